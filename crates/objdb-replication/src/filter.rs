use std::collections::HashSet;
use std::sync::Arc;

/// Case-insensitive allow/block list, or an arbitrary predicate, applied
/// both to which resources a replicator gets listeners for and to which
/// entries in its `resources` map are honored.
pub enum ResourceSelector {
    All,
    Allowlist(HashSet<String>),
    Blocklist(HashSet<String>),
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl ResourceSelector {
    pub fn allowlist(resources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ResourceSelector::Allowlist(resources.into_iter().map(|s| s.into().to_lowercase()).collect())
    }

    pub fn blocklist(resources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ResourceSelector::Blocklist(resources.into_iter().map(|s| s.into().to_lowercase()).collect())
    }

    pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        ResourceSelector::Predicate(Arc::new(f))
    }

    pub fn allows(&self, resource: &str) -> bool {
        match self {
            ResourceSelector::All => true,
            ResourceSelector::Allowlist(set) => set.contains(&resource.to_lowercase()),
            ResourceSelector::Blocklist(set) => !set.contains(&resource.to_lowercase()),
            ResourceSelector::Predicate(f) => f(resource),
        }
    }
}
