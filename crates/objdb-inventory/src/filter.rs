use std::sync::Arc;

use globset::{Glob, GlobMatcher};
use objdb_types::InventoryItem;

use crate::error::InventoryError;

/// A single `select`/`ignore` rule: either a glob matched against
/// `resourceType`, or an arbitrary predicate over the full item.
pub enum FilterRule {
    Pattern(GlobMatcher),
    Predicate(Arc<dyn Fn(&InventoryItem) -> bool + Send + Sync>),
}

impl FilterRule {
    pub fn pattern(glob: &str) -> Result<Self, InventoryError> {
        let matcher = Glob::new(glob)
            .map_err(|source| InventoryError::InvalidPattern { pattern: glob.to_string(), source })?
            .compile_matcher();
        Ok(FilterRule::Pattern(matcher))
    }

    pub fn predicate(f: impl Fn(&InventoryItem) -> bool + Send + Sync + 'static) -> Self {
        FilterRule::Predicate(Arc::new(f))
    }

    fn matches(&self, item: &InventoryItem) -> bool {
        match self {
            FilterRule::Pattern(glob) => glob.is_match(&item.resource_type),
            FilterRule::Predicate(f) => f(item),
        }
    }
}

/// `select` (whitelist) is applied first — an empty `select` list admits
/// everything — then `ignore` (blacklist) removes matches from what
/// remains.
#[derive(Default)]
pub struct InventoryFilter {
    select: Vec<FilterRule>,
    ignore: Vec<FilterRule>,
}

impl InventoryFilter {
    pub fn new(select: Vec<FilterRule>, ignore: Vec<FilterRule>) -> Self {
        InventoryFilter { select, ignore }
    }

    pub fn allows(&self, item: &InventoryItem) -> bool {
        let selected = self.select.is_empty() || self.select.iter().any(|r| r.matches(item));
        if !selected {
            return false;
        }
        !self.ignore.iter().any(|r| r.matches(item))
    }
}
