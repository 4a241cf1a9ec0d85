use uuid::Uuid;

/// Generates a new record/ticket/lease identifier.
///
/// A thin wrapper rather than calling `Uuid::new_v4()` at every call site so
/// the id format can change (e.g. to ULIDs) without touching callers.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Prefixed id, used for queue entries, tickets and snapshot keys where a
/// human-scannable namespace in logs is worth the extra bytes.
pub fn new_prefixed_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_unique() {
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn prefixed_id_carries_prefix() {
        let id = new_prefixed_id("msg");
        assert!(id.starts_with("msg-"));
    }
}
