use std::fmt;

/// The six operation families the resource runtime is wrapped for.
/// `Delete` subsumes `deleteMany`; `List` subsumes `getAll`/`listIds`/`page`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationFamily {
    Insert,
    Update,
    Delete,
    Get,
    List,
    Count,
}

impl OperationFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationFamily::Insert => "insert",
            OperationFamily::Update => "update",
            OperationFamily::Delete => "delete",
            OperationFamily::Get => "get",
            OperationFamily::List => "list",
            OperationFamily::Count => "count",
        }
    }
}

impl fmt::Display for OperationFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
