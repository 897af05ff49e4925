use derive_more::Display;

/// Identifier of a single spool within its backend.
///
/// Only meaningful to the backend that allocated it; two backends may hand
/// out the same identifier.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpoolId(String);
impl SpoolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
