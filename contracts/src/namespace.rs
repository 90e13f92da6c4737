use crate::error::{ContractError, ContractResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical partition of the memory store. `default` is the implicit root;
/// every other namespace is a path segment under the memory root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace(String);

impl Namespace {
    pub const DEFAULT: &'static str = "default";
    pub const GLOBAL: &'static str = "global";

    pub fn new(name: impl Into<String>) -> ContractResult<Self> {
        let name = name.into();
        if name.is_empty() || name.contains('/') || name.contains("..") || name.contains('\\') {
            return Err(ContractError::InvalidNamespace(name));
        }
        Ok(Self(name))
    }

    pub fn default_namespace() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    pub fn global() -> Self {
        Self(Self::GLOBAL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::default_namespace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal() {
        assert!(Namespace::new("../etc").is_err());
        assert!(Namespace::new("a/b").is_err());
        assert!(Namespace::new("").is_err());
    }

    #[test]
    fn accepts_plain_name() {
        assert!(Namespace::new("team-alpha").is_ok());
    }
}
