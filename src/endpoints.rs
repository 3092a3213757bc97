//! The fixed, ordered set of probed endpoints

use crate::errors::{DrWebError, Result};
use indexmap::IndexMap;

/// Checks whose outcome decides the verdict
pub const CRITICAL_CHECKS: [&str; 3] = ["health", "diag", "selftest"];

/// Ordered mapping from check name to relative URL path
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointMap {
    entries: IndexMap<String, String>,
}

impl Default for EndpointMap {
    fn default() -> Self {
        let entries = [
            ("health", "/api/healthz"),
            ("diag", "/api/diag"),
            ("selftest", "/api/selftest"),
            ("version", "/api/version"),
            ("time", "/api/time"),
        ]
        .into_iter()
        .map(|(name, path)| (name.to_string(), path.to_string()))
        .collect();

        Self { entries }
    }
}

impl EndpointMap {
    /// Build a map from (name, path) pairs, rejecting duplicate names
    pub fn new<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = IndexMap::new();
        for (name, path) in entries {
            let name = name.into();
            if map.contains_key(&name) {
                return Err(DrWebError::Config(format!("duplicate check name: {}", name)));
            }
            map.insert(name, path.into());
        }
        Ok(Self { entries: map })
    }

    /// Iterate entries in execution order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Resolve every entry against a base URL that has no trailing slash
    pub fn resolve<'a>(&'a self, base: &'a str) -> impl Iterator<Item = (&'a str, String)> + 'a {
        self.iter().map(move |(name, path)| (name, format!("{}{}", base, path)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
