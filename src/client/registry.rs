//! Static list of cluster endpoints
//!
//! The registry order is the scan order used by leader discovery and download
//! fallback. It carries no other priority.

use crate::common::config::DEFAULT_NODES;
use crate::common::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRegistry {
    endpoints: Vec<String>,
}

impl NodeRegistry {
    /// Validate and normalize a list of base URLs.
    pub fn new<I, S>(endpoints: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for raw in endpoints {
            let endpoint = normalize_endpoint(raw.as_ref())?;
            if normalized.contains(&endpoint) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate node endpoint: {}",
                    endpoint
                )));
            }
            normalized.push(endpoint);
        }

        if normalized.is_empty() {
            return Err(Error::InvalidConfig("node list cannot be empty".into()));
        }

        Ok(Self {
            endpoints: normalized,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        let endpoint = endpoint.trim_end_matches('/');
        self.endpoints.iter().any(|e| e == endpoint)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_NODES.iter().map(|n| n.to_string()).collect(),
        }
    }
}

fn normalize_endpoint(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let url = reqwest::Url::parse(trimmed)
        .map_err(|e| Error::InvalidConfig(format!("invalid node url {:?}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::InvalidConfig(format!(
            "node url must be http(s) with a host: {}",
            raw
        )));
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}
