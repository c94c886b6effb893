//! Endpoint registry.
//!
//! Static table of probe targets and the groups they are aggregated in.

mod builtin;

pub use builtin::*;

use crate::config::ServerConfig;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// HTTP method used by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// A single named endpoint to probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeTarget {
    pub name: String,
    pub description: String,
    pub base_url: String,
    pub path: String,
    pub method: HttpMethod,
    pub requires_auth: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_payload: Option<serde_json::Value>,
    pub classifier_key: String,
}

impl ProbeTarget {
    /// Create a GET target with no auth and no payload.
    pub fn get(name: &str, base_url: &str, path: &str, classifier_key: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            base_url: base_url.to_string(),
            path: path.to_string(),
            method: HttpMethod::Get,
            requires_auth: false,
            test_payload: None,
            classifier_key: classifier_key.to_string(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// Switch the target to POST with the given JSON body.
    pub fn with_post(mut self, payload: serde_json::Value) -> Self {
        self.method = HttpMethod::Post;
        self.test_payload = Some(payload);
        self
    }

    /// Full request URL.
    pub fn url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.path.is_empty() {
            base.to_string()
        } else if self.path.starts_with('/') {
            format!("{}{}", base, self.path)
        } else {
            format!("{}/{}", base, self.path)
        }
    }
}

/// Immutable registry of targets and groups.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    targets: BTreeMap<String, ProbeTarget>,
    groups: BTreeMap<String, Vec<String>>,
}

impl Registry {
    /// Build the built-in registry with base URLs taken from configuration.
    pub fn from_config(cfg: &ServerConfig) -> Self {
        let mut registry = Self::default();
        for target in builtin_targets(cfg) {
            registry.insert(target);
        }
        for (key, members) in BUILTIN_GROUPS {
            registry.define_group(key, members.iter().map(|m| m.to_string()).collect());
        }
        registry
    }

    /// Add a target, replacing any target of the same name.
    pub fn insert(&mut self, target: ProbeTarget) {
        self.targets.insert(target.name.clone(), target);
    }

    /// Define a group as an ordered list of target names.
    pub fn define_group(&mut self, key: &str, members: Vec<String>) {
        self.groups.insert(key.to_string(), members);
    }

    pub fn get(&self, name: &str) -> Option<&ProbeTarget> {
        self.targets.get(name)
    }

    /// Resolve a group to its targets, in group order.
    ///
    /// Members that name no registered target are skipped.
    pub fn group(&self, key: &str) -> Option<Vec<ProbeTarget>> {
        let members = self.groups.get(key)?;
        Some(
            members
                .iter()
                .filter_map(|name| self.targets.get(name).cloned())
                .collect(),
        )
    }

    pub fn group_keys(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn targets(&self) -> impl Iterator<Item = &ProbeTarget> {
        self.targets.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let t = ProbeTarget::get("a", "https://api.example.com/", "/daemon/getinfo", "daemon-info");
        assert_eq!(t.url(), "https://api.example.com/daemon/getinfo");

        let t = ProbeTarget::get("b", "https://api.example.com", "stats", "explorer-stats");
        assert_eq!(t.url(), "https://api.example.com/stats");
    }

    #[test]
    fn test_builtin_groups_resolve() {
        let registry = Registry::from_config(&ServerConfig::default());

        for key in ["network", "explorer", "stats", "ai-services", "infrastructure"] {
            let targets = registry.group(key).expect("group should exist");
            assert!(!targets.is_empty(), "group {} is empty", key);
        }

        let ai = registry.group("ai-services").unwrap();
        assert_eq!(ai.len(), 5);
        assert!(ai.iter().all(|t| t.requires_auth));

        let infra = registry.group("infrastructure").unwrap();
        let network = registry.group("network").unwrap();
        assert!(infra.len() > network.len());
    }

    #[test]
    fn test_explorer_transactions_and_models() {
        let registry = Registry::from_config(&ServerConfig::default());

        let txs = registry.get("Explorer Transactions").unwrap();
        assert!(txs.url().ends_with("/txs?limit=20"));
        assert!(!txs.requires_auth);
        let explorer = registry.group("explorer").unwrap();
        assert!(explorer.iter().any(|t| t.name == "Explorer Transactions"));
        let infra = registry.group("infrastructure").unwrap();
        assert!(infra.iter().any(|t| t.name == "Explorer Transactions"));

        let models = registry.get("Models").unwrap();
        assert!(models.url().ends_with("/v1/models"));
        assert_eq!(models.method, HttpMethod::Get);
        assert!(models.requires_auth);
    }

    #[test]
    fn test_every_builtin_target_has_a_heuristic() {
        let heuristics = crate::classify::Heuristics::builtin();
        let registry = Registry::from_config(&ServerConfig::default());
        for target in registry.targets() {
            assert!(
                heuristics.get(&target.classifier_key).is_some(),
                "no heuristic for {}",
                target.name
            );
        }
    }

    #[test]
    fn test_unknown_group_is_none() {
        let registry = Registry::from_config(&ServerConfig::default());
        assert!(registry.group("does-not-exist").is_none());
        assert!(registry.get("does-not-exist").is_none());
    }

    #[test]
    fn test_base_urls_follow_config() {
        let cfg = ServerConfig {
            ai_url: "http://127.0.0.1:9999".to_string(),
            ..Default::default()
        };
        let registry = Registry::from_config(&cfg);
        let gpt = registry.get("FluxGPT").unwrap();
        assert_eq!(gpt.url(), "http://127.0.0.1:9999/v1/chat/completions");
        assert_eq!(gpt.method, HttpMethod::Post);
        assert!(gpt.test_payload.is_some());
    }
}
