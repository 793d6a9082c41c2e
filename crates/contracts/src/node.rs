//! Upstream node registry entries
//!
//! The core never picks nodes on its own. Callers pre-order endpoints with
//! [`order_endpoints`] before handing them to the dispatcher.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Blockchain network family served by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainType {
    Ethereum,
    Bitcoin,
    Polygon,
    Bsc,
    Avalanche,
    Solana,
    Tron,
}

impl ChainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Bitcoin => "bitcoin",
            Self::Polygon => "polygon",
            Self::Bsc => "bsc",
            Self::Avalanche => "avalanche",
            Self::Solana => "solana",
            Self::Tron => "tron",
        }
    }
}

impl std::fmt::Display for ChainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upstream RPC node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NodeDescriptor {
    /// Unique node name
    #[validate(length(min = 1))]
    pub name: String,

    pub chain: ChainType,

    /// mainnet, testnet, ...
    #[serde(default = "default_network")]
    pub network: String,

    /// Endpoint identifier handed to the remote call
    #[validate(length(min = 1))]
    pub url: String,

    /// Higher priority nodes are listed first
    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_is_active")]
    pub is_active: bool,

    /// Advisory request budget, not enforced by the core
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

fn default_network() -> String {
    "mainnet".to_string()
}

fn default_is_active() -> bool {
    true
}

fn default_max_requests() -> u32 {
    1000
}

/// Active node URLs, highest priority first
///
/// Ties keep registry order. This is the only ordering the dispatch core
/// accepts; a lower-priority node can still win a failover race if faster.
pub fn order_endpoints(nodes: &[NodeDescriptor]) -> Vec<String> {
    let mut active: Vec<&NodeDescriptor> = nodes.iter().filter(|n| n.is_active).collect();
    active.sort_by(|a, b| b.priority.cmp(&a.priority));
    active.into_iter().map(|n| n.url.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, priority: i32, is_active: bool) -> NodeDescriptor {
        NodeDescriptor {
            name: name.to_string(),
            chain: ChainType::Ethereum,
            network: default_network(),
            url: format!("https://{name}.example.org"),
            priority,
            is_active,
            max_requests: default_max_requests(),
        }
    }

    #[test]
    fn test_order_endpoints_by_priority() {
        let nodes = vec![node("low", 1, true), node("high", 10, true), node("mid", 5, true)];
        assert_eq!(
            order_endpoints(&nodes),
            vec![
                "https://high.example.org",
                "https://mid.example.org",
                "https://low.example.org"
            ]
        );
    }

    #[test]
    fn test_order_endpoints_skips_inactive_and_keeps_ties() {
        let nodes = vec![node("a", 3, true), node("off", 99, false), node("b", 3, true)];
        assert_eq!(
            order_endpoints(&nodes),
            vec!["https://a.example.org", "https://b.example.org"]
        );
    }

    #[test]
    fn test_node_defaults_from_json() {
        let json = r#"{ "name": "tron-1", "chain": "tron", "url": "https://api.trongrid.io" }"#;
        let node: NodeDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(node.network, "mainnet");
        assert!(node.is_active);
        assert_eq!(node.priority, 0);
        assert_eq!(node.chain.to_string(), "tron");
    }
}
