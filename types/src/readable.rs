//! Entries of the readable-nodes snapshot served to clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::Node;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadableNode {
    pub id: String,
    #[serde(rename = "nodeid")]
    pub node_id: String,
    pub ip: Vec<String>,
    pub weight: String,
    #[serde(rename = "TXTokenFillRate")]
    pub tx_token_fill_rate: i64,
    #[serde(rename = "RXTokenFillRate")]
    pub rx_token_fill_rate: i64,
}

impl From<&Node> for ReadableNode {
    fn from(node: &Node) -> Self {
        let params = node.other.first();
        Self {
            id: node.id.to_string(),
            node_id: node.node_id.clone(),
            ip: node.addrs.clone(),
            weight: (node.weight as i32).to_string(),
            tx_token_fill_rate: fill_rate(params, "TXTokenFillRate"),
            rx_token_fill_rate: fill_rate(params, "RXTokenFillRate"),
        }
    }
}

fn fill_rate(params: Option<&Value>, key: &str) -> i64 {
    params
        .and_then(|doc| doc.get(key))
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_fill_rates_from_first_extension_document() {
        let node = Node {
            id: 3,
            node_id: "n3".into(),
            weight: 17.9,
            addrs: vec!["a".into()],
            other: vec![json!({"TXTokenFillRate": 10, "RXTokenFillRate": 20.0})],
            ..Default::default()
        };
        let readable = ReadableNode::from(&node);
        assert_eq!(readable.id, "3");
        assert_eq!(readable.weight, "17");
        assert_eq!(readable.tx_token_fill_rate, 10);
        assert_eq!(readable.rx_token_fill_rate, 20);
    }

    #[test]
    fn missing_extension_reads_as_zero() {
        let node = Node {
            id: 4,
            ..Default::default()
        };
        let readable = ReadableNode::from(&node);
        assert_eq!(readable.tx_token_fill_rate, 0);
        assert_eq!(readable.rx_token_fill_rate, 0);
    }
}
