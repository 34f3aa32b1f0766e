//! Wire form of a node snapshot carried on the sync topic.
//!
//! Snapshots are bincode-encoded. The extension list does not survive
//! bincode's non-self-describing format, so it travels as JSON text in
//! `ext`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::{Node, NodeId};
use crate::TypesError;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMsg {
    pub id: NodeId,
    pub node_id: String,
    pub pub_key: String,
    pub owner: String,
    pub profit_acc: String,
    pub pool_id: String,
    pub pool_owner: String,
    pub quota: i64,
    pub addrs: Vec<String>,
    pub cpu: i32,
    pub memory: i32,
    pub bandwidth: i32,
    pub max_data_space: i64,
    pub assigned_space: i64,
    pub productive_space: i64,
    pub used_space: i64,
    pub uspaces: BTreeMap<String, i64>,
    pub weight: f64,
    pub valid: i32,
    pub relay: i32,
    pub status: i32,
    pub timestamp: i64,
    pub version: i32,
    pub rebuilding: i32,
    pub real_space: i64,
    pub tx: i64,
    pub rx: i64,
    pub ext: String,
    pub manual_weight: i32,
}

impl NodeMsg {
    pub fn encode(&self) -> Result<Vec<u8>, TypesError> {
        bincode::serialize(self).map_err(|e| TypesError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TypesError> {
        bincode::deserialize(bytes).map_err(|e| TypesError::Serialization(e.to_string()))
    }
}

impl TryFrom<&Node> for NodeMsg {
    type Error = TypesError;

    fn try_from(node: &Node) -> Result<Self, Self::Error> {
        let ext = if node.other.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&node.other)
                .map_err(|e| TypesError::InvalidExtension(e.to_string()))?
        };
        Ok(Self {
            id: node.id,
            node_id: node.node_id.clone(),
            pub_key: node.pub_key.clone(),
            owner: node.owner.clone(),
            profit_acc: node.profit_acc.clone(),
            pool_id: node.pool_id.clone(),
            pool_owner: node.pool_owner.clone(),
            quota: node.quota,
            addrs: node.addrs.clone(),
            cpu: node.cpu,
            memory: node.memory,
            bandwidth: node.bandwidth,
            max_data_space: node.max_data_space,
            assigned_space: node.assigned_space,
            productive_space: node.productive_space,
            used_space: node.used_space,
            uspaces: node.uspaces.clone(),
            weight: node.weight,
            valid: node.valid,
            relay: node.relay,
            status: node.status,
            timestamp: node.timestamp,
            version: node.version,
            rebuilding: node.rebuilding,
            real_space: node.real_space,
            tx: node.tx,
            rx: node.rx,
            ext,
            manual_weight: node.manual_weight,
        })
    }
}

impl TryFrom<NodeMsg> for Node {
    type Error = TypesError;

    fn try_from(msg: NodeMsg) -> Result<Self, Self::Error> {
        let other = parse_ext(&msg.ext)?;
        Ok(Node {
            id: msg.id,
            node_id: msg.node_id,
            pub_key: msg.pub_key,
            owner: msg.owner,
            profit_acc: msg.profit_acc,
            pool_id: msg.pool_id,
            pool_owner: msg.pool_owner,
            quota: msg.quota,
            addrs: msg.addrs,
            cpu: msg.cpu,
            memory: msg.memory,
            bandwidth: msg.bandwidth,
            max_data_space: msg.max_data_space,
            assigned_space: msg.assigned_space,
            productive_space: msg.productive_space,
            used_space: msg.used_space,
            uspaces: msg.uspaces,
            weight: msg.weight,
            valid: msg.valid,
            relay: msg.relay,
            status: msg.status,
            timestamp: msg.timestamp,
            version: msg.version,
            rebuilding: msg.rebuilding,
            real_space: msg.real_space,
            tx: msg.tx,
            rx: msg.rx,
            other,
            manual_weight: msg.manual_weight,
            ..Default::default()
        })
    }
}

/// Only text shaped like a JSON array is parsed; anything else is an empty list.
fn parse_ext(ext: &str) -> Result<Vec<Value>, TypesError> {
    if ext.len() < 2 || !ext.starts_with('[') || !ext.ends_with(']') {
        return Ok(Vec::new());
    }
    serde_json::from_str(ext).map_err(|e| TypesError::InvalidExtension(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Node {
        let mut node = Node {
            id: 42,
            node_id: "16Uiu2HAm".into(),
            owner: "bob".into(),
            status: 1,
            weight: 12.5,
            addrs: vec!["/ip4/10.0.0.1/tcp/9999".into()],
            other: vec![json!({"TXTokenFillRate": 5, "RXTokenFillRate": 6})],
            ..Default::default()
        };
        node.uspaces.insert("0".into(), 10);
        node
    }

    #[test]
    fn snapshot_survives_the_wire() {
        let node = sample();
        let bytes = NodeMsg::try_from(&node).unwrap().encode().unwrap();
        let back = Node::try_from(NodeMsg::decode(&bytes).unwrap()).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn empty_extension_list_is_sent_as_empty_text() {
        let node = Node {
            id: 1,
            ..Default::default()
        };
        assert_eq!(NodeMsg::try_from(&node).unwrap().ext, "");
    }

    #[test]
    fn non_array_ext_is_ignored() {
        let msg = NodeMsg {
            id: 1,
            ext: "{\"a\":1}".into(),
            ..Default::default()
        };
        assert!(Node::try_from(msg).unwrap().other.is_empty());
    }

    #[test]
    fn malformed_array_ext_is_an_error() {
        let msg = NodeMsg {
            id: 1,
            ext: "[{]".into(),
            ..Default::default()
        };
        assert!(matches!(
            Node::try_from(msg),
            Err(TypesError::InvalidExtension(_))
        ));
    }

    #[test]
    fn garbage_bytes_do_not_decode() {
        assert!(NodeMsg::decode(&[1, 2, 3]).is_err());
    }
}
