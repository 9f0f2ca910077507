use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a node in the cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One server that may answer a request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Replica {
    node_id: NodeId,
    address: String,
}

impl Replica {
    pub fn new(node_id: NodeId, address: impl Into<String>) -> Self {
        Self {
            node_id,
            address: address.into(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Network address the replica listens on, e.g. `127.0.0.1:26257`.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for Replica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.node_id, self.address)
    }
}

/// Opaque request payload transported to a replica.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchRequest(pub serde_json::Value);

/// Opaque response payload returned by a replica.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchResponse(pub serde_json::Value);

impl From<serde_json::Value> for BatchRequest {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl From<serde_json::Value> for BatchResponse {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{NodeId, Replica};

    #[test]
    fn replica_display_includes_node_and_address() {
        let replica = Replica::new(NodeId(3), "10.0.0.3:26257");
        assert_eq!(replica.to_string(), "n3@10.0.0.3:26257");
        assert_eq!(replica.address(), "10.0.0.3:26257");
        assert_eq!(replica.node_id(), NodeId(3));
    }
}
