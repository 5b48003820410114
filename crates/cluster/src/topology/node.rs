use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// One node as reported by `GET /_nodes/http`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodesInfoNode {
    pub name: String,
    pub transport_address: String,
    pub host: String,
    pub ip: String,
    pub version: String,
    pub build_hash: String,
    /// e.g. `["master", "data", "ingest"]`
    pub roles: Vec<String>,
    pub attributes: HashMap<String, Value>,
    pub http: Option<NodesInfoNodeHttp>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodesInfoNodeHttp {
    pub bound_address: Vec<String>,
    pub publish_address: String,
    pub max_content_length_in_bytes: Option<u64>,
}

impl NodesInfoNode {
    #[inline]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Node is eligible to become master.
    #[inline]
    pub fn is_master(&self) -> bool {
        self.has_role("master")
    }

    #[inline]
    pub fn is_data(&self) -> bool {
        self.has_role("data")
    }

    #[inline]
    pub fn is_ingest(&self) -> bool {
        self.has_role("ingest")
    }

    /// The advertised HTTP address, if the node exposes one.
    pub fn publish_address(&self) -> Option<&str> {
        self.http
            .as_ref()
            .map(|http| http.publish_address.as_str())
            .filter(|addr| !addr.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::NodesInfoNode;

    #[test]
    fn roles_and_address() {
        let node: NodesInfoNode = serde_json::from_str(
            r#"{
                "name": "es-data-1",
                "roles": ["data", "ingest"],
                "attributes": {"zone": "east"},
                "http": {"publish_address": "10.0.0.7:9200", "bound_address": ["0.0.0.0:9200"]}
            }"#,
        )
        .unwrap();
        assert!(!node.is_master());
        assert!(node.is_data());
        assert!(node.is_ingest());
        assert_eq!(node.publish_address(), Some("10.0.0.7:9200"));
        assert_eq!(node.attributes["zone"], "east");

        let client_only = NodesInfoNode::default();
        assert_eq!(client_only.publish_address(), None);
    }
}
