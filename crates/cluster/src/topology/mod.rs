pub mod node;

use std::{collections::BTreeMap, sync::Arc, sync::OnceLock};

use regex::Regex;
use serde::Deserialize;

pub use node::{NodesInfoNode, NodesInfoNodeHttp};

/// Decides whether a discovered node may be added to the pool.
pub type SnifferCallback = Arc<dyn Fn(&NodesInfoNode) -> bool + Send + Sync + 'static>;

/// Callback accepting every node.
pub fn accept_all() -> SnifferCallback {
    Arc::new(|_| true)
}

/// Body of `GET /_nodes/http`, nodes keyed by node id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodesInfoResponse {
    pub cluster_name: String,
    pub nodes: BTreeMap<String, NodesInfoNode>,
}

fn _inet_address() -> Option<&'static Regex> {
    static INET: OnceLock<Option<Regex>> = OnceLock::new();
    INET.get_or_init(|| Regex::new(r"/([^:]*):([0-9]+)\]").ok()).as_ref()
}

/// Turns a published address into a connection url with `scheme`.
/// Supports the plain `host:port` form, the `hostname/ip:port` form and the
/// legacy `inet[/ip:port]` form.
/// ## Example
/// ```rust
/// use cluster::topology::extract_hostname;
///
/// assert_eq!(extract_hostname("http", "10.0.0.1:9200").as_deref(), Some("http://10.0.0.1:9200"));
/// assert_eq!(extract_hostname("http", "inet[/10.0.0.5:9300]").as_deref(), Some("http://10.0.0.5:9300"));
/// assert_eq!(extract_hostname("http", "es1/10.0.0.2:9200").as_deref(), Some("http://10.0.0.2:9200"));
/// assert_eq!(extract_hostname("http", "no-port"), None);
/// ```
pub fn extract_hostname(scheme: &str, address: &str) -> Option<String> {
    if address.starts_with("inet") {
        if let Some(caps) = _inet_address().and_then(|re| re.captures(address)) {
            return Some(format!("{}://{}:{}", scheme, &caps[1], &caps[2]));
        }
    }
    let host = match address.find('/') {
        Some(idx) => &address[idx + 1..],
        None => address,
    };
    if !host.contains(':') {
        return None;
    }
    Some(format!("{}://{}", scheme, host))
}
