use std::{fmt::Display, time::SystemTime};

use vendor::prelude::lock::RwLock;

#[derive(Debug, Default)]
struct Liveness {
    dead: bool,
    failures: u32,
    dead_since: Option<SystemTime>,
}

/// One reachable node endpoint and its liveness. The pool hands out
/// `Arc<Connection>`, so a dead mark made by one request is seen by every
/// other holder, and a sniff keeps the very same object (and so its
/// history) for a node it finds again.
/// ## Example
/// ```rust
/// use cluster::connections::connection::Connection;
///
/// let conn = Connection::new("n1", "http://10.0.0.5:9200");
/// conn.mark_as_dead();
/// assert!(conn.is_dead());
/// conn.mark_as_healthy();
/// assert_eq!(conn.failures(), 0);
/// ```
#[derive(Debug)]
pub struct Connection {
    node_id: Option<String>,
    url: String,
    liveness: RwLock<Liveness>,
}

impl Connection {
    /// Connection to a node discovered by sniffing.
    pub fn new<I: Into<String>, U: Into<String>>(node_id: I, url: U) -> Self {
        Self::with_node_id(Some(node_id.into()), url.into())
    }

    /// Connection to a statically configured url, node id unknown.
    pub fn seed<U: Into<String>>(url: U) -> Self {
        Self::with_node_id(None, url.into())
    }

    fn with_node_id(node_id: Option<String>, url: String) -> Self {
        Self {
            node_id: node_id.filter(|id| !id.is_empty()),
            url,
            liveness: RwLock::new(Liveness::default()),
        }
    }

    #[inline]
    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Identity for merging: the node id when known, else the url.
    #[inline]
    pub fn identity(&self) -> &str {
        self.node_id().unwrap_or(&self.url)
    }

    /// Two connections point to the same node if their ids match, or,
    /// when one of them has no id, if their urls match.
    pub fn same_node(&self, other: &Connection) -> bool {
        match (self.node_id(), other.node_id()) {
            (Some(this), Some(that)) => this == that,
            _ => self.url == other.url,
        }
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.liveness.read().dead
    }

    /// Times the connection was marked dead since it was last healthy.
    #[inline]
    pub fn failures(&self) -> u32 {
        self.liveness.read().failures
    }

    #[inline]
    pub fn dead_since(&self) -> Option<SystemTime> {
        self.liveness.read().dead_since
    }

    pub fn mark_as_dead(&self) {
        let mut liveness = self.liveness.write();
        liveness.dead = true;
        if liveness.dead_since.is_none() {
            liveness.dead_since = Some(SystemTime::now());
        }
        liveness.failures = liveness.failures.saturating_add(1);
    }

    /// Eligible for selection again, failure history is kept.
    #[inline]
    pub fn mark_as_alive(&self) {
        self.liveness.write().dead = false;
    }

    /// A full request round-trip succeeded, forget past failures.
    pub fn mark_as_healthy(&self) {
        let mut liveness = self.liveness.write();
        liveness.dead = false;
        liveness.dead_since = None;
        liveness.failures = 0;
    }
}

impl Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.is_dead() { "dead" } else { "alive" };
        write!(f, "{} [{}]", self.url, status)
    }
}
