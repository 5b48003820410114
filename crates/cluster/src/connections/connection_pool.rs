use std::{fmt::Display, sync::Arc};

use slog::{error, Logger};
use vendor::prelude::lock::RwLock;

use super::connection::Connection;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Members {
    conns: Vec<Arc<Connection>>,
    /// Index of the connection handed out last, unset after membership changed.
    cursor: Option<usize>,
}

/// The ordered set of known connections and the round-robin cursor over
/// them. Selection and replacement are serialized by one lock, liveness
/// changes go through each connection's own lock.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    members: RwLock<Members>,
}

impl ConnectionPool {
    pub fn new(conns: Vec<Arc<Connection>>) -> Self {
        Self {
            members: RwLock::new(Members { conns, cursor: None }),
        }
    }

    /// Picks the next alive connection in round-robin order.
    /// ### Params
    /// * **sniffer_enabled**: if all connections are dead and sniffing is on,
    /// wait for the sniffer to find fresh nodes (fail). Otherwise every
    /// connection is resurrected so the client cannot get stuck forever.
    /// * **logger**: where a resurrection is reported.
    /// ### Returns
    /// The connection, or [Error::NoAvailableConnection].
    pub fn next(&self, sniffer_enabled: bool, logger: &Logger) -> Result<Arc<Connection>> {
        let mut members = self.members.write();
        let total = members.conns.len();
        if total == 0 {
            return Err(Error::no_connection("no connection in the pool"));
        }

        for _ in 0..total {
            let cursor = members.cursor.map_or(0, |c| (c + 1) % total);
            members.cursor = Some(cursor);
            let conn = &members.conns[cursor];
            if !conn.is_dead() {
                return Ok(conn.clone());
            }
        }

        if sniffer_enabled {
            return Err(Error::no_connection(format!("all {} nodes marked as dead", total)));
        }

        error!(logger, "all nodes marked as dead; resurrecting them to prevent deadlock"; "nodes" => total);
        for conn in members.conns.iter() {
            conn.mark_as_alive();
        }
        let cursor = members.cursor.unwrap_or(0);
        Ok(members.conns[cursor].clone())
    }

    /// Replaces the membership with the `discovered` connections. A node
    /// already known keeps its connection object (liveness and failure
    /// history), matching by node id first and by url otherwise.
    /// ### Returns
    /// The connections that were not known before.
    pub fn update(&self, discovered: Vec<Arc<Connection>>) -> Vec<Arc<Connection>> {
        let mut members = self.members.write();
        let mut next: Vec<Arc<Connection>> = Vec::with_capacity(discovered.len());
        let mut joined = Vec::new();
        for conn in discovered {
            if next.iter().any(|kept| kept.same_node(&conn)) {
                continue;
            }
            match _find_known(&members.conns, &conn) {
                Some(known) => next.push(known),
                None => {
                    joined.push(conn.clone());
                    next.push(conn);
                }
            }
        }
        members.conns = next;
        members.cursor = None;
        joined
    }

    /// Copy of the current membership.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.members.read().conns.clone()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.read().conns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn has_alive(&self) -> bool {
        self.members.read().conns.iter().any(|c| !c.is_dead())
    }

    /// Fails unless at least one connection is alive.
    pub fn must_have_alive(&self) -> Result<()> {
        let members = self.members.read();
        if members.conns.iter().any(|c| !c.is_dead()) {
            return Ok(());
        }
        let urls: Vec<&str> = members.conns.iter().map(|c| c.url()).collect();
        Err(Error::no_connection(format!(
            "no active connection found: {:?}",
            urls
        )))
    }
}

/// Same id wins over same url, a url may be shared by a restarted node.
fn _find_known(known: &[Arc<Connection>], conn: &Connection) -> Option<Arc<Connection>> {
    if let Some(id) = conn.node_id() {
        if let Some(found) = known.iter().find(|k| k.node_id() == Some(id)) {
            return Some(found.clone());
        }
    }
    known
        .iter()
        .find(|k| (k.node_id().is_none() || conn.node_id().is_none()) && k.url() == conn.url())
        .cloned()
}

impl Display for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let members = self.members.read();
        for (i, conn) in members.conns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", conn)?;
        }
        Ok(())
    }
}
