use std::{sync::Arc, time::Duration};

use futures::{stream::FuturesUnordered, StreamExt};
use reqwest::Method;
use slog::{debug, info};

use super::Client;
use crate::{
    config::BasicAuth,
    connections::Connection,
    error::{Error, Result},
    http::{request::PreparedRequest, response::Response},
    topology::{extract_hostname, NodesInfoResponse},
};

const NODES_INFO_PATH: &str = "/_nodes/http";

impl Client {
    /// Discovers the cluster members and replaces the pool with them.
    /// Every seed url and every alive connection is asked concurrently,
    /// the first non-empty answer within `timeout` wins and the other
    /// probes are dropped. Nothing happens if sniffing is disabled.
    /// ### Returns
    /// [Error::NoAvailableConnection] if there is nothing to ask or no
    /// node answered in time, the pool is left untouched then.
    pub async fn sniff(&self, timeout: Duration) -> Result<()> {
        if !self.inner.sniff.enabled {
            return Ok(());
        }

        let mut candidates = self.inner.seeds.clone();
        for conn in self.inner.pool.snapshot() {
            if !conn.is_dead() && !candidates.iter().any(|url| url == conn.url()) {
                candidates.push(conn.url().to_owned());
            }
        }
        if candidates.is_empty() {
            return Err(Error::no_connection("no URLs to sniff"));
        }

        let auth = self._basic_auth();
        let mut probes: FuturesUnordered<_> = candidates
            .iter()
            .map(|url| self._sniff_node(url, timeout, auth.as_ref()))
            .collect();

        let winner = tokio::time::timeout(timeout, async {
            while let Some(nodes) = probes.next().await {
                if !nodes.is_empty() {
                    return Some(nodes);
                }
            }
            None
        })
        .await;

        let discovered = match winner {
            Ok(Some(nodes)) => nodes,
            Ok(None) => {
                return Err(Error::no_connection(format!(
                    "no node found by sniffing {:?}",
                    candidates
                )))
            }
            Err(_) => {
                return Err(Error::no_connection(format!(
                    "sniffing {:?} timed out after {:?}",
                    candidates, timeout
                )))
            }
        };

        for joined in self.inner.pool.update(discovered) {
            info!(self.inner.log.info, "node joined the cluster"; "url" => joined.url(), "node_id" => joined.identity());
        }
        Ok(())
    }

    /// Asks the node at `url` for the cluster members. Any failure yields
    /// an empty list.
    async fn _sniff_node(
        &self,
        url: &str,
        timeout: Duration,
        auth: Option<&BasicAuth>,
    ) -> Vec<Arc<Connection>> {
        let info = match self._nodes_info(url, timeout, auth).await {
            Ok(info) => info,
            Err(e) => {
                debug!(self.inner.log.trace, "sniffing node failed"; "url" => url, "error" => %e);
                return Vec::new();
            }
        };

        let accept = &self.inner.sniffer_callback;
        info.nodes
            .iter()
            .filter(|(_, node)| accept(node))
            .filter_map(|(node_id, node)| {
                let address = node.publish_address()?;
                let url = extract_hostname(&self.inner.scheme, address)?;
                Some(Arc::new(Connection::new(node_id.clone(), url)))
            })
            .collect()
    }

    async fn _nodes_info(
        &self,
        url: &str,
        timeout: Duration,
        auth: Option<&BasicAuth>,
    ) -> Result<NodesInfoResponse> {
        let mut req = PreparedRequest::probe(Method::GET, NODES_INFO_PATH).build(
            &self.inner.http,
            url,
            auth,
        )?;
        *req.timeout_mut() = Some(timeout);
        let resp = Response::read(self.inner.http.execute(req).await?).await?;
        if !resp.is_success() {
            return Err(Error::no_connection(format!(
                "nodes info of {} answered {}",
                url, resp.status
            )));
        }
        resp.decode()
    }
}
