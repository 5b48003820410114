use std::time::Duration;

use futures::{stream, StreamExt};
use reqwest::Method;
use slog::{error, info};
use tokio::time::{sleep, Instant};

use super::Client;
use crate::{
    config::BasicAuth,
    error::{Error, Result},
    http::request::PreparedRequest,
};

const STARTUP_BACKOFF: Duration = Duration::from_secs(1);

impl Client {
    /// Probes every pooled connection with a bodyless `HEAD /` and marks
    /// it alive on a 2xx answer, dead otherwise. Nothing happens if health
    /// checks are disabled, unless `force` is set.
    pub async fn healthcheck(&self, timeout: Duration, force: bool) {
        if !force && !self.inner.healthcheck.enabled {
            return;
        }
        let auth = self._basic_auth();
        let auth = auth.as_ref();
        let conns = self.inner.pool.snapshot();
        let log = &self.inner.log;

        stream::iter(conns)
            .for_each_concurrent(self.inner.healthcheck.concurrency(), |conn| async move {
                match self._probe(conn.url(), timeout, auth).await {
                    Ok(status) if (200..300).contains(&status) => {
                        if conn.is_dead() {
                            info!(log.info, "node is alive again"; "url" => conn.url());
                        }
                        conn.mark_as_alive();
                    }
                    Ok(status) => {
                        error!(log.error, "node answered health check with an error"; "url" => conn.url(), "status" => status);
                        conn.mark_as_dead();
                    }
                    Err(e) => {
                        error!(log.error, "node failed health check"; "url" => conn.url(), "error" => %e);
                        conn.mark_as_dead();
                    }
                }
            })
            .await;
    }

    /// Waits for any seed url to answer a health probe, retrying every
    /// second until `timeout` has elapsed.
    pub(crate) async fn startup_healthcheck(&self, timeout: Duration) -> Result<()> {
        let auth = self._basic_auth();
        let deadline = Instant::now() + timeout;
        loop {
            for url in self.inner.seeds.iter() {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match self._probe(url, remaining, auth.as_ref()).await {
                    Ok(status) if (200..300).contains(&status) => return Ok(()),
                    Ok(status) => {
                        error!(self.inner.log.error, "seed answered health check with an error"; "url" => url, "status" => status)
                    }
                    Err(e) => {
                        error!(self.inner.log.error, "seed failed health check"; "url" => url, "error" => %e)
                    }
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            sleep(std::cmp::min(STARTUP_BACKOFF, remaining)).await;
        }
        Err(Error::Construction(format!(
            "health check timeout: no node available within {:?} at {:?}",
            timeout, self.inner.seeds
        )))
    }

    async fn _probe(&self, url: &str, timeout: Duration, auth: Option<&BasicAuth>) -> Result<u16> {
        let mut req = PreparedRequest::probe(Method::HEAD, "").build(&self.inner.http, url, auth)?;
        *req.timeout_mut() = Some(timeout);
        let resp = self.inner.http.execute(req).await?;
        Ok(resp.status().as_u16())
    }
}
