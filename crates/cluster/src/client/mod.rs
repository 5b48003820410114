pub mod builder;
mod executor;
mod health;
mod sniffer;

use std::{
    fmt::Display,
    sync::{Arc, Weak},
    time::Duration,
};

use reqwest::Method;
use slog::{error, info};
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use vendor::prelude::lock::RwLock;

pub use builder::ClientBuilder;

use crate::{
    config::{BasicAuth, HealthcheckConfig, SniffConfig},
    connections::{Connection, ConnectionPool},
    error::{Error, Result},
    logging::LogSinks,
    retry::{Retrier, SharedRetrier},
    runtime,
    topology::SnifferCallback,
};

/// Settings callers may change on a running client, guarded by their own
/// lock so reading them never waits for the pool and vice versa.
pub(crate) struct Settings {
    pub(crate) retrier: SharedRetrier,
    pub(crate) basic_auth: Option<BasicAuth>,
    pub(crate) gzip: bool,
    pub(crate) send_get_body_as: Method,
}

struct Background {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

pub(crate) struct ClientInner {
    pub(crate) http: reqwest::Client,
    pub(crate) pool: ConnectionPool,
    pub(crate) settings: RwLock<Settings>,
    /// Canonical seed urls, always part of the sniff candidates.
    pub(crate) seeds: Vec<String>,
    pub(crate) scheme: String,
    pub(crate) sniff: SniffConfig,
    pub(crate) healthcheck: HealthcheckConfig,
    pub(crate) sniffer_callback: SnifferCallback,
    pub(crate) log: LogSinks,
    background: RwLock<Option<Background>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(background) = self.background.get_mut().take() {
            background.token.cancel();
        }
    }
}

/// Handle to a cluster. Cloning is cheap and every clone shares the pool,
/// the settings and the background tasks.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

impl Client {
    /// Starts the enabled background loops (sniffer, health checker).
    /// Does nothing if the client is already running.
    pub fn start(&self) -> Result<()> {
        let mut background = self.inner.background.write();
        if background.is_some() {
            return Ok(());
        }

        let token = CancellationToken::new();
        let mut tasks = Vec::with_capacity(2);
        let sniff = &self.inner.sniff;
        if sniff.enabled && !sniff.interval.is_zero() {
            let task = _periodic(
                Arc::downgrade(&self.inner),
                token.clone(),
                sniff.interval,
                |client| async move {
                    if let Err(e) = client.sniff(client.inner.sniff.timeout).await {
                        error!(client.inner.log.error, "sniffing failed"; "error" => %e);
                    }
                },
            );
            tasks.push(runtime::spawn(task).map_err(|e| Error::Construction(e.to_string()))?);
        }
        let healthcheck = &self.inner.healthcheck;
        if healthcheck.enabled && !healthcheck.interval.is_zero() {
            let task = _periodic(
                Arc::downgrade(&self.inner),
                token.clone(),
                healthcheck.interval,
                |client| async move {
                    client
                        .healthcheck(client.inner.healthcheck.timeout, false)
                        .await;
                },
            );
            tasks.push(runtime::spawn(task).map_err(|e| Error::Construction(e.to_string()))?);
        }

        info!(self.inner.log.info, "client started"; "background_tasks" => tasks.len());
        *background = Some(Background { token, tasks });
        Ok(())
    }

    /// Stops the background loops and waits until all of them exited.
    /// Does nothing if the client is not running.
    pub async fn stop(&self) {
        let background = self.inner.background.write().take();
        let Some(Background { token, tasks }) = background else {
            return;
        };
        token.cancel();
        for task in tasks {
            let _ = task.await;
        }
        info!(self.inner.log.info, "client stopped");
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.inner.background.read().is_some()
    }

    /// Flags the client running without starting any loop.
    pub(crate) fn _mark_running(&self) {
        let mut background = self.inner.background.write();
        if background.is_none() {
            *background = Some(Background {
                token: CancellationToken::new(),
                tasks: Vec::new(),
            });
        }
    }

    /// Snapshot of the pooled connections.
    #[inline]
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.inner.pool.snapshot()
    }

    pub fn set_retrier<R: Retrier>(&self, retrier: R) {
        self.inner.settings.write().retrier = Arc::new(retrier);
    }

    pub fn set_basic_auth<U: Into<String>, P: Into<String>>(&self, user: U, password: P) {
        self.inner.settings.write().basic_auth = Some(BasicAuth::new(user, password));
    }

    pub fn set_gzip(&self, gzip: bool) {
        self.inner.settings.write().gzip = gzip;
    }

    /// Method used to send GET requests that carry a body.
    pub fn set_send_get_body_as(&self, method: Method) {
        self.inner.settings.write().send_get_body_as = method;
    }

    #[inline]
    pub(crate) fn _basic_auth(&self) -> Option<BasicAuth> {
        self.inner.settings.read().basic_auth.clone()
    }
}

impl Display for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner.pool)
    }
}

/// Runs `cycle` every `period` until `token` is canceled or the client
/// is gone. The first cycle runs one period after start.
async fn _periodic<F, Fut>(inner: Weak<ClientInner>, token: CancellationToken, period: Duration, cycle: F)
where
    F: Fn(Client) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = inner.upgrade() else {
            break;
        };
        tokio::select! {
            _ = token.cancelled() => break,
            _ = cycle(Client { inner }) => {}
        }
    }
}
