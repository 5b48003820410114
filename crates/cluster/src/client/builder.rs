use std::{sync::Arc, time::Duration};

use reqwest::Method;
use slog::{info, Level, Logger};
use vendor::prelude::{file_logger, lock::RwLock, LoggerConfig};

use super::{Client, ClientInner, Settings};
use crate::{
    config::{canonicalize_url, BasicAuth, ClientConfig, HealthcheckConfig, SniffConfig, DEFAULT_SCHEME, DEFAULT_URL},
    connections::{Connection, ConnectionPool},
    error::{Error, Result},
    logging::LogSinks,
    retry::{BackoffRetrier, Retrier, SharedRetrier, SimpleBackoff, StopRetrier},
    topology::{accept_all, NodesInfoNode, SnifferCallback},
};

/// Configures and builds a [Client].
/// ## Example
/// ```no_run
/// use std::time::Duration;
/// use cluster::ClientBuilder;
/// # async fn run() -> cluster::Result<()> {
/// let client = ClientBuilder::new()
///     .urls(["http://127.0.0.1:9200", "http://127.0.0.1:9201"])
///     .sniffer_callback(|node| node.is_data())
///     .healthcheck_interval(Duration::from_secs(10))
///     .max_retries(5)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    urls: Vec<String>,
    basic_auth: Option<BasicAuth>,
    scheme: String,
    sniff: SniffConfig,
    healthcheck: HealthcheckConfig,
    sniffer_callback: SnifferCallback,
    retrier: SharedRetrier,
    gzip: bool,
    send_get_body_as: Method,
    log: LogSinks,
    http: Option<reqwest::Client>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            basic_auth: None,
            scheme: DEFAULT_SCHEME.to_owned(),
            sniff: SniffConfig::default(),
            healthcheck: HealthcheckConfig::default(),
            sniffer_callback: accept_all(),
            retrier: Arc::new(StopRetrier),
            gzip: false,
            send_get_body_as: Method::GET,
            log: LogSinks::default(),
            http: None,
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed urls, `http://127.0.0.1:9200` if none is given.
    pub fn urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn basic_auth<U: Into<String>, P: Into<String>>(mut self, user: U, password: P) -> Self {
        self.basic_auth = Some(BasicAuth::new(user, password));
        self
    }

    /// Scheme of the urls built from sniffed addresses, `http` or `https`
    /// (TLS through rustls).
    pub fn scheme<S: Into<String>>(mut self, scheme: S) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn sniff(mut self, enabled: bool) -> Self {
        self.sniff.enabled = enabled;
        self
    }

    pub fn sniffer_timeout_startup(mut self, timeout: Duration) -> Self {
        self.sniff.startup_timeout = timeout;
        self
    }

    pub fn sniffer_timeout(mut self, timeout: Duration) -> Self {
        self.sniff.timeout = timeout;
        self
    }

    pub fn sniffer_interval(mut self, interval: Duration) -> Self {
        self.sniff.interval = interval;
        self
    }

    /// Only nodes accepted by `callback` join the pool when sniffing.
    pub fn sniffer_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&NodesInfoNode) -> bool + Send + Sync + 'static,
    {
        self.sniffer_callback = Arc::new(callback);
        self
    }

    pub fn healthcheck(mut self, enabled: bool) -> Self {
        self.healthcheck.enabled = enabled;
        self
    }

    pub fn healthcheck_timeout_startup(mut self, timeout: Duration) -> Self {
        self.healthcheck.startup_timeout = timeout;
        self
    }

    pub fn healthcheck_timeout(mut self, timeout: Duration) -> Self {
        self.healthcheck.timeout = timeout;
        self
    }

    pub fn healthcheck_interval(mut self, interval: Duration) -> Self {
        self.healthcheck.interval = interval;
        self
    }

    pub fn healthcheck_concurrency(mut self, concurrency: usize) -> Self {
        self.healthcheck.concurrency = concurrency;
        self
    }

    /// Retry up to `retries` times, 100ms apart. Zero disables retries.
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.retrier = if retries == 0 {
            Arc::new(StopRetrier)
        } else {
            Arc::new(BackoffRetrier::new(SimpleBackoff::new(&vec![100; retries])))
        };
        self
    }

    pub fn retrier<R: Retrier>(mut self, retrier: R) -> Self {
        self.retrier = Arc::new(retrier);
        self
    }

    pub fn gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    pub fn send_get_body_as(mut self, method: Method) -> Self {
        self.send_get_body_as = method;
        self
    }

    pub fn error_log(mut self, logger: Logger) -> Self {
        self.log.error = logger;
        self
    }

    pub fn info_log(mut self, logger: Logger) -> Self {
        self.log.info = logger;
        self
    }

    pub fn trace_log(mut self, logger: Logger) -> Self {
        self.log.trace = logger;
        self
    }

    /// Underlying HTTP client, e.g. to set a request timeout or a proxy.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Builds a client and starts its background loops. On the way the
    /// seeds are health checked, the cluster is sniffed and the pool is
    /// validated, any failure there fails the construction.
    pub async fn build(self) -> Result<Client> {
        let client = self._assemble()?;
        let inner = &client.inner;

        if inner.healthcheck.enabled {
            client
                .startup_healthcheck(inner.healthcheck.startup_timeout)
                .await?;
        }

        if inner.sniff.enabled {
            client
                .sniff(inner.sniff.startup_timeout)
                .await
                .map_err(|e| Error::Construction(format!("no node found by sniffing: {}", e)))?;
        } else {
            _seed(&client);
        }

        if inner.healthcheck.enabled {
            client
                .healthcheck(inner.healthcheck.startup_timeout, true)
                .await;
        }

        inner
            .pool
            .must_have_alive()
            .map_err(|e| Error::Construction(e.to_string()))?;

        client.start()?;
        info!(inner.log.info, "client built"; "connections" => %client);
        Ok(client)
    }

    /// Short-lived client for one-off work: no sniffing, no health checks
    /// and no background loop, the pool holds the seed urls only.
    pub fn build_simple(mut self) -> Result<Client> {
        self.sniff.enabled = false;
        self.healthcheck.enabled = false;
        let client = self._assemble()?;
        _seed(&client);
        client._mark_running();
        Ok(client)
    }

    fn _assemble(self) -> Result<Client> {
        let raw_urls = if self.urls.is_empty() {
            vec![DEFAULT_URL.to_owned()]
        } else {
            self.urls
        };
        let mut seeds = Vec::with_capacity(raw_urls.len());
        let mut basic_auth = self.basic_auth;
        for raw in raw_urls.iter() {
            let (url, auth) = canonicalize_url(raw)?;
            if basic_auth.is_none() {
                basic_auth = auth;
            }
            if !seeds.contains(&url) {
                seeds.push(url);
            }
        }

        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder()
                .build()
                .map_err(|e| Error::Construction(e.to_string()))?,
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                http,
                pool: ConnectionPool::default(),
                settings: RwLock::new(Settings {
                    retrier: self.retrier,
                    basic_auth,
                    gzip: self.gzip,
                    send_get_body_as: self.send_get_body_as,
                }),
                seeds,
                scheme: self.scheme,
                sniff: self.sniff,
                healthcheck: self.healthcheck,
                sniffer_callback: self.sniffer_callback,
                log: self.log,
                background: RwLock::new(None),
            }),
        })
    }
}

fn _seed(client: &Client) {
    let conns = client
        .inner
        .seeds
        .iter()
        .map(|url| Arc::new(Connection::seed(url.clone())))
        .collect();
    client.inner.pool.update(conns);
}

impl Client {
    /// Builds and starts a client from a [ClientConfig], the log paths
    /// become append-only file loggers.
    pub async fn from_config(config: &ClientConfig) -> Result<Client> {
        let mut builder = ClientBuilder::new().urls([config.url.clone()]);
        if let Some(user) = &config.username {
            builder = builder.basic_auth(user.clone(), config.password.clone().unwrap_or_default());
        }
        if let Some(sniff) = config.sniff {
            builder = builder.sniff(sniff);
        }
        if let Some(healthcheck) = config.healthcheck {
            builder = builder.healthcheck(healthcheck);
        }
        if let Some(path) = &config.errorlog {
            builder = builder.error_log(_open_log(path, "error")?);
        }
        if let Some(path) = &config.infolog {
            builder = builder.info_log(_open_log(path, "info")?);
        }
        if let Some(path) = &config.tracelog {
            builder = builder.trace_log(_open_log(path, "trace")?);
        }
        builder.build().await
    }
}

fn _open_log(path: &std::path::Path, label: &str) -> Result<Logger> {
    let config = LoggerConfig::in_level(Level::Debug).with_label(label);
    file_logger(path, config)
        .map_err(|e| Error::Config(format!("cannot open {} log {:?}: {}", label, path, e)))
}
