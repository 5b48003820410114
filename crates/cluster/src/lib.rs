//! Cluster is the access layer between an application and a multi-node
//! HTTP search cluster. Given some seed urls it discovers the nodes of the
//! cluster ([sniffing](crate::client::Client::sniff)), keeps track of which
//! of them are alive ([health checks](crate::client::Client::healthcheck))
//! and dispatches every request to a healthy node, retrying transport
//! failures with a pluggable [Retrier](crate::retry::Retrier).
//! ```no_run
//! use cluster::{ClientBuilder, Context, PerformRequestOptions, Method};
//! # async fn run() -> cluster::Result<()> {
//! let client = ClientBuilder::new()
//!     .urls(["http://10.0.0.1:9200", "http://10.0.0.2:9200"])
//!     .max_retries(3)
//!     .build()
//!     .await?;
//! let resp = client
//!     .perform_request(&Context::background(), PerformRequestOptions::new(Method::GET, "/_cluster/health"))
//!     .await?;
//! println!("{}", resp.text());
//! client.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connections;
pub mod context;
pub mod error;
pub mod http;
pub mod logging;
pub mod retry;
pub mod topology;

pub use client::{Client, ClientBuilder};
pub use context::Context;
pub use error::{Error, Result};
pub use http::{Body, PerformRequestOptions, Response};
pub use reqwest::Method;

pub mod runtime {
    use std::{future::Future, io, sync::OnceLock};

    use tokio::{
        runtime::{Builder, Handle, Runtime},
        task::JoinHandle,
    };

    // Fallback runtime for clients started outside of any runtime.
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();

    /// Spawns `task` on the current runtime if there is one, or on the
    /// shared fallback runtime otherwise.
    pub fn spawn<F>(task: F) -> io::Result<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if let Ok(h) = Handle::try_current() {
            return Ok(h.spawn(task));
        }
        Ok(_shared()?.spawn(task))
    }

    fn _shared() -> io::Result<&'static Runtime> {
        if let Some(runtime) = RUNTIME.get() {
            return Ok(runtime);
        }
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .worker_threads(2)
            .thread_name("cluster-background")
            .build()?;
        // a concurrent caller may have won, its runtime is kept
        let _ = RUNTIME.set(runtime);
        RUNTIME
            .get()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "fallback runtime unavailable"))
    }

}
