use std::fmt::{self, Display};

use thiserror::Error;

use crate::{context::CancelReason, http::response::{ErrorDetails, Response}};

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the client surfaces to its callers. Transport and pool
/// exhaustion failures are recovered locally by the retry policy first,
/// the rest is returned as soon as it happens.
#[derive(Debug, Error)]
pub enum Error {
    /// All pooled connections are dead, or there was nothing to sniff.
    #[error("no available connection: {0}")]
    NoAvailableConnection(String),

    /// The node could not be reached: connection refused, DNS, timeout
    /// of the underlying HTTP client etc.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The caller canceled the context or its deadline passed.
    #[error("{0}")]
    Canceled(CancelReason),

    /// A well-formed HTTP error response from a node.
    #[error(transparent)]
    Remote(Box<RemoteError>),

    /// The client could not be built.
    #[error("cannot create client: {0}")]
    Construction(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("cannot encode request body: {0}")]
    Body(String),

    #[error("cannot decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Raised by retry policies that refuse to go on.
    #[error("cannot connect after several retries")]
    RetriesExhausted,
}

impl Error {
    #[inline]
    pub(crate) fn no_connection<S: Into<String>>(reason: S) -> Self {
        Error::NoAvailableConnection(reason.into())
    }

    /// True if no node was available to serve the request.
    #[inline]
    pub fn is_conn_err(&self) -> bool {
        matches!(self, Error::NoAvailableConnection(_))
    }

    #[inline]
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    #[inline]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled(_))
    }

    /// HTTP status of a remote error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote(remote) => Some(remote.status),
            _ => None,
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Either the node answered 408 or the request timed out in transport.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_timeout(),
            _ => self.status() == Some(408),
        }
    }

    #[inline]
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// The (partial) response that came along with a remote error.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::Remote(remote) => Some(&remote.response),
            _ => None,
        }
    }
}

/// Error response returned by a node, e.g.
/// `{"status": 404, "error": {"type": "index_not_found_exception", ...}}`.
#[derive(Debug)]
pub struct RemoteError {
    pub status: u16,
    pub details: Option<ErrorDetails>,
    pub response: Response,
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("");
        match &self.details {
            Some(details) if !details.kind.is_empty() => write!(
                f,
                "remote error {} ({}): {} [type={}]",
                self.status, text, details.reason, details.kind
            ),
            Some(details) if !details.reason.is_empty() => {
                write!(f, "remote error {} ({}): {}", self.status, text, details.reason)
            }
            _ => write!(f, "remote error {} ({})", self.status, text),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<RemoteError> for Error {
    fn from(e: RemoteError) -> Self {
        Error::Remote(Box::new(e))
    }
}
