use std::io::Write;

use bytes::Bytes;
use flate2::{write::GzEncoder, Compression};
use fxhash::FxHashSet;
use reqwest::{
    header::{HeaderValue, ACCEPT, CONTENT_ENCODING, CONTENT_TYPE, USER_AGENT},
    Method,
};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::{
    config::BasicAuth,
    error::{Error, Result},
};

pub const USER_AGENT_VALUE: &str = concat!("searchlink/", env!("CARGO_PKG_VERSION"));

/// Request payload, JSON values are serialized, raw text is sent as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
}

impl Body {
    /// Serializes any `serde` value into a JSON body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Body::Json)
            .map_err(|e| Error::Body(e.to_string()))
    }

    fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Body::Json(value) => serde_json::to_vec(value).map_err(|e| Error::Body(e.to_string())),
            Body::Text(text) => Ok(text.as_bytes().to_vec()),
        }
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_owned())
    }
}

/// Everything a caller says about one logical request. The node it goes
/// to is decided per attempt by the executor.
/// ## Example
/// ```rust
/// use cluster::http::{PerformRequestOptions, Body};
/// use reqwest::Method;
///
/// let opts = PerformRequestOptions::new(Method::GET, "/tweets/_search")
///     .param("size", "10")
///     .body(serde_json::json!({"query": {"match_all": {}}}))
///     .ignore_errors([404]);
/// assert!(opts.ignore_errors.contains(&404));
/// ```
#[derive(Debug, Clone)]
pub struct PerformRequestOptions {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Body>,
    /// Non-2xx statuses handed back as plain responses.
    pub ignore_errors: FxHashSet<u16>,
}

impl PerformRequestOptions {
    pub fn new<P: Into<String>>(method: Method, path: P) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
            ignore_errors: FxHashSet::default(),
        }
    }

    pub fn param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn body<B: Into<Body>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn ignore_errors<I: IntoIterator<Item = u16>>(mut self, statuses: I) -> Self {
        self.ignore_errors.extend(statuses);
        self
    }
}

/// A request with its body already encoded, rebuilt against a new base
/// url on every attempt.
#[derive(Debug, Clone)]
pub(crate) struct PreparedRequest {
    pub(crate) method: Method,
    path: String,
    params: Vec<(String, String)>,
    body: Option<Bytes>,
    gzipped: bool,
}

impl PreparedRequest {
    /// ### Params
    /// * **send_get_body_as**: method used instead of GET when a GET has a body.
    /// * **gzip**: compress the body.
    pub(crate) fn prepare(
        opts: &PerformRequestOptions,
        send_get_body_as: &Method,
        gzip: bool,
    ) -> Result<Self> {
        let mut method = opts.method.clone();
        if method == Method::GET && opts.body.is_some() && *send_get_body_as != Method::GET {
            method = send_get_body_as.clone();
        }
        let path = if opts.path.starts_with('/') {
            opts.path.clone()
        } else {
            format!("/{}", opts.path)
        };
        let body = match &opts.body {
            Some(body) => {
                let raw = body.encode()?;
                Some(if gzip { _gzip(&raw)? } else { raw }.into())
            }
            None => None,
        };
        Ok(Self {
            method,
            path,
            params: opts.params.clone(),
            gzipped: gzip && body.is_some(),
            body,
        })
    }

    /// Bodyless request, used by the sniffer and the health checker.
    pub(crate) fn probe<P: Into<String>>(method: Method, path: P) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
            gzipped: false,
        }
    }

    /// Full url of this request on the node at `base_url`.
    pub(crate) fn url_on(&self, base_url: &str) -> Result<Url> {
        let raw = format!("{}{}", base_url.trim_end_matches('/'), self.path);
        let mut url = Url::parse(&raw).map_err(|source| Error::InvalidUrl {
            url: raw.clone(),
            source,
        })?;
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.params.iter());
        }
        Ok(url)
    }

    pub(crate) fn build(
        &self,
        http: &reqwest::Client,
        base_url: &str,
        auth: Option<&BasicAuth>,
    ) -> Result<reqwest::Request> {
        let url = self.url_on(base_url)?;
        let mut builder = http
            .request(self.method.clone(), url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        if let Some(auth) = auth {
            builder = builder.basic_auth(&auth.user, Some(&auth.password));
        }
        if let Some(body) = &self.body {
            if self.gzipped {
                builder = builder.header(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            }
            builder = builder.body(body.clone());
        }
        builder.build().map_err(Error::from)
    }

    #[inline]
    pub(crate) fn body_len(&self) -> usize {
        self.body.as_ref().map_or(0, Bytes::len)
    }
}

fn _gzip(raw: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder.write_all(raw).map_err(|e| Error::Body(e.to_string()))?;
    encoder.finish().map_err(|e| Error::Body(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;
    use reqwest::{header::CONTENT_ENCODING, Method};
    use serde_json::json;

    use super::{PerformRequestOptions, PreparedRequest};
    use crate::config::BasicAuth;

    #[test]
    fn get_with_body_switches_method() {
        let opts = PerformRequestOptions::new(Method::GET, "_search").body(json!({"size": 0}));
        let prepared = PreparedRequest::prepare(&opts, &Method::POST, false).unwrap();
        assert_eq!(prepared.method, Method::POST);

        let bodyless = PerformRequestOptions::new(Method::GET, "/_search");
        let prepared = PreparedRequest::prepare(&bodyless, &Method::POST, false).unwrap();
        assert_eq!(prepared.method, Method::GET);

        let prepared = PreparedRequest::prepare(&opts, &Method::GET, false).unwrap();
        assert_eq!(prepared.method, Method::GET);
    }

    #[test]
    fn url_with_params() {
        let opts = PerformRequestOptions::new(Method::GET, "tweets/_doc/1")
            .param("refresh", "true")
            .param("routing", "a b");
        let prepared = PreparedRequest::prepare(&opts, &Method::GET, false).unwrap();
        let url = prepared.url_on("http://10.0.0.1:9200/").unwrap();
        assert_eq!(
            url.as_str(),
            "http://10.0.0.1:9200/tweets/_doc/1?refresh=true&routing=a+b"
        );
        assert!(prepared.url_on("not a url").is_err());
    }

    #[test]
    fn gzip_body_and_headers() {
        let opts = PerformRequestOptions::new(Method::POST, "/tweets/_doc")
            .body(json!({"user": "olivere"}));
        let prepared = PreparedRequest::prepare(&opts, &Method::GET, true).unwrap();
        let http = reqwest::Client::new();
        let auth = BasicAuth {
            user: "elastic".to_owned(),
            password: "secret".to_owned(),
        };
        let req = prepared.build(&http, "http://127.0.0.1:9200", Some(&auth)).unwrap();
        assert_eq!(req.headers()[CONTENT_ENCODING], "gzip");
        assert!(req.headers().contains_key("authorization"));

        let compressed = req.body().and_then(|b| b.as_bytes()).unwrap();
        let mut plain = String::new();
        GzDecoder::new(compressed).read_to_string(&mut plain).unwrap();
        assert_eq!(plain, r#"{"user":"olivere"}"#);
    }

    #[test]
    fn raw_text_body() {
        let opts = PerformRequestOptions::new(Method::POST, "/_bulk").body("{\"index\":{}}\n{}\n");
        let prepared = PreparedRequest::prepare(&opts, &Method::GET, false).unwrap();
        assert_eq!(prepared.body_len(), 16);
    }
}
