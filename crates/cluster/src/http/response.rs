use std::collections::HashMap;

use bytes::Bytes;
use fxhash::FxHashSet;
use reqwest::header::HeaderMap;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use crate::error::{RemoteError, Result};

/// What a node answered: status, headers and the raw body.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Bodyless response of `status`.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Drains a transport response. Fails only if reading the body fails.
    pub(crate) async fn read(resp: reqwest::Response) -> reqwest::Result<Self> {
        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserializes the JSON body.
    /// ## Example
    /// ```rust
    /// use cluster::http::response::Response;
    ///
    /// let mut resp = Response::empty(200);
    /// resp.body = br#"{"acknowledged":true}"#.to_vec().into();
    /// let ack: serde_json::Value = resp.decode().unwrap();
    /// assert_eq!(ack["acknowledged"], true);
    /// ```
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    #[inline]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Structured part of an error body returned by a node.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ErrorDetails {
    #[serde(rename = "type")]
    pub kind: String,
    pub reason: String,
    #[serde(rename = "resource.type")]
    pub resource_type: Option<String>,
    #[serde(rename = "resource.id")]
    pub resource_id: Option<String>,
    pub index: Option<String>,
    pub phase: Option<String>,
    pub caused_by: Option<HashMap<String, Value>>,
    pub root_cause: Vec<ErrorDetails>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<Value>,
}

/// Lifts a node response into the error domain. 2xx responses and the
/// statuses in `ignore` pass through, every other status becomes an
/// [Error::Remote](crate::error::Error::Remote) carrying the response.
pub fn check_response(resp: Response, ignore: &FxHashSet<u16>) -> Result<Response> {
    if resp.is_success() || ignore.contains(&resp.status) {
        return Ok(resp);
    }
    let details = parse_details(&resp.body);
    Err(RemoteError {
        status: resp.status,
        details,
        response: resp,
    }
    .into())
}

fn parse_details(body: &[u8]) -> Option<ErrorDetails> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.error? {
        Value::String(reason) => Some(ErrorDetails {
            reason,
            ..Default::default()
        }),
        details @ Value::Object(_) => serde_json::from_value(details).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use fxhash::FxHashSet;

    use super::{check_response, Response};

    fn response(status: u16, body: &str) -> Response {
        let mut resp = Response::empty(status);
        resp.body = body.as_bytes().to_vec().into();
        resp
    }

    #[test]
    fn success_and_ignored_pass() {
        let none = FxHashSet::default();
        assert!(check_response(response(201, "{}"), &none).is_ok());

        let ignore: FxHashSet<u16> = [404].into_iter().collect();
        let resp = check_response(response(404, r#"{"found":false}"#), &ignore).unwrap();
        assert_eq!(resp.status, 404);
        assert!(check_response(response(409, ""), &ignore).is_err());
    }

    #[test]
    fn structured_error_body() {
        let body = r#"{
            "status": 404,
            "error": {
                "type": "index_not_found_exception",
                "reason": "no such index",
                "resource.type": "index_or_alias",
                "resource.id": "tweets",
                "index": "tweets",
                "root_cause": [{"type": "index_not_found_exception", "reason": "no such index"}]
            }
        }"#;
        let err = check_response(response(404, body), &FxHashSet::default()).unwrap_err();
        assert!(err.is_not_found());
        let crate::error::Error::Remote(remote) = err else {
            panic!("expected a remote error");
        };
        let details = remote.details.as_ref().unwrap();
        assert_eq!(details.kind, "index_not_found_exception");
        assert_eq!(details.resource_id.as_deref(), Some("tweets"));
        assert_eq!(details.root_cause.len(), 1);
        assert_eq!(remote.response.status, 404);
    }

    #[test]
    fn legacy_and_garbage_bodies() {
        let legacy = r#"{"error": "IndexMissingException[[tweets] missing]", "status": 404}"#;
        let err = check_response(response(404, legacy), &FxHashSet::default()).unwrap_err();
        assert!(err.to_string().contains("IndexMissingException"));

        let err = check_response(response(502, "<html>bad gateway</html>"), &FxHashSet::default())
            .unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.response().unwrap().text(), "<html>bad gateway</html>");
    }

    #[test]
    fn decode_body() {
        let resp = response(200, r#"{"count": 3}"#);
        let v: serde_json::Value = resp.decode().unwrap();
        assert_eq!(v["count"], 3);
        assert!(response(200, "not json").decode::<serde_json::Value>().is_err());
        assert!(Response::empty(200).is_empty());
    }
}
