//! Request and raw response types exchanged with the [`Connection`](crate::Connection).

use std::time::Duration;

use http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::body::RequestBody;
use crate::error::Message;

/// Metadata for an individual HTTP request.
///
/// Built by an [`Endpoint`](crate::Endpoint) verb and executed by the
/// connection. The URL is absolute; query parameters are appended at send time.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The absolute request URL, without query string.
    pub url: Url,

    /// Query parameters for this request, in insertion order.
    pub query_params: Vec<(String, String)>,

    /// The encoded request body, if any.
    pub body: Option<RequestBody>,
}

impl RequestMetadata {
    /// Creates a new `RequestMetadata` with the given method and URL.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            query_params: Vec::new(),
            body: None,
        }
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Adds multiple query parameters to the request.
    pub fn with_query_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// The URL with query parameters applied.
    pub fn full_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query_params);
        }
        url
    }
}

/// A response as received from the wire, before status mapping.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The HTTP status code.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The body, decoded as JSON when the content type is JSON-like.
    pub body: Message,

    /// Time from sending the request to reading the full body.
    pub latency: Duration,
}
