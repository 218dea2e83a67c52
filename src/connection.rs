//! Authenticated transport shared by every [`Endpoint`] of a tree.
//!
//! A [`Connection`] is configured once with credentials and then cloned
//! cheaply into every node. It sends requests, reads bodies and decodes JSON;
//! mapping statuses to errors is left to [`crate::response`].

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::body::RequestBody;
use crate::error::Message;
use crate::metadata::{RawResponse, RequestMetadata};
use crate::{Endpoint, Error, Result};

/// The production Planning Center API.
pub const DEFAULT_BASE_URL: &str = "https://api.planningcenteronline.com";

const DEFAULT_USER_AGENT: &str = concat!("pco-api/", env!("CARGO_PKG_VERSION"));

/// Credentials sent with every request.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// HTTP Basic with a personal access token: application id and secret.
    Basic {
        /// Sent as the username.
        token: String,
        /// Sent as the password.
        secret: String,
    },
    /// `Authorization: Bearer <token>` from an OAuth flow.
    Bearer(String),
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Basic { token, .. } => f
                .debug_struct("Basic")
                .field("token", token)
                .field("secret", &"<redacted>")
                .finish(),
            Auth::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}

/// An authenticated connection to the Planning Center API.
///
/// Clones share one connection pool and configuration.
///
/// # Examples
///
/// ```no_run
/// use pco_api::Connection;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), pco_api::Error> {
/// let api = Connection::builder()
///     .oauth_token("access-token")
///     .timeout(Duration::from_secs(30))
///     .build()?
///     .root();
///
/// let me = api.people().v2().me().get().await?;
/// println!("Signed in as {:?}", me.data());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

#[derive(Debug)]
struct ConnectionInner {
    http_client: reqwest::Client,
    base_url: Url,
    auth: Auth,
    timeout: Option<Duration>,
}

impl Connection {
    /// Creates a new `ConnectionBuilder`.
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// The base URL every path is built on.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The configured credentials.
    pub fn auth(&self) -> &Auth {
        &self.inner.auth
    }

    /// Returns a new root [`Endpoint`] addressing the base URL.
    ///
    /// Each call starts a fresh tree with its own child cache.
    pub fn root(&self) -> Endpoint {
        Endpoint::root(self.clone())
    }

    /// Sends one request and reads the full response.
    ///
    /// Non-2xx statuses are not errors at this level; they come back as a
    /// [`RawResponse`] like any other.
    pub async fn execute(&self, metadata: &RequestMetadata) -> Result<RawResponse> {
        let url = metadata.full_url();

        tracing::debug!(
            method = %metadata.method,
            url = %url,
            "Executing HTTP request"
        );

        let mut request = self
            .inner
            .http_client
            .request(metadata.method.clone(), url);

        request = match &self.inner.auth {
            Auth::Basic { token, secret } => request.basic_auth(token, Some(secret)),
            Auth::Bearer(token) => request.bearer_auth(token),
        };

        if let Some(timeout) = self.inner.timeout {
            request = request.timeout(timeout);
        }

        if let Some(body) = &metadata.body {
            request = match body {
                RequestBody::Json(value) => request.json(value),
                RequestBody::Form(encoded) => request
                    .header(CONTENT_TYPE, body.content_type())
                    .body(encoded.clone()),
            };
        }

        let start_time = Instant::now();
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await.map_err(transport_error)?;
        let latency = start_time.elapsed();

        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            "Received HTTP response"
        );

        if status.is_client_error() {
            tracing::warn!(
                status = status.as_u16(),
                response = %text,
                "Client error (4xx)"
            );
        } else if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                response = %text,
                "Server error (5xx)"
            );
        }

        Ok(RawResponse {
            status,
            body: decode_body(&headers, text),
            headers,
            latency,
        })
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(e)
    }
}

/// Parses the body as JSON when the content type says so; otherwise, or when
/// parsing fails, keeps the raw text.
fn decode_body(headers: &HeaderMap, text: String) -> Message {
    let json_like = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));

    if json_like && !text.trim().is_empty() {
        if let Ok(value) = serde_json::from_str(&text) {
            return Message::Json(value);
        }
    }
    Message::Text(text)
}

/// Builder for configuring and creating a [`Connection`].
///
/// Exactly one of [`basic_auth`](Self::basic_auth) or
/// [`oauth_token`](Self::oauth_token) must be set before [`build`](Self::build).
///
/// # Examples
///
/// ```
/// use pco_api::{ConnectionBuilder, Error};
///
/// let err = ConnectionBuilder::new().build().unwrap_err();
/// assert!(matches!(err, Error::ConfigurationError(_)));
///
/// let connection = ConnectionBuilder::new()
///     .base_url("https://api.example.com")?
///     .basic_auth("app-id", "secret")
///     .default_header("X-PCO-API-Version", "2023-03-21")?
///     .build()?;
/// assert_eq!(connection.base_url().as_str(), "https://api.example.com/");
/// # Ok::<(), Error>(())
/// ```
#[derive(Debug)]
pub struct ConnectionBuilder {
    base_url: Option<Url>,
    basic: Option<Auth>,
    oauth: Option<Auth>,
    default_headers: HeaderMap,
    user_agent: Option<String>,
    timeout: Option<Duration>,
}

impl ConnectionBuilder {
    /// Creates a new `ConnectionBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            basic: None,
            oauth: None,
            default_headers: HeaderMap::new(),
            user_agent: None,
            timeout: None,
        }
    }

    /// Creates a builder from environment variables.
    ///
    /// * `PCO_API_URL`: base URL
    /// * `PCO_API_TOKEN` and `PCO_API_SECRET`: basic auth pair
    /// * `PCO_API_OAUTH_TOKEN`: OAuth bearer token
    ///
    /// Unset or empty variables are skipped, so [`build`](Self::build) still
    /// reports missing credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if `PCO_API_URL` is set but invalid.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let mut builder = Self::new();
        if let Some(url) = var("PCO_API_URL") {
            builder = builder.base_url(url)?;
        }
        if let (Some(token), Some(secret)) = (var("PCO_API_TOKEN"), var("PCO_API_SECRET")) {
            builder = builder.basic_auth(token, secret);
        }
        if let Some(token) = var("PCO_API_OAUTH_TOKEN") {
            builder = builder.oauth_token(token);
        }
        Ok(builder)
    }

    /// Sets the base URL for all requests.
    ///
    /// Defaults to [`DEFAULT_BASE_URL`].
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or is not an `http`/`https` URL
    /// that paths can be appended to.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let url = Url::parse(url.as_ref())?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(Error::ConfigurationError(format!(
                "Base URL must be an http(s) URL, got {}",
                url
            )));
        }
        self.base_url = Some(url);
        Ok(self)
    }

    /// Authenticates with a personal access token (HTTP Basic).
    pub fn basic_auth(mut self, token: impl Into<String>, secret: impl Into<String>) -> Self {
        self.basic = Some(Auth::Basic {
            token: token.into(),
            secret: secret.into(),
        });
        self
    }

    /// Authenticates with an OAuth access token (`Authorization: Bearer`).
    pub fn oauth_token(mut self, token: impl Into<String>) -> Self {
        self.oauth = Some(Auth::Bearer(token.into()));
        self
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Overrides the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the request timeout.
    ///
    /// Without one, requests wait as long as the transport allows.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configured `Connection`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if neither or both of basic auth
    /// and an OAuth token were provided, or if the HTTP client cannot be built.
    pub fn build(self) -> Result<Connection> {
        let auth = match (self.basic, self.oauth) {
            (Some(auth), None) | (None, Some(auth)) => auth,
            (None, None) => {
                return Err(Error::ConfigurationError(
                    "Either basic auth (token and secret) or an OAuth token is required"
                        .to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(Error::ConfigurationError(
                    "Basic auth and an OAuth token are mutually exclusive".to_string(),
                ))
            }
        };

        let base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL)?,
        };

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        // 3xx must reach the status mapping as a fatal status.
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(user_agent)
            .default_headers(self.default_headers)
            .build()
            .map_err(|e| {
                Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Connection {
            inner: Arc::new(ConnectionInner {
                http_client,
                base_url,
                auth,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_headers(content_type: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers
    }

    #[test]
    fn test_decodes_json_like_content_types() {
        let message = decode_body(
            &json_headers("application/vnd.api+json; charset=utf-8"),
            r#"{"data":[]}"#.to_string(),
        );
        assert_eq!(message, Message::Json(json!({ "data": [] })));
    }

    #[test]
    fn test_keeps_text_otherwise() {
        let message = decode_body(&json_headers("text/html"), r#"{"data":[]}"#.to_string());
        assert_eq!(message, Message::Text(r#"{"data":[]}"#.to_string()));

        let message = decode_body(&json_headers("application/json"), "oops".to_string());
        assert_eq!(message, Message::Text("oops".to_string()));

        let message = decode_body(&HeaderMap::new(), String::new());
        assert_eq!(message, Message::Text(String::new()));
    }

    #[test]
    fn test_requires_exactly_one_credential() {
        let err = Connection::builder().build().unwrap_err();
        assert!(matches!(err, Error::ConfigurationError(_)));

        let err = Connection::builder()
            .basic_auth("token", "secret")
            .oauth_token("bearer")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::ConfigurationError(_)));

        let connection = Connection::builder().oauth_token("bearer").build().unwrap();
        assert_eq!(connection.auth(), &Auth::Bearer("bearer".to_string()));
        assert_eq!(connection.base_url().as_str(), "https://api.planningcenteronline.com/");
    }

    #[test]
    fn test_rejects_non_http_base_urls() {
        let err = Connection::builder().base_url("mailto:someone@example.com").unwrap_err();
        assert!(matches!(err, Error::ConfigurationError(_)));

        let err = Connection::builder().base_url("not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let builder = Connection::builder()
            .basic_auth("app-id", "hunter2")
            .oauth_token("bearer-secret");
        let debug = format!("{:?}", builder);
        assert!(debug.contains("app-id"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("bearer-secret"));
    }
}
