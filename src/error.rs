//! Error types for Planning Center API calls.
//!
//! Non-2xx responses become an [`ApiError`] whose [`ErrorKind`] is derived from
//! the status code. Every kind belongs to one of two categories, client error
//! (4xx) or server error (5xx), so callers can match a specific kind or handle
//! a whole category at once. Statuses outside 2xx/4xx/5xx are a protocol
//! violation and surface as [`Error::UnexpectedStatus`].

use std::fmt;

use http::{HeaderMap, StatusCode};
use serde_json::Value;

use crate::rate_limit::RateLimitInfo;

/// The main error type for Planning Center API calls.
///
/// # Examples
///
/// ```no_run
/// use pco_api::{Connection, Error, ErrorKind};
///
/// # async fn example() -> Result<(), Error> {
/// let api = Connection::builder()
///     .basic_auth("app-id", "secret")
///     .build()?
///     .root();
///
/// match api.people().v2().people().id(1).get().await {
///     Ok(envelope) => println!("Found: {:?}", envelope.data()),
///     Err(e) if e.kind() == Some(ErrorKind::NotFound) => println!("No such person"),
///     Err(e) if e.is_client_error() => eprintln!("Request rejected: {}", e),
///     Err(e) => return Err(e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error occurred (connection failed, DNS lookup failed, etc.).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The request exceeded the timeout configured on the connection.
    #[error("Request timed out")]
    Timeout,

    /// The server answered with a 4xx or 5xx status.
    #[error(transparent)]
    Api(Box<ApiError>),

    /// The server answered with a status that is neither success, client error
    /// nor server error.
    ///
    /// This is a protocol violation and is never absorbed by the client.
    #[error("Unexpected HTTP status {status}: {message}")]
    UnexpectedStatus {
        /// The HTTP status code
        status: StatusCode,
        /// The parsed JSON body, or the raw body text
        message: Message,
    },

    /// A successful response carried a body that is not JSON, or a JSON body
    /// could not be deserialized into the requested type.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// Invalid configuration was provided.
    ///
    /// Raised by [`ConnectionBuilder::build`](crate::ConnectionBuilder::build)
    /// when credentials are missing or ambiguous, and by builder setters given
    /// invalid header names or values.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// A path segment that cannot be addressed in a URL (`.` or `..`).
    ///
    /// Raised by the verbs, before any request is sent, and by
    /// [`Endpoint::try_segment`](crate::Endpoint::try_segment).
    #[error("Path segment {0:?} cannot be addressed")]
    InvalidSegment(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api(api) => Some(api.status),
            Error::UnexpectedStatus { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the error message carried by a status error.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Error::Api(api) => Some(&api.message),
            Error::UnexpectedStatus { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Returns the status-derived kind, for [`Error::Api`] only.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Api(api) => Some(api.kind),
            _ => None,
        }
    }

    /// Returns the inner [`ApiError`] if the server answered with 4xx or 5xx.
    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            _ => None,
        }
    }

    /// Returns `true` for a 404 response.
    pub fn is_not_found(&self) -> bool {
        self.kind() == Some(ErrorKind::NotFound)
    }

    /// Returns `true` for any error in the client error (4xx) category.
    pub fn is_client_error(&self) -> bool {
        self.kind().is_some_and(ErrorKind::is_client_error)
    }

    /// Returns `true` for any error in the server error (5xx) category.
    pub fn is_server_error(&self) -> bool {
        self.kind().is_some_and(ErrorKind::is_server_error)
    }

    /// Returns rate limit information parsed from the error response headers.
    pub fn rate_limit_info(&self) -> Option<&RateLimitInfo> {
        self.as_api_error().map(|api| &api.rate_limit)
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        Error::Api(Box::new(err))
    }
}

/// The kind of a status error.
///
/// Named kinds exist for the statuses the Planning Center API documents;
/// everything else in 4xx maps to [`ErrorKind::ClientError`] and everything
/// else in 5xx to [`ErrorKind::ServerError`].
///
/// # Examples
///
/// ```
/// use http::StatusCode;
/// use pco_api::ErrorKind;
///
/// let kind = ErrorKind::from_status(StatusCode::SERVICE_UNAVAILABLE).unwrap();
/// assert_eq!(kind, ErrorKind::ServerError);
/// assert!(kind.is_server_error());
///
/// assert_eq!(ErrorKind::from_status(StatusCode::OK), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 405
    MethodNotAllowed,
    /// 422
    UnprocessableEntity,
    /// 429
    TooManyRequests,
    /// Any other 4xx.
    ClientError,
    /// 500
    InternalServerError,
    /// Any other 5xx.
    ServerError,
}

impl ErrorKind {
    /// Maps a status code to its kind; `None` for anything outside 4xx and 5xx.
    pub fn from_status(status: StatusCode) -> Option<Self> {
        let kind = match status.as_u16() {
            400 => ErrorKind::BadRequest,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            405 => ErrorKind::MethodNotAllowed,
            422 => ErrorKind::UnprocessableEntity,
            429 => ErrorKind::TooManyRequests,
            500 => ErrorKind::InternalServerError,
            _ if status.is_client_error() => ErrorKind::ClientError,
            _ if status.is_server_error() => ErrorKind::ServerError,
            _ => return None,
        };
        Some(kind)
    }

    /// Returns `true` if this kind belongs to the client error (4xx) category.
    pub fn is_client_error(self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this kind belongs to the server error (5xx) category.
    pub fn is_server_error(self) -> bool {
        matches!(self, ErrorKind::InternalServerError | ErrorKind::ServerError)
    }

    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "Bad request",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "Not found",
            ErrorKind::MethodNotAllowed => "Method not allowed",
            ErrorKind::UnprocessableEntity => "Unprocessable entity",
            ErrorKind::TooManyRequests => "Too many requests",
            ErrorKind::ClientError => "Client error",
            ErrorKind::InternalServerError => "Internal server error",
            ErrorKind::ServerError => "Server error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 4xx or 5xx response from the API.
#[derive(thiserror::Error, Debug, Clone)]
#[error("{kind} (HTTP {status}): {message}")]
pub struct ApiError {
    /// The status-derived kind.
    pub kind: ErrorKind,
    /// The HTTP status code.
    pub status: StatusCode,
    /// The parsed JSON body, or the raw body text.
    pub message: Message,
    /// The response headers.
    pub headers: HeaderMap,
    /// Rate limit headers, mostly interesting for [`ErrorKind::TooManyRequests`].
    pub rate_limit: RateLimitInfo,
}

/// The body of an error response.
///
/// Planning Center answers errors with a JSON:API `errors` document, but
/// proxies and load balancers in front of it may answer with plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// The body parsed as JSON.
    Json(Value),
    /// The body as raw text.
    Text(String),
}

impl Message {
    /// Returns the parsed body, if it was JSON.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Message::Json(value) => Some(value),
            Message::Text(_) => None,
        }
    }

    /// Returns the raw body, if it was not JSON.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Json(_) => None,
            Message::Text(text) => Some(text),
        }
    }

    /// Collects the human readable parts of a JSON:API `errors` array.
    ///
    /// Each entry contributes its `detail`, falling back to its `title`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pco_api::Message;
    /// use serde_json::json;
    ///
    /// let message = Message::Json(json!({
    ///     "errors": [
    ///         { "title": "Not Found", "detail": "Person 1 was not found" },
    ///         { "title": "Forbidden" }
    ///     ]
    /// }));
    /// assert_eq!(
    ///     message.error_details(),
    ///     vec!["Person 1 was not found", "Forbidden"]
    /// );
    /// ```
    pub fn error_details(&self) -> Vec<String> {
        let Some(errors) = self
            .as_json()
            .and_then(|v| v.get("errors"))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        errors
            .iter()
            .filter_map(|e| e.get("detail").or_else(|| e.get("title")))
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Json(value) => write!(f, "{}", value),
            Message::Text(text) => f.write_str(text),
        }
    }
}

/// A specialized `Result` type for Planning Center API calls.
pub type Result<T> = std::result::Result<T, Error>;
