//! Success envelopes and the status mapping that produces them.
//!
//! Planning Center answers with JSON:API documents (`data`, `included`,
//! `links`, `meta`). The [`Envelope`] keeps that document as a JSON object and
//! injects the response headers under a `headers` key, so the whole response
//! can be handed around as one value.

use std::time::Duration;

use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ApiError, ErrorKind, Message};
use crate::metadata::RawResponse;
use crate::rate_limit::RateLimitInfo;
use crate::{Error, Result};

/// The key under which response headers are injected into the envelope body.
pub const HEADERS_KEY: &str = "headers";

/// A successful (2xx) response.
///
/// Dereferences to the JSON object, so the usual `serde_json::Map` accessors
/// work directly on the envelope.
///
/// # Examples
///
/// ```no_run
/// use pco_api::Connection;
///
/// # async fn example() -> Result<(), pco_api::Error> {
/// let api = Connection::builder()
///     .basic_auth("app-id", "secret")
///     .build()?
///     .root();
///
/// let people = api.people().v2().people().get_with([("per_page", "25")]).await?;
///
/// println!("First page: {:?}", people.data());
/// println!("Content-Type: {:?}", people["headers"]["content-type"]);
/// if let Some(next) = people.next_link() {
///     println!("More at {}", next);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Envelope {
    body: Map<String, Value>,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers, also present in the body under `headers`.
    pub headers: HeaderMap,

    /// Time from sending the request to reading the full body.
    pub latency: Duration,
}

impl Envelope {
    /// Builds an envelope from a decoded body, injecting the headers.
    pub fn new(
        mut body: Map<String, Value>,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
    ) -> Self {
        body.insert(HEADERS_KEY.to_string(), headers_to_json(&headers));
        Self {
            body,
            status,
            headers,
            latency,
        }
    }

    /// The primary `data` member: one resource object or an array of them.
    pub fn data(&self) -> Option<&Value> {
        self.body.get("data")
    }

    /// The `included` member of a compound document.
    pub fn included(&self) -> Option<&Value> {
        self.body.get("included")
    }

    /// The `links` member.
    pub fn links(&self) -> Option<&Value> {
        self.body.get("links")
    }

    /// The `meta` member.
    pub fn meta(&self) -> Option<&Value> {
        self.body.get("meta")
    }

    /// The `links.next` URL, if the collection has another page.
    pub fn next_link(&self) -> Option<&str> {
        self.links()?.get("next")?.as_str()
    }

    /// Returns a response header by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Deserializes the whole envelope body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeserializationFailed`] if the body does not match `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let value = Value::Object(self.body.clone());
        serde_json::from_value(value).map_err(|e| Error::DeserializationFailed {
            raw_response: Value::Object(self.body.clone()).to_string(),
            serde_error: e.to_string(),
            status: self.status,
        })
    }

    /// The envelope body as a JSON object, including `headers`.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Consumes the envelope, returning the body as a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

impl std::ops::Deref for Envelope {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.body
    }
}

impl AsRef<Map<String, Value>> for Envelope {
    fn as_ref(&self) -> &Map<String, Value> {
        &self.body
    }
}

/// The result of a successful DELETE.
#[derive(Debug, Clone)]
pub enum Deleted {
    /// The server answered 204 No Content.
    NoContent,
    /// The server answered another 2xx with a body.
    Envelope(Envelope),
}

impl Deleted {
    /// Returns `true` for a 204 No Content answer.
    pub fn is_no_content(&self) -> bool {
        matches!(self, Deleted::NoContent)
    }

    /// Returns the envelope for answers that carried one.
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Deleted::NoContent => None,
            Deleted::Envelope(envelope) => Some(envelope),
        }
    }
}

/// Maps a raw response to an envelope or a status error.
///
/// * 2xx: the decoded body with `headers` merged in.
/// * 4xx / 5xx: [`Error::Api`] with the kind given by [`ErrorKind::from_status`].
/// * anything else: [`Error::UnexpectedStatus`].
///
/// Success bodies that are JSON objects are used as-is, an empty body becomes
/// an empty object and any other JSON value is placed under `data`.
///
/// # Examples
///
/// ```
/// use http::{HeaderMap, StatusCode};
/// use pco_api::metadata::RawResponse;
/// use pco_api::{map_response, ErrorKind, Message};
/// use serde_json::json;
/// use std::time::Duration;
///
/// let raw = RawResponse {
///     status: StatusCode::UNPROCESSABLE_ENTITY,
///     headers: HeaderMap::new(),
///     body: Message::Json(json!({ "errors": [{ "detail": "First name can't be blank" }] })),
///     latency: Duration::ZERO,
/// };
///
/// let err = map_response(raw).unwrap_err();
/// assert_eq!(err.kind(), Some(ErrorKind::UnprocessableEntity));
/// assert_eq!(err.message().unwrap().error_details(), vec!["First name can't be blank"]);
/// ```
pub fn map_response(raw: RawResponse) -> Result<Envelope> {
    let RawResponse {
        status,
        headers,
        body,
        latency,
    } = raw;

    if status.is_success() {
        let body = success_body(status, body)?;
        return Ok(Envelope::new(body, status, headers, latency));
    }

    match ErrorKind::from_status(status) {
        Some(kind) => Err(ApiError {
            kind,
            status,
            message: body,
            rate_limit: RateLimitInfo::from_headers(&headers),
            headers,
        }
        .into()),
        None => Err(Error::UnexpectedStatus {
            status,
            message: body,
        }),
    }
}

/// Maps a raw DELETE response: 204 is [`Deleted::NoContent`], everything else
/// goes through [`map_response`].
pub fn map_delete_response(raw: RawResponse) -> Result<Deleted> {
    if raw.status == StatusCode::NO_CONTENT {
        return Ok(Deleted::NoContent);
    }
    map_response(raw).map(Deleted::Envelope)
}

fn success_body(status: StatusCode, body: Message) -> Result<Map<String, Value>> {
    let value = match body {
        Message::Json(value) => value,
        Message::Text(text) if text.trim().is_empty() => return Ok(Map::new()),
        Message::Text(text) => match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                return Err(Error::DeserializationFailed {
                    raw_response: text,
                    serde_error: e.to_string(),
                    status,
                })
            }
        },
    };

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            Ok(map)
        }
    }
}

/// Renders headers as a JSON object; repeated headers are joined with `, `.
fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for name in headers.keys() {
        let value = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        map.insert(name.as_str().to_string(), Value::String(value));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    fn raw(status: u16, body: Message) -> RawResponse {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        RawResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body,
            latency: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_success_merges_headers() {
        let envelope = map_response(raw(200, Message::Json(json!({ "data": { "id": "1" } })))).unwrap();
        assert_eq!(envelope["data"], json!({ "id": "1" }));
        assert_eq!(envelope["headers"], json!({ "x-request-id": "abc" }));
        assert_eq!(envelope.header("x-request-id"), Some("abc"));
    }

    #[test]
    fn test_success_shapes() {
        let envelope = map_response(raw(200, Message::Text(String::new()))).unwrap();
        assert_eq!(envelope.len(), 1);
        assert!(envelope.contains_key("headers"));

        let envelope = map_response(raw(200, Message::Json(json!([1, 2])))).unwrap();
        assert_eq!(envelope.data(), Some(&json!([1, 2])));

        let envelope = map_response(raw(201, Message::Text(r#"{"data":[]}"#.to_string()))).unwrap();
        assert_eq!(envelope.data(), Some(&json!([])));
        assert_eq!(envelope.status, StatusCode::CREATED);
    }

    #[test]
    fn test_success_with_non_json_text_fails() {
        let err = map_response(raw(200, Message::Text("<html>".to_string()))).unwrap_err();
        match err {
            Error::DeserializationFailed {
                raw_response,
                status,
                ..
            } => {
                assert_eq!(raw_response, "<html>");
                assert_eq!(status, StatusCode::OK);
            }
            other => panic!("Expected DeserializationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_status_table() {
        let cases = [
            (400, ErrorKind::BadRequest),
            (401, ErrorKind::Unauthorized),
            (403, ErrorKind::Forbidden),
            (404, ErrorKind::NotFound),
            (405, ErrorKind::MethodNotAllowed),
            (409, ErrorKind::ClientError),
            (422, ErrorKind::UnprocessableEntity),
            (429, ErrorKind::TooManyRequests),
            (500, ErrorKind::InternalServerError),
            (502, ErrorKind::ServerError),
            (503, ErrorKind::ServerError),
        ];

        for (status, kind) in cases {
            let err = map_response(raw(status, Message::Text("nope".to_string()))).unwrap_err();
            assert_eq!(err.kind(), Some(kind), "status {}", status);
            assert_eq!(err.status().map(|s| s.as_u16()), Some(status));
            assert_eq!(err.message(), Some(&Message::Text("nope".to_string())));
            assert_eq!(err.is_client_error(), status < 500);
            assert_eq!(err.is_server_error(), status >= 500);
        }
    }

    #[test]
    fn test_unexpected_status_is_fatal() {
        for status in [101, 302, 304] {
            let err = map_response(raw(status, Message::Text(String::new()))).unwrap_err();
            assert!(
                matches!(err, Error::UnexpectedStatus { .. }),
                "status {} gave {:?}",
                status,
                err
            );
            assert_eq!(err.kind(), None);
        }
    }

    #[test]
    fn test_error_keeps_json_message_and_rate_limit() {
        let mut response = raw(429, Message::Json(json!({ "errors": [{ "title": "Slow down" }] })));
        response
            .headers
            .insert("retry-after", HeaderValue::from_static("20"));

        let err = map_response(response).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::TooManyRequests));
        assert_eq!(err.message().unwrap().error_details(), vec!["Slow down"]);
        assert_eq!(
            err.rate_limit_info().unwrap().retry_after,
            Some(Duration::from_secs(20))
        );
    }

    #[test]
    fn test_delete_mapping() {
        let deleted = map_delete_response(raw(204, Message::Text(String::new()))).unwrap();
        assert!(deleted.is_no_content());

        let deleted =
            map_delete_response(raw(200, Message::Json(json!({ "meta": { "ok": true } })))).unwrap();
        assert!(!deleted.is_no_content());
        assert_eq!(
            deleted.envelope().unwrap().meta(),
            Some(&json!({ "ok": true }))
        );

        let err = map_delete_response(raw(404, Message::Text(String::new()))).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("vary", HeaderValue::from_static("Accept"));
        headers.append("vary", HeaderValue::from_static("Origin"));
        assert_eq!(headers_to_json(&headers), json!({ "vary": "Accept, Origin" }));
    }

    #[test]
    fn test_typed_deserialize() {
        #[derive(serde::Deserialize)]
        struct Doc {
            data: Vec<Value>,
        }

        let envelope = map_response(raw(200, Message::Json(json!({ "data": [{}, {}] })))).unwrap();
        let doc: Doc = envelope.deserialize().unwrap();
        assert_eq!(doc.data.len(), 2);
    }
}
