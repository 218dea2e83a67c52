//! Request body encoding.
//!
//! Bodies are JSON unless the target is an OAuth token-exchange endpoint
//! (`.../oauth/token`, `.../oauth/revoke`, ...). Those only accept
//! `application/x-www-form-urlencoded`, so nested JSON is flattened into
//! bracketed query keys: `{"a": {"b": 1}, "c": [1, 2]}` becomes
//! `a%5Bb%5D=1&c%5B%5D=1&c%5B%5D=2`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use url::form_urlencoded;

use crate::{Error, Result};

static OAUTH_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|/)oauth/[a-z]+$").expect("Invalid OAuth path regex"));

/// A serialized request body together with its media type.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Sent as `application/json`.
    Json(Value),
    /// Sent as `application/x-www-form-urlencoded`; already encoded.
    Form(String),
}

impl RequestBody {
    /// Picks the encoding for a body sent to `path` (the URL path, without query).
    ///
    /// # Examples
    ///
    /// ```
    /// use pco_api::body::RequestBody;
    /// use serde_json::json;
    ///
    /// let body = RequestBody::for_path("/oauth/token", json!({ "grant_type": "refresh_token" }))?;
    /// assert_eq!(body, RequestBody::Form("grant_type=refresh_token".to_string()));
    ///
    /// let body = RequestBody::for_path("/people/v2/people", json!({ "data": {} }))?;
    /// assert!(matches!(body, RequestBody::Json(_)));
    /// # Ok::<(), pco_api::Error>(())
    /// ```
    pub fn for_path(path: &str, value: Value) -> Result<Self> {
        if is_form_path(path) {
            Ok(RequestBody::Form(encode_nested_query(&value)?))
        } else {
            Ok(RequestBody::Json(value))
        }
    }

    /// The `Content-Type` header value for this body.
    pub fn content_type(&self) -> &'static str {
        match self {
            RequestBody::Json(_) => "application/json",
            RequestBody::Form(_) => "application/x-www-form-urlencoded",
        }
    }
}

/// Returns `true` when the last two path segments are `oauth/<lowercase word>`.
pub fn is_form_path(path: &str) -> bool {
    OAUTH_PATH.is_match(path)
}

/// Encodes a JSON object as a nested form query.
///
/// Object keys become `parent[key]`, array items become `parent[]`, `null`
/// and empty containers become a bare key. Keys are emitted in sorted order.
///
/// # Errors
///
/// Returns [`Error::SerializationFailed`] if `value` is not a JSON object.
pub fn encode_nested_query(value: &Value) -> Result<String> {
    let Value::Object(map) = value else {
        return Err(Error::SerializationFailed(format!(
            "form-encoded bodies must be JSON objects, got {}",
            value
        )));
    };

    let mut pairs = Vec::new();
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    for key in keys {
        flatten(key.clone(), &map[key.as_str()], &mut pairs);
    }

    let encoded = pairs
        .into_iter()
        .map(|(key, value)| match value {
            Some(value) => format!("{}={}", escape(&key), escape(&value)),
            None => escape(&key),
        })
        .collect::<Vec<_>>()
        .join("&");
    Ok(encoded)
}

fn flatten(prefix: String, value: &Value, out: &mut Vec<(String, Option<String>)>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                flatten(format!("{}[{}]", prefix, key), &map[key.as_str()], out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            let item_key = format!("{}[]", prefix);
            for item in items {
                flatten(item_key.clone(), item, out);
            }
        }
        Value::Array(_) => out.push((format!("{}[]", prefix), None)),
        Value::Object(_) | Value::Null => out.push((prefix, None)),
        Value::String(s) => out.push((prefix, Some(s.clone()))),
        Value::Bool(_) | Value::Number(_) => out.push((prefix, Some(value.to_string()))),
    }
}

fn escape(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_oauth_paths_are_form_encoded() {
        assert!(is_form_path("/oauth/token"));
        assert!(is_form_path("/oauth/revoke"));
        assert!(is_form_path("/api/oauth/token"));
    }

    #[test]
    fn test_other_paths_are_json() {
        assert!(!is_form_path("/people/v2/people"));
        assert!(!is_form_path("/oauth/token/extra"));
        assert!(!is_form_path("/oauth/Token"));
        assert!(!is_form_path("/myoauth/token"));
        assert!(!is_form_path("/oauth/"));
    }

    #[test]
    fn test_flat_object() {
        let body = json!({
            "grant_type": "authorization_code",
            "code": "abc 123",
            "redirect_uri": "https://example.com/cb",
        });
        assert_eq!(
            encode_nested_query(&body).unwrap(),
            "code=abc+123&grant_type=authorization_code&redirect_uri=https%3A%2F%2Fexample.com%2Fcb"
        );
    }

    #[test]
    fn test_nested_objects_and_arrays() {
        let body = json!({
            "user": { "name": "Ada", "admin": true },
            "scope": ["people", "services"],
            "items": [{ "id": 1 }, { "id": 2 }],
        });
        assert_eq!(
            encode_nested_query(&body).unwrap(),
            "items%5B%5D%5Bid%5D=1&items%5B%5D%5Bid%5D=2\
             &scope%5B%5D=people&scope%5B%5D=services\
             &user%5Badmin%5D=true&user%5Bname%5D=Ada"
        );
    }

    #[test]
    fn test_null_and_empty_containers_are_bare_keys() {
        let body = json!({ "a": null, "b": [], "c": {} });
        assert_eq!(encode_nested_query(&body).unwrap(), "a&b%5B%5D&c");
    }

    #[test]
    fn test_non_object_is_rejected() {
        let err = encode_nested_query(&json!(["a", "b"])).unwrap_err();
        assert!(matches!(err, Error::SerializationFailed(_)));
    }

    #[test]
    fn test_body_for_path() {
        let body = RequestBody::for_path("/oauth/token", json!({ "code": "x" })).unwrap();
        assert_eq!(body.content_type(), "application/x-www-form-urlencoded");

        let body = RequestBody::for_path("/people/v2/people", json!({ "code": "x" })).unwrap();
        assert_eq!(body.content_type(), "application/json");
        assert_eq!(body, RequestBody::Json(json!({ "code": "x" })));
    }
}
