//! The lazy path builder.
//!
//! An [`Endpoint`] is a handle to one node of a tree of URL paths. Walking the
//! tree (`segment`, `id`, the named accessors) never touches the network; only
//! the verbs do. Every node memoizes its children by segment name, so the same
//! expression evaluated twice from the same parent yields the very same node.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use http::Method;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::body::RequestBody;
use crate::metadata::{RawResponse, RequestMetadata};
use crate::response::{map_delete_response, map_response, Deleted, Envelope};
use crate::{Connection, Error, Result};

/// A node addressing one absolute URL path.
///
/// `Endpoint` is a cheap handle: cloning it clones an `Arc`, and both clones
/// refer to the same node, cache and last result.
///
/// # Examples
///
/// ```
/// use pco_api::Connection;
///
/// let api = Connection::builder()
///     .basic_auth("app-id", "secret")
///     .build()?
///     .root();
///
/// let person = api.people().v2().people().id(1);
/// assert_eq!(
///     person.as_str(),
///     "https://api.planningcenteronline.com/people/v2/people/1"
/// );
///
/// // Same segment name from the same parent: same node.
/// assert!(api.people().ptr_eq(&api.segment("people")));
/// # Ok::<(), pco_api::Error>(())
/// ```
///
/// # Concurrency
///
/// Building children is safe from any number of tasks. The last result is
/// kept per node, so when several requests go through the *same* node at
/// once, [`last_result`](Self::last_result) holds whichever finished last.
#[derive(Clone)]
pub struct Endpoint {
    node: Arc<Node>,
}

struct Node {
    url: Url,
    connection: Connection,
    children: DashMap<String, Endpoint>,
    last_result: Mutex<Option<RawResponse>>,
    /// First `.` or `..` segment on the way from the root; such nodes cannot
    /// be addressed and refuse every verb.
    dot_segment: Option<String>,
}

macro_rules! segments {
    ($($(#[$doc:meta])* $name:ident => $segment:literal),* $(,)?) => {
        impl Endpoint {
            $(
                $(#[$doc])*
                pub fn $name(&self) -> Endpoint {
                    self.segment($segment)
                }
            )*
        }
    };
}

segments! {
    /// `api` namespace.
    api => "api",
    /// `calendar` product namespace.
    calendar => "calendar",
    /// `check-ins` product namespace.
    check_ins => "check-ins",
    /// `giving` product namespace.
    giving => "giving",
    /// `groups` product namespace.
    groups => "groups",
    /// `people` product namespace, or the `people` collection inside it.
    people => "people",
    /// `publishing` product namespace.
    publishing => "publishing",
    /// `registrations` product namespace.
    registrations => "registrations",
    /// `resources` product namespace.
    resources => "resources",
    /// `services` product namespace.
    services => "services",
    /// `webhooks` product namespace.
    webhooks => "webhooks",
    /// `oauth` namespace; posts below it are form encoded.
    oauth => "oauth",
    /// `token` below `oauth`.
    token => "token",
    /// `me`, the authenticated person.
    me => "me",
    /// API version 2.
    v2 => "v2",
}

impl Endpoint {
    /// Creates the root of a new tree, addressing the connection's base URL.
    pub fn root(connection: Connection) -> Self {
        let url = connection.base_url().clone();
        Self::with_url(url, connection, None)
    }

    fn with_url(url: Url, connection: Connection, dot_segment: Option<String>) -> Self {
        Self {
            node: Arc::new(Node {
                url,
                connection,
                children: DashMap::new(),
                last_result: Mutex::new(None),
                dot_segment,
            }),
        }
    }

    /// Returns the child for `name`, creating it on first access.
    ///
    /// The child's URL is this URL with `name` appended as one path segment.
    /// The name is percent-encoded as a whole, `%` included, so an already
    /// encoded name such as `"a%20b"` is sent as `a%2520b`; pass names
    /// unencoded.
    ///
    /// `"."` and `".."` have no URL form of their own (parsers fold them into
    /// the parent), so their nodes keep the URL of the last addressable
    /// ancestor and every verb on them, or on their descendants, fails with
    /// [`Error::InvalidSegment`] without touching the network. Use
    /// [`try_segment`](Self::try_segment) to reject them up front.
    pub fn segment(&self, name: impl AsRef<str>) -> Endpoint {
        let name = name.as_ref();
        if let Some(child) = self.node.children.get(name) {
            return child.clone();
        }

        self.node
            .children
            .entry(name.to_string())
            .or_insert_with(|| {
                let dot_segment = self
                    .node
                    .dot_segment
                    .clone()
                    .or_else(|| is_dot_segment(name).then(|| name.to_string()));

                let mut url = self.node.url.clone();
                if dot_segment.is_none() {
                    if let Ok(mut segments) = url.path_segments_mut() {
                        segments.pop_if_empty().push(name);
                    }
                }
                Endpoint::with_url(url, self.node.connection.clone(), dot_segment)
            })
            .clone()
    }

    /// Like [`segment`](Self::segment), but fails with
    /// [`Error::InvalidSegment`] when the child cannot be addressed.
    pub fn try_segment(&self, name: impl AsRef<str>) -> Result<Endpoint> {
        let child = self.segment(name);
        match &child.node.dot_segment {
            Some(dot) => Err(Error::InvalidSegment(dot.clone())),
            None => Ok(child),
        }
    }

    /// Returns the child for a resource id.
    ///
    /// Integers and strings alike are appended in their `Display` form, with
    /// the same encoding rules as [`segment`](Self::segment).
    pub fn id(&self, id: impl fmt::Display) -> Endpoint {
        self.segment(id.to_string())
    }

    /// Walks a `/`-separated path one segment at a time.
    ///
    /// Empty components are skipped, so `"/people/v2/"` equals
    /// `people().v2()`.
    pub fn path(&self, path: &str) -> Endpoint {
        path.split('/')
            .filter(|s| !s.is_empty())
            .fold(self.clone(), |endpoint, segment| endpoint.segment(segment))
    }

    /// The absolute URL of this node.
    pub fn url(&self) -> &Url {
        &self.node.url
    }

    /// The absolute URL of this node as a string.
    pub fn as_str(&self) -> &str {
        self.node.url.as_str()
    }

    /// The connection shared by this tree.
    pub fn connection(&self) -> &Connection {
        &self.node.connection
    }

    /// Returns `true` if both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Endpoint) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// The last response received through this node, if any.
    ///
    /// Updated by every verb that got a response back, error statuses
    /// included; network failures leave it untouched.
    pub fn last_result(&self) -> Option<RawResponse> {
        self.node
            .last_result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Issues a GET without query parameters.
    pub async fn get(&self) -> Result<Envelope> {
        self.get_with(std::iter::empty::<(String, String)>()).await
    }

    /// Issues a GET with `params` as the query string.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example(api: pco_api::Endpoint) -> Result<(), pco_api::Error> {
    /// let people = api
    ///     .people()
    ///     .v2()
    ///     .people()
    ///     .get_with([("where[first_name]", "Pat"), ("per_page", "100")])
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_with<K, V>(&self, params: impl IntoIterator<Item = (K, V)>) -> Result<Envelope>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let metadata = RequestMetadata::new(Method::GET, self.url().clone()).with_query_params(params);
        map_response(self.send(&metadata).await?)
    }

    /// Issues a POST.
    ///
    /// The body is sent as JSON, except below `oauth/<word>` where it is form
    /// encoded. See [`RequestBody::for_path`].
    pub async fn post<B: Serialize + ?Sized>(&self, body: &B) -> Result<Envelope> {
        self.send_with_body(Method::POST, body).await
    }

    /// Issues a PATCH, encoded like [`post`](Self::post).
    ///
    /// Planning Center expects the attributes wrapped as
    /// `{ "data": { "attributes": { ... } } }`.
    pub async fn patch<B: Serialize + ?Sized>(&self, body: &B) -> Result<Envelope> {
        self.send_with_body(Method::PATCH, body).await
    }

    /// Issues a DELETE.
    ///
    /// Returns [`Deleted::NoContent`] on 204, the envelope on any other 2xx.
    pub async fn delete(&self) -> Result<Deleted> {
        let metadata = RequestMetadata::new(Method::DELETE, self.url().clone());
        map_delete_response(self.send(&metadata).await?)
    }

    /// Checks whether the child `segment` is reachable.
    ///
    /// This performs a real GET against the child. A 404 gives `Ok(false)`,
    /// any success `Ok(true)`; every other error is returned as is. Beware
    /// that it costs a full request against the rate limit and that the
    /// child's [`last_result`](Self::last_result) is overwritten.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example(api: pco_api::Endpoint) -> Result<(), pco_api::Error> {
    /// if api.people().v2().exists("forms").await? {
    ///     println!("Forms are available");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn exists(&self, segment: impl AsRef<str>) -> Result<bool> {
        match self.segment(segment).get().await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn send_with_body<B: Serialize + ?Sized>(&self, method: Method, body: &B) -> Result<Envelope> {
        let value: Value =
            serde_json::to_value(body).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        let body = RequestBody::for_path(self.url().path(), value)?;
        let metadata = RequestMetadata::new(method, self.url().clone()).with_body(body);
        map_response(self.send(&metadata).await?)
    }

    async fn send(&self, metadata: &RequestMetadata) -> Result<RawResponse> {
        if let Some(dot) = &self.node.dot_segment {
            return Err(Error::InvalidSegment(dot.clone()));
        }
        let raw = self.node.connection.execute(metadata).await?;
        *self
            .node
            .last_result
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(raw.clone());
        Ok(raw)
    }
}

fn is_dot_segment(name: &str) -> bool {
    matches!(name, "." | "..")
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.node.url.as_str())
            .field("children", &self.node.children.len())
            .finish()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(base: &str) -> Endpoint {
        Connection::builder()
            .base_url(base)
            .unwrap()
            .basic_auth("token", "secret")
            .build()
            .unwrap()
            .root()
    }

    #[test]
    fn test_segments_are_joined_in_order() {
        let api = root("https://api.example.com");
        let endpoint = api.segment("a").segment("b").segment("c");
        assert_eq!(endpoint.as_str(), "https://api.example.com/a/b/c");
        assert_eq!(endpoint.url().path(), "/a/b/c");
    }

    #[test]
    fn test_base_path_is_kept() {
        let api = root("https://api.example.com/prefix/");
        assert_eq!(api.people().as_str(), "https://api.example.com/prefix/people");

        let api = root("https://api.example.com/prefix");
        assert_eq!(api.people().as_str(), "https://api.example.com/prefix/people");
    }

    #[test]
    fn test_children_are_memoized_by_name() {
        let api = root("https://api.example.com");
        let first = api.people();
        let second = api.segment("people");
        assert!(first.ptr_eq(&second));

        let other = api.services();
        assert!(!first.ptr_eq(&other));

        // Same name under different parents: different nodes.
        let nested = api.people().people();
        assert!(!nested.ptr_eq(&first));
        assert_eq!(nested.as_str(), "https://api.example.com/people/people");
    }

    #[test]
    fn test_ids_use_display_form() {
        let api = root("https://api.example.com");
        assert!(api.id(42).ptr_eq(&api.segment("42")));
        assert!(api.id("42").ptr_eq(&api.id(42u64)));
    }

    #[test]
    fn test_named_accessors_match_segments() {
        let api = root("https://api.example.com");
        let built = api.people().v2().people().id(1);
        assert_eq!(built.as_str(), "https://api.example.com/people/v2/people/1");
        assert!(built.ptr_eq(&api.path("/people/v2/people/1/")));
        assert_eq!(api.check_ins().as_str(), "https://api.example.com/check-ins");
    }

    #[test]
    fn test_segments_are_percent_encoded() {
        let api = root("https://api.example.com");
        assert_eq!(
            api.segment("a b").segment("c/d").as_str(),
            "https://api.example.com/a%20b/c%2Fd"
        );
    }

    #[test]
    fn test_encoded_names_are_encoded_again() {
        let api = root("https://api.example.com");
        assert_eq!(api.id("a%20b").as_str(), "https://api.example.com/a%2520b");
    }

    #[test]
    fn test_dot_segments_are_not_addressable() {
        let api = root("https://api.example.com");
        let people = api.people();

        for name in [".", ".."] {
            let child = people.segment(name);
            assert!(!child.ptr_eq(&people));
            assert!(child.ptr_eq(&people.segment(name)));
            assert!(matches!(
                people.try_segment(name),
                Err(Error::InvalidSegment(ref n)) if n == name
            ));
            assert!(matches!(
                child.segment("1").try_segment("x"),
                Err(Error::InvalidSegment(ref n)) if n == name
            ));
        }

        // Dots inside a name are ordinary characters.
        assert_eq!(
            people.try_segment("...").unwrap().as_str(),
            "https://api.example.com/people/..."
        );
        assert!(people.try_segment("v2").is_ok());
    }

    #[test]
    fn test_clones_share_the_node() {
        let api = root("https://api.example.com");
        let people = api.people();
        let clone = people.clone();
        assert!(people.ptr_eq(&clone));
        assert!(people.v2().ptr_eq(&clone.v2()));
        assert!(people.last_result().is_none());
    }

    #[test]
    fn test_display_is_the_url() {
        let api = root("https://api.example.com");
        assert_eq!(api.giving().to_string(), "https://api.example.com/giving");
    }
}
