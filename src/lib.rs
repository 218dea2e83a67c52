//! # pco-api - a path-building client for the Planning Center API
//!
//! Requests are addressed by walking a tree of [`Endpoint`]s, one per URL
//! segment, and finished with an HTTP verb. Walking is free; only the verbs
//! go to the network.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pco_api::{Connection, Deleted};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pco_api::Error> {
//!     let api = Connection::builder()
//!         .basic_auth("app-id", "secret")
//!         .build()?
//!         .root();
//!
//!     // GET https://api.planningcenteronline.com/people/v2/people?where[first_name]=Pat
//!     let people = api.people().v2().people();
//!     let found = people.get_with([("where[first_name]", "Pat")]).await?;
//!     println!("{:?}", found.data());
//!
//!     // Arbitrary segments work too.
//!     let person = people.id(1);
//!     person
//!         .patch(&json!({ "data": { "attributes": { "first_name": "Pat" } } }))
//!         .await?;
//!
//!     if let Deleted::NoContent = api.path("people/v2/emails").id(7).delete().await? {
//!         println!("Gone");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every 4xx/5xx response becomes an [`ApiError`] with an [`ErrorKind`]
//! derived from the status code:
//!
//! ```no_run
//! use pco_api::{Connection, Error, ErrorKind};
//!
//! # async fn example() -> Result<(), Error> {
//! # let api = Connection::builder().oauth_token("token").build()?.root();
//! match api.people().v2().people().id(999).get().await {
//!     Ok(envelope) => println!("{:?}", envelope.data()),
//!     Err(Error::Api(err)) if err.kind == ErrorKind::NotFound => println!("No such person"),
//!     Err(Error::Api(err)) if err.kind.is_server_error() => {
//!         eprintln!("Planning Center is having a bad day: {}", err.message)
//!     }
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Nothing is retried; a 429 is surfaced as [`ErrorKind::TooManyRequests`]
//! with its [`rate_limit::RateLimitInfo`] attached.

pub mod body;
mod connection;
mod endpoint;
mod error;
pub mod metadata;
pub mod rate_limit;
mod response;

pub use connection::{Auth, Connection, ConnectionBuilder, DEFAULT_BASE_URL};
pub use endpoint::Endpoint;
pub use error::{ApiError, Error, ErrorKind, Message, Result};
pub use response::{map_delete_response, map_response, Deleted, Envelope, HEADERS_KEY};
