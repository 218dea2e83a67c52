//! Example demonstrating error handling.
//!
//! This example shows how to:
//! - Match on specific error kinds
//! - Handle whole client/server error categories
//! - Read the JSON:API error details and rate limit headers
//! - Recognise configuration errors before any request is sent
//!
//! Run with:
//! `PCO_API_TOKEN=... PCO_API_SECRET=... cargo run --example error_handling`

use pco_api::{Connection, ConnectionBuilder, Error, ErrorKind};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("pco_api=info")
        .init();

    println!("=== Example 1: Missing credentials ===");
    match Connection::builder().build() {
        Ok(_) => println!("Unexpected success"),
        Err(Error::ConfigurationError(reason)) => println!("Configuration error: {}", reason),
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    let api = ConnectionBuilder::from_env()?.build()?.root();

    println!("=== Example 2: A resource that does not exist ===");
    match api.people().v2().people().id(0).get().await {
        Ok(envelope) => println!("Found: {:?}", envelope.data()),
        Err(Error::Api(err)) if err.kind == ErrorKind::NotFound => {
            println!("Not found (HTTP {})", err.status);
            for detail in err.message.error_details() {
                println!("  {}", detail);
            }
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 3: Categories ===");
    let result = api
        .people()
        .v2()
        .people()
        .post(&serde_json::json!({ "data": { "attributes": {} } }))
        .await;

    match result {
        Ok(envelope) => println!("Created: {:?}", envelope.data()),
        Err(e) if e.is_client_error() => {
            println!("Rejected: {}", e);
            println!("  Kind: {:?}", e.kind());
            println!("  Message: {:?}", e.message());
            if e.kind() == Some(ErrorKind::TooManyRequests) {
                println!("  Rate limit: {:?}", e.rate_limit_info());
            }
        }
        Err(e) if e.is_server_error() => println!("Server trouble: {}", e),
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 4: Existence check ===");
    println!(
        "people/v2/nonexistent reachable: {}",
        api.people().v2().exists("nonexistent").await?
    );

    Ok(())
}
