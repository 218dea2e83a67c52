//! Basic example walking the Planning Center People API.
//!
//! This example shows how to:
//! - Configure a connection from the environment
//! - Build paths by chaining segments
//! - Fetch a collection with query parameters and a single resource by id
//! - Inspect the envelope and its headers
//!
//! Run with:
//! `PCO_API_TOKEN=... PCO_API_SECRET=... cargo run --example basic_call`

use pco_api::{ConnectionBuilder, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("pco_api=debug,basic_call=info")
        .init();

    let api = ConnectionBuilder::from_env()?.build()?.root();

    println!("=== Listing people ===");
    let people = api.people().v2().people();
    let page = people
        .get_with([("per_page", "5"), ("order", "last_name")])
        .await?;

    let ids: Vec<String> = page
        .data()
        .and_then(|data| data.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    println!("Found ids: {:?}", ids);
    println!("Latency: {:?}", page.latency);
    println!("Rate count: {:?}", page["headers"]["x-pco-api-request-rate-count"]);
    if let Some(next) = page.next_link() {
        println!("Next page: {}", next);
    }
    println!();

    if let Some(id) = ids.first() {
        println!("=== Fetching one person ===");
        let person = people.id(id);
        let envelope = person.get_with([("include", "emails")]).await?;
        println!("URL: {}", person);
        println!("Attributes: {}", envelope["data"]["attributes"]);
        println!("Included: {:?}", envelope.included());
        println!();
    }

    println!("=== Probing for an optional resource ===");
    let has_forms = api.people().v2().exists("forms").await?;
    println!("Forms reachable: {}", has_forms);

    Ok(())
}
