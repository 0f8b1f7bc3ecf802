/*!
# Musiconn API Client

Resilient access to the musiconn query endpoint.

## Features

- **One endpoint, typed queries**: [`ApiQuery`] builds `action`, entity-keyed
  id lists (`|`-joined), `props`, optional `project` scoping and `format=json`
- **Retries**: linear backoff (`base × (attempt + 1)`) for network errors and
  retryable statuses
- **Deadline**: one overall timeout covers every attempt of a request
- **Injection seam**: higher layers depend on [`FetchJson`], not on HTTP

## Example

```rust,no_run
use musiconn_api_client::{ApiQuery, ClientConfig, FetchJson, ResilientClient, Uid};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = ResilientClient::new(&ClientConfig::default())?;
    let query = ApiQuery::get()
        .ids("location", [Uid(332)])
        .props(["uid", "title"]);
    let json = client.fetch_json(&query).await?;
    println!("{json}");
    Ok(())
}
```
*/

mod client;
mod config;
mod error;
mod model;
mod query;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use client::FetchJson;
pub use client::ResilientClient;
pub use client::entity_entry;
pub use client::entity_map;
pub use config::ClientConfig;
pub use config::DEFAULT_BASE_URL;
pub use config::RetryPolicy;
pub use error::AttemptError;
pub use error::FetchError;
pub use error::Result;
pub use model::CorporationRef;
pub use model::EntityKind;
pub use model::EventDate;
pub use model::EventRecord;
pub use model::EventRef;
pub use model::LocationInfo;
pub use model::LocationNode;
pub use model::LocationRef;
pub use model::Performance;
pub use model::PersonRef;
pub use model::SourceRef;
pub use model::Uid;
pub use query::Action;
pub use query::ApiQuery;
