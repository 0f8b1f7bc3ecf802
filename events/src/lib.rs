/*!
# Musiconn Events

Aggregation of the events held by a location and all of its descendants.

## Pipeline

```text
root location
  └─> LocationTreeWalker   one request per node, children fanned out
        └─> event UID set
              └─> fetch_all_events   300 UIDs per request, batches in parallel
                    └─> bucket_by_year   first-date year, inclusive range
```

Failures below the root never abort a run: a failed location prunes its
subtree, a failed batch drops its events, and both are reported in
[`PartialFailures`].

## Example

```rust,no_run
use musiconn_api_client::{ClientConfig, ResilientClient, Uid};
use musiconn_events::{AggregatorConfig, EventAggregator, YearRange};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let api = Arc::new(ResilientClient::new(&ClientConfig::default())?);
    let aggregator = EventAggregator::new(api, AggregatorConfig::default())?;
    let result = aggregator
        .aggregate_events(Uid(332), Some(YearRange::new(1850, 1900)))
        .await?;
    println!("{} years", result.events_by_year.len());
    Ok(())
}
```
*/

mod aggregator;
mod config;
mod error;
mod location;
mod walker;

pub use aggregator::AggregatedEvents;
pub use aggregator::EventAggregator;
pub use aggregator::FetchedEvents;
pub use aggregator::PartialFailures;
pub use aggregator::YearBuckets;
pub use aggregator::YearRange;
pub use aggregator::bucket_by_year;
pub use aggregator::infer_year_range;
pub use config::AggregatorConfig;
pub use error::EventsError;
pub use error::Result;
pub use location::location_geometries;
pub use location::location_info;
pub use walker::LocationTreeWalker;
pub use walker::WalkOutcome;
