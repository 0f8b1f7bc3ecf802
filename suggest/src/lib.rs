/*!
# Musiconn Suggest

Autocomplete suggestions ranked by how many events reference them, plus the
selected-filter model the ranking consults.

## Example

```rust,no_run
use musiconn_api_client::{ClientConfig, EntityKind, ResilientClient};
use musiconn_suggest::{SelectedFilters, SuggestConfig, SuggestionEnricher};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let api = Arc::new(ResilientClient::new(&ClientConfig::default())?);
    let enricher = SuggestionEnricher::new(api, SuggestConfig::default())?;
    let ranked = enricher
        .enriched_suggestions("bach", &[EntityKind::Person], None, &SelectedFilters::default())
        .await;
    for suggestion in ranked {
        println!("{} ({})", suggestion.candidate.title, suggestion.count);
    }
    Ok(())
}
```
*/

mod config;
mod error;
mod filters;
mod suggest;

pub use config::SuggestConfig;
pub use error::Result;
pub use error::SuggestError;
pub use filters::Filter;
pub use filters::FilterCounter;
pub use filters::SelectedFilters;
pub use filters::filter_counters;
pub use suggest::Candidate;
pub use suggest::RankedSuggestion;
pub use suggest::SuggestionEnricher;
