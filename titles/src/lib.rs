/*!
# Musiconn Titles

Resolution of entity UIDs (works, persons, locations, corporations,
composers) to their display titles.

## Features

- **Deduplication**: a UID is fetched at most once at a time per kind, however
  many callers ask for it concurrently
- **Batching**: misses are fetched 50 per request, batches in parallel
- **Cooldown**: UIDs that failed to resolve are left alone for five minutes
  (or until [`TitleCache::clear_failed_cache`])
- **Prioritized resolution**: high-count UIDs first, one by one, so a UI can
  show the most relevant titles early
- **Persistence**: the title map is snapshotted after every change and
  reloaded on start when it is recent enough
- **Never fails**: lookups degrade to `Unknown <kind> (<uid>)`

## Example

```rust,no_run
use musiconn_api_client::{ClientConfig, EntityKind, ResilientClient, Uid};
use musiconn_titles::{FileSnapshotStore, TitleCache, TitleCacheConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let api = Arc::new(ResilientClient::new(&ClientConfig::default())?);
    let store = Arc::new(FileSnapshotStore::new("titles_cache.json"));
    let cache = TitleCache::with_store(api, TitleCacheConfig::default(), store)?;
    println!("{}", cache.title_async(Uid(42), EntityKind::Work).await);
    Ok(())
}
```
*/

mod cache;
mod config;
mod error;
mod persist;

pub use cache::CacheStats;
pub use cache::PrioritizedUid;
pub use cache::TitleCache;
pub use cache::placeholder;
pub use config::TitleCacheConfig;
pub use error::PersistError;
pub use error::Result;
pub use error::TitlesError;
pub use persist::FileSnapshotStore;
pub use persist::MemorySnapshotStore;
pub use persist::SnapshotStore;
pub use persist::TitleEntry;
pub use persist::TitleMap;
pub use persist::TitleSnapshot;
