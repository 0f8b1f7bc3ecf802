use crate::api;
use crate::config::MusiconnConfig;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use musiconn_api_client::EntityKind;
use musiconn_api_client::Uid;
use musiconn_titles::FileSnapshotStore;
use musiconn_titles::TitleCache;
use musiconn_titles::TitleCacheConfig;
use musiconn_titles::placeholder;
use owo_colors::OwoColorize;
use std::sync::Arc;

#[derive(Debug, Parser)]
pub struct TitlesArgs {
    /// Entity kind: work, person, location, corporation or composer
    #[arg(value_name = "KIND")]
    pub kind: EntityKind,

    #[arg(value_name = "UID", required = true)]
    pub uids: Vec<u64>,

    /// How long to wait for titles before printing placeholders
    #[arg(long, value_name = "MS")]
    pub wait_ms: Option<u64>,
}

#[derive(Debug, Parser)]
pub struct CacheStatsArgs {
    /// Print the statistics as JSON
    #[arg(long)]
    pub json: bool,
}

fn open_cache(config: &MusiconnConfig, titles: TitleCacheConfig) -> Result<TitleCache> {
    let path = config.cache_path()?;
    let store = Arc::new(FileSnapshotStore::new(path));
    TitleCache::with_store(api(config)?, titles, store)
        .context("Failed to open title cache")
}

pub(crate) async fn run_titles(config: &MusiconnConfig, args: TitlesArgs) -> Result<()> {
    let mut titles_config = config.titles.clone();
    if let Some(wait_ms) = args.wait_ms {
        titles_config.wait_timeout_ms = wait_ms.max(1);
    }
    let wait = titles_config.wait_timeout();
    let cache = open_cache(config, titles_config)?;
    let kind = args.kind;
    let uids: Vec<Uid> = args.uids.into_iter().map(Uid).collect();

    if tokio::time::timeout(wait, cache.resolve_many(&uids, kind))
        .await
        .is_err()
    {
        tracing::warn!("Gave up waiting for {kind} titles after {wait:?}");
    }
    for uid in &uids {
        let title = cache
            .cached_title(*uid, kind)
            .unwrap_or_else(|| placeholder(*uid, kind));
        println!("{uid}\t{title}");
    }
    Ok(())
}

pub(crate) fn run_cache_stats(config: &MusiconnConfig, args: CacheStatsArgs) -> Result<()> {
    let cache = open_cache(config, config.titles.clone())?;
    let stats = cache.cache_stats();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!(
        "{} {} cached titles ({})",
        "▶".bright_blue(),
        stats.total_cached.bright_cyan(),
        config.cache_path()?.display()
    );
    for kind in EntityKind::ALL {
        let count = stats.by_entity.get(&kind).copied().unwrap_or(0);
        println!("  {kind}: {count}");
    }
    Ok(())
}
