use crate::api;
use crate::config::MusiconnConfig;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use musiconn_api_client::Uid;
use musiconn_events::EventAggregator;
use musiconn_events::YearRange;
use owo_colors::OwoColorize;

#[derive(Debug, Parser)]
pub struct EventsArgs {
    /// Root location UID
    #[arg(value_name = "LOCATION_ID")]
    pub location_id: u64,

    /// First year to include (requires --end-year)
    #[arg(long, requires = "end_year")]
    pub start_year: Option<i32>,

    /// Last year to include (requires --start-year)
    #[arg(long, requires = "start_year")]
    pub end_year: Option<i32>,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct LocationArgs {
    #[arg(value_name = "LOCATION_ID")]
    pub location_id: u64,

    /// Print the location as JSON
    #[arg(long)]
    pub json: bool,
}

pub(crate) async fn run_events(config: &MusiconnConfig, args: EventsArgs) -> Result<()> {
    let aggregator = EventAggregator::new(api(config)?, config.events.clone())
        .context("Failed to create event aggregator")?;
    let range = match (args.start_year, args.end_year) {
        (Some(start), Some(end)) => Some(YearRange::new(start, end)),
        _ => None,
    };
    let root = Uid(args.location_id);
    let result = aggregator.aggregate_events_or_empty(root, range).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.events_by_year.is_empty() {
        println!("{} No events found for location {root}", "✗".bright_red());
        return Ok(());
    }
    println!(
        "{} Location {root}: {}..={}",
        "✓".bright_green(),
        result.start_year,
        result.end_year
    );
    for (year, events) in &result.events_by_year {
        println!("  {}  {} events", year.bright_cyan(), events.len());
    }
    let total: usize = result.events_by_year.values().map(Vec::len).sum();
    println!("  Total: {}", total.bright_cyan());

    let partial = &result.partial;
    if !partial.is_empty() {
        println!(
            "{} Incomplete: {} locations, {} event batches, {} events could not be loaded",
            "!".bright_yellow(),
            partial.locations.len(),
            partial.event_batches,
            partial.undecodable_events
        );
    }
    Ok(())
}

pub(crate) async fn run_location(config: &MusiconnConfig, args: LocationArgs) -> Result<()> {
    let aggregator = EventAggregator::new(api(config)?, config.events.clone())
        .context("Failed to create event aggregator")?;
    let info = aggregator
        .location_info(Uid(args.location_id))
        .await
        .with_context(|| format!("Failed to fetch location {}", args.location_id))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{} {}", info.uid.bright_yellow(), info.title.bold());
    if let Some(slug) = &info.slug {
        println!("  Slug: {slug}");
    }
    println!("  Children: {}", info.children.len().bright_cyan());
    let parents: Vec<String> = info.parents.iter().map(|p| p.location.to_string()).collect();
    if !parents.is_empty() {
        println!("  Parents: {}", parents.join(", "));
    }
    println!("  Geometries: {}", info.geometries.len());
    Ok(())
}
