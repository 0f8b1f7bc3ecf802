use crate::api;
use crate::config::MusiconnConfig;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use musiconn_api_client::EntityKind;
use musiconn_api_client::Uid;
use musiconn_suggest::Filter;
use musiconn_suggest::SelectedFilters;
use musiconn_suggest::SuggestionEnricher;
use owo_colors::OwoColorize;

#[derive(Debug, Parser)]
pub struct SuggestArgs {
    /// Text to autocomplete
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Entity kinds to search, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    pub entities: Vec<EntityKind>,

    /// Restrict suggestions and counts to a project
    #[arg(long)]
    pub project: Option<u64>,

    /// Already selected entity to leave out, as KIND:ID (repeatable)
    #[arg(long, value_name = "KIND:ID", value_parser = parse_filter)]
    pub exclude: Vec<Filter>,

    /// Print the ranked suggestions as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_filter(raw: &str) -> Result<Filter, String> {
    let (kind, id) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected KIND:ID, got {raw:?}"))?;
    let kind: EntityKind = kind.parse()?;
    let id: Uid = id.parse().map_err(|_| format!("invalid id in {raw:?}"))?;
    Ok(Filter::new(kind, id))
}

pub(crate) async fn run_suggest(config: &MusiconnConfig, args: SuggestArgs) -> Result<()> {
    let enricher = SuggestionEnricher::new(api(config)?, config.suggest.clone())
        .context("Failed to create suggestion enricher")?;
    let selected = SelectedFilters {
        not: args.exclude,
        ..Default::default()
    };
    let ranked = enricher
        .enriched_suggestions(&args.query, &args.entities, args.project, &selected)
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
        return Ok(());
    }

    if ranked.is_empty() {
        println!("{} No suggestions", "✗".bright_red());
        return Ok(());
    }
    for (i, suggestion) in ranked.iter().enumerate() {
        let candidate = &suggestion.candidate;
        println!(
            "{}. {} {} {}",
            (i + 1).bright_yellow(),
            candidate.title,
            format!("({} {})", candidate.entity, candidate.id).bright_black(),
            suggestion.count.bright_cyan()
        );
    }
    Ok(())
}
