use crate::config::SuggestConfig;
use crate::error::Result;
use crate::error::SuggestError;
use crate::filters::SelectedFilters;
use futures::future::join_all;
use musiconn_api_client::ApiQuery;
use musiconn_api_client::EntityKind;
use musiconn_api_client::FetchJson;
use musiconn_api_client::Uid;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// One autocomplete hit. `entity` is the API's own entity name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub entity: String,
    pub id: Uid,
}

impl Candidate {
    pub fn new(title: impl Into<String>, entity: impl Into<String>, id: Uid) -> Self {
        Self {
            title: title.into(),
            entity: entity.into(),
            id,
        }
    }

    /// Reads a `[title, entity, id, ...]` row. Extra trailing fields are
    /// ignored.
    fn from_row(row: &Value) -> Option<Self> {
        let row = row.as_array()?;
        let title = row.first()?.as_str()?;
        let entity = row.get(1)?.as_str()?;
        let id = Uid::deserialize(row.get(2)?).ok()?;
        Some(Self::new(title, entity, id))
    }
}

/// A candidate with the number of events it appears in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedSuggestion {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub count: u64,
}

/// Autocomplete results ranked by how many events reference them.
#[derive(Clone)]
pub struct SuggestionEnricher {
    api: Arc<dyn FetchJson>,
    config: SuggestConfig,
}

impl SuggestionEnricher {
    pub fn new(api: Arc<dyn FetchJson>, config: SuggestConfig) -> Result<Self> {
        config.validate().map_err(SuggestError::Config)?;
        Ok(Self { api, config })
    }

    /// Autocompletes `query_text` over `entity_kinds`, drops candidates that
    /// are already selected, and ranks the rest by event count.
    ///
    /// When the project-scoped attempt fails the whole enrichment is retried
    /// once without the project; if that fails too the result is empty.
    pub async fn enriched_suggestions(
        &self,
        query_text: &str,
        entity_kinds: &[EntityKind],
        project: Option<u64>,
        selected: &SelectedFilters,
    ) -> Vec<RankedSuggestion> {
        let query_text = query_text.trim();
        if query_text.is_empty() || entity_kinds.is_empty() {
            return Vec::new();
        }

        let scoped = self.suggest(query_text, entity_kinds, project, selected);
        match scoped.await {
            Ok(ranked) => return ranked,
            Err(err) if project.is_some() => {
                warn!(
                    "Suggestions for {query_text:?} in project failed: {err}; retrying unscoped"
                );
            }
            Err(err) => {
                warn!("Suggestions for {query_text:?} failed: {err}");
                return Vec::new();
            }
        }

        let unscoped = self.suggest(query_text, entity_kinds, None, selected);
        match unscoped.await {
            Ok(ranked) => ranked,
            Err(err) => {
                warn!("Unscoped suggestions for {query_text:?} failed: {err}");
                Vec::new()
            }
        }
    }

    async fn suggest(
        &self,
        query_text: &str,
        entity_kinds: &[EntityKind],
        project: Option<u64>,
        selected: &SelectedFilters,
    ) -> Result<Vec<RankedSuggestion>> {
        let candidates = self
            .fetch_candidates(query_text, entity_kinds, project)
            .await?;
        Ok(self.enrich_and_rank(candidates, selected, project).await)
    }

    /// Raw autocomplete hits, in the order the API returned them.
    pub async fn fetch_candidates(
        &self,
        query_text: &str,
        entity_kinds: &[EntityKind],
        project: Option<u64>,
    ) -> Result<Vec<Candidate>> {
        let mut entities: Vec<&str> = Vec::with_capacity(entity_kinds.len());
        for kind in entity_kinds {
            if !entities.contains(&kind.api_name()) {
                entities.push(kind.api_name());
            }
        }
        let query = ApiQuery::autocomplete()
            .param("title", query_text)
            .param("entities", entities.join("|"))
            .param("max", self.config.max_candidates.to_string())
            .project(project);
        let json = self.api.fetch_json(&query).await?;

        let Value::Array(rows) = json else {
            return Err(SuggestError::Decode(format!("expected an array from {query}")));
        };
        let candidates: Vec<Candidate> = rows.iter().filter_map(Candidate::from_row).collect();
        if candidates.len() < rows.len() {
            debug!(
                "Skipped {} malformed autocomplete rows",
                rows.len() - candidates.len()
            );
        }
        Ok(candidates)
    }

    /// Drops already-selected candidates, fetches every remaining count
    /// concurrently and sorts by descending count. Equal counts keep their
    /// input order; a failed count lookup counts as 0.
    pub async fn enrich_and_rank(
        &self,
        candidates: Vec<Candidate>,
        selected: &SelectedFilters,
        project: Option<u64>,
    ) -> Vec<RankedSuggestion> {
        let remaining: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| !selected.contains(&c.entity, c.id))
            .collect();
        let counts = join_all(
            remaining
                .iter()
                .map(|candidate| self.usage_count(candidate, project)),
        )
        .await;

        let mut ranked: Vec<RankedSuggestion> = remaining
            .into_iter()
            .zip(counts)
            .map(|(candidate, count)| RankedSuggestion { candidate, count })
            .collect();
        ranked.sort_by_key(|suggestion| Reverse(suggestion.count));
        info!("Ranked {} suggestions", ranked.len());
        ranked
    }

    /// Number of events referencing `candidate`, or 0 if it can't be fetched.
    pub async fn usage_count(&self, candidate: &Candidate, project: Option<u64>) -> u64 {
        let query = ApiQuery::query()
            .ids(&candidate.entity, [candidate.id])
            .param("entity", "none")
            .project(project);
        match self.api.fetch_json(&query).await {
            Ok(json) => event_count(&json),
            Err(err) => {
                warn!(
                    "Count for {} {} failed: {err}",
                    candidate.entity, candidate.id
                );
                0
            }
        }
    }
}

/// `count.event` as a number or numeric string; anything else is 0.
fn event_count(json: &Value) -> u64 {
    match json.get("count").and_then(|count| count.get("event")) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn reads_event_count_leniently() {
        assert_eq!(event_count(&json!({ "count": { "event": 12 } })), 12);
        assert_eq!(event_count(&json!({ "count": { "event": "7" } })), 7);
        assert_eq!(event_count(&json!({ "count": { "event": "many" } })), 0);
        assert_eq!(event_count(&json!({ "count": {} })), 0);
        assert_eq!(event_count(&json!([])), 0);
    }

    #[test]
    fn candidate_rows() {
        assert_eq!(
            Candidate::from_row(&json!(["Bach", "person", "5", "extra"])),
            Some(Candidate::new("Bach", "person", Uid(5)))
        );
        assert_eq!(Candidate::from_row(&json!(["Bach", "person"])), None);
        assert_eq!(Candidate::from_row(&json!({ "title": "Bach" })), None);
    }
}
