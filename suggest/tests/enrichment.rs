use musiconn_api_client::Action;
use musiconn_api_client::ApiQuery;
use musiconn_api_client::EntityKind;
use musiconn_api_client::Uid;
use musiconn_api_client::testing::ScriptedApi;
use musiconn_api_client::testing::exhausted;
use musiconn_suggest::Candidate;
use musiconn_suggest::Filter;
use musiconn_suggest::SelectedFilters;
use musiconn_suggest::SuggestConfig;
use musiconn_suggest::SuggestionEnricher;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use std::sync::Arc;

/// Autocomplete returns three people; person N appears in `counts[N]` events.
fn catalogue(query: &ApiQuery) -> musiconn_api_client::Result<Value> {
    match query.action() {
        Action::Autocomplete => Ok(json!([
            ["Carl", "person", 1],
            ["Clara", "person", "2"],
            ["Robert", "person", 3]
        ])),
        _ => {
            let count = match query.uid_list("person").first().map(|uid| uid.get()) {
                Some(1) => json!(5),
                Some(2) => json!("9"),
                Some(3) => json!(5),
                _ => json!(null),
            };
            Ok(json!({ "count": { "event": count } }))
        }
    }
}

fn enricher(api: &ScriptedApi) -> SuggestionEnricher {
    SuggestionEnricher::new(Arc::new(api.clone()), SuggestConfig::default()).expect("enricher")
}

fn ids(ranked: &[musiconn_suggest::RankedSuggestion]) -> Vec<(u64, u64)> {
    ranked
        .iter()
        .map(|r| (r.candidate.id.get(), r.count))
        .collect()
}

#[tokio::test]
async fn ranks_by_descending_count() {
    let api = ScriptedApi::new(catalogue);
    let enricher = enricher(&api);

    let ranked = enricher
        .enrich_and_rank(
            vec![
                Candidate::new("Carl", "person", Uid(1)),
                Candidate::new("Clara", "person", Uid(2)),
            ],
            &SelectedFilters::default(),
            None,
        )
        .await;
    assert_eq!(ids(&ranked), vec![(2, 9), (1, 5)]);
}

#[tokio::test]
async fn full_flow_keeps_input_order_on_ties() {
    let api = ScriptedApi::new(catalogue);
    let none = SelectedFilters::default();
    let enricher = enricher(&api);

    let ranked = enricher
        .enriched_suggestions("c", &[EntityKind::Person], Some(4), &none)
        .await;
    assert_eq!(ids(&ranked), vec![(2, 9), (1, 5), (3, 5)]);

    let requests = api.requests();
    let autocomplete = &requests[0];
    assert_eq!(autocomplete.value("title"), Some("c"));
    assert_eq!(autocomplete.value("entities"), Some("person"));
    assert_eq!(autocomplete.value("max"), Some("20"));
    assert_eq!(autocomplete.value("project"), Some("4"));
    for count in &requests[1..] {
        assert_eq!(count.action(), Action::Query);
        assert_eq!(count.value("entity"), Some("none"));
        assert_eq!(count.value("project"), Some("4"));
    }
}

#[tokio::test]
async fn selected_candidates_are_removed_before_counting() {
    let api = ScriptedApi::new(catalogue);
    let enricher = enricher(&api);
    let selected = SelectedFilters {
        or: vec![Filter::new(EntityKind::Composer, Uid(2))],
        ..Default::default()
    };
    let kinds = [EntityKind::Person, EntityKind::Composer];

    let ranked = enricher
        .enriched_suggestions("c", &kinds, None, &selected)
        .await;
    assert_eq!(ids(&ranked), vec![(1, 5), (3, 5)]);
    assert_eq!(api.requests_for("person", 2), 0);
    assert_eq!(api.requests()[0].value("entities"), Some("person"));
}

#[tokio::test]
async fn failed_count_degrades_to_zero() {
    let api = ScriptedApi::new(|query| {
        if query.uid_list("person").first() == Some(&Uid(2)) {
            Err(exhausted(query))
        } else {
            catalogue(query)
        }
    });
    let none = SelectedFilters::default();
    let ranked = enricher(&api)
        .enriched_suggestions("c", &[EntityKind::Person], None, &none)
        .await;
    assert_eq!(ids(&ranked), vec![(1, 5), (3, 5), (2, 0)]);
}

#[tokio::test]
async fn retries_once_without_project() {
    let api = ScriptedApi::new(|query| {
        if query.has("project") {
            Err(exhausted(query))
        } else {
            catalogue(query)
        }
    });
    let none = SelectedFilters::default();
    let ranked = enricher(&api)
        .enriched_suggestions("c", &[EntityKind::Person], Some(4), &none)
        .await;
    assert_eq!(ids(&ranked), vec![(2, 9), (1, 5), (3, 5)]);

    let autocompletes: Vec<bool> = api
        .requests()
        .iter()
        .filter(|q| q.action() == Action::Autocomplete)
        .map(|q| q.has("project"))
        .collect();
    assert_eq!(autocompletes, vec![true, false]);
}

#[tokio::test]
async fn gives_up_after_unscoped_retry() {
    let api = ScriptedApi::new(|query| Err(exhausted(query)));
    let none = SelectedFilters::default();
    let ranked = enricher(&api)
        .enriched_suggestions("c", &[EntityKind::Person], Some(4), &none)
        .await;
    assert!(ranked.is_empty());
    assert_eq!(api.request_count(), 2);
}

#[tokio::test]
async fn empty_input_issues_no_requests() {
    let api = ScriptedApi::new(catalogue);
    let none = SelectedFilters::default();
    let enricher = enricher(&api);

    let blank = enricher
        .enriched_suggestions("   ", &[EntityKind::Person], None, &none)
        .await;
    assert!(blank.is_empty());
    let kindless = enricher
        .enriched_suggestions("bach", &[], None, &none)
        .await;
    assert!(kindless.is_empty());
    assert_eq!(api.request_count(), 0);
}

#[tokio::test]
async fn non_array_autocomplete_is_a_failure() {
    let api = ScriptedApi::new(|_| Ok(json!({ "error": "bad request" })));
    let none = SelectedFilters::default();
    let ranked = enricher(&api)
        .enriched_suggestions("c", &[EntityKind::Work], None, &none)
        .await;
    assert!(ranked.is_empty());
    assert_eq!(api.request_count(), 1);
}
