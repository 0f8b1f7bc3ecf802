use musiconn_api_client::ApiQuery;
use musiconn_api_client::ClientConfig;
use musiconn_api_client::ResilientClient;
use musiconn_api_client::Uid;
use musiconn_api_client::testing::ScriptedApi;
use musiconn_api_client::testing::exhausted;
use musiconn_events::AggregatorConfig;
use musiconn_events::EventAggregator;
use musiconn_events::YearRange;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::query_param;

fn year_for(uid: u64) -> u64 {
    1850 + uid % 60
}

/// Answers `get` requests for events with one record per requested UID,
/// skipping every UID divisible by 97 to mimic holes in the remote data.
fn event_batch(query: &ApiQuery) -> Value {
    let mut events = serde_json::Map::new();
    for uid in query.uid_list("event") {
        if uid.get() % 97 == 0 {
            continue;
        }
        events.insert(
            uid.to_string(),
            json!({
                "uid": uid.get(),
                "dates": [{ "date": format!("{}-05-00", year_for(uid.get())) }]
            }),
        );
    }
    json!({ "event": events })
}

#[tokio::test]
async fn issues_one_request_per_300_events() {
    let refs: BTreeSet<Uid> = (1..=650).map(Uid).collect();
    let api = Arc::new(ScriptedApi::new(|query| Ok(event_batch(query))));
    let aggregator =
        EventAggregator::new(api.clone(), AggregatorConfig::default()).expect("aggregator");

    let fetched = aggregator.fetch_all_events(&refs).await;
    assert_eq!(fetched.requested_batches, 3);
    assert_eq!(fetched.failed_batches, 0);
    assert_eq!(api.request_count(), 3);

    let mut sizes: Vec<usize> = api
        .requests()
        .iter()
        .map(|q| q.uid_list("event").len())
        .collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![50, 300, 300]);

    let returned: BTreeSet<Uid> = fetched.events().map(|e| e.uid).collect();
    let expected: BTreeSet<Uid> = refs.iter().copied().filter(|u| u.get() % 97 != 0).collect();
    assert_eq!(returned, expected);
}

#[tokio::test]
async fn failed_batch_only_removes_its_own_events() {
    let refs: BTreeSet<Uid> = (1..=600).map(Uid).collect();
    let api = Arc::new(ScriptedApi::new(|query| {
        // The batch holding UID 1 fails on every attempt.
        if query.uid_list("event").contains(&Uid(1)) {
            Err(exhausted(query))
        } else {
            Ok(event_batch(query))
        }
    }));
    let aggregator = EventAggregator::new(api, AggregatorConfig::default()).expect("aggregator");

    let fetched = aggregator.fetch_all_events(&refs).await;
    assert_eq!(fetched.failed_batches, 1);
    assert_eq!(fetched.batches.len(), 1);
    assert!(fetched.events().all(|e| e.uid.get() > 300));
}

#[tokio::test]
async fn empty_reference_set_issues_no_requests() {
    let api = Arc::new(ScriptedApi::new(|query| Ok(event_batch(query))));
    let aggregator =
        EventAggregator::new(api.clone(), AggregatorConfig::default()).expect("aggregator");
    let fetched = aggregator.fetch_all_events(&BTreeSet::new()).await;
    assert_eq!(fetched.requested_batches, 0);
    assert_eq!(api.request_count(), 0);
}

#[tokio::test]
async fn end_to_end_over_http() {
    let server = MockServer::start().await;
    let root = json!({
        "location": { "332": {
            "childs": [{ "location": 333 }, { "location": 334 }],
            "events": [{ "event": 1 }]
        } }
    });
    let child = json!({
        "location": { "333": { "events": [{ "event": "2" }, { "event": 3 }] } }
    });
    let events = json!({
        "event": {
            "1": { "uid": 1, "dates": [{ "date": "1888-01-00" }] },
            "2": { "uid": 2, "dates": [{ "date": "1905-03-04" }] },
            "3": { "uid": 3, "dates": [{ "date": "1920-11-11" }] }
        }
    });
    Mock::given(method("GET"))
        .and(query_param("location", "332"))
        .respond_with(ResponseTemplate::new(200).set_body_json(root))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("location", "333"))
        .respond_with(ResponseTemplate::new(200).set_body_json(child))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("location", "334"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("event", "1|2|3"))
        .and(query_param(
            "props",
            "uid|dates|locations|persons|performances|corporations|sources",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(events))
        .expect(2)
        .mount(&server)
        .await;

    let config = ClientConfig {
        base_url: format!("{}/api", server.uri()),
        retries: 2,
        retry_delay_ms: 5,
        ..Default::default()
    };
    let api = Arc::new(ResilientClient::new(&config).expect("client"));
    let aggregator = EventAggregator::new(api, AggregatorConfig::default()).expect("aggregator");

    let inferred = aggregator
        .aggregate_events(Uid(332), None)
        .await
        .expect("root succeeds");
    assert_eq!((inferred.start_year, inferred.end_year), (1888, 1920));
    assert_eq!(
        inferred.events_by_year.keys().copied().collect::<Vec<_>>(),
        vec![1888, 1905, 1920]
    );
    assert_eq!(inferred.partial.locations, BTreeSet::from([Uid(334)]));

    let pinned = aggregator
        .aggregate_events(Uid(332), Some(YearRange::new(1900, 1910)))
        .await
        .expect("root succeeds");
    assert_eq!((pinned.start_year, pinned.end_year), (1900, 1910));
    assert_eq!(pinned.events_by_year.len(), 1);
    assert_eq!(pinned.events_by_year[&1905][0].uid, Uid(2));
}

#[tokio::test]
async fn root_failure_falls_back_to_empty() {
    let api = Arc::new(ScriptedApi::new(|query| Err(exhausted(query))));
    let aggregator = EventAggregator::new(api, AggregatorConfig::default()).expect("aggregator");

    assert!(aggregator.aggregate_events(Uid(1), None).await.is_err());
    let empty = aggregator.aggregate_events_or_empty(Uid(1), None).await;
    assert!(empty.events_by_year.is_empty());
    assert_eq!((empty.start_year, empty.end_year), (0, 0));
}
