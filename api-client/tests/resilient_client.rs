use musiconn_api_client::ApiQuery;
use musiconn_api_client::AttemptError;
use musiconn_api_client::ClientConfig;
use musiconn_api_client::FetchError;
use musiconn_api_client::FetchJson;
use musiconn_api_client::ResilientClient;
use musiconn_api_client::RetryPolicy;
use musiconn_api_client::Uid;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use std::time::Duration;
use std::time::Instant;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

fn client_for(server: &MockServer, retry_client_errors: bool) -> ResilientClient {
    let config = ClientConfig {
        base_url: format!("{}/api", server.uri()),
        retries: 3,
        retry_delay_ms: 10,
        timeout_ms: 2_000,
        retry_client_errors,
        ..Default::default()
    };
    ResilientClient::new(&config).expect("client should build")
}

fn json_body(value: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(value)
}

fn location_query() -> ApiQuery {
    ApiQuery::get()
        .ids("location", [Uid(332)])
        .props(["childs", "events"])
}

#[tokio::test]
async fn recovers_after_transient_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("action", "get"))
        .and(query_param("location", "332"))
        .and(query_param("props", "childs|events"))
        .and(query_param("format", "json"))
        .respond_with(json_body(json!({ "location": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let value = client_for(&server, false)
        .fetch_json(&location_query())
        .await
        .expect("third attempt succeeds");
    assert_eq!(value, json!({ "location": {} }));
}

#[tokio::test]
async fn exhausts_after_configured_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = client_for(&server, false)
        .fetch_json(&location_query())
        .await
        .expect_err("every attempt fails");
    match err {
        FetchError::Exhausted { attempts, last, .. } => {
            assert_eq!(attempts, 3);
            assert!(matches!(last, AttemptError::Status(status) if status == 500));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn waits_linearly_longer_between_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let client = client_for(&server, false);
    let policy = RetryPolicy {
        retries: 4,
        delay_base: Duration::from_millis(200),
        overall_timeout: Duration::from_secs(10),
        retry_client_errors: false,
    };
    let started = Instant::now();
    let err = client
        .fetch_json_with(&location_query(), &policy)
        .await
        .expect_err("every attempt fails");
    let elapsed = started.elapsed();

    assert!(matches!(err, FetchError::Exhausted { attempts: 4, .. }));
    // 200 + 400 + 600 ms; a doubling backoff would need 1400 ms.
    assert!(elapsed >= Duration::from_millis(1200), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1400), "{elapsed:?}");
}

#[tokio::test]
async fn not_found_is_not_retried_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server, false)
        .fetch_json(&location_query())
        .await
        .expect_err("404 fails");
    assert!(matches!(err, FetchError::Rejected { status, .. } if status == 404));
}

#[tokio::test]
async fn client_errors_can_opt_into_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&server)
        .await;

    let err = client_for(&server, true)
        .fetch_json(&location_query())
        .await
        .expect_err("404 fails");
    assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn rate_limited_responses_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(json_body(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let value = client_for(&server, false)
        .fetch_json(&location_query())
        .await
        .expect("retry after 429 succeeds");
    assert_eq!(value, json!({ "ok": true }));
}

#[tokio::test]
async fn invalid_json_counts_as_a_failed_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html/>"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client_for(&server, false)
        .fetch_json(&location_query())
        .await
        .expect_err("body never parses");
    assert!(matches!(
        err,
        FetchError::Exhausted {
            last: AttemptError::Body(_),
            ..
        }
    ));
}

#[tokio::test]
async fn overall_deadline_cancels_pending_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, false);
    let policy = RetryPolicy {
        overall_timeout: Duration::from_millis(100),
        ..*client.policy()
    };
    let err = client
        .fetch_json_with(&location_query(), &policy)
        .await
        .expect_err("deadline elapses");
    assert!(err.is_timeout(), "expected timeout, got {err:?}");

    let received = server.received_requests().await.unwrap_or_default();
    assert_eq!(received.len(), 1);
}

#[tokio::test]
async fn deadline_also_cuts_backoff_short() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server, false);
    let policy = RetryPolicy {
        retries: 5,
        delay_base: Duration::from_millis(400),
        overall_timeout: Duration::from_millis(150),
        retry_client_errors: false,
    };
    let err = client
        .fetch_json_with(&location_query(), &policy)
        .await
        .expect_err("deadline elapses during backoff");
    assert!(err.is_timeout());

    let received = server.received_requests().await.unwrap_or_default();
    assert_eq!(received.len(), 1);
}
