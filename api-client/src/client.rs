use crate::config::ClientConfig;
use crate::config::RetryPolicy;
use crate::error::AttemptError;
use crate::error::FetchError;
use crate::error::Result;
use crate::query::ApiQuery;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::debug;
use tracing::warn;
use url::Url;

/// Anything that can answer an [`ApiQuery`] with a JSON document.
///
/// Components hold an `Arc<dyn FetchJson>` so tests can swap the network for
/// a scripted responder.
#[async_trait]
pub trait FetchJson: Send + Sync {
    async fn fetch_json(&self, query: &ApiQuery) -> Result<Value>;
}

/// HTTP client with linear-backoff retries under one overall deadline.
#[derive(Clone, Debug)]
pub struct ResilientClient {
    http: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate().map_err(|reason| FetchError::InvalidUrl {
            url: config.base_url.clone(),
            reason,
        })?;
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| FetchError::InvalidUrl {
                url: config.base_url.clone(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            policy: config.retry_policy(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches `query` with an explicit retry policy instead of the
    /// configured one.
    pub async fn fetch_json_with(&self, query: &ApiQuery, policy: &RetryPolicy) -> Result<Value> {
        let url = query.to_url(&self.base_url)?;
        self.fetch_url(url, policy).await
    }

    /// GETs `url` and decodes the body as JSON.
    ///
    /// The whole retry loop runs under `policy.overall_timeout`; when it
    /// elapses the in-flight attempt is dropped and pending retries are
    /// abandoned.
    pub async fn fetch_url(&self, url: Url, policy: &RetryPolicy) -> Result<Value> {
        let label = url.to_string();
        let attempts = self.retry_loop(&url, policy);
        match timeout(policy.overall_timeout, attempts).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Fetch of {label} timed out after {:?}",
                    policy.overall_timeout
                );
                Err(FetchError::Timeout {
                    url: label,
                    after: policy.overall_timeout,
                })
            }
        }
    }

    async fn retry_loop(&self, url: &Url, policy: &RetryPolicy) -> Result<Value> {
        let attempts = policy.retries.max(1);
        let mut attempt = 0;
        loop {
            let err = match self.attempt(url).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            warn!(
                "Attempt {}/{} failed for {url}: {err}",
                attempt + 1,
                attempts
            );

            if let Some(status) = err.status() {
                if !is_retryable(status, policy.retry_client_errors) {
                    return Err(FetchError::Rejected {
                        url: url.to_string(),
                        status,
                    });
                }
            }

            if attempt + 1 >= attempts {
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts,
                    last: err,
                });
            }

            let delay = policy.delay_after(attempt);
            debug!("Retrying {url} in {delay:?}");
            sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt(&self, url: &Url) -> std::result::Result<Value, AttemptError> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(AttemptError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }
        response.json::<Value>().await.map_err(AttemptError::Body)
    }
}

#[async_trait]
impl FetchJson for ResilientClient {
    async fn fetch_json(&self, query: &ApiQuery) -> Result<Value> {
        self.fetch_json_with(query, &self.policy).await
    }
}

/// 5xx, 408 and 429 are worth another try; other client errors are not
/// unless the caller opts in.
fn is_retryable(status: StatusCode, retry_client_errors: bool) -> bool {
    if !status.is_client_error() {
        return true;
    }
    retry_client_errors
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

/// Short, stable rendering of a JSON value's type for decode errors.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Looks up `root[kind][uid]` in an entity-keyed response.
pub fn entity_entry<'a>(root: &'a Value, kind: &str, uid: &str) -> Option<&'a Value> {
    root.get(kind)?.get(uid)
}

/// The object stored under `kind` in an entity-keyed response, or an error
/// naming what was found instead. A missing key counts as an empty object.
pub fn entity_map<'a>(
    root: &'a Value,
    kind: &str,
    query: &ApiQuery,
) -> Result<Option<&'a serde_json::Map<String, Value>>> {
    match root.get(kind) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        // An empty result set is sometimes rendered as `[]`.
        Some(Value::Array(items)) if items.is_empty() => Ok(None),
        Some(other) => Err(FetchError::Decode {
            url: query.to_string(),
            reason: format!("expected object under `{kind}`, found {}", json_kind(other)),
        }),
    }
}
