//! In-memory [`FetchJson`] for exercising higher layers without a network.

use crate::client::FetchJson;
use crate::error::FetchError;
use crate::error::Result;
use crate::query::ApiQuery;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

type Responder = dyn Fn(&ApiQuery) -> Result<Value> + Send + Sync;

/// Answers every query from a closure and records what it was asked.
///
/// An optional latency is awaited before each answer so callers can observe
/// overlapping requests.
#[derive(Clone)]
pub struct ScriptedApi {
    responder: Arc<Responder>,
    latency: Option<Duration>,
    log: Arc<Mutex<Vec<ApiQuery>>>,
}

impl ScriptedApi {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ApiQuery) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            latency: None,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every query received so far, in arrival order.
    pub fn requests(&self) -> Vec<ApiQuery> {
        match self.log.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }

    /// Queries whose `key` parameter lists `uid`.
    pub fn requests_for(&self, key: &str, uid: u64) -> usize {
        self.requests()
            .iter()
            .filter(|query| query.uid_list(key).iter().any(|u| u.get() == uid))
            .count()
    }
}

/// The error a scripted responder returns to simulate a dead endpoint.
pub fn exhausted(query: &ApiQuery) -> FetchError {
    FetchError::Exhausted {
        url: query.to_string(),
        attempts: 1,
        last: crate::error::AttemptError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE),
    }
}

#[async_trait]
impl FetchJson for ScriptedApi {
    async fn fetch_json(&self, query: &ApiQuery) -> Result<Value> {
        match self.log.lock() {
            Ok(mut guard) => guard.push(query.clone()),
            Err(poisoned) => poisoned.into_inner().push(query.clone()),
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        (self.responder)(query)
    }
}
