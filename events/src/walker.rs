use crate::error::Result;
use crate::location::location_node;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::join_all;
use musiconn_api_client::FetchJson;
use musiconn_api_client::LocationNode;
use musiconn_api_client::Uid;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;
use tracing::warn;

/// Event references gathered from a location subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkOutcome {
    pub events: BTreeSet<Uid>,
    /// Locations whose fetch failed; their subtrees contributed nothing.
    pub failed_locations: BTreeSet<Uid>,
}

impl WalkOutcome {
    fn failed(uid: Uid) -> Self {
        Self {
            events: BTreeSet::new(),
            failed_locations: BTreeSet::from([uid]),
        }
    }

    fn merge(&mut self, other: WalkOutcome) {
        self.events.extend(other.events);
        self.failed_locations.extend(other.failed_locations);
    }
}

/// Expands a location into the events held by it and all its descendants.
///
/// The remote tree is trusted to be acyclic: there is no cycle detection and
/// no depth limit.
#[derive(Clone)]
pub struct LocationTreeWalker {
    api: Arc<dyn FetchJson>,
}

impl LocationTreeWalker {
    pub fn new(api: Arc<dyn FetchJson>) -> Self {
        Self { api }
    }

    /// Walks the tree below `root`. A failure to fetch `root` itself is
    /// returned; failures further down only prune the failing subtree.
    pub async fn walk(&self, root: Uid) -> Result<WalkOutcome> {
        let node = location_node(self.api.as_ref(), root).await?;
        let outcome = self.expand(root, node).await;
        debug!(
            "Location {root}: {} events, {} failed locations",
            outcome.events.len(),
            outcome.failed_locations.len()
        );
        Ok(outcome)
    }

    /// Like [`Self::walk`], but a failing root yields an empty set.
    pub async fn collect_event_refs(&self, root: Uid) -> BTreeSet<Uid> {
        match self.walk(root).await {
            Ok(outcome) => outcome.events,
            Err(err) => {
                warn!("Failed to fetch events for location {root}: {err}");
                BTreeSet::new()
            }
        }
    }

    fn walk_subtree(&self, uid: Uid) -> BoxFuture<'_, WalkOutcome> {
        async move {
            match location_node(self.api.as_ref(), uid).await {
                Ok(node) => self.expand(uid, node).await,
                Err(err) => {
                    warn!("Skipping location {uid}: {err}");
                    WalkOutcome::failed(uid)
                }
            }
        }
        .boxed()
    }

    async fn expand(&self, uid: Uid, node: LocationNode) -> WalkOutcome {
        let mut outcome = WalkOutcome {
            events: node.events.iter().map(|r| r.event).collect(),
            failed_locations: BTreeSet::new(),
        };
        if node.childs.is_empty() {
            return outcome;
        }

        debug!(
            "Location {uid}: descending into {} children",
            node.childs.len()
        );
        // TODO: accept a cancellation token here so an abandoned request stops fanning out.
        let pending = node.childs.iter().map(|c| self.walk_subtree(c.location));
        for child in join_all(pending).await {
            outcome.merge(child);
        }
        outcome
    }
}
