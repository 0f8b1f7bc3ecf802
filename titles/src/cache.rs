use crate::config::TitleCacheConfig;
use crate::error::Result;
use crate::error::TitlesError;
use crate::persist::SnapshotStore;
use crate::persist::TitleEntry;
use crate::persist::TitleMap;
use crate::persist::TitleSnapshot;
use futures::future::join_all;
use musiconn_api_client::ApiQuery;
use musiconn_api_client::EntityKind;
use musiconn_api_client::EventRecord;
use musiconn_api_client::FetchJson;
use musiconn_api_client::Uid;
use musiconn_api_client::entity_map;
use serde::Deserialize;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// A UID with the weight used to order a prioritized resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrioritizedUid {
    pub uid: Uid,
    pub count: u64,
}

impl PrioritizedUid {
    pub fn new(uid: Uid, count: u64) -> Self {
        Self { uid, count }
    }
}

/// Read-only view of the cache's bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_cached: usize,
    pub by_entity: BTreeMap<EntityKind, usize>,
    pub in_flight: BTreeMap<EntityKind, Vec<Uid>>,
    pub failed: BTreeMap<EntityKind, Vec<Uid>>,
}

#[derive(Default)]
struct CacheState {
    titles: TitleMap,
    in_flight: HashMap<EntityKind, HashSet<Uid>>,
    /// Failed UIDs and the instant their cooldown ends.
    cooldown: HashMap<EntityKind, HashMap<Uid, Instant>>,
}

impl CacheState {
    fn title(&self, uid: Uid, kind: EntityKind) -> Option<&str> {
        self.titles
            .get(&kind)
            .and_then(|titles| titles.get(&uid))
            .map(|entry| entry.title.as_str())
    }

    fn is_in_flight(&self, uid: Uid, kind: EntityKind) -> bool {
        self.in_flight
            .get(&kind)
            .is_some_and(|uids| uids.contains(&uid))
    }

    fn is_cooling(&self, uid: Uid, kind: EntityKind, now: Instant) -> bool {
        self.cooldown
            .get(&kind)
            .and_then(|uids| uids.get(&uid))
            .is_some_and(|until| *until > now)
    }

    /// Neither resolved, pending nor cooling down.
    fn wants(&self, uid: Uid, kind: EntityKind, now: Instant) -> bool {
        self.title(uid, kind).is_none()
            && !self.is_in_flight(uid, kind)
            && !self.is_cooling(uid, kind, now)
    }

    fn prune_cooldown(&mut self, now: Instant) {
        for uids in self.cooldown.values_mut() {
            uids.retain(|_, until| *until > now);
        }
        self.cooldown.retain(|_, uids| !uids.is_empty());
    }
}

struct Inner {
    api: Arc<dyn FetchJson>,
    config: TitleCacheConfig,
    store: Option<Arc<dyn SnapshotStore>>,
    state: Mutex<CacheState>,
    /// Serializes snapshot writes so the last write carries the newest map.
    persist_lock: Mutex<()>,
    /// Bumped whenever a title is added.
    changes: watch::Sender<u64>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, CacheState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let _writer = match self.persist_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let snapshot = TitleSnapshot::new(self.state().titles.clone());
        if let Err(err) = store.write(&snapshot) {
            warn!("Failed to persist title cache: {err}");
        }
    }
}

/// Marks a claimed set of UIDs as in flight until dropped, so a cancelled
/// resolution never leaves UIDs stuck.
struct InFlight<'a> {
    inner: &'a Inner,
    kind: EntityKind,
    uids: Vec<Uid>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.state();
        if let Some(pending) = state.in_flight.get_mut(&self.kind) {
            for uid in &self.uids {
                pending.remove(uid);
            }
            if pending.is_empty() {
                state.in_flight.remove(&self.kind);
            }
        }
    }
}

/// Deduplicating, cooldown-aware title lookup for entity UIDs.
///
/// Cheap to clone; clones share one state. Concurrent resolutions of
/// overlapping UID sets issue at most one request per (kind, UID): UIDs are
/// claimed as in flight before any request goes out and released only after
/// the result has been merged.
#[derive(Clone)]
pub struct TitleCache {
    inner: Arc<Inner>,
}

impl TitleCache {
    /// A cache without persistence.
    pub fn new(api: Arc<dyn FetchJson>, config: TitleCacheConfig) -> Result<Self> {
        Self::build(api, config, None)
    }

    /// A cache seeded from `store` and written back to it after every change.
    ///
    /// A snapshot that cannot be read, has another version or is older than
    /// the configured expiry is ignored.
    pub fn with_store(
        api: Arc<dyn FetchJson>,
        config: TitleCacheConfig,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self> {
        Self::build(api, config, Some(store))
    }

    fn build(
        api: Arc<dyn FetchJson>,
        config: TitleCacheConfig,
        store: Option<Arc<dyn SnapshotStore>>,
    ) -> Result<Self> {
        config.validate().map_err(TitlesError::Config)?;
        let titles = store
            .as_deref()
            .map(|store| load_titles(store, config.snapshot_expiry()))
            .unwrap_or_default();
        let (changes, _) = watch::channel(0);
        Ok(Self {
            inner: Arc::new(Inner {
                api,
                config,
                store,
                state: Mutex::new(CacheState {
                    titles,
                    ..Default::default()
                }),
                persist_lock: Mutex::new(()),
                changes,
            }),
        })
    }

    pub fn config(&self) -> &TitleCacheConfig {
        &self.inner.config
    }

    /// Cached title, without triggering any fetch.
    pub fn cached_title(&self, uid: Uid, kind: EntityKind) -> Option<String> {
        self.inner.state().title(uid, kind).map(str::to_string)
    }

    /// All cached titles of one kind.
    pub fn titles(&self, kind: EntityKind) -> BTreeMap<Uid, String> {
        self.inner
            .state()
            .titles
            .get(&kind)
            .map(|titles| {
                titles
                    .iter()
                    .map(|(uid, entry)| (*uid, entry.title.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Non-blocking read. On a miss, a background resolution is started
    /// unless the UID is already pending or cooling down.
    pub fn title_sync(&self, uid: Uid, kind: EntityKind) -> Option<String> {
        if let Some(title) = self.cached_title(uid, kind) {
            return Some(title);
        }
        self.spawn_resolve(uid, kind);
        None
    }

    /// The title of `uid`, waiting up to the configured timeout for it to be
    /// resolved. Falls back to [`placeholder`] instead of failing.
    pub async fn title_async(&self, uid: Uid, kind: EntityKind) -> String {
        if let Some(title) = self.cached_title(uid, kind) {
            return title;
        }
        self.spawn_resolve(uid, kind);
        match self
            .wait_for_title(uid, kind, self.inner.config.wait_timeout())
            .await
        {
            Some(title) => title,
            None => {
                debug!("No title for {kind} {uid} within the wait timeout");
                placeholder(uid, kind)
            }
        }
    }

    /// Waits until `uid` has a title or `timeout` elapses. Does not start a
    /// resolution.
    pub async fn wait_for_title(
        &self,
        uid: Uid,
        kind: EntityKind,
        timeout: Duration,
    ) -> Option<String> {
        // Subscribe before the first check so no update is missed in between.
        let mut changes = self.inner.changes.subscribe();
        let wait = async {
            loop {
                if let Some(title) = self.cached_title(uid, kind) {
                    return Some(title);
                }
                if changes.changed().await.is_err() {
                    return None;
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.ok().flatten()
    }

    fn spawn_resolve(&self, uid: Uid, kind: EntityKind) {
        if !self.inner.state().wants(uid, kind, Instant::now()) {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let cache = self.clone();
                handle.spawn(async move { cache.resolve_many(&[uid], kind).await });
            }
            Err(_) => debug!("No async runtime; not resolving {kind} {uid}"),
        }
    }

    /// Fetches titles for every UID in `uids` that is not cached, pending or
    /// cooling down, `batch_size` UIDs per request with all batches in flight
    /// at once. A failed batch puts its UIDs into cooldown.
    pub async fn resolve_many(&self, uids: &[Uid], kind: EntityKind) {
        let Some(claim) = self.claim(uids, kind) else {
            return;
        };
        debug!("Resolving {} {kind} titles", claim.uids.len());
        let batches = claim
            .uids
            .chunks(self.inner.config.batch_size)
            .map(|chunk| self.resolve_batch(chunk, kind));
        join_all(batches).await;
        drop(claim);
    }

    /// Filters `uids` down to those worth fetching and marks them in flight,
    /// in one critical section.
    fn claim(&self, uids: &[Uid], kind: EntityKind) -> Option<InFlight<'_>> {
        let now = Instant::now();
        let mut state = self.inner.state();
        let mut seen = HashSet::new();
        let claimed: Vec<Uid> = uids
            .iter()
            .copied()
            .filter(|uid| seen.insert(*uid) && state.wants(*uid, kind, now))
            .collect();
        if claimed.is_empty() {
            return None;
        }
        state
            .in_flight
            .entry(kind)
            .or_default()
            .extend(claimed.iter().copied());
        Some(InFlight {
            inner: &self.inner,
            kind,
            uids: claimed,
        })
    }

    async fn resolve_batch(&self, chunk: &[Uid], kind: EntityKind) {
        let query = ApiQuery::get()
            .entity_ids(kind, chunk.iter().copied())
            .props(["title"]);
        let resolved = match self.inner.api.fetch_json(&query).await {
            Ok(json) => match entity_map(&json, kind.api_name(), &query) {
                Ok(map) => map
                    .into_iter()
                    .flatten()
                    .filter_map(|(key, value)| {
                        let uid = key.parse::<Uid>().ok()?;
                        let entry = TitleEntry::deserialize(value).ok()?;
                        Some((uid, entry))
                    })
                    .collect::<BTreeMap<_, _>>(),
                Err(err) => {
                    warn!("Malformed {kind} title batch: {err}");
                    BTreeMap::new()
                }
            },
            Err(err) => {
                warn!("Failed to fetch {} {kind} titles: {err}", chunk.len());
                BTreeMap::new()
            }
        };

        let failed: Vec<Uid> = chunk
            .iter()
            .copied()
            .filter(|uid| !resolved.contains_key(uid))
            .collect();
        self.merge(kind, resolved, &failed);
    }

    fn merge(&self, kind: EntityKind, resolved: BTreeMap<Uid, TitleEntry>, failed: &[Uid]) {
        let added = resolved.len();
        {
            let mut state = self.inner.state();
            if !failed.is_empty() {
                let until = Instant::now() + self.inner.config.cooldown();
                let cooling = state.cooldown.entry(kind).or_default();
                for uid in failed {
                    cooling.insert(*uid, until);
                }
            }
            if added > 0 {
                state.titles.entry(kind).or_default().extend(resolved);
            }
        }
        if !failed.is_empty() {
            debug!("{} {kind} UIDs cooling down", failed.len());
        }
        if added > 0 {
            self.inner.persist();
            self.inner.changes.send_modify(|version| *version += 1);
        }
    }

    /// Resolves `items` by descending count: the first `priority_individual`
    /// one per request, the rest in small batches, pausing in between so
    /// observers see titles arrive in rank order.
    pub async fn resolve_prioritized(&self, items: &[PrioritizedUid], kind: EntityKind) {
        let now = Instant::now();
        let mut ranked: Vec<PrioritizedUid> = {
            let state = self.inner.state();
            let mut seen = HashSet::new();
            items
                .iter()
                .copied()
                .filter(|item| seen.insert(item.uid) && state.wants(item.uid, kind, now))
                .collect()
        };
        if ranked.is_empty() {
            return;
        }
        ranked.sort_by_key(|item| Reverse(item.count));

        let config = &self.inner.config;
        let split = config.priority_individual.min(ranked.len());
        let (top, rest) = ranked.split_at(split);
        for item in top {
            self.resolve_many(&[item.uid], kind).await;
            tokio::time::sleep(Duration::from_millis(config.priority_individual_pause_ms)).await;
        }
        for chunk in rest.chunks(config.priority_batch_size) {
            let uids: Vec<Uid> = chunk.iter().map(|item| item.uid).collect();
            self.resolve_many(&uids, kind).await;
            tokio::time::sleep(Duration::from_millis(config.priority_batch_pause_ms)).await;
        }
    }

    /// Resolves every entity an event references, all kinds concurrently.
    pub async fn resolve_titles_for_event(&self, event: &EventRecord) {
        self.preload_titles_for_events(std::iter::once(event)).await;
    }

    /// Resolves the union of entities referenced by `events`, one
    /// `resolve_many` per kind.
    pub async fn preload_titles_for_events<'a, I>(&self, events: I)
    where
        I: IntoIterator<Item = &'a EventRecord>,
    {
        let mut wanted: BTreeMap<EntityKind, Vec<Uid>> = BTreeMap::new();
        for event in events {
            for kind in EntityKind::ALL {
                let uids = event.uids_for_kind(kind);
                if !uids.is_empty() {
                    wanted.entry(kind).or_default().extend(uids);
                }
            }
        }
        join_all(
            wanted
                .iter()
                .map(|(kind, uids)| self.resolve_many(uids, *kind)),
        )
        .await;
    }

    /// Lifts every cooldown so failed UIDs may be fetched again right away.
    pub fn clear_failed_cache(&self) {
        self.inner.state().cooldown.clear();
        info!("Cleared failed titles cache");
    }

    pub fn cache_stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut state = self.inner.state();
        state.prune_cooldown(now);

        let by_entity: BTreeMap<EntityKind, usize> = state
            .titles
            .iter()
            .map(|(kind, titles)| (*kind, titles.len()))
            .collect();
        CacheStats {
            total_cached: by_entity.values().sum(),
            by_entity,
            in_flight: sorted_uids(state.in_flight.iter().map(|(k, v)| (*k, v.iter()))),
            failed: sorted_uids(state.cooldown.iter().map(|(k, v)| (*k, v.keys()))),
        }
    }
}

/// Text shown for a UID whose title could not be resolved.
pub fn placeholder(uid: Uid, kind: EntityKind) -> String {
    format!("Unknown {kind} ({uid})")
}

fn sorted_uids<'a, I, U>(groups: I) -> BTreeMap<EntityKind, Vec<Uid>>
where
    I: Iterator<Item = (EntityKind, U)>,
    U: Iterator<Item = &'a Uid>,
{
    groups
        .map(|(kind, uids)| {
            let mut uids: Vec<Uid> = uids.copied().collect();
            uids.sort_unstable();
            (kind, uids)
        })
        .filter(|(_, uids)| !uids.is_empty())
        .collect()
}

fn load_titles(store: &dyn SnapshotStore, expiry: Duration) -> TitleMap {
    match store.read() {
        Ok(Some(snapshot)) => {
            if snapshot.is_usable(chrono::Utc::now().timestamp_millis(), expiry) {
                let count: usize = snapshot.data.values().map(BTreeMap::len).sum();
                info!("Loaded {count} cached titles");
                snapshot.data
            } else {
                TitleMap::new()
            }
        }
        Ok(None) => TitleMap::new(),
        Err(err) => {
            warn!("Failed to load title cache: {err}");
            TitleMap::new()
        }
    }
}
