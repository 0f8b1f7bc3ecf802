use crate::config::AggregatorConfig;
use crate::error::EventsError;
use crate::error::Result;
use crate::location::location_info;
use crate::walker::LocationTreeWalker;
use futures::future::join_all;
use musiconn_api_client::ApiQuery;
use musiconn_api_client::EventRecord;
use musiconn_api_client::FetchJson;
use musiconn_api_client::LocationInfo;
use musiconn_api_client::Uid;
use musiconn_api_client::entity_map;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;
use tracing::info;
use tracing::warn;

const EVENT_PROPS: [&str; 7] = [
    "uid",
    "dates",
    "locations",
    "persons",
    "performances",
    "corporations",
    "sources",
];

/// Inclusive bounds on the year of an event's first date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }
}

/// Event records grouped by year, with the bounds that were applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearBuckets {
    pub bucketed: BTreeMap<i32, Vec<EventRecord>>,
    pub start_year: i32,
    pub end_year: i32,
}

impl YearBuckets {
    pub fn event_count(&self) -> usize {
        self.bucketed.values().map(Vec::len).sum()
    }
}

/// Units of work that failed while the rest of the run went ahead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialFailures {
    pub locations: BTreeSet<Uid>,
    pub event_batches: usize,
    pub undecodable_events: usize,
}

impl PartialFailures {
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty() && self.event_batches == 0 && self.undecodable_events == 0
    }
}

/// Result of fetching event details for a set of references.
#[derive(Debug, Clone, Default)]
pub struct FetchedEvents {
    /// One entry per successful batch, in no particular order.
    pub batches: Vec<Vec<EventRecord>>,
    pub requested_batches: usize,
    pub failed_batches: usize,
    pub undecodable_events: usize,
}

impl FetchedEvents {
    pub fn events(&self) -> impl Iterator<Item = &EventRecord> {
        self.batches.iter().flatten()
    }
}

/// Everything a caller needs to render a location's event history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedEvents {
    pub events_by_year: BTreeMap<i32, Vec<EventRecord>>,
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default)]
    pub partial: PartialFailures,
}

/// Walks a location tree, fetches the referenced events in batches and
/// buckets them by year.
#[derive(Clone)]
pub struct EventAggregator {
    api: Arc<dyn FetchJson>,
    walker: LocationTreeWalker,
    config: AggregatorConfig,
}

impl EventAggregator {
    pub fn new(api: Arc<dyn FetchJson>, config: AggregatorConfig) -> Result<Self> {
        config.validate().map_err(EventsError::Config)?;
        Ok(Self {
            walker: LocationTreeWalker::new(Arc::clone(&api)),
            api,
            config,
        })
    }

    pub fn walker(&self) -> &LocationTreeWalker {
        &self.walker
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub async fn location_info(&self, uid: Uid) -> Result<LocationInfo> {
        location_info(self.api.as_ref(), uid).await
    }

    /// Fetches full records for `refs`, `event_batch_size` per request, all
    /// batches in flight at once. Failed batches are logged and skipped.
    pub async fn fetch_all_events(&self, refs: &BTreeSet<Uid>) -> FetchedEvents {
        let uids: Vec<Uid> = refs.iter().copied().collect();
        let chunks: Vec<&[Uid]> = uids.chunks(self.config.event_batch_size).collect();
        let mut fetched = FetchedEvents {
            requested_batches: chunks.len(),
            ..Default::default()
        };
        if chunks.is_empty() {
            return fetched;
        }

        info!(
            "Fetching {} events in {} batches",
            uids.len(),
            fetched.requested_batches
        );
        let results = join_all(
            chunks
                .iter()
                .enumerate()
                .map(|(index, chunk)| self.fetch_batch(index, chunk)),
        )
        .await;

        for result in results {
            match result {
                Some((events, undecodable)) => {
                    fetched.undecodable_events += undecodable;
                    fetched.batches.push(events);
                }
                None => fetched.failed_batches += 1,
            }
        }
        fetched
    }

    /// Decoded events of one batch plus the number that failed to decode, or
    /// `None` when the batch as a whole failed.
    async fn fetch_batch(&self, index: usize, chunk: &[Uid]) -> Option<(Vec<EventRecord>, usize)> {
        let query = ApiQuery::get()
            .ids("event", chunk.iter().copied())
            .props(EVENT_PROPS);
        let json = match self.api.fetch_json(&query).await {
            Ok(json) => json,
            Err(err) => {
                warn!("Event batch {index} ({} events) failed: {err}", chunk.len());
                return None;
            }
        };
        let map = match entity_map(&json, "event", &query) {
            Ok(map) => map,
            Err(err) => {
                warn!("Event batch {index} is malformed: {err}");
                return None;
            }
        };

        let mut events = Vec::with_capacity(chunk.len());
        let mut undecodable = 0;
        for (key, value) in map.into_iter().flatten() {
            match EventRecord::deserialize(value) {
                Ok(event) => events.push(event),
                Err(err) => {
                    undecodable += 1;
                    warn!("Skipping undecodable event {key}: {err}");
                }
            }
        }
        debug!(
            "Event batch {index}: {} of {} events returned",
            events.len(),
            chunk.len()
        );
        Some((events, undecodable))
    }

    /// Full pipeline for one root location.
    ///
    /// Returns an error only if the root location itself cannot be fetched;
    /// everything below it degrades to partial results.
    pub async fn aggregate_events(
        &self,
        root: Uid,
        year_range: Option<YearRange>,
    ) -> Result<AggregatedEvents> {
        let walk = self.walker.walk(root).await?;
        let fetched = self.fetch_all_events(&walk.events).await;
        let buckets = bucket_by_year(&fetched.batches, year_range);

        let partial = PartialFailures {
            locations: walk.failed_locations,
            event_batches: fetched.failed_batches,
            undecodable_events: fetched.undecodable_events,
        };
        if !partial.is_empty() {
            warn!(
                "Location {root} aggregated with gaps: {} locations, {} batches, {} events missing",
                partial.locations.len(),
                partial.event_batches,
                partial.undecodable_events
            );
        }
        info!(
            "Location {root}: {} events in {} years ({}..={})",
            buckets.event_count(),
            buckets.bucketed.len(),
            buckets.start_year,
            buckets.end_year
        );

        Ok(AggregatedEvents {
            events_by_year: buckets.bucketed,
            start_year: buckets.start_year,
            end_year: buckets.end_year,
            partial,
        })
    }

    /// [`Self::aggregate_events`] with the empty result (`{}`, 0, 0) in
    /// place of a root failure.
    pub async fn aggregate_events_or_empty(
        &self,
        root: Uid,
        year_range: Option<YearRange>,
    ) -> AggregatedEvents {
        match self.aggregate_events(root, year_range).await {
            Ok(aggregated) => aggregated,
            Err(err) => {
                warn!("Aggregation for location {root} failed: {err}");
                AggregatedEvents::default()
            }
        }
    }
}

/// Smallest and largest first-date year across `events`, or `(0, 0)` when no
/// event carries a parseable date.
pub fn infer_year_range<'a, I>(events: I) -> YearRange
where
    I: IntoIterator<Item = &'a EventRecord>,
{
    let mut bounds: Option<(i32, i32)> = None;
    for year in events.into_iter().filter_map(EventRecord::year) {
        bounds = Some(match bounds {
            Some((lo, hi)) => (lo.min(year), hi.max(year)),
            None => (year, year),
        });
    }
    let (start, end) = bounds.unwrap_or((0, 0));
    YearRange::new(start, end)
}

/// Groups events by the year of their first date.
///
/// Undated events are dropped. Without a pinned `year_range` the bounds are
/// inferred from the data; years are compared numerically. Each bucket is
/// ordered by (date, uid) so the result does not depend on batch order.
pub fn bucket_by_year(batches: &[Vec<EventRecord>], year_range: Option<YearRange>) -> YearBuckets {
    let range = year_range.unwrap_or_else(|| infer_year_range(batches.iter().flatten()));

    let mut bucketed: BTreeMap<i32, Vec<EventRecord>> = BTreeMap::new();
    for event in batches.iter().flatten() {
        let Some(year) = event.year() else {
            continue;
        };
        if !range.contains(year) {
            continue;
        }
        bucketed.entry(year).or_default().push(event.clone());
    }
    for events in bucketed.values_mut() {
        events.sort_by(|a, b| {
            a.first_date()
                .cmp(&b.first_date())
                .then_with(|| a.uid.cmp(&b.uid))
        });
    }

    YearBuckets {
        bucketed,
        start_year: range.start,
        end_year: range.end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn event(uid: u64, date: Option<&str>) -> EventRecord {
        let dates = match date {
            Some(date) => json!([{ "date": date }]),
            None => json!([]),
        };
        serde_json::from_value(json!({ "uid": uid, "dates": dates })).expect("event")
    }

    fn uids(buckets: &YearBuckets, year: i32) -> Vec<u64> {
        buckets
            .bucketed
            .get(&year)
            .map(|events| events.iter().map(|e| e.uid.get()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn infers_range_from_dated_events_only() {
        let batches = vec![
            vec![event(1, Some("1905-06-00")), event(2, None)],
            vec![event(3, Some("1888-01-02")), event(4, Some("1920-12-31"))],
        ];
        let buckets = bucket_by_year(&batches, None);
        assert_eq!((buckets.start_year, buckets.end_year), (1888, 1920));
        assert_eq!(buckets.event_count(), 3);
        let years: Vec<i32> = buckets.bucketed.keys().copied().collect();
        assert_eq!(years, vec![1888, 1905, 1920]);
    }

    #[test]
    fn pinned_range_filters_numerically() {
        let batches = vec![vec![
            event(1, Some("1888-01-01")),
            event(2, Some("1905-05-05")),
            event(3, Some("1920-02-02")),
        ]];
        let buckets = bucket_by_year(&batches, Some(YearRange::new(1900, 1910)));
        assert_eq!((buckets.start_year, buckets.end_year), (1900, 1910));
        assert_eq!(buckets.event_count(), 1);
        assert_eq!(uids(&buckets, 1905), vec![2]);
    }

    #[test]
    fn no_dates_means_zero_bounds() {
        let batches = vec![vec![event(1, None), event(2, Some(""))]];
        let buckets = bucket_by_year(&batches, None);
        assert_eq!((buckets.start_year, buckets.end_year), (0, 0));
        assert!(buckets.bucketed.is_empty());
    }

    #[test]
    fn bucket_content_ignores_batch_order() {
        let a = vec![event(5, Some("1890-03-01")), event(1, Some("1890-01-00"))];
        let b = vec![event(3, Some("1890-01-00")), event(9, Some("1891-07-07"))];
        let forward = bucket_by_year(&[a.clone(), b.clone()], None);
        let backward = bucket_by_year(&[b, a], None);
        assert_eq!(forward, backward);
        assert_eq!(uids(&forward, 1890), vec![1, 3, 5]);
    }

    #[test]
    fn year_range_contains_is_inclusive() {
        let range = YearRange::new(1850, 1900);
        assert!(range.contains(1850));
        assert!(range.contains(1900));
        assert!(!range.contains(1849));
        assert!(!range.contains(1901));
    }
}
