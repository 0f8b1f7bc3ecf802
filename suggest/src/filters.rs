use musiconn_api_client::EntityKind;
use musiconn_api_client::EventRecord;
use musiconn_api_client::Uid;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// One entity the user has already picked as a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub entity: EntityKind,
    pub id: Uid,
    #[serde(default)]
    pub color: Option<String>,
}

impl Filter {
    pub fn new(entity: EntityKind, id: Uid) -> Self {
        Self {
            entity,
            id,
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Filters grouped by how they combine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedFilters {
    #[serde(default)]
    pub and: Vec<Filter>,
    #[serde(default)]
    pub or: Vec<Filter>,
    #[serde(default)]
    pub not: Vec<Filter>,
}

impl SelectedFilters {
    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.and.iter().chain(&self.or).chain(&self.not)
    }

    pub fn is_empty(&self) -> bool {
        self.and.is_empty() && self.or.is_empty() && self.not.is_empty()
    }

    /// Whether an entity named as the API names it (`composer` filters
    /// count as `person`) is already selected.
    pub fn contains(&self, entity: &str, id: Uid) -> bool {
        self.iter()
            .any(|filter| filter.id == id && filter.entity.api_name() == entity)
    }
}

/// How often one filter matches within an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCounter {
    pub counter: usize,
    pub color: String,
}

/// Counts, per filter id, the matches of every selected filter in `event`.
///
/// Composer filters match the first composer of each performance, work
/// filters the performance's work, person filters any performer, and
/// corporation filters the event's corporations. Location filters never
/// match. Filters sharing an id share one counter; the first one's color is
/// kept.
pub fn filter_counters(
    event: &EventRecord,
    filters: &SelectedFilters,
) -> BTreeMap<Uid, FilterCounter> {
    let mut counters: BTreeMap<Uid, FilterCounter> = BTreeMap::new();
    let mut counted = BTreeSet::new();
    for filter in filters.iter() {
        let counter = counters.entry(filter.id).or_insert_with(|| FilterCounter {
            counter: 0,
            color: filter.color.clone().unwrap_or_default(),
        });
        if !counted.insert((filter.entity, filter.id)) {
            continue;
        }
        counter.counter += matches(event, filter);
    }
    counters
}

fn matches(event: &EventRecord, filter: &Filter) -> usize {
    let id = filter.id;
    match filter.entity {
        EntityKind::Composer => event
            .performances
            .iter()
            .filter(|p| p.composers.first().is_some_and(|c| c.person == id))
            .count(),
        EntityKind::Work => event
            .performances
            .iter()
            .filter(|p| p.work == Some(id))
            .count(),
        EntityKind::Person => event
            .performances
            .iter()
            .flat_map(|p| &p.persons)
            .filter(|p| p.person == id)
            .count(),
        EntityKind::Corporation => event
            .corporations
            .iter()
            .filter(|c| c.corporation == id)
            .count(),
        EntityKind::Location => 0,
    }
}
