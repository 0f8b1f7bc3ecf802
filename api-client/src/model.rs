use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::de;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Identifier of an entity in the remote database.
///
/// Unique only within one entity namespace; the API serializes it either as a
/// JSON number or as a numeric string, so both forms are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Uid(pub u64);

impl Uid {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Uid {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl FromStr for Uid {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Uid)
    }
}

impl<'de> Deserialize<'de> for Uid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct UidVisitor;

        impl de::Visitor<'_> for UidVisitor {
            type Value = Uid;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or a numeric string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Uid, E> {
                Ok(Uid(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Uid, E> {
                u64::try_from(v)
                    .map(Uid)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Uid, E> {
                v.parse()
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(UidVisitor)
    }
}

/// Kinds of entity whose titles the events reference.
///
/// `Composer` shares the person UID space on the API side but is kept as its
/// own bucket wherever titles are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Work,
    Person,
    Location,
    Corporation,
    Composer,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Work,
        EntityKind::Person,
        EntityKind::Location,
        EntityKind::Corporation,
        EntityKind::Composer,
    ];

    /// Name used in local buckets, logs and placeholders.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Work => "work",
            EntityKind::Person => "person",
            EntityKind::Location => "location",
            EntityKind::Corporation => "corporation",
            EntityKind::Composer => "composer",
        }
    }

    /// Name of the parameter and response key on the remote endpoint.
    pub fn api_name(self) -> &'static str {
        match self {
            EntityKind::Composer => EntityKind::Person.as_str(),
            other => other.as_str(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "work" => Ok(EntityKind::Work),
            "person" => Ok(EntityKind::Person),
            "location" => Ok(EntityKind::Location),
            "corporation" => Ok(EntityKind::Corporation),
            "composer" => Ok(EntityKind::Composer),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDate {
    /// `YYYY-MM-DD`, with `00` standing in for an unknown day or month.
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRef {
    pub location: Uid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    pub person: Uid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorporationRef {
    pub corporation: Uid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: Uid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
    pub event: Uid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performance {
    #[serde(default)]
    pub work: Option<Uid>,
    #[serde(default)]
    pub composers: Vec<PersonRef>,
    #[serde(default)]
    pub persons: Vec<PersonRef>,
}

/// One event as returned by `action=get&event=...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub uid: Uid,
    #[serde(default)]
    pub dates: Vec<EventDate>,
    #[serde(default)]
    pub locations: Vec<LocationRef>,
    #[serde(default)]
    pub persons: Vec<PersonRef>,
    #[serde(default)]
    pub performances: Vec<Performance>,
    #[serde(default)]
    pub corporations: Vec<CorporationRef>,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

impl EventRecord {
    /// The date string of the first listed date, if any.
    pub fn first_date(&self) -> Option<&str> {
        self.dates
            .first()
            .and_then(|d| d.date.as_deref())
            .filter(|d| !d.is_empty())
    }

    /// Calendar year of the first date: the leading `-`-separated component.
    pub fn year(&self) -> Option<i32> {
        let date = self.first_date()?;
        date.split('-').next()?.trim().parse().ok()
    }

    /// UIDs referenced by this event for one entity kind, deduplicated and in
    /// first-seen order.
    pub fn uids_for_kind(&self, kind: EntityKind) -> Vec<Uid> {
        let mut seen = std::collections::HashSet::new();
        let all: Box<dyn Iterator<Item = Uid> + '_> = match kind {
            EntityKind::Work => Box::new(self.performances.iter().filter_map(|p| p.work)),
            EntityKind::Person => Box::new(self.persons.iter().map(|p| p.person)),
            EntityKind::Location => Box::new(self.locations.iter().map(|l| l.location)),
            EntityKind::Corporation => Box::new(self.corporations.iter().map(|c| c.corporation)),
            EntityKind::Composer => Box::new(
                self.performances
                    .iter()
                    .flat_map(|p| p.composers.iter().map(|c| c.person)),
            ),
        };
        all.filter(|uid| seen.insert(*uid)).collect()
    }
}

/// Children and directly attached events of one location node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationNode {
    #[serde(default)]
    pub childs: Vec<LocationRef>,
    #[serde(default)]
    pub events: Vec<EventRef>,
}

/// Descriptive fields of a single location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub uid: Uid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub categories: Vec<Value>,
    #[serde(default)]
    pub geometries: Vec<Value>,
    #[serde(default, rename = "childs")]
    pub children: Vec<LocationRef>,
    #[serde(default)]
    pub parents: Vec<LocationRef>,
}
