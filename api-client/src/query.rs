use crate::error::FetchError;
use crate::model::EntityKind;
use crate::model::Uid;
use std::fmt;
use url::Url;

/// Operations the remote endpoint understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Get,
    Query,
    Autocomplete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Get => "get",
            Action::Query => "query",
            Action::Autocomplete => "autocomplete",
        }
    }
}

/// Parameters of one request against the single query endpoint.
///
/// Parameters keep their insertion order; `format=json` is always appended
/// last when the URL is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiQuery {
    action: Action,
    params: Vec<(String, String)>,
}

impl ApiQuery {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            params: Vec::new(),
        }
    }

    pub fn get() -> Self {
        Self::new(Action::Get)
    }

    pub fn query() -> Self {
        Self::new(Action::Query)
    }

    pub fn autocomplete() -> Self {
        Self::new(Action::Autocomplete)
    }

    /// Adds `key=uid1|uid2|...`.
    pub fn ids<I>(self, key: &str, uids: I) -> Self
    where
        I: IntoIterator<Item = Uid>,
    {
        let joined = join_pipe(uids.into_iter().map(|uid| uid.to_string()));
        self.param(key, joined)
    }

    /// Adds the id list under the entity's API key (`composer` goes out as
    /// `person`).
    pub fn entity_ids<I>(self, kind: EntityKind, uids: I) -> Self
    where
        I: IntoIterator<Item = Uid>,
    {
        self.ids(kind.api_name(), uids)
    }

    pub fn props<'a, I>(self, props: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.param("props", join_pipe(props))
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Adds the `project` scoping parameter when one is given.
    pub fn project(self, project: Option<u64>) -> Self {
        match project {
            Some(project) => self.param("project", project.to_string()),
            None => self,
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// First value recorded for `key`. `action` and `format` are answered too.
    pub fn value(&self, key: &str) -> Option<&str> {
        match key {
            "action" => Some(self.action.as_str()),
            "format" => Some("json"),
            _ => self
                .params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
        }
    }

    /// The `|`-separated values of `key`, parsed as UIDs. Unparseable entries
    /// are skipped.
    pub fn uid_list(&self, key: &str) -> Vec<Uid> {
        match self.value(key) {
            Some(raw) => raw.split('|').filter_map(|part| part.parse().ok()).collect(),
            None => Vec::new(),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    pub fn to_url(&self, base: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(base).map_err(|err| FetchError::InvalidUrl {
            url: base.to_string(),
            reason: err.to_string(),
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("action", self.action.as_str());
            for (key, value) in &self.params {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("format", "json");
        }
        Ok(url)
    }
}

impl fmt::Display for ApiQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action={}", self.action.as_str())?;
        for (key, value) in &self.params {
            write!(f, "&{key}={value}")?;
        }
        f.write_str("&format=json")
    }
}

fn join_pipe<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for part in parts {
        if !out.is_empty() {
            out.push('|');
        }
        out.push_str(part.as_ref());
    }
    out
}
