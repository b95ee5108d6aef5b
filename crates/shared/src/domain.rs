use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Source tag of a calendar entry. Unknown tags are carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CalendarKind {
    IcsUrl,
    GoogleOauth,
    Other(String),
}

impl CalendarKind {
    pub fn as_str(&self) -> &str {
        match self {
            CalendarKind::IcsUrl => "ics-url",
            CalendarKind::GoogleOauth => "google-oauth",
            CalendarKind::Other(tag) => tag,
        }
    }

    /// Whether entries of this kind are fetched from a remote `url`.
    pub fn requires_url(&self) -> bool {
        matches!(self, CalendarKind::IcsUrl)
    }
}

impl From<String> for CalendarKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ics-url" => CalendarKind::IcsUrl,
            "google-oauth" => CalendarKind::GoogleOauth,
            _ => CalendarKind::Other(value),
        }
    }
}

impl From<&str> for CalendarKind {
    fn from(value: &str) -> Self {
        CalendarKind::from(value.to_string())
    }
}

impl From<CalendarKind> for String {
    fn from(value: CalendarKind) -> Self {
        match value {
            CalendarKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for CalendarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the calendar list.
///
/// An entry has no identifier and no stored priority: its priority is its
/// position in the [`CalendarList`] that holds it. Fields the core does not
/// know about (e.g. `client-id` on `google-oauth` entries) are kept in
/// `extra` so they survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CalendarKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entry {
    pub fn new(name: impl Into<String>, kind: impl Into<CalendarKind>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            url: None,
            extra: Map::new(),
        }
    }

    pub fn ics(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, CalendarKind::IcsUrl).with_url(url)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// The ordered calendar list. Index 0 is the highest priority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarList(Vec<Entry>);

impl CalendarList {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.0.iter()
    }

    /// `(priority, entry)` pairs in display order.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &Entry)> {
        self.0.iter().enumerate()
    }
}

impl From<Vec<Entry>> for CalendarList {
    fn from(entries: Vec<Entry>) -> Self {
        Self(entries)
    }
}

impl FromIterator<Entry> for CalendarList {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a CalendarList {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for CalendarList {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
