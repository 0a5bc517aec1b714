// ── List descriptors ──

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};

use super::filter::FilterExpr;
use crate::error::CoreError;

/// Opaque id of one list view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ListId(String);

impl ListId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ListId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Who computes the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListMode {
    /// Filter, group, sort and paginate the local cache.
    #[default]
    Local,
    /// The service returns the page; the engine mirrors and maintains it.
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// What a list shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: String,
    pub group_key: Option<String>,
    pub collapsed: BTreeSet<String>,
    pub sort_key: Option<String>,
    pub sort_direction: SortDirection,
    pub page_number: usize,
    /// `0` means the engine's default page size.
    pub page_size: usize,
    /// Keep `page_number` when re-querying with a different descriptor.
    pub keep_page: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filter: String::new(),
            group_key: None,
            collapsed: BTreeSet::new(),
            sort_key: None,
            sort_direction: SortDirection::Ascending,
            page_number: 1,
            page_size: 0,
            keep_page: false,
        }
    }
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, text: impl Into<String>) -> Self {
        self.filter = text.into();
        self
    }

    pub fn group_by(mut self, key: impl Into<String>) -> Self {
        self.group_key = Some(key.into());
        self
    }

    pub fn collapse(mut self, group: impl Into<String>) -> Self {
        self.collapsed.insert(group.into());
        self
    }

    pub fn sort_by(mut self, key: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_key = Some(key.into());
        self.sort_direction = direction;
        self
    }

    pub fn page(mut self, number: usize) -> Self {
        self.page_number = number;
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    pub fn keep_page(mut self) -> Self {
        self.keep_page = true;
        self
    }

    /// Fill defaults and reject impossible pages.
    pub(crate) fn normalized(mut self, default_page_size: usize) -> Result<Self, CoreError> {
        if self.page_size == 0 {
            self.page_size = default_page_size;
        }
        if self.page_size == 0 {
            return Err(CoreError::validation("page_size", "must be greater than 0"));
        }
        if self.page_number == 0 {
            return Err(CoreError::validation("page_number", "must be at least 1"));
        }
        Ok(self)
    }

    /// Same descriptor, ignoring page position.
    pub(crate) fn same_descriptor(&self, other: &Self) -> bool {
        self.filter == other.filter
            && self.group_key == other.group_key
            && self.collapsed == other.collapsed
            && self.sort_key == other.sort_key
            && self.sort_direction == other.sort_direction
            && self.page_size == other.page_size
    }

    /// Request params for a server-side list.
    pub(crate) fn to_params(&self) -> Value {
        let mut params = json!({
            "group_collapsed": self.collapsed.iter().collect::<Vec<_>>(),
            "sort_direction": self.sort_direction,
            "page_number": self.page_number,
            "page_size": self.page_size,
        });
        if let Some(obj) = params.as_object_mut() {
            let filter = FilterExpr::parse(&self.filter);
            if !filter.is_empty() {
                obj.insert("filter".into(), filter.to_wire());
            }
            if let Some(ref key) = self.group_key {
                obj.insert("group_key".into(), Value::from(key.as_str()));
            }
            if let Some(ref key) = self.sort_key {
                obj.insert("sort_key".into(), Value::from(key.as_str()));
            }
        }
        params
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_page_size() {
        let q = ListQuery::new().normalized(25).unwrap();
        assert_eq!(q.page_size, 25);
        assert!(ListQuery::new().page(0).normalized(25).is_err());
    }

    #[test]
    fn server_params_include_only_set_fields() {
        let q = ListQuery::new()
            .filter("status:deployed")
            .group_by("status")
            .collapse("Ready")
            .page_size(10);
        assert_eq!(
            q.to_params(),
            json!({
                "filter": {"status": ["deployed"]},
                "group_key": "status",
                "group_collapsed": ["Ready"],
                "sort_direction": "ascending",
                "page_number": 1,
                "page_size": 10
            })
        );
    }
}
