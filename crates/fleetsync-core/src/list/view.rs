// ── List views ──
//
// A list view is a paginated, grouped, sorted projection of one model's
// cache. Local views are recomputed from the cache on every change.
// Server views mirror the page the service returned and are patched in
// place by change notifications until the consumer re-queries.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use fleetsync_api::RequestId;

use super::filter::FilterExpr;
use super::order::{compare_values, group_name};
use super::query::{ListId, ListMode, ListQuery, SortDirection};
use crate::error::CoreError;
use crate::model::{Entity, ErrorPayload, ModelSchema, PrimaryKey};

/// Name of the bucket for entities without a usable group value.
pub const UNKNOWN_GROUP: &str = "Unknown";

/// One group on the current page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListGroup {
    /// `None` only for the single bucket of an ungrouped list.
    pub name: Option<String>,
    pub value: Value,
    /// Size of the whole group, not just this page. `None` when unknown.
    pub count: Option<usize>,
    pub collapsed: bool,
    /// Members on this page. Always empty for collapsed groups.
    pub keys: Vec<PrimaryKey>,
}

/// Materialized state of one list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListView {
    pub id: ListId,
    pub mode: ListMode,
    pub query: ListQuery,
    pub result_keys: Vec<PrimaryKey>,
    pub groups: Vec<ListGroup>,
    pub cur_page: usize,
    pub num_pages: usize,
    pub count: usize,
    pub loading: bool,
    pub loaded: bool,
    pub stale: bool,
    pub errors: Option<ErrorPayload>,
    /// Keys the service holds subscriptions for under this list.
    pub unsubscribe_keys: Vec<PrimaryKey>,
    /// Request whose response this list is waiting for.
    pub pending: Option<RequestId>,
}

impl ListView {
    pub(crate) fn new(id: ListId, mode: ListMode, query: ListQuery) -> Self {
        Self {
            id,
            mode,
            cur_page: query.page_number,
            query,
            result_keys: Vec::new(),
            groups: Vec::new(),
            num_pages: 0,
            count: 0,
            loading: false,
            loaded: false,
            stale: false,
            errors: None,
            unsubscribe_keys: Vec::new(),
            pending: None,
        }
    }

    /// Is `key` shown by, or subscribed through, this list?
    pub fn contains(&self, key: &PrimaryKey) -> bool {
        self.result_keys.contains(key) || self.unsubscribe_keys.contains(key)
    }

    // ── Local projection ─────────────────────────────────────────────

    /// Recompute from the cache. Returns `true` if anything changed.
    pub(crate) fn project(
        &mut self,
        items: &IndexMap<PrimaryKey, Entity>,
        schema: &ModelSchema,
        loading: bool,
        loaded: bool,
    ) -> bool {
        let next = Projection::compute(items, schema, &self.query);
        let changed = next.groups != self.groups
            || next.result_keys != self.result_keys
            || next.count != self.count
            || next.num_pages != self.num_pages
            || self.cur_page != self.query.page_number
            || self.loading != loading
            || self.loaded != loaded;

        self.groups = next.groups;
        self.result_keys = next.result_keys;
        self.count = next.count;
        self.num_pages = next.num_pages;
        self.cur_page = self.query.page_number;
        self.loading = loading;
        self.loaded = loaded;
        changed
    }

    // ── Server pages ─────────────────────────────────────────────────

    /// Replace the view with a page the service returned.
    pub(crate) fn apply_page(&mut self, page: &ServerPage) {
        self.groups.clone_from(&page.groups);
        self.count = page.count;
        self.cur_page = page.cur_page;
        self.num_pages = page.num_pages;
        self.unsubscribe_keys = page.keys();
        self.rebuild_result_keys();
        self.loading = false;
        self.loaded = true;
        self.stale = false;
        self.errors = None;
        self.pending = None;
    }

    /// A `created` notification. Server views cannot place the entity
    /// themselves and go stale.
    pub(crate) fn entity_created(&mut self) -> bool {
        if self.mode != ListMode::Server || self.stale {
            return false;
        }
        self.stale = true;
        true
    }

    /// An `updated` notification: move the key if its group changed.
    pub(crate) fn entity_updated(&mut self, entity: &Entity) -> bool {
        if self.mode != ListMode::Server {
            return false;
        }
        let Some(group_key) = self.query.group_key.as_deref() else {
            return false;
        };
        let key = entity.key();
        let Some(current) = self.groups.iter().position(|g| g.keys.contains(key)) else {
            return false;
        };

        let value = entity.get_path(group_key).cloned().unwrap_or(Value::Null);
        let name = group_name(Some(&value)).unwrap_or_else(|| UNKNOWN_GROUP.to_owned());
        if self
            .groups
            .get(current)
            .is_some_and(|g| g.name.as_deref() == Some(name.as_str()))
        {
            return false;
        }

        if let Some(group) = self.groups.get_mut(current) {
            group.keys.retain(|k| k != key);
            group.count = group.count.map(|c| c.saturating_sub(1));
        }

        if let Some(target) = self
            .groups
            .iter_mut()
            .find(|g| g.name.as_deref() == Some(name.as_str()))
        {
            if !target.collapsed {
                target.keys.push(key.clone());
            }
            target.count = target.count.map(|c| c + 1);
        } else {
            let collapsed = self.query.collapsed.contains(&name);
            self.groups.push(ListGroup {
                name: Some(name),
                value,
                count: None,
                collapsed,
                keys: if collapsed { Vec::new() } else { vec![key.clone()] },
            });
        }

        self.groups.retain(|g| !g.keys.is_empty() || g.collapsed);
        self.rebuild_result_keys();
        true
    }

    /// A removal from the cache (delete success or notification).
    pub(crate) fn entity_removed(&mut self, key: &PrimaryKey) -> bool {
        let before = self.unsubscribe_keys.len();
        self.unsubscribe_keys.retain(|k| k != key);
        let mut changed = before != self.unsubscribe_keys.len();

        if self.mode != ListMode::Server {
            return changed;
        }

        let mut found = false;
        for group in &mut self.groups {
            if let Some(pos) = group.keys.iter().position(|k| k == key) {
                group.keys.remove(pos);
                group.count = group.count.map(|c| c.saturating_sub(1));
                found = true;
            }
        }
        if found {
            self.groups.retain(|g| !g.keys.is_empty() || g.collapsed);
            self.count = self.count.saturating_sub(1);
            self.rebuild_result_keys();
            changed = true;
        }
        changed
    }

    fn rebuild_result_keys(&mut self) {
        self.result_keys = self
            .groups
            .iter()
            .flat_map(|g| g.keys.iter().cloned())
            .collect();
    }
}

// ── Local projection ─────────────────────────────────────────────────

struct Bucket<'a> {
    name: Option<String>,
    value: Value,
    members: Vec<&'a Entity>,
}

impl Bucket<'_> {
    /// Value used to order groups. Objects order by their name.
    fn order_value(&self) -> Option<Value> {
        match self.value {
            Value::Null => None,
            Value::Object(_) => self.name.clone().map(Value::String),
            ref other => Some(other.clone()),
        }
    }
}

enum Row {
    Header(usize),
    Member(usize, usize),
}

struct Projection {
    groups: Vec<ListGroup>,
    result_keys: Vec<PrimaryKey>,
    count: usize,
    num_pages: usize,
}

impl Projection {
    fn compute(
        items: &IndexMap<PrimaryKey, Entity>,
        schema: &ModelSchema,
        query: &ListQuery,
    ) -> Self {
        // 1. Filter
        let filter = FilterExpr::parse(&query.filter);
        let matched: Vec<&Entity> = items
            .values()
            .filter(|e| filter.matches(e, schema.search_fields()))
            .collect();
        let count = matched.len();

        // 2. Group
        let grouped = query.group_key.is_some();
        let mut buckets = match query.group_key {
            Some(ref group_key) => group_entities(matched, group_key),
            None => vec![Bucket {
                name: None,
                value: Value::Null,
                members: matched,
            }],
        };

        // 3. Sort (stable, so ties keep fetch order)
        if let Some(ref sort_key) = query.sort_key {
            for bucket in &mut buckets {
                bucket.members.sort_by(|a, b| {
                    compare_values(a.get_path(sort_key), b.get_path(sort_key), query.sort_direction)
                });
            }
        }

        // 4. Paginate over header + member rows
        let mut rows = Vec::new();
        for (bi, bucket) in buckets.iter().enumerate() {
            if grouped {
                rows.push(Row::Header(bi));
            }
            if !is_collapsed(query, bucket) {
                rows.extend((0..bucket.members.len()).map(|mi| Row::Member(bi, mi)));
            }
        }
        let size = query.page_size.max(1);
        let start = query.page_number.saturating_sub(1).saturating_mul(size);
        let end = start.saturating_add(size).min(rows.len());
        let page = rows.get(start..end).unwrap_or_default();

        let mut groups: Vec<ListGroup> = Vec::new();
        let mut result_keys = Vec::new();
        let mut last_bucket = None;
        for row in page {
            let (Row::Header(bi) | Row::Member(bi, _)) = *row;
            let Some(bucket) = buckets.get(bi) else {
                continue;
            };
            if last_bucket != Some(bi) {
                groups.push(ListGroup {
                    name: bucket.name.clone(),
                    value: bucket.value.clone(),
                    count: Some(bucket.members.len()),
                    collapsed: is_collapsed(query, bucket),
                    keys: Vec::new(),
                });
                last_bucket = Some(bi);
            }
            if let (Row::Member(_, mi), Some(group)) = (row, groups.last_mut()) {
                if let Some(entity) = bucket.members.get(*mi) {
                    group.keys.push(entity.key().clone());
                    result_keys.push(entity.key().clone());
                }
            }
        }
        if !grouped && groups.is_empty() {
            groups.push(ListGroup {
                name: None,
                value: Value::Null,
                count: Some(count),
                collapsed: false,
                keys: Vec::new(),
            });
        }

        Self {
            groups,
            result_keys,
            count,
            num_pages: rows.len().div_ceil(size),
        }
    }
}

fn is_collapsed(query: &ListQuery, bucket: &Bucket<'_>) -> bool {
    bucket
        .name
        .as_ref()
        .is_some_and(|name| query.group_key.is_some() && query.collapsed.contains(name))
}

fn group_entities<'a>(entities: Vec<&'a Entity>, group_key: &str) -> Vec<Bucket<'a>> {
    let mut by_name: IndexMap<Option<String>, Bucket<'a>> = IndexMap::new();
    for entity in entities {
        let value = entity.get_path(group_key);
        let name = group_name(value);
        by_name
            .entry(name.clone())
            .or_insert_with(|| Bucket {
                value: if name.is_some() {
                    value.cloned().unwrap_or(Value::Null)
                } else {
                    Value::Null
                },
                name: Some(name.unwrap_or_else(|| UNKNOWN_GROUP.to_owned())),
                members: Vec::new(),
            })
            .members
            .push(entity);
    }
    let mut buckets: Vec<Bucket<'a>> = by_name.into_values().collect();
    buckets.sort_by(|a, b| {
        compare_values(
            a.order_value().as_ref(),
            b.order_value().as_ref(),
            SortDirection::Ascending,
        )
    });
    buckets
}

// ── Server pages ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    cur_page: Option<usize>,
    #[serde(default)]
    num_pages: Option<usize>,
    #[serde(default)]
    groups: Vec<RawGroup>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    collapsed: bool,
    #[serde(default)]
    items: Vec<Value>,
}

/// A decoded server list response.
#[derive(Debug, Clone)]
pub(crate) struct ServerPage {
    pub(crate) entities: Vec<Entity>,
    pub(crate) groups: Vec<ListGroup>,
    pub(crate) count: usize,
    pub(crate) cur_page: usize,
    pub(crate) num_pages: usize,
}

impl ServerPage {
    /// Accepts the grouped page object or, from simpler services, a bare
    /// array of records.
    pub(crate) fn parse(
        value: Value,
        schema: &ModelSchema,
        query: &ListQuery,
    ) -> Result<Self, CoreError> {
        let raw = match value {
            Value::Array(items) => RawPage {
                count: Some(items.len()),
                cur_page: Some(query.page_number),
                num_pages: None,
                groups: vec![RawGroup {
                    name: None,
                    value: Value::Null,
                    count: Some(items.len()),
                    collapsed: false,
                    items,
                }],
            },
            other => serde_json::from_value(other)
                .map_err(|e| CoreError::Internal(format!("malformed list response: {e}")))?,
        };

        let mut entities = Vec::new();
        let mut groups = Vec::with_capacity(raw.groups.len());
        for group in raw.groups {
            let mut keys = Vec::with_capacity(group.items.len());
            for item in group.items {
                match schema.entity(item) {
                    Some(entity) => {
                        keys.push(entity.key().clone());
                        entities.push(entity);
                    }
                    None => tracing::warn!(model = schema.name(), "list item without a key"),
                }
            }
            groups.push(ListGroup {
                name: group.name,
                value: group.value,
                count: group.count,
                collapsed: group.collapsed,
                keys,
            });
        }

        let count = raw.count.unwrap_or(entities.len());
        let size = query.page_size.max(1);
        Ok(Self {
            entities,
            groups,
            count,
            cur_page: raw.cur_page.unwrap_or(query.page_number),
            num_pages: raw.num_pages.unwrap_or_else(|| count.div_ceil(size)),
        })
    }

    pub(crate) fn keys(&self) -> Vec<PrimaryKey> {
        self.entities.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn widgets(values: &[(&str, Value)]) -> IndexMap<PrimaryKey, Entity> {
        values
            .iter()
            .map(|(id, value)| {
                let e = Entity::from_value(json!({"id": id, "name": id, "value": value}), "id")
                    .unwrap();
                (e.key().clone(), e)
            })
            .collect()
    }

    fn schema() -> ModelSchema {
        ModelSchema::new("widget", "id").searchable(["name"])
    }

    fn keys(ids: &[&str]) -> Vec<PrimaryKey> {
        ids.iter().map(|id| PrimaryKey::from(*id)).collect()
    }

    fn local(query: ListQuery) -> ListView {
        ListView::new(ListId::new(), ListMode::Local, query)
    }

    #[test]
    fn groups_by_value_and_keeps_counts_when_collapsed() {
        let items = widgets(&[("a", json!(1)), ("b", json!(2)), ("c", json!(1))]);

        let mut view = local(ListQuery::new().group_by("value").page_size(10));
        view.project(&items, &schema(), false, true);
        let summary: Vec<_> = view
            .groups
            .iter()
            .map(|g| (g.name.clone().unwrap(), g.count, g.keys.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("1".to_owned(), Some(2), keys(&["a", "c"])),
                ("2".to_owned(), Some(1), keys(&["b"])),
            ]
        );

        let mut collapsed = local(ListQuery::new().group_by("value").collapse("1").page_size(10));
        collapsed.project(&items, &schema(), false, true);
        assert_eq!(collapsed.groups[0].name.as_deref(), Some("1"));
        assert!(collapsed.groups[0].keys.is_empty());
        assert_eq!(collapsed.groups[0].count, Some(2));
        assert!(collapsed.groups[0].collapsed);
        assert_eq!(collapsed.result_keys, keys(&["b"]));
    }

    #[test]
    fn missing_group_values_land_in_unknown_last() {
        let items = widgets(&[("a", json!(null)), ("b", json!("x"))]);
        let mut view = local(ListQuery::new().group_by("value").page_size(10));
        view.project(&items, &schema(), false, true);
        let names: Vec<_> = view.groups.iter().map(|g| g.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["x".to_owned(), UNKNOWN_GROUP.to_owned()]);
    }

    #[test]
    fn pagination_counts_headers_and_members() {
        let items = widgets(&[("a", json!(1)), ("b", json!(1)), ("c", json!(2))]);
        // rows: [h1, a, b, h2, c]
        let mut page2 = local(ListQuery::new().group_by("value").page(2).page_size(2));
        page2.project(&items, &schema(), false, true);
        assert_eq!(page2.num_pages, 3);
        assert_eq!(page2.result_keys, keys(&["b"]));
        let names: Vec<_> = page2.groups.iter().map(|g| g.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["1".to_owned(), "2".to_owned()]);
        assert!(page2.groups[1].keys.is_empty());
    }

    #[test]
    fn ungrouped_lists_paginate_members_only() {
        let items = widgets(&[("a", json!(3)), ("b", json!(1)), ("c", json!(2))]);
        let mut view = local(
            ListQuery::new()
                .sort_by("value", SortDirection::Descending)
                .page(1)
                .page_size(2),
        );
        view.project(&items, &schema(), false, true);
        assert_eq!(view.result_keys, keys(&["a", "c"]));
        assert_eq!(view.num_pages, 2);
        assert_eq!(view.count, 3);
        assert_eq!(view.groups.len(), 1);
        assert_eq!(view.groups[0].name, None);
    }

    #[test]
    fn filter_applies_before_grouping() {
        let items = widgets(&[("alpha", json!(1)), ("beta", json!(1))]);
        let mut view = local(ListQuery::new().filter("alp").group_by("value").page_size(10));
        view.project(&items, &schema(), false, true);
        assert_eq!(view.count, 1);
        assert_eq!(view.groups[0].count, Some(1));
    }

    #[test]
    fn projection_reports_no_change_when_stable() {
        let items = widgets(&[("a", json!(1))]);
        let mut view = local(ListQuery::new().page_size(10));
        assert!(view.project(&items, &schema(), false, true));
        assert!(!view.project(&items, &schema(), false, true));
    }

    fn server_view(schema: &ModelSchema) -> ListView {
        let query = ListQuery::new().group_by("status").page_size(10);
        let page = ServerPage::parse(
            json!({
                "count": 3, "cur_page": 1, "num_pages": 1,
                "groups": [
                    {"name": "Ready", "value": "Ready", "count": 2, "collapsed": false,
                     "items": [{"id": "a", "status": "Ready"}, {"id": "b", "status": "Ready"}]},
                    {"name": "New", "value": "New", "count": 1, "collapsed": false,
                     "items": [{"id": "c", "status": "New"}]}
                ]
            }),
            schema,
            &query,
        )
        .unwrap();
        let mut view = ListView::new(ListId::new(), ListMode::Server, query);
        view.apply_page(&page);
        view
    }

    #[test]
    fn server_update_moves_key_between_groups() {
        let schema = schema();
        let mut view = server_view(&schema);
        let moved = schema.entity(json!({"id": "c", "status": "Ready"})).unwrap();
        assert!(view.entity_updated(&moved));

        assert_eq!(view.groups.len(), 1, "emptied group is dropped");
        assert_eq!(view.groups[0].keys, keys(&["a", "b", "c"]));
        assert_eq!(view.groups[0].count, Some(3));

        let to_new_group = schema.entity(json!({"id": "a", "status": "Broken"})).unwrap();
        assert!(view.entity_updated(&to_new_group));
        let broken = view.groups.iter().find(|g| g.name.as_deref() == Some("Broken")).unwrap();
        assert_eq!(broken.count, None);
        assert_eq!(broken.keys, keys(&["a"]));
    }

    #[test]
    fn server_delete_decrements_counts() {
        let schema = schema();
        let mut view = server_view(&schema);
        assert!(view.entity_removed(&"c".into()));
        assert_eq!(view.count, 2);
        assert_eq!(view.result_keys, keys(&["a", "b"]));
        assert!(!view.contains(&"c".into()));
        assert!(!view.entity_removed(&"c".into()));
    }

    #[test]
    fn server_create_marks_stale() {
        let schema = schema();
        let mut view = server_view(&schema);
        assert!(view.entity_created());
        assert!(view.stale);
        assert!(!view.entity_created());
    }
}
