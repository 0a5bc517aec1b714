// ── Value ordering ──
//
// Total order over JSON values for sorting and group ordering:
// bool < number < string. Missing values, nulls, arrays and objects are
// not comparable; they form one bucket placed after every comparable
// value in ascending order (and therefore before them descending).

use std::cmp::Ordering;

use serde_json::Value;

use super::query::SortDirection;

#[derive(Debug)]
enum Rank {
    Bool(bool),
    Number(f64),
    Text(String),
}

fn rank(value: Option<&Value>) -> Option<Rank> {
    match value? {
        Value::Bool(b) => Some(Rank::Bool(*b)),
        Value::Number(n) => n.as_f64().map(Rank::Number),
        Value::String(s) => Some(Rank::Text(s.to_lowercase())),
        _ => None,
    }
}

fn compare_ranks(a: &Rank, b: &Rank) -> Ordering {
    match (a, b) {
        (Rank::Bool(x), Rank::Bool(y)) => x.cmp(y),
        (Rank::Number(x), Rank::Number(y)) => x.total_cmp(y),
        (Rank::Text(x), Rank::Text(y)) => x.cmp(y),
        (Rank::Bool(_), _) | (Rank::Number(_), Rank::Text(_)) => Ordering::Less,
        _ => Ordering::Greater,
    }
}

/// Compare two optional values in `direction`.
pub(crate) fn compare_values(
    a: Option<&Value>,
    b: Option<&Value>,
    direction: SortDirection,
) -> Ordering {
    let ascending = match (rank(a), rank(b)) {
        (Some(x), Some(y)) => compare_ranks(&x, &y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    match direction {
        SortDirection::Ascending => ascending,
        SortDirection::Descending => ascending.reverse(),
    }
}

/// Display name of a group value. `None` means the unknown bucket.
pub(crate) fn group_name(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(fields) => fields.get("name").and_then(|n| group_name(Some(n))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sorted(values: &[Option<Value>], direction: SortDirection) -> Vec<Option<Value>> {
        let mut v = values.to_vec();
        v.sort_by(|a, b| compare_values(a.as_ref(), b.as_ref(), direction));
        v
    }

    #[test]
    fn mixed_types_follow_type_rank() {
        let input = [Some(json!("b")), Some(json!(2)), Some(json!(true)), Some(json!(1))];
        assert_eq!(
            sorted(&input, SortDirection::Ascending),
            vec![Some(json!(true)), Some(json!(1)), Some(json!(2)), Some(json!("b"))]
        );
    }

    #[test]
    fn incomparable_values_sort_last_ascending_first_descending() {
        let input = [None, Some(json!(3)), Some(json!([1])), Some(json!(1))];
        assert_eq!(
            sorted(&input, SortDirection::Ascending),
            vec![Some(json!(1)), Some(json!(3)), None, Some(json!([1]))]
        );
        assert_eq!(
            sorted(&input, SortDirection::Descending),
            vec![None, Some(json!([1])), Some(json!(3)), Some(json!(1))]
        );
    }

    #[test]
    fn group_names_use_display_form() {
        assert_eq!(group_name(Some(&json!(1))), Some("1".into()));
        assert_eq!(group_name(Some(&json!({"id": 2, "name": "gpu"}))), Some("gpu".into()));
        assert_eq!(group_name(Some(&json!(null))), None);
        assert_eq!(group_name(None), None);
    }
}
