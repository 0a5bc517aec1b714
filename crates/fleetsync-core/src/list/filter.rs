// ── Filter text ──
//
// Filter text is a whitespace-separated list of tokens, all of which
// must match:
//
//   node-1                 free term, any searchable field
//   status:ready,new       one field, any of the values
//   status:(ready, new)    same, parenthesised
//   !owner:admin           negated (also `owner:!admin`)
//   hostname:=node-1       exact instead of substring
//   "two words"            quoted term
//
// Matching is case-insensitive.

use serde_json::{Map, Value};

use crate::model::Entity;

/// Key under which free terms are sent to the service.
const FREE_TEXT_KEY: &str = "q";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTerm {
    /// `None` for free terms.
    pub field: Option<String>,
    pub values: Vec<String>,
    pub negated: bool,
}

/// Parsed filter text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterExpr {
    terms: Vec<FilterTerm>,
}

impl FilterExpr {
    pub fn parse(text: &str) -> Self {
        Self {
            terms: tokenize(text).iter().filter_map(|t| parse_term(t)).collect(),
        }
    }

    pub fn terms(&self) -> &[FilterTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Does `entity` satisfy every term?
    pub fn matches(&self, entity: &Entity, search_fields: &[String]) -> bool {
        self.terms.iter().all(|term| {
            let hit = match term.field {
                Some(ref field) => term
                    .values
                    .iter()
                    .any(|needle| entity.get_path(field).is_some_and(|v| value_matches(v, needle))),
                None => term.values.iter().any(|needle| {
                    search_fields
                        .iter()
                        .filter_map(|f| entity.get_path(f))
                        .any(|v| value_matches(v, needle))
                }),
            };
            hit != term.negated
        })
    }

    /// Server-side filter object: `{ field: [values], "q": [terms] }`.
    /// Negated values carry a leading `!`.
    pub fn to_wire(&self) -> Value {
        let mut out = Map::new();
        for term in &self.terms {
            let key = term.field.as_deref().unwrap_or(FREE_TEXT_KEY);
            let entry = out
                .entry(key.to_owned())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(values) = entry {
                for v in &term.values {
                    let v = if term.negated {
                        format!("!{v}")
                    } else {
                        v.clone()
                    };
                    values.push(Value::String(v));
                }
            }
        }
        Value::Object(out)
    }
}

/// Split on whitespace outside parentheses and quotes.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quoted = false;

    for ch in text.chars() {
        match ch {
            '"' => quoted = !quoted,
            '(' if !quoted => {
                depth += 1;
                current.push(ch);
            }
            ')' if !quoted => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if c.is_whitespace() && depth == 0 && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_term(token: &str) -> Option<FilterTerm> {
    let (mut negated, token) = match token.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    match token.split_once(':') {
        Some((field, rest)) if !field.is_empty() => {
            let rest = match rest.strip_prefix('!') {
                Some(r) => {
                    negated = true;
                    r
                }
                None => rest,
            };
            let rest = rest.trim_start_matches('(').trim_end_matches(')');
            let values: Vec<String> = rest
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
                .collect();
            // A bare `field:` is still being typed and filters nothing.
            (!values.is_empty()).then(|| FilterTerm {
                field: Some(field.to_owned()),
                values,
                negated,
            })
        }
        _ => (!token.is_empty()).then(|| FilterTerm {
            field: None,
            values: vec![token.to_owned()],
            negated,
        }),
    }
}

fn value_matches(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => text_matches(s, needle),
        Value::Number(n) => text_matches(&n.to_string(), needle),
        Value::Bool(b) => text_matches(if *b { "true" } else { "false" }, needle),
        Value::Array(items) => items.iter().any(|item| value_matches(item, needle)),
        Value::Object(fields) => fields
            .get("name")
            .is_some_and(|name| value_matches(name, needle)),
        Value::Null => false,
    }
}

fn text_matches(haystack: &str, needle: &str) -> bool {
    let haystack = haystack.to_lowercase();
    match needle.strip_prefix('=') {
        Some(exact) => haystack == exact.to_lowercase(),
        None => haystack.contains(&needle.to_lowercase()),
    }
}
