//! Row helpers shared by the join engine and in-memory services.

use serde_json::{Map, Value};

use crate::contracts::ListRequest;

/// Stable string key of a scalar value, used to match keys across services.
pub fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Array(_) | Value::Object(_) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Keys held by `value`: one for a scalar, one per element for an array.
pub fn keys_of(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(key_of).collect(),
        other => key_of(other).into_iter().collect(),
    }
}

fn value_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None | Some(Value::Null), Value::Null) => true,
        (None, _) => false,
        // "one of"
        (Some(actual), Value::Array(options)) => {
            let wanted: Vec<String> = options.iter().filter_map(key_of).collect();
            keys_of(actual).iter().any(|k| wanted.contains(k))
        }
        // array column contains the scalar
        (Some(Value::Array(items)), scalar) => items.contains(scalar),
        (Some(actual), expected) => actual == expected,
    }
}

/// True when every filter matches `row`. An array filter value means "one of".
pub fn matches_filters(row: &Value, filters: &Map<String, Value>) -> bool {
    filters
        .iter()
        .all(|(key, expected)| value_matches(row.get(key), expected))
}

/// Keep only `fields` of an object row; an empty list keeps everything.
pub fn project(row: &Value, fields: &[String]) -> Value {
    match row {
        Value::Object(map) if !fields.is_empty() => Value::Object(
            fields
                .iter()
                .filter_map(|f| map.get(f).map(|v| (f.clone(), v.clone())))
                .collect(),
        ),
        other => other.clone(),
    }
}

pub fn paginate<T>(items: Vec<T>, skip: Option<usize>, take: Option<usize>) -> Vec<T> {
    let iter = items.into_iter().skip(skip.unwrap_or(0));
    match take {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    }
}

/// Filter, paginate and project `rows` the way `request` asks. Relations
/// count as requested fields.
pub fn apply<I>(rows: I, request: &ListRequest) -> Vec<Value>
where
    I: IntoIterator<Item = Value>,
{
    let matching: Vec<Value> = rows
        .into_iter()
        .filter(|r| matches_filters(r, &request.filters))
        .collect();
    let page = paginate(matching, request.skip, request.take);
    if request.fields.is_empty() {
        return page;
    }
    let mut wanted = request.fields.clone();
    wanted.extend(request.relations.iter().cloned());
    page.iter().map(|r| project(r, &wanted)).collect()
}
