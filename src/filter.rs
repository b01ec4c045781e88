//! Transport-side row selection: exact-match filters and time-range scoping.
//!
//! These run before shaping, the way the upstream sheet service narrows a
//! response. The shaping pipeline itself never calls them.

use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;
use log::debug;

use crate::{
    data::{Row, Value, parse_grouped_number, parse_time_string},
    query::{Filter, TimeRange},
};

/// Parses a `key=value` filter argument. Surrounding quotes on either side
/// are dropped.
pub fn parse_filter(expression: &str) -> Result<Filter> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Empty filter expression"));
    }
    let Some((key, value)) = trimmed.split_once('=') else {
        return Err(anyhow!(
            "Failed to parse filter expression '{trimmed}'; expected key=value"
        ));
    };
    let key = unquote(key.trim());
    if key.is_empty() {
        return Err(anyhow!("Filter expression '{trimmed}' has no key"));
    }
    Ok(Filter::new(key, unquote(value.trim())))
}

pub fn parse_filters(expressions: &[String]) -> Result<Vec<Filter>> {
    expressions.iter().map(|e| parse_filter(e)).collect()
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Looks `key` up exactly, then case-insensitively after dropping quotes.
fn lookup<'a>(row: &'a Row, key: &str) -> Option<&'a Value> {
    if let Some(value) = row.get(key) {
        return Some(value);
    }
    let wanted = unquote(key.trim());
    row.iter()
        .find(|(candidate, _)| unquote(candidate.trim()).eq_ignore_ascii_case(wanted))
        .map(|(_, value)| value)
}

fn parse_flag(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Compares a cell with the filter's textual operand according to the
/// cell's own kind. A `null` cell matches only an empty operand.
pub fn value_equals(value: &Value, expected: &str) -> bool {
    let expected = expected.trim();
    match value {
        Value::Null => expected.is_empty(),
        Value::Text(text) => text.trim().eq_ignore_ascii_case(expected),
        Value::Bool(b) => parse_flag(expected) == Some(*b),
        Value::Number(n) => parse_grouped_number(expected).is_some_and(|e| e == *n),
        Value::Time(dt) => parse_time_string(expected).is_ok_and(|e| e == *dt),
    }
}

pub fn row_matches(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        lookup(row, &filter.key).is_some_and(|value| value_equals(value, &filter.value))
    })
}

fn time_of(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Time(dt) => Some(*dt),
        Value::Text(text) => parse_time_string(text).ok(),
        _ => None,
    }
}

/// Bounds that parse; an unparseable bound does not constrain.
fn bounds(range: &TimeRange) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
    let parse = |bound: Option<&str>| bound.and_then(|b| parse_time_string(b).ok());
    (parse(range.from.as_deref()), parse(range.to.as_deref()))
}

/// Rows whose time value parses and falls outside the window are dropped;
/// rows without a readable time value are kept.
pub fn within_range(
    row: &Row,
    time_key: &str,
    from: Option<NaiveDateTime>,
    to: Option<NaiveDateTime>,
) -> bool {
    let Some(instant) = lookup(row, time_key).and_then(time_of) else {
        return true;
    };
    from.is_none_or(|from| instant >= from) && to.is_none_or(|to| instant <= to)
}

/// Narrows `rows` by `filters`, then by `range` on `time_key` when both are set.
pub fn apply(
    rows: Vec<Row>,
    filters: &[Filter],
    range: Option<&TimeRange>,
    time_key: Option<&str>,
) -> Vec<Row> {
    let before = rows.len();
    let (from, to) = range.map(bounds).unwrap_or_default();
    let scoped_key = time_key.filter(|_| from.is_some() || to.is_some());
    let kept = rows
        .into_iter()
        .filter(|row| row_matches(row, filters))
        .filter(|row| scoped_key.is_none_or(|key| within_range(row, key, from, to)))
        .collect::<Vec<_>>();
    debug!("Filters kept {} of {} row(s)", kept.len(), before);
    kept
}
