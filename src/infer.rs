//! Sampling-based type and precision inference for schema-less rows.
//!
//! Every column is tested against four hypotheses (numeric, boolean,
//! time-like, geo-like). The first three are falsified by the first sampled
//! value that fails them; the primary type is the first survivor in the
//! order numeric, boolean, time. Geo evidence is counted instead of
//! falsified and decides virtual column synthesis on its own, independently
//! of the primary type.
//!
//! Decimal precision is tracked over every row, not just the sample, and is
//! read from literal text (see [`crate::numeric`]).

use std::collections::HashMap;

use log::debug;

use crate::{
    data::{Row, Value, parse_grouped_number, parse_time_string},
    geo::{GeoInfo, parse_geo},
    numeric::decimals_from_value,
    schema::SemanticType,
};

pub const DEFAULT_SAMPLE_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceOptions {
    /// Non-blank values inspected per column before the decision is taken.
    pub sample_limit: usize,
    /// Rounding for derived coordinates whose token has no fraction digits.
    pub default_geo_precision: u32,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            default_geo_precision: crate::geo::DEFAULT_GEO_PRECISION,
        }
    }
}

/// Outcome of sampling one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnProfile {
    pub semantic_type: SemanticType,
    pub evaluated: usize,
    pub geo_like: bool,
}

#[derive(Debug, Clone)]
struct Hypotheses {
    evaluated: usize,
    numeric: bool,
    boolean: bool,
    time_like: bool,
    geo_matches: usize,
}

impl Hypotheses {
    fn new() -> Self {
        Self {
            evaluated: 0,
            numeric: true,
            boolean: true,
            time_like: true,
            geo_matches: 0,
        }
    }

    fn update(&mut self, value: &Value) {
        self.evaluated += 1;
        if self.numeric && !looks_numeric(value) {
            self.numeric = false;
        }
        if self.boolean && !looks_boolean(value) {
            self.boolean = false;
        }
        if self.time_like && !looks_time(value) {
            self.time_like = false;
        }
        if looks_geo(value) {
            self.geo_matches += 1;
        }
    }

    /// Nothing left to learn: every primary hypothesis is gone and a geo
    /// majority can no longer be reached within `limit` samples.
    fn exhausted(&self, limit: usize) -> bool {
        !self.numeric && !self.boolean && !self.time_like && !self.geo_reachable(limit)
    }

    /// Whether enough samples remain for coordinate pairs to outnumber
    /// everything else, assuming every remaining sample is one.
    fn geo_reachable(&self, limit: usize) -> bool {
        let non_geo = self.evaluated - self.geo_matches;
        let remaining = limit.saturating_sub(self.evaluated);
        self.geo_matches + remaining > non_geo
    }

    fn geo_like(&self) -> bool {
        self.geo_matches > 0 && self.geo_matches * 2 > self.evaluated
    }

    fn decide(&self) -> SemanticType {
        if self.evaluated == 0 {
            SemanticType::String
        } else if self.numeric {
            SemanticType::Number
        } else if self.boolean {
            SemanticType::Boolean
        } else if self.time_like {
            SemanticType::Time
        } else {
            SemanticType::String
        }
    }

    fn profile(&self) -> ColumnProfile {
        ColumnProfile {
            semantic_type: self.decide(),
            evaluated: self.evaluated,
            geo_like: self.geo_like(),
        }
    }
}

pub fn looks_numeric(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_finite(),
        Value::Text(text) => parse_grouped_number(text).is_some(),
        _ => false,
    }
}

pub fn looks_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Text(text) => matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "true" | "false" | "yes" | "no" | "1" | "0"
        ),
        Value::Number(n) => *n == 0.0 || *n == 1.0,
        _ => false,
    }
}

pub fn looks_time(value: &Value) -> bool {
    match value {
        Value::Time(_) => true,
        Value::Text(text) => {
            let trimmed = text.trim();
            !trimmed.is_empty()
                && trimmed.contains(|c: char| matches!(c, '-' | '/' | ':' | 'T') || c.is_whitespace())
                && parse_time_string(trimmed).is_ok()
        }
        _ => false,
    }
}

pub fn looks_geo(value: &Value) -> bool {
    parse_geo(value).is_some()
}

/// Samples up to `options.sample_limit` non-blank values of `key` in row
/// order. Rows lacking the key, `null` cells and empty strings are skipped
/// and do not count toward the limit.
pub fn profile(rows: &[Row], key: &str, options: &InferenceOptions) -> ColumnProfile {
    let mut hypotheses = Hypotheses::new();
    for value in rows.iter().filter_map(|row| row.get(key)) {
        if hypotheses.evaluated >= options.sample_limit {
            break;
        }
        if value.is_blank() {
            continue;
        }
        hypotheses.update(value);
        if hypotheses.exhausted(options.sample_limit) {
            break;
        }
    }
    let profile = hypotheses.profile();
    debug!(
        "Column '{}' sampled {} value(s): {} (geo-like: {})",
        key, profile.evaluated, profile.semantic_type, profile.geo_like
    );
    profile
}

pub fn classify(rows: &[Row], key: &str, options: &InferenceOptions) -> SemanticType {
    profile(rows, key, options).semantic_type
}

/// Maximum literal precision of `key` across all rows, or `None` when no
/// row holds a numeric literal for it.
pub fn decimals_of(rows: &[Row], key: &str) -> Option<u32> {
    rows.iter()
        .filter_map(|row| row.get(key))
        .filter_map(decimals_from_value)
        .max()
}

/// [`decimals_of`] for every key at once, in a single pass.
pub fn decimal_map(rows: &[Row]) -> HashMap<String, u32> {
    let mut result: HashMap<String, u32> = HashMap::new();
    for row in rows {
        for (key, value) in row {
            let Some(decimals) = decimals_from_value(value) else {
                continue;
            };
            result
                .entry(key.clone())
                .and_modify(|current| *current = (*current).max(decimals))
                .or_insert(decimals);
        }
    }
    result
}

/// Per-half precision over every cell of `key` that parses as a coordinate
/// pair; `None` when none does.
pub fn geo_info_of(rows: &[Row], key: &str) -> Option<GeoInfo> {
    rows.iter()
        .filter_map(|row| row.get(key))
        .filter_map(parse_geo)
        .fold(None, |acc: Option<GeoInfo>, point| {
            let mut info = acc.unwrap_or_default();
            info.observe(&point);
            Some(info)
        })
}

/// [`geo_info_of`] for every key at once, in a single pass.
pub fn geo_info_map(rows: &[Row]) -> HashMap<String, GeoInfo> {
    let mut result: HashMap<String, GeoInfo> = HashMap::new();
    for row in rows {
        for (key, value) in row {
            if let Some(point) = parse_geo(value) {
                result.entry(key.clone()).or_default().observe(&point);
            }
        }
    }
    result
}
