//! Query descriptor and the upstream response envelope it is answered with.

use serde::{Deserialize, Serialize};

use crate::{data::Row, schema::FieldHint};

/// Largest page the upstream transport will serve in one response.
pub const MAX_PAGE_SIZE: usize = 5000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Query {
    pub ref_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<String>,
    pub limit: i64,
    pub skip: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_field: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<TimeRange>,
}

/// Exact-match filter on one row key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filter {
    pub key: String,
    pub value: String,
}

impl Filter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Inclusive time window; either bound may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl TimeRange {
    pub fn is_unbounded(&self) -> bool {
        non_blank(self.from.as_deref()).is_none() && non_blank(self.to.as_deref()).is_none()
    }
}

impl Query {
    pub fn new(ref_id: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            ..Self::default()
        }
    }

    /// Frame name: the sheet id, or the ref id when no sheet is named.
    pub fn frame_name(&self) -> &str {
        non_blank(self.sheet_id.as_deref()).unwrap_or(&self.ref_id)
    }

    pub fn effective_limit(&self) -> usize {
        if self.limit <= 0 {
            return MAX_PAGE_SIZE;
        }
        usize::try_from(self.limit)
            .map(|limit| limit.min(MAX_PAGE_SIZE))
            .unwrap_or(MAX_PAGE_SIZE)
    }

    pub fn effective_skip(&self) -> usize {
        usize::try_from(self.skip).unwrap_or(0)
    }

    pub fn time_field(&self) -> Option<&str> {
        non_blank(self.time_field.as_deref())
    }

    /// Skips then truncates `rows` to the sanitized page.
    pub fn page(&self, rows: Vec<Row>) -> Vec<Row> {
        rows.into_iter()
            .skip(self.effective_skip())
            .take(self.effective_limit())
            .collect()
    }
}

/// What the upstream sheet service answers a query with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryResponse {
    pub rows: Vec<Row>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldHint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_field: Option<String>,
}

impl QueryResponse {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Time key designated for this response: the response's own, then the query's.
    pub fn designated_time_key<'a>(&'a self, query: &'a Query) -> Option<&'a str> {
        non_blank(self.time_field.as_deref()).or_else(|| query.time_field())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
