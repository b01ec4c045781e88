//! Field model: semantic types, upstream field hints, and resolved field
//! descriptors.
//!
//! A [`FieldHint`] is what the upstream sheet service says about a column
//! (possibly nothing beyond its key). A [`FieldDescriptor`] is the resolved,
//! authoritative description that drives typed extraction and display
//! formatting in [`crate::frame`].
//!
//! ## Responsibilities
//!
//! - Wire names for semantic types (`string`, `number`, `boolean`, `time`)
//! - Classification of upstream `type` / `format` strings into a [`ColumnKind`]
//! - Descriptor display configuration (`displayName`, `decimals`)

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::numeric::positive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SemanticType {
    #[default]
    String,
    Number,
    Boolean,
    Time,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::String => "string",
            SemanticType::Number => "number",
            SemanticType::Boolean => "boolean",
            SemanticType::Time => "time",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["string", "number", "boolean", "time"]
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SemanticType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(SemanticType::String),
            "number" => Ok(SemanticType::Number),
            "boolean" => Ok(SemanticType::Boolean),
            "time" => Ok(SemanticType::Time),
            _ => Err(anyhow!(
                "Unknown semantic type '{value}'. Supported types: {}",
                SemanticType::variants().join(", ")
            )),
        }
    }
}

impl Serialize for SemanticType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SemanticType {
    /// Unrecognized wire names fall back to `string`, the way a display
    /// layer treats a type it does not know.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        Ok(SemanticType::from_str(&token).unwrap_or_default())
    }
}

/// Kind of a column before geo columns are folded into strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    String,
    Number,
    Boolean,
    Time,
    Geo,
}

impl ColumnKind {
    pub fn semantic_type(self) -> SemanticType {
        match self {
            ColumnKind::Number => SemanticType::Number,
            ColumnKind::Boolean => SemanticType::Boolean,
            ColumnKind::Time => SemanticType::Time,
            ColumnKind::String | ColumnKind::Geo => SemanticType::String,
        }
    }

    /// Kinds that say little about the data and are worth refining by sampling.
    pub fn is_refinable(self) -> bool {
        matches!(self, ColumnKind::String | ColumnKind::Geo)
    }
}

impl From<SemanticType> for ColumnKind {
    fn from(value: SemanticType) -> Self {
        match value {
            SemanticType::String => ColumnKind::String,
            SemanticType::Number => ColumnKind::Number,
            SemanticType::Boolean => ColumnKind::Boolean,
            SemanticType::Time => ColumnKind::Time,
        }
    }
}

/// Maps the upstream sheet's own field `type`/`format` strings onto a kind.
pub fn classify_upstream(source_type: Option<&str>, format: Option<&str>) -> ColumnKind {
    let format = format.unwrap_or_default().trim().to_ascii_lowercase();
    let typ = source_type.unwrap_or_default().trim().to_ascii_lowercase();

    if format.contains("true/false") || typ == "boolean" {
        ColumnKind::Boolean
    } else if format.contains("number")
        || format.contains("formula")
        || matches!(typ.as_str(), "number" | "integer" | "float" | "double")
    {
        ColumnKind::Number
    } else if format.contains("gps")
        || format.contains("location")
        || matches!(typ.as_str(), "gps" | "location")
    {
        ColumnKind::Geo
    } else if format.contains("date")
        || format.contains("time")
        || matches!(typ.as_str(), "datetime" | "date")
    {
        ColumnKind::Time
    } else {
        ColumnKind::String
    }
}

/// Partial description of a column supplied by the upstream service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldHint {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(
        default,
        rename = "grafanaType",
        alias = "semanticType",
        skip_serializing_if = "Option::is_none"
    )]
    pub semantic_type: Option<SemanticType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_time: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

impl FieldHint {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn typed(key: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            semantic_type: Some(semantic_type),
            ..Self::new(key)
        }
    }

    /// Kind declared by the hint itself, if it declares one at all.
    pub fn declared_kind(&self) -> Option<ColumnKind> {
        if let Some(semantic_type) = self.semantic_type {
            return Some(semantic_type.into());
        }
        if self.source_type.is_none() && self.format.is_none() {
            return None;
        }
        Some(classify_upstream(
            self.source_type.as_deref(),
            self.format.as_deref(),
        ))
    }

    pub fn label_or_key(&self) -> &str {
        self.label
            .as_deref()
            .filter(|label| !label.is_empty())
            .unwrap_or(&self.key)
    }
}

/// One resolved output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub key: String,
    pub label: String,
    #[serde(rename = "grafanaType")]
    pub semantic_type: SemanticType,
    #[serde(rename = "isTime")]
    pub is_time_candidate: bool,
    #[serde(
        default,
        rename = "decimals",
        skip_serializing_if = "Option::is_none"
    )]
    pub decimal_precision: Option<u32>,
}

impl FieldDescriptor {
    pub fn new(key: impl Into<String>, semantic_type: SemanticType) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            semantic_type,
            is_time_candidate: semantic_type == SemanticType::Time,
            decimal_precision: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if !label.is_empty() {
            self.label = label;
        }
        self
    }

    /// Keeps `decimals` only when it can matter: numeric fields, positive precision.
    pub fn with_decimals(mut self, decimals: Option<u32>) -> Self {
        self.decimal_precision = if self.semantic_type == SemanticType::Number {
            positive(decimals)
        } else {
            None
        };
        self
    }

    pub fn display_name(&self) -> Option<&str> {
        (self.label != self.key).then_some(self.label.as_str())
    }
}
