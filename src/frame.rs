//! Frame assembly: one pass over the rows that extracts, derives and
//! normalizes every resolved field into typed, row-aligned columns.

use chrono::NaiveDateTime;
use log::debug;
use serde::{Serialize, Serializer};

use crate::{
    data::{
        Row, Value, epoch_millis, parse_grouped_number, parse_time_string, time_from_epoch_millis,
    },
    geo::{derive_coordinate, split_virtual_key},
    infer::InferenceOptions,
    query::Query,
    schema::{FieldDescriptor, SemanticType},
};

const TIME_TABLE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visualisation {
    Graph,
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameMeta {
    pub preferred_visualisation_type: Visualisation,
}

/// Display configuration attached to a frame field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

impl FieldConfig {
    pub fn for_descriptor(descriptor: &FieldDescriptor) -> Self {
        Self {
            display_name: descriptor.display_name().map(str::to_string),
            decimals: descriptor
                .decimal_precision
                .filter(|_| descriptor.semantic_type == SemanticType::Number),
        }
    }
}

/// Normalized values of one field, aligned by row index.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValues {
    /// String fields pass values through untouched, whatever their kind.
    String(Vec<Value>),
    Number(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Time(Vec<Option<NaiveDateTime>>),
}

impl FieldValues {
    pub fn with_capacity(semantic_type: SemanticType, capacity: usize) -> Self {
        match semantic_type {
            SemanticType::String => FieldValues::String(Vec::with_capacity(capacity)),
            SemanticType::Number => FieldValues::Number(Vec::with_capacity(capacity)),
            SemanticType::Boolean => FieldValues::Boolean(Vec::with_capacity(capacity)),
            SemanticType::Time => FieldValues::Time(Vec::with_capacity(capacity)),
        }
    }

    /// Appends `raw` normalized to this column's type; a missing value is `null`.
    pub fn push(&mut self, raw: Option<&Value>) {
        match self {
            FieldValues::String(values) => values.push(raw.cloned().unwrap_or_default()),
            FieldValues::Number(values) => values.push(raw.and_then(normalize_number)),
            FieldValues::Boolean(values) => values.push(raw.and_then(normalize_boolean)),
            FieldValues::Time(values) => values.push(raw.and_then(normalize_time)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FieldValues::String(values) => values.len(),
            FieldValues::Number(values) => values.len(),
            FieldValues::Boolean(values) => values.len(),
            FieldValues::Time(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self, index: usize) -> bool {
        match self {
            FieldValues::String(values) => values.get(index).is_none_or(|v| *v == Value::Null),
            FieldValues::Number(values) => values.get(index).is_none_or(Option::is_none),
            FieldValues::Boolean(values) => values.get(index).is_none_or(Option::is_none),
            FieldValues::Time(values) => values.get(index).is_none_or(Option::is_none),
        }
    }

    /// Text for row `index`, honouring a display precision for numbers.
    /// Nulls render empty.
    pub fn display(&self, index: usize, decimals: Option<u32>) -> String {
        match self {
            FieldValues::String(values) => values
                .get(index)
                .map(Value::as_display)
                .unwrap_or_default(),
            FieldValues::Number(values) => match (values.get(index).copied().flatten(), decimals) {
                (Some(n), Some(prec)) => format!("{n:.prec$}", prec = prec as usize),
                (Some(n), None) => n.to_string(),
                (None, _) => String::new(),
            },
            FieldValues::Boolean(values) => values
                .get(index)
                .copied()
                .flatten()
                .map(|b| b.to_string())
                .unwrap_or_default(),
            FieldValues::Time(values) => values
                .get(index)
                .copied()
                .flatten()
                .map(|dt| dt.format(TIME_TABLE_FORMAT).to_string())
                .unwrap_or_default(),
        }
    }
}

impl Serialize for FieldValues {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FieldValues::String(values) => values.serialize(serializer),
            FieldValues::Number(values) => values.serialize(serializer),
            FieldValues::Boolean(values) => values.serialize(serializer),
            // Time axes travel as epoch milliseconds.
            FieldValues::Time(values) => {
                serializer.collect_seq(values.iter().map(|v| v.as_ref().map(epoch_millis)))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameField {
    pub name: String,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
    pub config: FieldConfig,
    pub values: FieldValues,
}

/// Column-oriented result of one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnarFrame {
    pub ref_id: String,
    pub name: String,
    pub meta: FrameMeta,
    pub fields: Vec<FrameField>,
    pub length: usize,
}

impl ColumnarFrame {
    pub fn field(&self, name: &str) -> Option<&FrameField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn visualisation(&self) -> Visualisation {
        self.meta.preferred_visualisation_type
    }

    /// Column headers for tabular output: display names where configured.
    pub fn headers(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|field| {
                field
                    .config
                    .display_name
                    .clone()
                    .unwrap_or_else(|| field.name.clone())
            })
            .collect()
    }

    /// Row-major text rendering of every cell.
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        (0..self.length)
            .map(|idx| {
                self.fields
                    .iter()
                    .map(|field| field.values.display(idx, field.config.decimals))
                    .collect()
            })
            .collect()
    }
}

pub fn normalize_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.is_finite().then_some(*n),
        Value::Text(text) => parse_grouped_number(text),
        _ => None,
    }
}

/// Booleans pass through; text must use the `true/false`, `1/0`, `yes/no`
/// vocabulary (any case); anything else is judged by truthiness.
pub fn normalize_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(*b),
        Value::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        Value::Number(n) => Some(*n != 0.0 && !n.is_nan()),
        Value::Time(_) => Some(true),
    }
}

/// Numbers are read as epoch milliseconds.
pub fn normalize_time(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Time(dt) => Some(*dt),
        Value::Text(text) => parse_time_string(text).ok(),
        Value::Number(n) => time_from_epoch_millis(*n),
        _ => None,
    }
}

/// Value of a virtual `<base>_lat|_lon` field for a row lacking that key.
fn derive_virtual(row: &Row, field: &FieldDescriptor, options: &InferenceOptions) -> Option<f64> {
    if field.semantic_type != SemanticType::Number {
        return None;
    }
    let (base, axis) = split_virtual_key(&field.key)?;
    let base_value = row.get(base)?;
    derive_coordinate(base_value, axis, options.default_geo_precision)
}

pub fn assemble(
    query: &Query,
    rows: &[Row],
    fields: &[FieldDescriptor],
    options: &InferenceOptions,
) -> ColumnarFrame {
    let mut columns: Vec<FieldValues> = fields
        .iter()
        .map(|field| FieldValues::with_capacity(field.semantic_type, rows.len()))
        .collect();

    for row in rows {
        for (column, field) in columns.iter_mut().zip(fields) {
            match row.get(&field.key) {
                Some(value) => column.push(Some(value)),
                None => {
                    let derived = derive_virtual(row, field, options).map(Value::Number);
                    column.push(derived.as_ref());
                }
            }
        }
    }

    let has_time_field = fields.iter().any(|field| field.is_time_candidate);
    let visualisation = if has_time_field && !rows.is_empty() {
        Visualisation::Graph
    } else {
        Visualisation::Table
    };

    let frame_fields = fields
        .iter()
        .zip(columns)
        .map(|(field, values)| FrameField {
            name: field.key.clone(),
            semantic_type: field.semantic_type,
            config: FieldConfig::for_descriptor(field),
            values,
        })
        .collect::<Vec<_>>();

    debug!(
        "Assembled frame '{}' with {} field(s) x {} row(s), preferring {:?}",
        query.ref_id,
        frame_fields.len(),
        rows.len(),
        visualisation
    );

    ColumnarFrame {
        ref_id: query.ref_id.clone(),
        name: query.frame_name().to_string(),
        meta: FrameMeta {
            preferred_visualisation_type: visualisation,
        },
        fields: frame_fields,
        length: rows.len(),
    }
}
