//! Field resolution: turns rows plus optional upstream hints into the ordered
//! list of [`FieldDescriptor`]s a frame is assembled from.
//!
//! With hints, their order and declared types are authoritative and sampling
//! only fills gaps. Without hints, keys are taken in first-appearance order
//! across all rows and every type comes from [`crate::infer`]. Either way
//! geo-like columns are followed by their virtual `_lat` / `_lon` columns,
//! and a designated time field is moved to the front as a final step.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use log::{debug, warn};

use crate::{
    data::Row,
    geo::{GeoAxis, GeoInfo, split_virtual_key, virtual_key},
    infer::{self, InferenceOptions},
    schema::{ColumnKind, FieldDescriptor, FieldHint, SemanticType},
};

pub fn resolve(
    rows: &[Row],
    hints: &[FieldHint],
    designated_time_key: Option<&str>,
    options: &InferenceOptions,
) -> Vec<FieldDescriptor> {
    let mut fields = if hints.is_empty() {
        synthesize(rows, options)
    } else {
        from_hints(rows, hints, options)
    };

    if let Some(requested) = designated_time_key.map(str::trim).filter(|k| !k.is_empty()) {
        match resolve_time_key(requested, &fields) {
            Some(key) => {
                if let Some(field) = fields.iter_mut().find(|f| f.key == key) {
                    field.is_time_candidate = true;
                }
                promote_to_front(&mut fields, &key);
            }
            None => warn!("Requested time field '{requested}' not found among resolved fields"),
        }
    }

    debug!(
        "Resolved {} field(s) from {} row(s) and {} hint(s)",
        fields.len(),
        rows.len(),
        hints.len()
    );
    fields
}

/// Descriptors for schema-less rows, in first-appearance key order.
fn synthesize(rows: &[Row], options: &InferenceOptions) -> Vec<FieldDescriptor> {
    let decimals = infer::decimal_map(rows);
    let geo = infer::geo_info_map(rows);
    let mut builder = FieldListBuilder::default();

    for key in rows.iter().flat_map(|row| row.keys()).unique() {
        let profile = infer::profile(rows, key, options);
        let descriptor = FieldDescriptor::new(key.as_str(), profile.semantic_type)
            .with_decimals(decimals.get(key).copied());
        let spawn_geo = profile.geo_like && profile.semantic_type != SemanticType::Number;
        builder.push(descriptor);
        if spawn_geo {
            builder.push_geo_pair(key, key, geo.get(key));
        }
    }

    builder.finish()
}

/// Descriptors for rows that came with upstream hints.
fn from_hints(rows: &[Row], hints: &[FieldHint], options: &InferenceOptions) -> Vec<FieldDescriptor> {
    let decimals = infer::decimal_map(rows);
    let geo = infer::geo_info_map(rows);
    let mut builder = FieldListBuilder::reserving(hints.iter().map(|hint| hint.key.clone()));

    for hint in hints.iter().unique_by(|hint| hint.key.clone()) {
        let declared = hint.declared_kind();
        let mut sampled = None;
        let mut sample = || *sampled.get_or_insert_with(|| infer::profile(rows, &hint.key, options));

        let semantic_type = match (hint.semantic_type, declared) {
            (Some(explicit), _) => explicit,
            (None, Some(kind)) if !kind.is_refinable() => kind.semantic_type(),
            (None, _) => {
                let profile = sample();
                if profile.evaluated > 0 {
                    profile.semantic_type
                } else {
                    SemanticType::String
                }
            }
        };

        let spawn_geo = semantic_type == SemanticType::String
            && (declared == Some(ColumnKind::Geo) || sample().geo_like);

        let tracked = hint
            .decimals
            .or_else(|| decimals.get(&hint.key).copied())
            .or_else(|| virtual_decimals(&hint.key, &geo));

        let mut descriptor = FieldDescriptor::new(hint.key.as_str(), semantic_type)
            .with_label(hint.label_or_key())
            .with_decimals(tracked);
        descriptor.is_time_candidate |= hint.is_time.unwrap_or(false);
        builder.push(descriptor);

        if spawn_geo {
            builder.push_geo_pair(&hint.key, hint.label_or_key(), geo.get(&hint.key));
        }
    }

    builder.finish()
}

/// Precision of a `<base>_lat|_lon` key taken from its base column's geo info.
fn virtual_decimals(key: &str, geo: &HashMap<String, GeoInfo>) -> Option<u32> {
    let (base, axis) = split_virtual_key(key)?;
    geo.get(base).map(|info| info.decimals(axis))
}

/// Accumulates descriptors while keeping keys unique; the first descriptor
/// claiming a key wins. Reserved keys are never claimed by synthesized
/// geo pairs, so an explicit hint for `<base>_lat` keeps its own settings.
#[derive(Default)]
struct FieldListBuilder {
    fields: Vec<FieldDescriptor>,
    claimed: HashSet<String>,
    reserved: HashSet<String>,
}

impl FieldListBuilder {
    fn reserving(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            reserved: keys.into_iter().collect(),
            ..Self::default()
        }
    }

    fn push(&mut self, descriptor: FieldDescriptor) {
        if self.claimed.insert(descriptor.key.clone()) {
            self.fields.push(descriptor);
        }
    }

    fn push_geo_pair(&mut self, base_key: &str, base_label: &str, info: Option<&GeoInfo>) {
        let info = info.copied().unwrap_or_default();
        for axis in [GeoAxis::Lat, GeoAxis::Lon] {
            let key = virtual_key(base_key, axis);
            if self.reserved.contains(&key) {
                continue;
            }
            let descriptor = FieldDescriptor::new(key, SemanticType::Number)
                .with_label(format!("{base_label} {}", axis.label_suffix()))
                .with_decimals(Some(info.decimals(axis)));
            self.push(descriptor);
        }
        debug!("Synthesized latitude/longitude fields for geo column '{base_key}'");
    }

    fn finish(self) -> Vec<FieldDescriptor> {
        self.fields
    }
}

/// Finds the canonical key for a requested time field: exact key first, then
/// a case-insensitive match on keys, then on labels.
pub fn resolve_time_key(requested: &str, fields: &[FieldDescriptor]) -> Option<String> {
    let requested = requested.trim();
    if requested.is_empty() {
        return None;
    }
    let folded = requested.to_lowercase();
    fields
        .iter()
        .find(|f| f.key == requested)
        .or_else(|| fields.iter().find(|f| f.key.to_lowercase() == folded))
        .or_else(|| fields.iter().find(|f| f.label.to_lowercase() == folded))
        .map(|f| f.key.clone())
}

/// Moves `key` to index 0, leaving the relative order of the rest intact.
pub fn promote_to_front(fields: &mut [FieldDescriptor], key: &str) {
    if let Some(idx) = fields.iter().position(|f| f.key == key)
        && idx > 0
    {
        fields[..=idx].rotate_right(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    fn keys(fields: &[FieldDescriptor]) -> Vec<&str> {
        fields.iter().map(|f| f.key.as_str()).collect()
    }

    #[test]
    fn synthesized_fields_follow_first_appearance() {
        let rows = vec![
            row(&[("A", Value::from("x")), ("B", Value::from("1"))]),
            row(&[("C", Value::from("y")), ("A", Value::from("z"))]),
        ];
        let fields = resolve(&rows, &[], None, &InferenceOptions::default());
        assert_eq!(keys(&fields), vec!["A", "B", "C"]);
        assert_eq!(fields[1].semantic_type, SemanticType::Number);
    }

    #[test]
    fn designated_time_field_moves_to_front() {
        let rows = vec![row(&[
            ("A", Value::from("a")),
            ("B", Value::from("b")),
            ("TimeCol", Value::from("2025-03-17 14:02:14")),
            ("C", Value::from("c")),
        ])];
        let fields = resolve(&rows, &[], Some("TimeCol"), &InferenceOptions::default());
        assert_eq!(keys(&fields), vec!["TimeCol", "A", "B", "C"]);
        assert!(fields[0].is_time_candidate);
    }

    #[test]
    fn designated_time_field_matches_case_insensitively() {
        let rows = vec![row(&[("A", Value::from("a")), ("Created", Value::from("x"))])];
        let fields = resolve(&rows, &[], Some("created"), &InferenceOptions::default());
        assert_eq!(keys(&fields), vec!["Created", "A"]);
        assert!(fields[0].is_time_candidate);
    }

    #[test]
    fn unknown_time_field_is_ignored() {
        let rows = vec![row(&[("A", Value::from("a"))])];
        let fields = resolve(&rows, &[], Some("Missing"), &InferenceOptions::default());
        assert_eq!(keys(&fields), vec!["A"]);
        assert!(!fields[0].is_time_candidate);
    }

    #[test]
    fn geo_columns_gain_virtual_pairs() {
        let rows = vec![row(&[
            ("Location", Value::from("51.5072, -0.1275")),
            ("Name", Value::from("London")),
        ])];
        let fields = resolve(&rows, &[], None, &InferenceOptions::default());
        assert_eq!(
            keys(&fields),
            vec!["Location", "Location_lat", "Location_lon", "Name"]
        );
        assert_eq!(fields[1].label, "Location Latitude");
        assert_eq!(fields[1].decimal_precision, Some(4));
        assert_eq!(fields[2].decimal_precision, Some(4));
    }

    #[test]
    fn hints_keep_their_order_and_types() {
        let rows = vec![row(&[("Count", Value::from("5")), ("Note", Value::from("7"))])];
        let hints = vec![
            FieldHint::typed("Note", SemanticType::String),
            FieldHint::typed("Count", SemanticType::Number),
        ];
        let fields = resolve(&rows, &hints, None, &InferenceOptions::default());
        assert_eq!(keys(&fields), vec!["Note", "Count"]);
        assert_eq!(fields[0].semantic_type, SemanticType::String);
        assert_eq!(fields[1].decimal_precision, None);
    }

    #[test]
    fn untyped_hints_are_refined_by_sampling() {
        let rows = vec![row(&[
            ("Price", Value::from("12.340")),
            ("Where", Value::from("51.5, -0.12")),
        ])];
        let hints = vec![
            FieldHint::new("Price"),
            FieldHint {
                format: Some("GPS".to_string()),
                label: Some("Scan location".to_string()),
                ..FieldHint::new("Where")
            },
        ];
        let fields = resolve(&rows, &hints, None, &InferenceOptions::default());
        assert_eq!(keys(&fields), vec!["Price", "Where", "Where_lat", "Where_lon"]);
        assert_eq!(fields[0].semantic_type, SemanticType::Number);
        assert_eq!(fields[0].decimal_precision, Some(3));
        assert_eq!(fields[2].label, "Scan location Latitude");
        assert_eq!(fields[3].decimal_precision, Some(2));
    }

    #[test]
    fn hinted_virtual_columns_are_not_duplicated() {
        let rows = vec![row(&[("Location", Value::from("51.5072, -0.1275"))])];
        let hints = vec![
            FieldHint::typed("Location", SemanticType::String),
            FieldHint::typed("Location_lon", SemanticType::Number),
            FieldHint {
                label: Some("Lat".to_string()),
                ..FieldHint::typed("Location_lat", SemanticType::Number)
            },
        ];
        let fields = resolve(&rows, &hints, None, &InferenceOptions::default());
        assert_eq!(
            keys(&fields),
            vec!["Location", "Location_lon", "Location_lat"]
        );
        assert_eq!(fields[1].decimal_precision, Some(4));
        assert_eq!(fields[2].label, "Lat");
        assert_eq!(fields[2].decimal_precision, Some(4));
    }

    #[test]
    fn resolution_is_idempotent() {
        let rows = vec![
            row(&[("When", Value::from("2025-01-01")), ("V", Value::from("1.25"))]),
            row(&[("V", Value::from("2")), ("Extra", Value::Bool(true))]),
        ];
        let options = InferenceOptions::default();
        assert_eq!(
            resolve(&rows, &[], Some("V"), &options),
            resolve(&rows, &[], Some("V"), &options)
        );
    }

    #[test]
    fn promote_to_front_is_a_stable_move() {
        let mut fields: Vec<FieldDescriptor> = ["A", "B", "T", "C"]
            .iter()
            .map(|k| FieldDescriptor::new(*k, SemanticType::String))
            .collect();
        promote_to_front(&mut fields, "T");
        assert_eq!(keys(&fields), vec!["T", "A", "B", "C"]);
        promote_to_front(&mut fields, "T");
        assert_eq!(keys(&fields), vec!["T", "A", "B", "C"]);
    }
}
