mod common;

use common::{fixture_path, row, text_row};
use sheet_frames::{
    data::Value,
    frame::{FieldValues, Visualisation},
    infer::InferenceOptions,
    io_utils,
    numeric::round_to_decimals,
    query::{Query, QueryResponse},
    resolve_fields,
    schema::{FieldHint, SemanticType},
    shape_response,
};

fn response(rows: Vec<sheet_frames::data::Row>) -> QueryResponse {
    QueryResponse::from_rows(rows)
}

#[test]
fn trailing_zero_precision_survives_shaping() {
    let query = Query::new("A");
    let response = response(vec![
        text_row(&[("Price", "12.340")]),
        text_row(&[("Price", "5")]),
    ]);
    let frame = shape_response(&query, &response, &InferenceOptions::default());

    let price = frame.field("Price").expect("price field");
    assert_eq!(price.semantic_type, SemanticType::Number);
    assert_eq!(price.config.decimals, Some(3));
    assert_eq!(price.values, FieldValues::Number(vec![Some(12.34), Some(5.0)]));
    assert_eq!(price.values.display(0, price.config.decimals), "12.340");
    assert_eq!(format!("{:.3}", round_to_decimals(12.34, 3)), "12.340");
}

#[test]
fn composite_coordinates_decompose_into_latitude_and_longitude() {
    let query = Query::new("A");
    let response = response(vec![text_row(&[("Location", "51.5072, -0.1275")])]);
    let frame = shape_response(&query, &response, &InferenceOptions::default());

    let names = frame
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Location", "Location_lat", "Location_lon"]);

    let lat = frame.field("Location_lat").unwrap();
    assert_eq!(lat.values, FieldValues::Number(vec![Some(51.5072)]));
    assert_eq!(lat.config.decimals, Some(4));
    assert_eq!(lat.config.display_name.as_deref(), Some("Location Latitude"));

    let lon = frame.field("Location_lon").unwrap();
    assert_eq!(lon.values, FieldValues::Number(vec![Some(-0.1275)]));
    assert_eq!(lon.config.decimals, Some(4));
}

#[test]
fn explicit_number_hint_yields_numbers_without_forced_decimals() {
    let query = Query::new("A");
    let response = QueryResponse {
        rows: vec![text_row(&[("Count", "5")])],
        fields: vec![FieldHint::typed("Count", SemanticType::Number)],
        ..QueryResponse::default()
    };
    let frame = shape_response(&query, &response, &InferenceOptions::default());

    let count = frame.field("Count").unwrap();
    assert_eq!(count.values, FieldValues::Number(vec![Some(5.0)]));
    assert_eq!(count.config.decimals, None);
    let json = serde_json::to_value(count).unwrap();
    assert_eq!(json["config"], serde_json::json!({}));
    assert_eq!(json["values"], serde_json::json!([5.0]));
}

#[test]
fn hints_decide_which_fields_appear_and_in_what_order() {
    let query = Query::new("A");
    let response = QueryResponse {
        rows: vec![text_row(&[("a", "1"), ("b", "x"), ("c", "true")])],
        fields: vec![FieldHint::new("c"), FieldHint::new("a")],
        ..QueryResponse::default()
    };
    let fields = resolve_fields(&query, &response, &InferenceOptions::default());
    let keys = fields.iter().map(|f| f.key.as_str()).collect::<Vec<_>>();
    assert_eq!(keys, vec!["c", "a"]);
    assert_eq!(fields[0].semantic_type, SemanticType::Boolean);
    assert_eq!(fields[1].semantic_type, SemanticType::Number);
}

#[test]
fn designated_time_field_moves_first_and_prefers_a_graph() {
    let query = Query {
        time_field: Some("when".to_string()),
        ..Query::new("A")
    };
    let response = response(vec![
        text_row(&[("value", "3"), ("When", "2025-03-17 14:02:14")]),
        text_row(&[("value", "4"), ("When", "2025-03-18 09:30:00")]),
    ]);
    let frame = shape_response(&query, &response, &InferenceOptions::default());

    assert_eq!(frame.fields[0].name, "When");
    assert_eq!(frame.fields[0].semantic_type, SemanticType::Time);
    assert_eq!(frame.visualisation(), Visualisation::Graph);
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(
        json["fields"][0]["values"],
        serde_json::json!([1742220134000_i64, 1742290200000_i64])
    );
}

#[test]
fn boolean_columns_normalize_vocabulary() {
    let query = Query::new("A");
    let response = response(vec![
        row(&[("Active", Value::Bool(true))]),
        row(&[("Active", Value::from("No"))]),
        row(&[("Active", Value::Null)]),
    ]);
    let frame = shape_response(&query, &response, &InferenceOptions::default());
    assert_eq!(
        frame.field("Active").unwrap().values,
        FieldValues::Boolean(vec![Some(true), Some(false), None])
    );
}

#[test]
fn empty_responses_produce_an_empty_table_frame() {
    let query = Query {
        sheet_id: Some("empty-sheet".to_string()),
        time_field: Some("When".to_string()),
        ..Query::new("Z")
    };
    let frame = shape_response(&query, &QueryResponse::default(), &InferenceOptions::default());
    assert_eq!(frame.ref_id, "Z");
    assert_eq!(frame.name, "empty-sheet");
    assert_eq!(frame.length, 0);
    assert!(frame.fields.is_empty());
    assert_eq!(frame.visualisation(), Visualisation::Table);
}

#[test]
fn shaping_is_idempotent() {
    let query = Query::new("A");
    let response = response(vec![
        text_row(&[("Location", "51.5072, -0.1275"), ("n", "1.50")]),
        text_row(&[("n", "2"), ("extra", "x")]),
    ]);
    let options = InferenceOptions::default();
    assert_eq!(
        shape_response(&query, &response, &options),
        shape_response(&query, &response, &options)
    );
}

#[test]
fn envelope_fixture_shapes_end_to_end() {
    let path = fixture_path("inspections.json");
    let response = io_utils::load_response(&path, encoding_rs::UTF_8).expect("load fixture");
    let query = Query {
        ref_id: response.ref_id.clone().unwrap_or_default(),
        sheet_id: response.sheet_id.clone(),
        ..Query::default()
    };
    let frame = shape_response(&query, &response, &InferenceOptions::default());

    let names = frame
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            "Inspected At",
            "Site",
            "Reading",
            "Passed",
            "Location",
            "Location_lat",
            "Location_lon"
        ]
    );
    assert_eq!(frame.name, "inspections");
    assert_eq!(frame.length, 3);
    assert_eq!(frame.visualisation(), Visualisation::Graph);

    let reading = frame.field("Reading").unwrap();
    assert_eq!(reading.config.decimals, Some(3));
    assert_eq!(
        reading.values,
        FieldValues::Number(vec![Some(12.34), Some(7.5), None])
    );
    assert_eq!(
        frame.field("Passed").unwrap().values,
        FieldValues::Boolean(vec![Some(true), Some(false), Some(true)])
    );
    assert_eq!(
        frame.field("Location_lon").unwrap().values,
        FieldValues::Number(vec![Some(-0.1275), Some(-74.006), None])
    );
}

#[test]
fn hinted_response_keeps_precision_and_present_coordinates() {
    let response = io_utils::parse_json_response(
        r#"{
            "rows": [{
                "Date": "2025-03-17 14:02:14",
                "Count": "5",
                "Price": "12.34",
                "Location": "51.5072, -0.1275",
                "Location_lat": 51.5072,
                "Location_lon": -0.1275
            }],
            "fields": [
                {"key": "Date", "grafanaType": "time", "isTime": true},
                {"key": "Count", "grafanaType": "number"},
                {"key": "Price", "grafanaType": "number", "decimals": 2},
                {"key": "Location", "grafanaType": "string"},
                {"key": "Location_lat", "grafanaType": "number", "decimals": 4},
                {"key": "Location_lon", "grafanaType": "number", "decimals": 4}
            ],
            "sheetId": "sheet-1",
            "refId": "A",
            "timeField": "Date"
        }"#,
        std::path::Path::new("inline.json"),
    )
    .expect("parse response");
    let query = Query {
        sheet_id: Some("sheet-1".to_string()),
        time_field: Some("Date".to_string()),
        ..Query::new("A")
    };
    let frame = shape_response(&query, &response, &InferenceOptions::default());

    assert_eq!(frame.name, "sheet-1");
    assert_eq!(frame.fields.len(), 6);
    let count = frame.field("Count").unwrap();
    assert_eq!(count.config.decimals, None);
    assert_eq!(count.values, FieldValues::Number(vec![Some(5.0)]));
    let price = frame.field("Price").unwrap();
    assert_eq!(price.config.decimals, Some(2));
    assert_eq!(price.values, FieldValues::Number(vec![Some(12.34)]));
    let lat = frame.field("Location_lat").unwrap();
    assert_eq!(lat.config.decimals, Some(4));
    assert_eq!(lat.values, FieldValues::Number(vec![Some(51.5072)]));
    let lon = frame.field("Location_lon").unwrap();
    assert_eq!(lon.config.decimals, Some(4));
    assert_eq!(lon.values, FieldValues::Number(vec![Some(-0.1275)]));
    assert_eq!(frame.visualisation(), Visualisation::Graph);
}

#[test]
fn coordinates_after_a_leading_stray_value_still_decompose() {
    let query = Query::new("A");
    let response = response(vec![
        text_row(&[("Location", "unknown")]),
        text_row(&[("Location", "51.5072, -0.1275")]),
        text_row(&[("Location", "40.7128, -74.0060")]),
    ]);
    let frame = shape_response(&query, &response, &InferenceOptions::default());

    let names = frame
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Location", "Location_lat", "Location_lon"]);
    assert_eq!(
        frame.field("Location_lat").unwrap().values,
        FieldValues::Number(vec![None, Some(51.5072), Some(40.7128)])
    );
}

#[test]
fn hinted_display_decimals_leave_derived_coordinates_unrounded() {
    let response = io_utils::parse_json_response(
        r#"{
            "rows": [{"Location": "51.5072, -0.1275"}],
            "fields": [
                {"key": "Location", "grafanaType": "string"},
                {"key": "Location_lat", "grafanaType": "number", "decimals": 1}
            ]
        }"#,
        std::path::Path::new("inline.json"),
    )
    .expect("parse response");
    let frame = shape_response(&Query::new("A"), &response, &InferenceOptions::default());

    let lat = frame.field("Location_lat").unwrap();
    assert_eq!(lat.config.decimals, Some(1));
    assert_eq!(lat.values, FieldValues::Number(vec![Some(51.5072)]));
    assert_eq!(lat.values.display(0, lat.config.decimals), "51.5");
}
