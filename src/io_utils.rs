//! I/O utilities: loading rows, hints and queries, and opening outputs.
//!
//! All file I/O in sheet-frames flows through this module. It provides:
//!
//! - **Row loading**: `.json` files (a bare row array or a query-response
//!   envelope), `.csv`/`.tsv` files (header row becomes the keys), and `-`
//!   for JSON on stdin.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Hints and queries**: YAML or JSON documents read through `serde_yaml`.
//! - **stdout**: a missing or `-` output path routes to standard output.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::debug;
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    data::{Row, Value},
    error::InputError,
    query::{Query, QueryResponse},
    schema::FieldHint,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Delimited(u8),
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn input_format(path: &Path) -> Result<InputFormat> {
    if is_dash(path) {
        return Ok(InputFormat::Json);
    }
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(InputFormat::Json),
        Some(ext) if ext.eq_ignore_ascii_case("csv") => {
            Ok(InputFormat::Delimited(DEFAULT_CSV_DELIMITER))
        }
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => {
            Ok(InputFormat::Delimited(DEFAULT_TSV_DELIMITER))
        }
        _ => Err(InputError::UnsupportedInput {
            path: path.to_path_buf(),
        }
        .into()),
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8, has_headers: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    decode_record(&headers, encoding)
}

fn read_input_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    if is_dash(path) {
        io::stdin()
            .lock()
            .read_to_end(&mut buf)
            .context("Reading rows from stdin")?;
    } else {
        File::open(path)
            .with_context(|| format!("Opening input file {path:?}"))?
            .read_to_end(&mut buf)
            .with_context(|| format!("Reading input file {path:?}"))?;
    }
    Ok(buf)
}

/// Loads a query response from `path`. Delimited files carry no field hints.
pub fn load_response(path: &Path, encoding: &'static Encoding) -> Result<QueryResponse> {
    let response = match input_format(path)? {
        InputFormat::Json => {
            let bytes = read_input_bytes(path)?;
            let text = decode_bytes(&bytes, encoding).map_err(|_| InputError::Decode {
                path: path.to_path_buf(),
                encoding: encoding.name().to_string(),
            })?;
            parse_json_response(&text, path)?
        }
        InputFormat::Delimited(delimiter) => {
            QueryResponse::from_rows(read_delimited_rows(path, delimiter, encoding)?)
        }
    };
    debug!(
        "Loaded {} row(s) and {} field hint(s) from {:?}",
        response.rows.len(),
        response.fields.len(),
        path
    );
    Ok(response)
}

/// Accepts a bare array of row objects or an object carrying a `rows` array.
pub fn parse_json_response(text: &str, path: &Path) -> Result<QueryResponse> {
    let document: serde_json::Value =
        serde_json::from_str(text).with_context(|| format!("Parsing JSON from {path:?}"))?;
    let rows = match &document {
        serde_json::Value::Array(rows) => rows,
        serde_json::Value::Object(map) => match map.get("rows") {
            Some(serde_json::Value::Array(rows)) => rows,
            _ => {
                return Err(InputError::MissingRows {
                    path: path.to_path_buf(),
                }
                .into());
            }
        },
        _ => {
            return Err(InputError::MissingRows {
                path: path.to_path_buf(),
            }
            .into());
        }
    };
    if let Some(row) = rows.iter().position(|row| !row.is_object()) {
        return Err(InputError::NotAnObject {
            path: path.to_path_buf(),
            row,
        }
        .into());
    }
    match document {
        serde_json::Value::Array(_) => {
            let rows: Vec<Row> = serde_json::from_value(document)
                .with_context(|| format!("Reading rows from {path:?}"))?;
            Ok(QueryResponse::from_rows(rows))
        }
        envelope => serde_json::from_value(envelope)
            .with_context(|| format!("Reading query response from {path:?}")),
    }
}

/// Header row becomes the keys; empty cells are `null`, all others text.
pub fn read_delimited_rows(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Vec<Row>> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let mut reader = open_csv_reader(BufReader::new(file), delimiter, true);
    let headers = reader_headers(&mut reader, encoding)
        .with_context(|| format!("Reading headers from {path:?}"))?;
    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} of {path:?}", idx + 2))?;
        let cells = decode_record(&record, encoding).map_err(|_| InputError::Decode {
            path: path.to_path_buf(),
            encoding: encoding.name().to_string(),
        })?;
        let row = headers
            .iter()
            .zip(cells)
            .map(|(header, cell)| {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::Text(cell)
                };
                (header.clone(), value)
            })
            .collect::<Row>();
        rows.push(row);
    }
    Ok(rows)
}

fn load_document<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let mut raw = String::new();
    File::open(path)
        .with_context(|| format!("Opening {what} file {path:?}"))?
        .read_to_string(&mut raw)
        .with_context(|| format!("Reading {what} file {path:?}"))?;
    serde_yaml::from_str(&raw).with_context(|| format!("Parsing {what} file {path:?}"))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HintsDocument {
    List(Vec<FieldHint>),
    Wrapped { fields: Vec<FieldHint> },
}

/// Field hints from YAML or JSON: a bare list or an object with `fields`.
pub fn load_hints(path: &Path) -> Result<Vec<FieldHint>> {
    let document: HintsDocument = load_document(path, "hints")?;
    Ok(match document {
        HintsDocument::List(fields) | HintsDocument::Wrapped { fields } => fields,
    })
}

pub fn load_query(path: &Path) -> Result<Query> {
    load_document(path, "query")
}

pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    })
}

pub fn open_csv_writer(path: Option<&Path>) -> Result<csv::Writer<Box<dyn Write>>> {
    let delimiter = match path.and_then(|p| p.extension()).and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    };
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(open_output(path)?))
}
