pub mod cli;
pub mod data;
pub mod error;
pub mod filter;
pub mod frame;
pub mod geo;
pub mod infer;
pub mod io_utils;
pub mod numeric;
pub mod query;
pub mod resolve;
pub mod schema;
pub mod table;

use std::{env, io::Write, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, InputArgs, OutputFormat},
    frame::ColumnarFrame,
    infer::InferenceOptions,
    query::{Query, QueryResponse, TimeRange},
    schema::FieldDescriptor,
};

static LOGGER: OnceLock<()> = OnceLock::new();

const DEFAULT_REF_ID: &str = "A";

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_frames", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

/// Resolves the field list for `response` and assembles its frame.
///
/// The designated time key is the response's own `timeField`, falling back
/// to the query's.
pub fn shape_response(
    query: &Query,
    response: &QueryResponse,
    options: &InferenceOptions,
) -> ColumnarFrame {
    let fields = resolve_fields(query, response, options);
    frame::assemble(query, &response.rows, &fields, options)
}

pub fn resolve_fields(
    query: &Query,
    response: &QueryResponse,
    options: &InferenceOptions,
) -> Vec<FieldDescriptor> {
    resolve::resolve(
        &response.rows,
        &response.fields,
        response.designated_time_key(query),
        options,
    )
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Fields(args) => handle_fields(&args),
        Commands::Shape(args) => handle_shape(&args),
    }
}

fn inference_options(args: &InputArgs) -> InferenceOptions {
    InferenceOptions {
        sample_limit: args.sample_limit,
        ..InferenceOptions::default()
    }
}

/// Reads the input rows and applies `--hints` and `--time-field` on top of
/// whatever the input itself carries.
fn load_input(args: &InputArgs) -> Result<QueryResponse> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let mut response = io_utils::load_response(&args.input, encoding)
        .with_context(|| format!("Loading rows from {:?}", args.input))?;
    if let Some(path) = &args.hints {
        response.fields = io_utils::load_hints(path)
            .with_context(|| format!("Loading field hints from {path:?}"))?;
        debug!("Using {} field hint(s) from {:?}", response.fields.len(), path);
    }
    if let Some(time_field) = &args.time_field {
        response.time_field = Some(time_field.clone());
    }
    Ok(response)
}

fn handle_fields(args: &cli::FieldsArgs) -> Result<()> {
    info!("Resolving fields for '{}'", args.input.input.display());
    let response = load_input(&args.input)?;
    let query = Query::new(DEFAULT_REF_ID);
    let fields = resolve_fields(&query, &response, &inference_options(&args.input));
    let mut out = std::io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &fields).context("Writing fields as JSON")?;
        writeln!(out)?;
    } else {
        write!(out, "{}", table::render_descriptors(&fields))?;
    }
    info!(
        "Resolved {} field(s) from {} row(s)",
        fields.len(),
        response.rows.len()
    );
    Ok(())
}

/// Query from `--query`, overridden by flags. Ids the input envelope carries
/// fill whatever is still unset.
fn build_query(args: &cli::ShapeArgs, response: &QueryResponse) -> Result<Query> {
    let mut query = match &args.query {
        Some(path) => io_utils::load_query(path)
            .with_context(|| format!("Loading query from {path:?}"))?,
        None => Query::default(),
    };
    if let Some(ref_id) = &args.ref_id {
        query.ref_id = ref_id.clone();
    }
    if query.ref_id.trim().is_empty() {
        query.ref_id = response
            .ref_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REF_ID.to_string());
    }
    if let Some(sheet_id) = &args.sheet_id {
        query.sheet_id = Some(sheet_id.clone());
    }
    if query.sheet_id.is_none() {
        query.sheet_id = response.sheet_id.clone();
    }
    if let Some(time_field) = &args.input.time_field {
        query.time_field = Some(time_field.clone());
    }
    query
        .filters
        .extend(filter::parse_filters(&args.filters)?);
    if args.from.is_some() || args.to.is_some() {
        let range = query.range.get_or_insert_with(TimeRange::default);
        if let Some(from) = &args.from {
            range.from = Some(from.clone());
        }
        if let Some(to) = &args.to {
            range.to = Some(to.clone());
        }
    }
    if let Some(limit) = args.limit {
        query.limit = limit;
    }
    if let Some(skip) = args.skip {
        query.skip = skip;
    }
    Ok(query)
}

fn handle_shape(args: &cli::ShapeArgs) -> Result<()> {
    info!("Shaping '{}'", args.input.input.display());
    let mut response = load_input(&args.input)?;
    let query = build_query(args, &response)?;
    let options = inference_options(&args.input);

    // Narrow and page the rows the way the upstream service would before
    // they reach the shaping pipeline.
    let rows = std::mem::take(&mut response.rows);
    let time_key = response
        .designated_time_key(&query)
        .map(str::to_string);
    let rows = filter::apply(rows, &query.filters, query.range.as_ref(), time_key.as_deref());
    response.rows = query.page(rows);

    let frame = shape_response(&query, &response, &options);
    write_frame(&frame, args.format, args.output.as_deref())?;
    info!(
        "Frame '{}' with {} field(s) and {} row(s) written as {:?}",
        frame.name,
        frame.fields.len(),
        frame.length,
        args.format
    );
    Ok(())
}

fn write_frame(
    frame: &ColumnarFrame,
    format: OutputFormat,
    output: Option<&std::path::Path>,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let mut out = io_utils::open_output(output)?;
            serde_json::to_writer_pretty(&mut out, frame).context("Writing frame as JSON")?;
            writeln!(out)?;
            out.flush()?;
        }
        OutputFormat::Table => {
            let mut out = io_utils::open_output(output)?;
            write!(out, "{}", table::render_frame(frame))?;
            out.flush()?;
        }
        OutputFormat::Csv => {
            let mut writer = io_utils::open_csv_writer(output)?;
            writer
                .write_record(frame.headers())
                .context("Writing CSV headers")?;
            for row in frame.display_rows() {
                writer.write_record(&row).context("Writing CSV row")?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}
