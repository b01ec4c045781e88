use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::infer::DEFAULT_SAMPLE_LIMIT;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Shape schema-less sheet rows into typed, column-oriented frames",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve the ordered field list (types, labels, precision) for a set of rows
    Fields(FieldsArgs),
    /// Filter, page and assemble rows into a column-oriented frame
    Shape(ShapeArgs),
}

/// Options shared by every command that reads rows.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Rows to read: .json (row array or query response), .csv, .tsv, or '-' for JSON on stdin
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML or JSON file of field hints; overrides hints embedded in the input
    #[arg(long = "hints")]
    pub hints: Option<PathBuf>,
    /// Key (or label) of the field to treat as the time axis
    #[arg(long = "time-field")]
    pub time_field: Option<String>,
    /// Non-blank values sampled per column during type inference
    #[arg(long = "sample-limit", default_value_t = DEFAULT_SAMPLE_LIMIT)]
    pub sample_limit: usize,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct FieldsArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Emit the resolved fields as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ShapeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// YAML or JSON query descriptor (refId, sheetId, timeField, filters, range, limit, skip)
    #[arg(short = 'q', long = "query")]
    pub query: Option<PathBuf>,
    /// Frame ref id (defaults to 'A')
    #[arg(long = "ref-id")]
    pub ref_id: Option<String>,
    /// Sheet id used as the frame name
    #[arg(long = "sheet-id")]
    pub sheet_id: Option<String>,
    /// Exact-match filters of the form `key=value`
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Drop rows whose time value is before this instant
    #[arg(long)]
    pub from: Option<String>,
    /// Drop rows whose time value is after this instant
    #[arg(long)]
    pub to: Option<String>,
    /// Maximum rows to shape (values <= 0 or above 5000 mean 5000)
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,
    /// Rows to skip before shaping (negative values mean 0)
    #[arg(long, allow_negative_numbers = true)]
    pub skip: Option<i64>,
    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Data-frame JSON
    Json,
    /// Aligned plain-text table
    Table,
    /// Delimited text with a header row of display names
    Csv,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn shape_accepts_negative_paging() {
        let cli = Cli::try_parse_from([
            "sheet-frames",
            "shape",
            "-i",
            "rows.json",
            "--limit",
            "-1",
            "--skip",
            "-5",
            "--filter",
            "Status=Open",
            "--format",
            "table",
        ])
        .unwrap();
        let Commands::Shape(args) = cli.command else {
            panic!("expected shape command");
        };
        assert_eq!(args.limit, Some(-1));
        assert_eq!(args.skip, Some(-5));
        assert_eq!(args.filters, vec!["Status=Open".to_string()]);
        assert_eq!(args.format, OutputFormat::Table);
        assert_eq!(args.input.sample_limit, DEFAULT_SAMPLE_LIMIT);
    }
}
