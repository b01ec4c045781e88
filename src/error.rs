use std::path::PathBuf;

use thiserror::Error;

/// Input problems the loaders report before any shaping happens.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Unsupported input {path:?}: expected .json, .csv, .tsv or '-'")]
    UnsupportedInput { path: PathBuf },

    #[error("Input {path:?} holds neither a row array nor an object with a 'rows' array")]
    MissingRows { path: PathBuf },

    #[error("Row {row} of {path:?} is not an object")]
    NotAnObject { path: PathBuf, row: usize },

    #[error("Failed to decode {path:?} as {encoding}")]
    Decode { path: PathBuf, encoding: String },
}
