//! Plain-text rendering of frames and resolved field lists.

use std::borrow::Cow;
use std::fmt::Write as _;

use itertools::Itertools;

use crate::{frame::ColumnarFrame, schema::FieldDescriptor};

const COLUMN_GAP: &str = "  ";
const MIN_RULE_WIDTH: usize = 3;

/// Left-aligned columns under a dashed rule. Cells beyond the header count
/// are dropped; trailing padding is trimmed from every line.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let headers = headers.iter().map(|h| flatten(h)).collect::<Vec<_>>();
    let rows = rows
        .iter()
        .map(|row| row.iter().take(headers.len()).map(|c| flatten(c)).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    let mut widths = headers.iter().map(|h| width_of(h).max(1)).collect::<Vec<_>>();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(width_of(cell));
        }
    }
    let rule = widths
        .iter()
        .map(|w| Cow::Owned("-".repeat((*w).max(MIN_RULE_WIDTH))))
        .collect::<Vec<_>>();

    let mut output = String::new();
    for line in std::iter::once(&headers).chain(std::iter::once(&rule)).chain(&rows) {
        let _ = writeln!(output, "{}", aligned(line, &widths));
    }
    output
}

/// Frame cells aligned under their display names. Numbers honour the
/// field's display precision and nulls render empty.
pub fn render_frame(frame: &ColumnarFrame) -> String {
    render_table(&frame.headers(), &frame.display_rows())
}

pub fn render_descriptors(fields: &[FieldDescriptor]) -> String {
    let headers = ["#", "key", "label", "type", "time", "decimals"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = fields
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            vec![
                (idx + 1).to_string(),
                field.key.clone(),
                field.label.clone(),
                field.semantic_type.to_string(),
                if field.is_time_candidate { "yes" } else { "" }.to_string(),
                field
                    .decimal_precision
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

fn aligned(cells: &[Cow<'_, str>], widths: &[usize]) -> String {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .join(COLUMN_GAP);
    line.trim_end().to_string()
}

fn width_of(cell: &str) -> usize {
    cell.chars().count()
}

/// Cells are plain text; line breaks and tabs become spaces.
fn flatten(cell: &str) -> Cow<'_, str> {
    if cell.contains(['\n', '\r', '\t']) {
        Cow::Owned(cell.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(cell)
    }
}
