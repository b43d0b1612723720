//! Table loading with character-encoding recovery
//!
//! Reads a delimited file whose byte encoding is unknown, sniffs the
//! encoding from the raw bytes, and falls back through a fixed list of
//! candidate encodings when the sniffed one fails. Known source column
//! names are renamed to their canonical equivalents.

use crate::error::{CineScoreError, Result};
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Fallback encodings tried in order when the sniffed encoding fails.
const FALLBACK_ENCODINGS: [&str; 4] = ["utf-8", "latin1", "iso-8859-1", "cp1252"];

/// Source column name → canonical column name.
const COLUMN_RENAMES: [(&str, &str); 5] = [
    ("Name", "title"),
    ("Director", "director"),
    ("Genre", "genres"),
    ("Year", "release_date"),
    ("Rating", "rating"),
];

/// CSV loader with best-effort encoding detection
#[derive(Debug, Clone, Default)]
pub struct TableLoader {
    infer_schema_length: Option<usize>,
}

impl TableLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(100),
        }
    }

    /// Load a CSV file, recovering from non-UTF-8 byte encodings, and
    /// rename known source columns to canonical names.
    pub fn load(&self, path: &Path) -> Result<DataFrame> {
        let bytes = std::fs::read(path)?;
        let text = decode_bytes(&bytes, path)?;

        let reader = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .into_reader_with_file_handle(Cursor::new(text.into_bytes()));

        let mut df = reader
            .finish()
            .map_err(|e| CineScoreError::DataError(e.to_string()))?;

        rename_columns(&mut df)?;
        Ok(df)
    }
}

/// Decode raw bytes: try the sniffed encoding first, then the fixed
/// fallback list. Fails only when every candidate produces replacement
/// characters.
fn decode_bytes(bytes: &[u8], path: &Path) -> Result<String> {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let sniffed = detector.guess(None, true);

    let (decoded, _, had_errors) = sniffed.decode(bytes);
    if !had_errors {
        debug!(encoding = sniffed.name(), "decoded with sniffed encoding");
        return Ok(decoded.into_owned());
    }

    for label in FALLBACK_ENCODINGS {
        let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
            continue;
        };
        let (decoded, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            debug!(encoding = label, "decoded with fallback encoding");
            return Ok(decoded.into_owned());
        }
    }

    Err(CineScoreError::DecodingError {
        path: path.to_path_buf(),
    })
}

fn rename_columns(df: &mut DataFrame) -> Result<()> {
    let present: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    for (source, canonical) in COLUMN_RENAMES {
        if present.iter().any(|c| c == source) {
            df.rename(source, canonical.into())
                .map_err(|e| CineScoreError::DataError(e.to_string()))?;
        }
    }

    Ok(())
}
