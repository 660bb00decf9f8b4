//! # dbc
//!
//! Reader adapter for Vector `.dbc` files. It builds a [`Matrix`] exclusively through the
//! mutation API, so every invariant of the model holds for the imported data.
//!
//! Supported statements: `BU_`, `BO_`, `SG_` (including `M`/`mN` multiplex tags),
//! `BO_TX_BU_`, `CM_`, `VAL_`, `VAL_TABLE_`, `BA_DEF_`, `BA_DEF_DEF_`, `BA_` and
//! `SIG_GROUP_`. Other statements are ignored. A statement that cannot be parsed or that
//! the model rejects is skipped with a warning; the import itself never aborts.

mod attributes;
mod comments;
mod messages;
mod nodes;
mod signals;
mod strings;
mod value_tables;

use encoding_rs::WINDOWS_1252;
use log::{info, warn};
use std::fs::File;
use std::io::Read;
use thiserror::Error;

use crate::types::{
    errors::{DbcParseError, MatrixError},
    frame::ArbitrationId,
    matrix::Matrix,
};

/// Placeholder node name used by DBC editors for "no ECU".
pub(crate) const PLACEHOLDER_ECU: &str = "Vector__XXX";

/// Why one statement was skipped.
#[derive(Debug, Error)]
pub(crate) enum LineError {
    #[error("malformed statement ({0})")]
    Syntax(&'static str),
    #[error("unsupported statement ({0})")]
    Unsupported(String),
    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

pub(crate) type LineResult = Result<(), LineError>;

// Parser state carried between statements.
#[derive(Default)]
pub(crate) struct ParseState {
    /// Frame opened by the last `BO_`; `SG_` lines are added to it.
    pub(crate) current_frame: Option<ArbitrationId>,
}

/// Parses a DBC file and returns a populated [`Matrix`].
///
/// The file is decoded as Windows-1252, the encoding written by common DBC editors.
///
/// # Errors
/// Returns a [`DbcParseError`] if:
/// - The path does not end in `.dbc`.
/// - The file cannot be opened.
/// - There are I/O errors while reading.
///
/// # Example
/// ```no_run
/// use can_matrix::dbc;
///
/// let db = dbc::parse_from_file("example.dbc").expect("Failed to parse DBC file");
/// println!("Parsed {} frames", db.frame_count());
/// ```
pub fn parse_from_file(path: &str) -> Result<Matrix, DbcParseError> {
    // check if provided file has .dbc format
    if !path.to_ascii_lowercase().ends_with(".dbc") {
        return Err(DbcParseError::InvalidExtension {
            path: path.to_string(),
        });
    }

    let mut file: File = File::open(path).map_err(|source| DbcParseError::OpenFile {
        path: path.to_string(),
        source,
    })?;
    let mut raw: Vec<u8> = Vec::new();
    file.read_to_end(&mut raw)
        .map_err(|source| DbcParseError::Read {
            path: path.to_string(),
            source,
        })?;
    let (text, _, _) = WINDOWS_1252.decode(&raw);

    let db: Matrix = parse_from_str(&text);
    info!(
        "Loaded '{}': {} frames, {} ECUs",
        path,
        db.frame_count(),
        db.ecu_count()
    );
    Ok(db)
}

/// Parses already decoded DBC text.
pub fn parse_from_str(text: &str) -> Matrix {
    let mut db: Matrix = Matrix::new();
    let mut state: ParseState = ParseState::default();
    let mut lines = text.lines().enumerate();

    while let Some((idx, line)) = lines.next() {
        let line_trimmed: &str = line.trim();

        // skip comments and empty lines
        if line_trimmed.is_empty() || line_trimmed.starts_with("//") {
            continue;
        }

        // Accumulate multiline until every quoted segment is closed
        let mut statement: String = line_trimmed.to_string();
        while strings::has_open_quote(&statement) {
            let Some((_, next)) = lines.next() else {
                break;
            };
            statement.push('\n');
            statement.push_str(next.trim_start());
        }

        let mut parts = statement.split_ascii_whitespace();
        // Some DBCs use "BU_:" while others use "BU_". Accept both.
        let keyword: &str = parts.next().unwrap_or("").trim_end_matches(':');
        // bare keywords (NS_ section) carry no data
        if parts.next().is_none() {
            continue;
        }

        let result: LineResult = match keyword {
            "BU_" => nodes::decode(&mut db, &statement),
            "BO_" => messages::decode_frame(&mut db, &mut state, &statement),
            "SG_" => signals::decode_signal(&mut db, &state, &statement),
            "BO_TX_BU_" => messages::decode_transmitters(&mut db, &statement),
            "SIG_GROUP_" => signals::decode_signal_group(&mut db, &statement),
            "CM_" => comments::decode(&mut db, &statement),
            "VAL_TABLE_" => value_tables::decode_value_table(&mut db, &statement),
            "VAL_" => value_tables::decode_signal_values(&mut db, &statement),
            "BA_DEF_" => attributes::decode_define(&mut db, &statement),
            "BA_DEF_DEF_" => attributes::decode_define_default(&mut db, &statement),
            "BA_" => attributes::decode_attribute(&mut db, &statement),
            _ => Ok(()),
        };
        if let Err(e) = result {
            warn!("Line {}: skipping {} statement: {}", idx + 1, keyword, e);
        }
    }
    db
}

// Statement body without its keyword and trailing ';'.
pub(crate) fn body<'a>(statement: &'a str, keyword: &str) -> &'a str {
    let s: &str = statement.trim();
    let s: &str = s.strip_suffix(';').unwrap_or(s);
    s.strip_prefix(keyword).unwrap_or(s).trim()
}

pub(crate) fn parse_id(token: &str) -> Result<ArbitrationId, LineError> {
    let raw: u32 = token
        .parse::<u32>()
        .map_err(|_| LineError::Syntax("frame id"))?;
    Ok(ArbitrationId::from_dbc(raw).map_err(MatrixError::from)?)
}
