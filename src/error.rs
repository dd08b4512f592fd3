//! Error types for the formpress library.

use std::io;
use thiserror::Error;

/// Result type alias for formpress operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by template filling and overlay composition.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading templates or writing output files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The template PDF could not be read or written.
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// The template PDF is structurally unusable for composition.
    #[error("malformed template PDF: {0}")]
    MalformedPdf(String),

    /// A configured field key does not exist in the data source's column set.
    #[error("column {0} is not present in the data source")]
    MissingColumn(String),

    /// An explicit row range does not fit the available rows.
    #[error("invalid row range {start}..={end} over {available} row(s)")]
    InvalidRowRange {
        /// Requested 1-based first row.
        start: usize,
        /// Requested 1-based last row.
        end: usize,
        /// Number of rows the data source actually holds.
        available: usize,
    },

    /// A free-text template without any paragraph cannot be filled.
    #[error("template document contains no paragraphs")]
    NoParagraphs,

    /// A batch template without a table cannot be filled.
    #[error("template document contains no table")]
    NoTable,

    /// A batch iteration wrote nothing, so filling would never terminate.
    #[error("table template accepted no data at record {record}: no placeholder cells matched")]
    NoProgress {
        /// Index of the first unconsumed record when progress stopped.
        record: usize,
    },

    /// The base template PDF has no pages to clone.
    #[error("template PDF has no pages")]
    NoPages,

    /// A PDF export was requested without any labels or records.
    #[error("nothing to render: the export has no labels or no records")]
    NothingToRender,

    /// The label font could not be parsed.
    #[error("failed to parse font {path}: {reason}")]
    FontParse {
        /// Path the font was loaded from, if any.
        path: String,
        /// Parser diagnostic.
        reason: String,
    },
}
