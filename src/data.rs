//! Tabular data source access: column letters, row qualification and row
//! selection.
//!
//! The data source is an external collaborator reduced to its interface: an
//! ordered sequence of rows whose cells are addressed by spreadsheet-style
//! column letters assigned by position.  Missing cells read as empty strings.

use std::collections::BTreeMap;

use log::warn;

use crate::error::{Error, Result};

/// Returns the spreadsheet letter for a 0-based column index (`0` is `A`,
/// `26` is `AA`).
pub fn column_letter(index: usize) -> String {
    let mut index = index;
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Returns the 0-based column index for a spreadsheet letter, or `None` when
/// the key is not made of ASCII letters.
pub fn column_index(letter: &str) -> Option<usize> {
    if letter.is_empty() {
        return None;
    }
    let mut value = 0usize;
    for ch in letter.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let ch = ch.to_ascii_uppercase();
        value = value * 26 + (ch as usize - 'A' as usize + 1);
    }
    Some(value - 1)
}

/// One output record: a mapping from field key to string value.
///
/// Keys are normalized to their uppercase form, matching placeholder key
/// identity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field and returns the updated record.
    pub fn with_field(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.fields
            .insert(key.as_ref().to_uppercase(), value.into());
        self
    }

    /// Returns the value of `key`, or an empty string when absent.
    pub fn field(&self, key: &str) -> &str {
        self.fields
            .get(&key.to_uppercase())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Returns the full key/value view of the record.
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

/// An in-memory tabular data source.
#[derive(Clone, Debug, Default)]
pub struct DataTable {
    rows: Vec<Vec<String>>,
    column_count: usize,
}

impl DataTable {
    /// Builds a table from ordered rows; the column set is the widest row.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        let column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self { rows, column_count }
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the number of addressable columns.
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Returns the cell at `(row, column)`, with missing cells normalized to
    /// the empty string.
    pub fn value(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Which field keys an export reads from each row.
///
/// Required fields gate row qualification; optional fields are carried along
/// and resolve to empty strings when blank.
#[derive(Clone, Debug, Default)]
pub struct FieldSelection {
    required: Vec<String>,
    optional: Vec<String>,
}

impl FieldSelection {
    /// Creates a selection from required and optional column keys.
    pub fn new<R, O>(required: R, optional: O) -> Self
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
        O: IntoIterator,
        O::Item: AsRef<str>,
    {
        Self {
            required: required
                .into_iter()
                .map(|key| key.as_ref().to_uppercase())
                .collect(),
            optional: optional
                .into_iter()
                .map(|key| key.as_ref().to_uppercase())
                .collect(),
        }
    }

    /// Returns the required keys.
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Returns the optional keys.
    pub fn optional(&self) -> &[String] {
        &self.optional
    }

    /// Iterates over all configured keys, required first.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.required.iter().chain(self.optional.iter())
    }

    fn validate(&self, table: &DataTable) -> Result<()> {
        for key in self.keys() {
            match column_index(key) {
                Some(index) if index < table.column_count() => {}
                _ => return Err(Error::MissingColumn(key.clone())),
            }
        }
        Ok(())
    }
}

/// Row subset selection: everything, the first N rows, or a 1-based inclusive
/// range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RowSelection {
    /// Every row of the data source.
    #[default]
    All,
    /// The first `N` rows.
    FirstN(usize),
    /// A 1-based inclusive row range.
    Range {
        /// First row, 1-based.
        start: usize,
        /// Last row, 1-based inclusive.
        end: usize,
    },
}

impl RowSelection {
    fn bounds(self, available: usize) -> Result<(usize, usize)> {
        match self {
            RowSelection::All => Ok((0, available)),
            RowSelection::FirstN(count) => Ok((0, count.min(available))),
            RowSelection::Range { start, end } => {
                if start == 0 || end < start || end > available {
                    Err(Error::InvalidRowRange {
                        start,
                        end,
                        available,
                    })
                } else {
                    Ok((start - 1, end))
                }
            }
        }
    }
}

/// Collects the qualifying records of `table` under `selection`.
///
/// A row qualifies when every required field is non-empty; other rows are
/// skipped with a warning.  Keys missing from the data source's column set are
/// a configuration error.
pub fn qualifying_records(
    table: &DataTable,
    fields: &FieldSelection,
    selection: RowSelection,
) -> Result<Vec<Record>> {
    fields.validate(table)?;
    let (start, end) = selection.bounds(table.row_count())?;

    let mut records = Vec::new();
    for row in start..end {
        let qualified = fields.required().iter().all(|key| {
            column_index(key)
                .map(|index| !table.value(row, index).is_empty())
                .unwrap_or(false)
        });
        if !qualified {
            warn!("skipping row {}: a required field is empty", row + 1);
            continue;
        }

        let mut record = Record::new();
        for key in fields.keys() {
            if let Some(index) = column_index(key) {
                record = record.with_field(key, table.value(row, index));
            }
        }
        records.push(record);
    }
    Ok(records)
}
