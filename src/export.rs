//! Host-agnostic export drivers with progress reporting and cooperative
//! cancellation.
//!
//! The surrounding application may run an export on a worker thread while its
//! foreground loop polls progress.  The engine itself stays synchronous; the
//! only concession to threading is that progress is an atomic counter and
//! cancellation an atomic flag, both checked between records, never inside
//! one.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use log::debug;

use crate::batch::{fill_table_batches, BatchFillSummary};
use crate::data::{qualifying_records, DataTable, FieldSelection, Record, RowSelection};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::placeholder::AssignmentMap;
use crate::substitute::{substitute_document, SubstitutionStyle};

/// Monotonically increasing count of completed records.
///
/// Clones share the same counter, so one handle can live inside the export
/// while another is polled from a different thread.
#[derive(Clone, Debug, Default)]
pub struct ProgressCounter(Arc<AtomicUsize>);

impl ProgressCounter {
    /// Creates a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current count.
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn advance(&self, amount: usize) {
        self.0.fetch_add(amount, Ordering::Relaxed);
    }
}

/// Cooperative cancellation flag.
///
/// Cancellation is coarse-grained: exports check the flag between records and
/// batches, stop without finalizing output, and flag their summary.  Partial
/// in-memory state is the caller's to discard.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of a per-record document export.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExportSummary {
    /// Documents handed to the sink.
    pub records_written: usize,
    /// Whether the run stopped early at a cancellation check.
    pub cancelled: bool,
}

/// Generates one filled document per qualifying record from a free-text
/// template.
///
/// The template stays untouched; every record gets its own clone, substituted
/// and handed to a caller-supplied sink for persistence.
pub struct DocumentExportJob<'a> {
    template: &'a Document,
    fields: FieldSelection,
    selection: RowSelection,
    style: SubstitutionStyle,
}

impl<'a> DocumentExportJob<'a> {
    /// Creates a job over `template` reading the given fields.
    pub fn new(template: &'a Document, fields: FieldSelection) -> Self {
        Self {
            template,
            fields,
            selection: RowSelection::All,
            style: SubstitutionStyle::default(),
        }
    }

    /// Restricts which rows are exported.
    pub fn with_selection(mut self, selection: RowSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Overrides the substitution style.
    pub fn with_style(mut self, style: SubstitutionStyle) -> Self {
        self.style = style;
        self
    }

    /// Runs the export, handing each finished document to `sink`.
    ///
    /// The sink receives the source record alongside the document so it can
    /// derive an output name from a leading field.
    pub fn run<S>(
        &self,
        data: &DataTable,
        mut sink: S,
        progress: &ProgressCounter,
        cancel: &CancelFlag,
    ) -> Result<ExportSummary>
    where
        S: FnMut(&Record, Document) -> Result<()>,
    {
        if self.template.paragraphs().next().is_none() {
            return Err(Error::NoParagraphs);
        }
        let records = qualifying_records(data, &self.fields, self.selection)?;

        let mut summary = ExportSummary::default();
        for record in &records {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                return Ok(summary);
            }

            let mut document = self.template.clone();
            let mut assignments = AssignmentMap::for_document(record.fields(), &document);
            substitute_document(&mut document, &mut assignments, &self.style);
            sink(record, document)?;

            summary.records_written += 1;
            progress.advance(1);
        }
        debug!("document export finished: {} record(s)", summary.records_written);
        Ok(summary)
    }
}

/// Fills the caller's table document in batches, one record per column.
pub struct TableBatchJob {
    fields: FieldSelection,
    selection: RowSelection,
    style: SubstitutionStyle,
}

impl TableBatchJob {
    /// Creates a job reading the given fields.
    pub fn new(fields: FieldSelection) -> Self {
        Self {
            fields,
            selection: RowSelection::All,
            style: SubstitutionStyle::default(),
        }
    }

    /// Restricts which rows are exported.
    pub fn with_selection(mut self, selection: RowSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Overrides the substitution style.
    pub fn with_style(mut self, style: SubstitutionStyle) -> Self {
        self.style = style;
        self
    }

    /// Fills `document` with the qualifying records of `data`.
    pub fn run(
        &self,
        document: &mut Document,
        data: &DataTable,
        progress: &ProgressCounter,
        cancel: &CancelFlag,
    ) -> Result<BatchFillSummary> {
        let records = qualifying_records(data, &self.fields, self.selection)?;
        fill_table_batches(document, &records, &self.style, progress, cancel)
    }
}
