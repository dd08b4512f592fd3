//! Column-wise batch filling of table templates with page duplication.
//!
//! A table template holds one record per column, anchored at the rightmost
//! placeholder column and filling leftward.  When a table's capacity runs out
//! a fresh copy of the pristine template is inserted after a page break and
//! filling continues there.  Duplicates are always cloned from the template as
//! it looked before any data landed, never from an already-filled instance.

use log::debug;

use crate::data::Record;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::export::{CancelFlag, ProgressCounter};
use crate::placeholder::PlaceholderMap;
use crate::substitute::{write_cell, SubstitutionStyle};

/// Outcome of one batch-fill invocation.
#[derive(Clone, Copy, Debug, Default)]
pub struct BatchFillSummary {
    /// Records written into the document.
    pub records_written: usize,
    /// Table instances the records landed in (original plus clones).
    pub tables_filled: usize,
    /// Whether the run stopped early at a cancellation check.
    pub cancelled: bool,
}

/// Fills the first table of `document` with `records`, duplicating the table
/// onto new pages as needed.
///
/// Returns [`Error::NoProgress`] when a batch writes nothing, which would
/// otherwise loop forever on a malformed template.  Progress advances by
/// records after each batch; cancellation is honored between batches.
pub fn fill_table_batches(
    document: &mut Document,
    records: &[Record],
    style: &SubstitutionStyle,
    progress: &ProgressCounter,
    cancel: &CancelFlag,
) -> Result<BatchFillSummary> {
    let table_block = document.first_table_block().ok_or(Error::NoTable)?;
    let (placeholder_map, pristine) = {
        let table = document.table_at(table_block).ok_or(Error::NoTable)?;
        (PlaceholderMap::scan(table), table.clone())
    };
    let template_column = placeholder_map
        .template_column()
        .ok_or(Error::NoProgress { record: 0 })?;
    let column_count = template_column + 1;

    let mut summary = BatchFillSummary::default();
    let mut current_block = table_block;
    while summary.records_written < records.len() {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            return Ok(summary);
        }

        let batch_end = (summary.records_written + column_count).min(records.len());
        let batch = &records[summary.records_written..batch_end];
        let table = document
            .table_at_mut(current_block)
            .ok_or(Error::NoTable)?;
        let written = fill_batch(table, &placeholder_map, template_column, batch, style);
        if written == 0 {
            return Err(Error::NoProgress {
                record: summary.records_written,
            });
        }

        summary.records_written += written;
        summary.tables_filled += 1;
        progress.advance(written);
        debug!(
            "filled table instance {} ({}/{} records)",
            summary.tables_filled,
            summary.records_written,
            records.len()
        );

        if summary.records_written < records.len() {
            current_block = document.insert_table_after(current_block, pristine.clone());
        }
    }
    Ok(summary)
}

/// Writes one batch into `table`, rightmost column first, and returns how many
/// records landed.
fn fill_batch(
    table: &mut crate::document::Table,
    placeholder_map: &PlaceholderMap,
    template_column: usize,
    batch: &[Record],
    style: &SubstitutionStyle,
) -> usize {
    let mut written = 0;
    for (batch_index, record) in batch.iter().enumerate() {
        let target_column = template_column - batch_index;
        let mut wrote_any = false;
        for (row, keys) in placeholder_map.entries(template_column) {
            let value = keys
                .iter()
                .map(|key| record.field(key))
                .collect::<Vec<_>>()
                .join("\n");
            if let Some(cell) = table.cell_mut(*row, target_column) {
                wrote_any |= write_cell(cell, &value, style);
            }
        }
        if wrote_any {
            written += 1;
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Block, Cell, Paragraph, Run, Table};

    fn template_table(columns: usize) -> Table {
        // Two data rows per column: a name cell and an address cell.
        Table::from_rows(vec![
            (0..columns).map(|_| Cell::of("{{b}}")).collect(),
            (0..columns).map(|_| Cell::of("{{c}}\n{{d}}")).collect(),
        ])
    }

    fn records(count: usize) -> Vec<Record> {
        (0..count)
            .map(|index| {
                Record::new()
                    .with_field("b", format!("name-{index}"))
                    .with_field("c", format!("city-{index}"))
                    .with_field("d", format!("street-{index}"))
            })
            .collect()
    }

    #[test]
    fn records_fill_right_to_left_across_cloned_tables() {
        let mut document = Document::new().with_block(Block::Table(template_table(5)));
        let summary = fill_table_batches(
            &mut document,
            &records(12),
            &SubstitutionStyle::default(),
            &ProgressCounter::new(),
            &CancelFlag::new(),
        )
        .expect("fill succeeds");

        assert_eq!(summary.records_written, 12);
        assert_eq!(summary.tables_filled, 3);
        assert!(!summary.cancelled);

        let tables: Vec<&Table> = document.tables().collect();
        assert_eq!(tables.len(), 3);

        // Record i lands in instance i / 5 at column 4 - (i % 5).
        assert_eq!(tables[0].cell(0, 4).map(Cell::text), Some("name-0".into()));
        assert_eq!(tables[0].cell(0, 0).map(Cell::text), Some("name-4".into()));
        assert_eq!(tables[1].cell(0, 4).map(Cell::text), Some("name-5".into()));
        assert_eq!(tables[2].cell(0, 4).map(Cell::text), Some("name-10".into()));
        assert_eq!(tables[2].cell(0, 3).map(Cell::text), Some("name-11".into()));

        // The tail columns of the last instance keep the template defaults.
        assert_eq!(tables[2].cell(0, 2).map(Cell::text), Some("{{b}}".into()));

        // Cell values carrying several keys join with line breaks.
        assert_eq!(
            tables[0].cell(1, 4).map(Cell::text),
            Some("city-0\nstreet-0".into())
        );
    }

    #[test]
    fn every_clone_comes_from_the_pristine_template() {
        let mut document = Document::new().with_block(Block::Table(template_table(2)));
        fill_table_batches(
            &mut document,
            &records(5),
            &SubstitutionStyle::default(),
            &ProgressCounter::new(),
            &CancelFlag::new(),
        )
        .expect("fill succeeds");

        // 5 records over 2 columns: three instances, the last one half full.
        let tables: Vec<&Table> = document.tables().collect();
        assert_eq!(tables.len(), 3);
        assert_eq!(tables[2].cell(0, 1).map(Cell::text), Some("name-4".into()));
        assert_eq!(tables[2].cell(0, 0).map(Cell::text), Some("{{b}}".into()));
    }

    #[test]
    fn page_breaks_separate_cloned_tables() {
        let mut document = Document::new().with_block(Block::Table(template_table(1)));
        fill_table_batches(
            &mut document,
            &records(2),
            &SubstitutionStyle::default(),
            &ProgressCounter::new(),
            &CancelFlag::new(),
        )
        .expect("fill succeeds");

        let blocks = document.blocks();
        assert!(matches!(blocks[0], Block::Table(_)));
        assert!(matches!(blocks[1], Block::PageBreak));
        assert!(matches!(blocks[2], Block::Table(_)));
    }

    #[test]
    fn a_table_without_placeholders_cannot_make_progress() {
        let table = Table::from_rows(vec![vec![Cell::of("static")]]);
        let mut document = Document::new().with_block(Block::Table(table));
        let err = fill_table_batches(
            &mut document,
            &records(1),
            &SubstitutionStyle::default(),
            &ProgressCounter::new(),
            &CancelFlag::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NoProgress { record: 0 }));
    }

    #[test]
    fn a_document_without_tables_is_rejected() {
        let mut document = Document::new().with_block(Block::Paragraph(Paragraph::new(vec![
            Run::new("no table here"),
        ])));
        let err = fill_table_batches(
            &mut document,
            &records(1),
            &SubstitutionStyle::default(),
            &ProgressCounter::new(),
            &CancelFlag::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NoTable));
    }

    #[test]
    fn cancellation_stops_between_batches() {
        let mut document = Document::new().with_block(Block::Table(template_table(2)));
        let cancel = CancelFlag::new();
        cancel.cancel();

        let summary = fill_table_batches(
            &mut document,
            &records(4),
            &SubstitutionStyle::default(),
            &ProgressCounter::new(),
            &cancel,
        )
        .expect("cancellation is not an error");

        assert!(summary.cancelled);
        assert_eq!(summary.records_written, 0);
    }

    #[test]
    fn progress_advances_per_batch() {
        let mut document = Document::new().with_block(Block::Table(template_table(3)));
        let progress = ProgressCounter::new();
        fill_table_batches(
            &mut document,
            &records(7),
            &SubstitutionStyle::default(),
            &progress,
            &CancelFlag::new(),
        )
        .expect("fill succeeds");
        assert_eq!(progress.get(), 7);
    }
}
