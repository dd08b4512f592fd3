//! Data structures describing the paragraph/run/table content of a rich-text
//! document.
//!
//! The types in this module form the in-memory model that the substitution and
//! pagination engines mutate in place.  They intentionally avoid referencing any
//! concrete file format: a frontend that parses a word-processing document is
//! expected to build this model, hand it to the engines, and persist the result
//! itself.

use std::collections::BTreeMap;

/// A span of text sharing one formatting definition within a paragraph.
///
/// Run boundaries are arbitrary and may fall inside a placeholder token; the
/// substitution engine is built around that fact.  Formatting the engine does
/// not interpret is preserved verbatim in [`Run::attrs`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Run {
    text: String,
    font_name: Option<String>,
    font_size_pt: Option<f64>,
    attrs: BTreeMap<String, String>,
}

impl Run {
    /// Creates a run with the provided text and no explicit formatting.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Returns the raw text contained in this run.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the run's text, leaving formatting untouched.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Returns the explicit typeface name, if any.
    pub fn font_name(&self) -> Option<&str> {
        self.font_name.as_deref()
    }

    /// Sets the typeface name.
    pub fn set_font_name(&mut self, name: impl Into<String>) {
        self.font_name = Some(name.into());
    }

    /// Returns the explicit font size in points, if any.
    pub fn font_size_pt(&self) -> Option<f64> {
        self.font_size_pt
    }

    /// Sets the font size in points.
    pub fn set_font_size_pt(&mut self, size: f64) {
        self.font_size_pt = Some(size);
    }

    /// Attaches an opaque formatting attribute and returns the updated run.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Returns an opaque formatting attribute, if present.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Empties the run and discards its formatting.
    pub fn clear(&mut self) {
        self.text.clear();
        self.font_name = None;
        self.font_size_pt = None;
        self.attrs.clear();
    }
}

/// An ordered sequence of runs.
///
/// Invariant: the concatenation of all run texts is the paragraph's visible
/// text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Paragraph {
    runs: Vec<Run>,
}

impl Paragraph {
    /// Creates a paragraph from the provided runs.
    pub fn new(runs: impl Into<Vec<Run>>) -> Self {
        Self { runs: runs.into() }
    }

    /// Creates a paragraph holding a single run with the provided text.
    pub fn of(text: impl Into<String>) -> Self {
        Self::new(vec![Run::new(text)])
    }

    /// Returns the runs that make up the paragraph.
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Returns mutable access to the runs.
    pub fn runs_mut(&mut self) -> &mut [Run] {
        &mut self.runs
    }

    /// Appends a run.
    pub fn push_run(&mut self, run: Run) {
        self.runs.push(run);
    }

    /// Returns the paragraph's visible text (all run texts concatenated).
    pub fn text(&self) -> String {
        self.runs.iter().map(Run::text).collect()
    }
}

/// A table cell owning one or more paragraphs.
///
/// Only the first paragraph is used when writing values into a cell; the
/// single-value-per-cell convention of the template family.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cell {
    paragraphs: Vec<Paragraph>,
}

impl Cell {
    /// Creates a cell from the provided paragraphs.
    pub fn new(paragraphs: impl Into<Vec<Paragraph>>) -> Self {
        Self {
            paragraphs: paragraphs.into(),
        }
    }

    /// Creates a cell holding a single single-run paragraph.
    pub fn of(text: impl Into<String>) -> Self {
        Self::new(vec![Paragraph::of(text)])
    }

    /// Returns the paragraphs owned by the cell.
    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    /// Returns mutable access to the paragraphs.
    pub fn paragraphs_mut(&mut self) -> &mut [Paragraph] {
        &mut self.paragraphs
    }

    /// Returns the cell's visible text, paragraphs joined by line breaks.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A fixed-size grid of cells indexed `[row][column]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Creates an empty table with the given dimensions.
    pub fn new(row_count: usize, column_count: usize) -> Self {
        Self {
            rows: (0..row_count)
                .map(|_| (0..column_count).map(|_| Cell::default()).collect())
                .collect(),
        }
    }

    /// Creates a table from pre-built rows of cells.
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the number of columns (width of the widest row).
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Returns the rows of the table.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Returns the cell at `(row, column)`, if present.
    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|cells| cells.get(column))
    }

    /// Returns mutable access to the cell at `(row, column)`, if present.
    pub fn cell_mut(&mut self, row: usize, column: usize) -> Option<&mut Cell> {
        self.rows.get_mut(row).and_then(|cells| cells.get_mut(column))
    }
}

/// Individual content blocks that make up a document.
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    /// A free-standing paragraph.
    Paragraph(Paragraph),
    /// A table.
    Table(Table),
    /// Explicit page break request.
    PageBreak,
}

/// An ordered sequence of content blocks.
///
/// The document is owned by the caller for its whole lifetime; the engines
/// mutate it in place and never retain a reference after an operation returns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    blocks: Vec<Block>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block and returns the updated document.
    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    /// Appends a block.
    pub fn push_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Returns the blocks in document order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Iterates over the free-standing paragraphs in document order.
    ///
    /// Paragraphs inside table cells are reached through their tables, not
    /// through this iterator.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Paragraph(paragraph) => Some(paragraph),
            _ => None,
        })
    }

    /// Iterates mutably over the free-standing paragraphs in document order.
    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> {
        self.blocks.iter_mut().filter_map(|block| match block {
            Block::Paragraph(paragraph) => Some(paragraph),
            _ => None,
        })
    }

    /// Iterates over the tables in document order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Table(table) => Some(table),
            _ => None,
        })
    }

    /// Returns the block index of the first table, if any.
    pub fn first_table_block(&self) -> Option<usize> {
        self.blocks
            .iter()
            .position(|block| matches!(block, Block::Table(_)))
    }

    /// Returns the table stored at the given block index, if that block is one.
    pub fn table_at(&self, block_index: usize) -> Option<&Table> {
        match self.blocks.get(block_index) {
            Some(Block::Table(table)) => Some(table),
            _ => None,
        }
    }

    /// Returns mutable access to the table at the given block index.
    pub fn table_at_mut(&mut self, block_index: usize) -> Option<&mut Table> {
        match self.blocks.get_mut(block_index) {
            Some(Block::Table(table)) => Some(table),
            _ => None,
        }
    }

    /// Inserts a page break followed by `table` directly after `block_index`
    /// and returns the new table's block index.
    pub fn insert_table_after(&mut self, block_index: usize, table: Table) -> usize {
        let at = (block_index + 1).min(self.blocks.len());
        self.blocks.insert(at, Block::PageBreak);
        self.blocks.insert(at + 1, Block::Table(table));
        at + 1
    }
}
