//! Placeholder token discovery and value assignment.
//!
//! Placeholders are `{{ key }}` markers where the key is one or more ASCII
//! letters; matching is case-insensitive and key identity is the uppercased
//! form.  Tokens are matched over each paragraph's concatenated run text, so a
//! token split across run boundaries is still found.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::{Document, Table};

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z]+)\s*\}\}").expect("placeholder pattern is valid"));

/// A placeholder occurrence within a piece of text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TokenMatch {
    /// Byte offset of the opening brace.
    pub start: usize,
    /// Byte offset one past the closing brace.
    pub end: usize,
    /// Uppercased key.
    pub key: String,
}

/// Finds every placeholder token in `text`, in left-to-right order.
pub(crate) fn find_tokens(text: &str) -> Vec<TokenMatch> {
    TOKEN
        .captures_iter(text)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let key = captures.get(1)?.as_str().to_uppercase();
            Some(TokenMatch {
                start: whole.start(),
                end: whole.end(),
                key,
            })
        })
        .collect()
}

/// Ordered per-key value assignments consumed by occurrence position.
///
/// Built once per document per invocation.  In free-text mode every key carries
/// exactly as many values as its token occurs in the document: raw values are
/// split on commas, padded with empty strings when short, and the surplus tail
/// is collapsed into the final slot when long.  The mismatch recovery never
/// fails; the engine favors producing output over rejecting input.
#[derive(Clone, Debug, Default)]
pub struct AssignmentMap {
    values: BTreeMap<String, Vec<String>>,
    cursors: BTreeMap<String, usize>,
}

impl AssignmentMap {
    /// Builds the free-text assignment map for `document`.
    ///
    /// `replacements` maps keys to raw comma-separated value lists.  Keys whose
    /// token never occurs get an empty list and are silently ignored.
    pub fn for_document(replacements: &BTreeMap<String, String>, document: &Document) -> Self {
        let mut counts: BTreeMap<String, usize> = replacements
            .keys()
            .map(|key| (key.to_uppercase(), 0))
            .collect();
        for paragraph in document.paragraphs() {
            for token in find_tokens(&paragraph.text()) {
                if let Some(count) = counts.get_mut(&token.key) {
                    *count += 1;
                }
            }
        }

        let mut values = BTreeMap::new();
        for (key, raw) in replacements {
            let key = key.to_uppercase();
            let occurrences = counts.get(&key).copied().unwrap_or(0);
            values.insert(key, assign_values(raw, occurrences));
        }
        Self {
            values,
            cursors: BTreeMap::new(),
        }
    }

    /// Returns the assigned value list for `key` (empty when unknown).
    pub fn values(&self, key: &str) -> &[String] {
        self.values
            .get(&key.to_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Consumes and returns the next value for `key`.
    ///
    /// Exhausted and unknown keys yield an empty string; the cursor advances on
    /// every consumption regardless.
    pub fn next_value(&mut self, key: &str) -> String {
        let key = key.to_uppercase();
        let cursor = self.cursors.entry(key.clone()).or_insert(0);
        let value = self
            .values
            .get(&key)
            .and_then(|list| list.get(*cursor))
            .cloned()
            .unwrap_or_default();
        *cursor += 1;
        value
    }
}

/// Stretches or squeezes the comma-separated candidates of `raw` to exactly
/// `occurrences` values.
fn assign_values(raw: &str, occurrences: usize) -> Vec<String> {
    if occurrences == 0 {
        return Vec::new();
    }

    let mut candidates: Vec<String> = if raw.is_empty() {
        vec![String::new()]
    } else {
        raw.split(',')
            .map(str::trim)
            .filter(|candidate| !candidate.is_empty())
            .map(str::to_string)
            .collect()
    };

    if candidates.len() < occurrences {
        candidates.resize(occurrences, String::new());
    } else if candidates.len() > occurrences {
        let tail = candidates.split_off(occurrences - 1);
        candidates.push(tail.join(","));
    }
    candidates
}

/// Placeholder layout of a table template.
///
/// Maps each column index to the ordered `(row, keys)` entries found by a
/// single scan over every cell.  The highest column index carrying an entry is
/// the template column, the anchor of right-to-left batch filling.
#[derive(Clone, Debug, Default)]
pub struct PlaceholderMap {
    columns: BTreeMap<usize, Vec<(usize, Vec<String>)>>,
    template_column: Option<usize>,
}

impl PlaceholderMap {
    /// Scans every cell of `table` once and records per-column placeholders.
    pub fn scan(table: &Table) -> Self {
        let mut columns: BTreeMap<usize, Vec<(usize, Vec<String>)>> = BTreeMap::new();
        for (row_index, row) in table.rows().iter().enumerate() {
            for (column_index, cell) in row.iter().enumerate() {
                let mut keys = Vec::new();
                for paragraph in cell.paragraphs() {
                    for token in find_tokens(&paragraph.text()) {
                        keys.push(token.key);
                    }
                }
                if !keys.is_empty() {
                    columns
                        .entry(column_index)
                        .or_default()
                        .push((row_index, keys));
                }
            }
        }
        let template_column = columns.keys().next_back().copied();
        Self {
            columns,
            template_column,
        }
    }

    /// Returns the template column, or `None` for a table without any
    /// placeholder cells.
    pub fn template_column(&self) -> Option<usize> {
        self.template_column
    }

    /// Returns the `(row, keys)` entries registered at `column`.
    pub fn entries(&self, column: usize) -> &[(usize, Vec<String>)] {
        self.columns
            .get(&column)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Block, Cell, Paragraph, Run};

    #[test]
    fn tokens_match_case_insensitively_with_padding() {
        let tokens = find_tokens("to {{ b }} and {{C}} and {{b}}");
        let keys: Vec<_> = tokens.iter().map(|token| token.key.as_str()).collect();
        assert_eq!(keys, ["B", "C", "B"]);
    }

    #[test]
    fn short_value_lists_pad_with_empty_strings() {
        assert_eq!(assign_values("x,y", 4), ["x", "y", "", ""]);
    }

    #[test]
    fn long_value_lists_collapse_into_the_last_slot() {
        assert_eq!(assign_values("a, b, c, d, e", 3), ["a", "b", "c,d,e"]);
    }

    #[test]
    fn empty_raw_value_still_fills_every_occurrence() {
        assert_eq!(assign_values("", 2), ["", ""]);
        assert_eq!(assign_values(" , ,", 2), ["", ""]);
        assert!(assign_values("a,b", 0).is_empty());
    }

    #[test]
    fn occurrences_are_counted_across_run_boundaries() {
        let document = Document::new()
            .with_block(Block::Paragraph(Paragraph::new(vec![
                Run::new("{{"),
                Run::new("b}} and {{b}}"),
            ])))
            .with_block(Block::Paragraph(Paragraph::of("{{b}}")));

        let replacements = BTreeMap::from([("B".to_string(), "1,2".to_string())]);
        let map = AssignmentMap::for_document(&replacements, &document);
        assert_eq!(map.values("b"), ["1", "2", ""]);
    }

    #[test]
    fn cursor_consumes_values_in_order_and_then_runs_dry() {
        let document =
            Document::new().with_block(Block::Paragraph(Paragraph::of("{{a}} {{a}}")));
        let replacements = BTreeMap::from([("A".to_string(), "first,second".to_string())]);
        let mut map = AssignmentMap::for_document(&replacements, &document);

        assert_eq!(map.next_value("a"), "first");
        assert_eq!(map.next_value("A"), "second");
        assert_eq!(map.next_value("a"), "");
        assert_eq!(map.next_value("unknown"), "");
    }

    #[test]
    fn scan_finds_the_rightmost_placeholder_column() {
        let table = Table::from_rows(vec![
            vec![Cell::of("static"), Cell::of("{{b}}"), Cell::of("{{c}}\u{ff1a}")],
            vec![Cell::of(""), Cell::of(""), Cell::of("{{d}} {{e}}")],
        ]);
        let map = PlaceholderMap::scan(&table);

        assert_eq!(map.template_column(), Some(2));
        let entries = map.entries(2);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], (0, vec!["C".to_string()]));
        assert_eq!(entries[1], (1, vec!["D".to_string(), "E".to_string()]));
        assert!(map.entries(0).is_empty());
    }
}
