//! In-place placeholder substitution over paragraph runs.
//!
//! Authoring tools routinely split a single visual token across several runs
//! for formatting reasons, so the engine never matches against individual run
//! texts.  It snapshots the paragraph's concatenated text together with each
//! run's byte range, finds every token in the snapshot, and applies the
//! resulting edits back to front so the offsets of still-pending matches stay
//! valid while text lengths change.

use crate::document::{Cell, Document, Paragraph, Run};
use crate::placeholder::{find_tokens, AssignmentMap, TokenMatch};

const DEFAULT_SIZE_PT: f64 = 12.0;

/// Ordered `(max_len, size_pt)` font sizing rules.
///
/// The first rule whose `max_len` is at least the value's character length
/// applies; a value longer than every rule gets the fixed default.  Line break
/// characters do not count towards the length.
#[derive(Clone, Debug, PartialEq)]
pub struct FontSizeRules {
    rules: Vec<(usize, f64)>,
    default_pt: f64,
}

impl FontSizeRules {
    /// Creates a rule set from ordered `(max_len, size_pt)` pairs.
    pub fn new(rules: Vec<(usize, f64)>) -> Self {
        Self {
            rules,
            default_pt: DEFAULT_SIZE_PT,
        }
    }

    /// Overrides the fallback size used when no rule matches.
    pub fn with_default_pt(mut self, size_pt: f64) -> Self {
        self.default_pt = size_pt;
        self
    }

    /// Returns the size in points selected for `value`.
    pub fn size_for(&self, value: &str) -> f64 {
        let length = visible_length(value);
        self.rules
            .iter()
            .find(|(max_len, _)| length <= *max_len)
            .map(|(_, size_pt)| *size_pt)
            .unwrap_or(self.default_pt)
    }
}

impl Default for FontSizeRules {
    fn default() -> Self {
        Self::new(vec![(20, 22.0), (25, 16.0), (9999, 12.0)])
    }
}

fn visible_length(value: &str) -> usize {
    value.chars().filter(|ch| !matches!(ch, '\n' | '\r')).count()
}

/// Sizing rules and the typeface forced onto runs that absorb replacement
/// text.
#[derive(Clone, Debug, PartialEq)]
pub struct SubstitutionStyle {
    rules: FontSizeRules,
    typeface: String,
}

impl SubstitutionStyle {
    /// Creates a style with the provided sizing rules and the default
    /// typeface.
    pub fn new(rules: FontSizeRules) -> Self {
        Self {
            rules,
            typeface: "標楷體".to_string(),
        }
    }

    /// Overrides the forced typeface.
    pub fn with_typeface(mut self, typeface: impl Into<String>) -> Self {
        self.typeface = typeface.into();
        self
    }

    /// Returns the sizing rules.
    pub fn rules(&self) -> &FontSizeRules {
        &self.rules
    }

    /// Returns the forced typeface name.
    pub fn typeface(&self) -> &str {
        &self.typeface
    }

    fn apply_to(&self, run: &mut Run, value: &str) {
        run.set_font_size_pt(self.rules.size_for(value));
        run.set_font_name(self.typeface.clone());
    }
}

impl Default for SubstitutionStyle {
    fn default() -> Self {
        Self::new(FontSizeRules::default())
    }
}

/// Byte range of one run inside the paragraph snapshot.
#[derive(Clone, Copy, Debug)]
struct RunSpan {
    start: usize,
    end: usize,
}

fn snapshot(runs: &[Run]) -> (String, Vec<RunSpan>) {
    let mut text = String::new();
    let mut spans = Vec::with_capacity(runs.len());
    for run in runs {
        let start = text.len();
        text.push_str(run.text());
        spans.push(RunSpan {
            start,
            end: text.len(),
        });
    }
    (text, spans)
}

fn overlapping(spans: &[RunSpan], token: &TokenMatch) -> Vec<usize> {
    spans
        .iter()
        .enumerate()
        .filter(|(_, span)| span.start < token.end && span.end > token.start)
        .map(|(index, _)| index)
        .collect()
}

/// Replaces every placeholder occurrence in `paragraph` with the next
/// unconsumed value for its key and returns the number of replacements.
///
/// A match confined to a single run substitutes in place without touching
/// siblings; a match spanning several runs keeps the first run's prefix and the
/// last run's suffix while the interior is emptied.  The absorbing run gets the
/// rule-selected size and the forced typeface.
pub fn substitute_paragraph(
    paragraph: &mut Paragraph,
    assignments: &mut AssignmentMap,
    style: &SubstitutionStyle,
) -> usize {
    let (text, spans) = snapshot(paragraph.runs());
    let tokens = find_tokens(&text);
    if tokens.is_empty() {
        return 0;
    }

    // Values are consumed in reading order even though edits apply in reverse.
    let edits: Vec<(TokenMatch, String)> = tokens
        .into_iter()
        .map(|token| {
            let value = assignments.next_value(&token.key);
            (token, value)
        })
        .collect();

    for (token, value) in edits.iter().rev() {
        splice_span(paragraph, &spans, token, value, style);
    }
    edits.len()
}

fn splice_span(
    paragraph: &mut Paragraph,
    spans: &[RunSpan],
    token: &TokenMatch,
    value: &str,
    style: &SubstitutionStyle,
) {
    let hits = overlapping(spans, token);
    let (Some(&first), Some(&last)) = (hits.first(), hits.last()) else {
        return;
    };

    for &index in hits.iter().rev() {
        let span = spans[index];
        let run = &mut paragraph.runs_mut()[index];
        if index == first {
            let local_start = token.start - span.start;
            let local_end = if first == last {
                token.end - span.start
            } else {
                run.text().len()
            };
            let mut rebuilt = String::with_capacity(run.text().len() + value.len());
            rebuilt.push_str(&run.text()[..local_start]);
            rebuilt.push_str(value);
            rebuilt.push_str(&run.text()[local_end..]);
            run.set_text(rebuilt);
            style.apply_to(run, value);
        } else if index == last {
            let local_end = token.end - span.start;
            let suffix = run.text()[local_end..].to_string();
            run.set_text(suffix);
        } else {
            run.set_text("");
        }
    }
}

/// Substitutes every free-standing paragraph of `document` and returns the
/// total number of replacements.
pub fn substitute_document(
    document: &mut Document,
    assignments: &mut AssignmentMap,
    style: &SubstitutionStyle,
) -> usize {
    document
        .paragraphs_mut()
        .map(|paragraph| substitute_paragraph(paragraph, assignments, style))
        .sum()
}

/// Writes a single value into a placeholder cell.
///
/// The leftmost match span in the cell's first paragraph absorbs the whole
/// value: its first run is fully replaced and every other overlapping run is
/// cleared.  Any further match spans are cleared entirely.  Returns whether a
/// placeholder was found to write into.
pub fn write_cell(cell: &mut Cell, value: &str, style: &SubstitutionStyle) -> bool {
    let Some(paragraph) = cell.paragraphs_mut().first_mut() else {
        return false;
    };
    let (text, spans) = snapshot(paragraph.runs());
    let tokens = find_tokens(&text);
    if tokens.is_empty() {
        return false;
    }

    // Extra spans clear first so the leftmost span absorbs the value last.
    for (position, token) in tokens.iter().enumerate().rev() {
        let hits = overlapping(&spans, token);
        let Some(&first) = hits.first() else { continue };
        for &index in &hits {
            let run = &mut paragraph.runs_mut()[index];
            if position == 0 && index == first {
                run.set_text(value);
                style.apply_to(run, value);
            } else {
                run.clear();
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Block;
    use std::collections::BTreeMap;

    fn assignments_for(document: &Document, pairs: &[(&str, &str)]) -> AssignmentMap {
        let replacements: BTreeMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AssignmentMap::for_document(&replacements, document)
    }

    #[test]
    fn size_rules_select_by_character_length() {
        let rules = FontSizeRules::new(vec![(8, 22.0), (20, 18.0), (9999, 12.0)]);
        assert_eq!(rules.size_for("王小明"), 22.0);
        assert_eq!(rules.size_for(&"字".repeat(15)), 18.0);
        assert_eq!(rules.size_for(&"字".repeat(30)), 12.0);
    }

    #[test]
    fn line_breaks_do_not_count_towards_the_length() {
        let rules = FontSizeRules::new(vec![(3, 22.0), (9999, 12.0)]);
        assert_eq!(rules.size_for("王\n小\n明"), 22.0);
    }

    #[test]
    fn default_applies_when_no_rule_matches() {
        let rules = FontSizeRules::new(vec![(2, 30.0)]).with_default_pt(9.0);
        assert_eq!(rules.size_for("long value"), 9.0);
    }

    #[test]
    fn token_inside_one_run_keeps_siblings_untouched() {
        let document = Document::new().with_block(Block::Paragraph(Paragraph::new(vec![
            Run::new("Dear {{a}},"),
            Run::new(" welcome"),
        ])));
        let mut assignments = assignments_for(&document, &[("A", "Alice")]);
        let mut document = document;
        let style = SubstitutionStyle::default();

        let replaced = substitute_document(&mut document, &mut assignments, &style);

        assert_eq!(replaced, 1);
        let paragraph = document.paragraphs().next().expect("paragraph exists");
        assert_eq!(paragraph.text(), "Dear Alice, welcome");
        assert_eq!(paragraph.runs()[1].text(), " welcome");
        assert_eq!(paragraph.runs()[1].font_name(), None);
        assert_eq!(paragraph.runs()[0].font_name(), Some("標楷體"));
    }

    #[test]
    fn substitution_is_run_boundary_independent() {
        let splits: Vec<Vec<&str>> = vec![
            vec!["Dear {{a}}!"],
            vec!["Dear {", "{a}}!"],
            vec!["Dear {{", "a", "}}!"],
            vec!["Dear {{a", "}", "}!"],
        ];
        for runs in splits {
            let document = Document::new().with_block(Block::Paragraph(Paragraph::new(
                runs.iter().map(|text| Run::new(*text)).collect::<Vec<_>>(),
            )));
            let mut assignments = assignments_for(&document, &[("A", "Alice")]);
            let mut document = document;

            substitute_document(&mut document, &mut assignments, &SubstitutionStyle::default());

            let paragraph = document.paragraphs().next().expect("paragraph exists");
            assert_eq!(paragraph.text(), "Dear Alice!", "split {runs:?}");
        }
    }

    #[test]
    fn repeated_tokens_consume_values_in_reading_order() {
        let document = Document::new().with_block(Block::Paragraph(Paragraph::of(
            "{{a}} then {{a}} then {{a}}",
        )));
        let mut assignments = assignments_for(&document, &[("A", "one,two")]);
        let mut document = document;

        substitute_document(&mut document, &mut assignments, &SubstitutionStyle::default());

        let paragraph = document.paragraphs().next().expect("paragraph exists");
        assert_eq!(paragraph.text(), "one then two then ");
    }

    #[test]
    fn unassigned_keys_resolve_to_empty_strings() {
        let document =
            Document::new().with_block(Block::Paragraph(Paragraph::of("[{{z}}]")));
        let mut assignments = assignments_for(&document, &[("A", "unused")]);
        let mut document = document;

        substitute_document(&mut document, &mut assignments, &SubstitutionStyle::default());
        let paragraph = document.paragraphs().next().expect("paragraph exists");
        assert_eq!(paragraph.text(), "[]");
    }

    #[test]
    fn no_tokens_leaves_the_paragraph_untouched() {
        let mut paragraph = Paragraph::of("plain text { not a token }");
        let document = Document::new();
        let mut assignments = assignments_for(&document, &[]);

        let replaced =
            substitute_paragraph(&mut paragraph, &mut assignments, &SubstitutionStyle::default());

        assert_eq!(replaced, 0);
        assert_eq!(paragraph.text(), "plain text { not a token }");
    }

    #[test]
    fn cell_write_replaces_the_first_run_and_clears_the_rest() {
        let mut cell = Cell::new(vec![Paragraph::new(vec![
            Run::new("{{").with_attr("highlight", "yellow"),
            Run::new("b"),
            Run::new("}}"),
        ])]);
        let style = SubstitutionStyle::new(FontSizeRules::new(vec![(6, 22.0), (9999, 12.0)]));

        assert!(write_cell(&mut cell, "甲\n乙", &style));

        let runs = cell.paragraphs()[0].runs();
        assert_eq!(runs[0].text(), "甲\n乙");
        assert_eq!(runs[0].font_size_pt(), Some(22.0));
        assert_eq!(runs[1].text(), "");
        assert_eq!(runs[2].text(), "");
        assert_eq!(runs[0].attr("highlight"), Some("yellow"));
    }

    #[test]
    fn extra_cell_spans_are_cleared() {
        let mut cell = Cell::new(vec![Paragraph::new(vec![Run::new("{{b}} {{c}}")])]);
        assert!(write_cell(&mut cell, "value", &SubstitutionStyle::default()));
        assert_eq!(cell.paragraphs()[0].text(), "value");
    }

    #[test]
    fn cell_without_placeholders_is_not_written() {
        let mut cell = Cell::of("static header");
        assert!(!write_cell(&mut cell, "value", &SubstitutionStyle::default()));
        assert_eq!(cell.text(), "static header");
    }
}
