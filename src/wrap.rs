//! Keyword- and length-aware label line wrapping.
//!
//! Wrapping happens in two stages: configured keywords carve the text into
//! segments, then every segment is hard-wrapped at a character limit.  One
//! keyword may be flagged exclusive; it splits the text a single time, keeping
//! the keyword at the start of the suffix, while every other keyword splits
//! repeatedly after each occurrence.

/// A split keyword.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrapKeyword {
    text: String,
    exclusive: bool,
}

impl WrapKeyword {
    /// Creates a keyword that splits after each of its occurrences.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exclusive: false,
        }
    }

    /// Creates an exclusive keyword: it fires once, splitting the text into a
    /// prefix and a keyword-starting suffix.
    pub fn exclusive(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exclusive: true,
        }
    }

    /// Returns the keyword text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns whether the keyword is exclusive.
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }
}

/// Wrap configuration for one label: a character limit and the keyword list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WrapRules {
    limit: usize,
    keywords: Vec<WrapKeyword>,
}

impl WrapRules {
    /// Creates rules with the given character limit and no keywords.
    ///
    /// A zero limit disables hard wrapping.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            keywords: Vec::new(),
        }
    }

    /// Adds a keyword and returns the updated rules.
    pub fn with_keyword(mut self, keyword: WrapKeyword) -> Self {
        self.keywords.push(keyword);
        self
    }

    /// Returns the character limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the configured keywords.
    pub fn keywords(&self) -> &[WrapKeyword] {
        &self.keywords
    }
}

/// Splits `text` into display lines under `rules`.
///
/// Segments are trimmed before chunking; segments that trim to nothing are
/// dropped.  The function is pure and its output finite.
pub fn wrap_label(text: &str, rules: &WrapRules) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();

    // The first exclusive keyword fires once, on the whole text.
    if let Some(keyword) = rules.keywords().iter().find(|keyword| keyword.is_exclusive()) {
        if let Some(position) = text.find(keyword.text()) {
            if position > 0 {
                segments.push(text[..position].to_string());
            }
            segments.push(text[position..].to_string());
        }
    }
    if segments.is_empty() {
        segments.push(text.to_string());
    }

    for keyword in rules.keywords().iter().filter(|keyword| !keyword.is_exclusive()) {
        segments = segments
            .iter()
            .flat_map(|segment| split_after(segment, keyword.text()))
            .collect();
    }

    let mut lines = Vec::new();
    for segment in &segments {
        let trimmed = segment.trim();
        if trimmed.is_empty() {
            continue;
        }
        hard_wrap(trimmed, rules.limit(), &mut lines);
    }
    lines
}

/// Splits `segment` after every occurrence of `keyword`, keeping the keyword
/// at the end of the preceding piece.
fn split_after(segment: &str, keyword: &str) -> Vec<String> {
    if keyword.is_empty() {
        return vec![segment.to_string()];
    }
    let mut pieces = Vec::new();
    let mut rest = segment;
    while let Some(position) = rest.find(keyword) {
        let cut = position + keyword.len();
        pieces.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    if !rest.is_empty() || pieces.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}

fn hard_wrap(segment: &str, limit: usize, lines: &mut Vec<String>) {
    if limit == 0 {
        lines.push(segment.to_string());
        return;
    }
    let chars: Vec<char> = segment.chars().collect();
    for chunk in chars.chunks(limit) {
        lines.push(chunk.iter().collect());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_wraps_at_the_character_limit() {
        let rules = WrapRules::new(4);
        assert_eq!(wrap_label("abcdefghij", &rules), ["abcd", "efgh", "ij"]);
    }

    #[test]
    fn lines_reconstruct_the_trimmed_input_without_keywords() {
        let rules = WrapRules::new(3);
        let input = "  some longer label text ";
        let lines = wrap_label(input, &rules);

        assert!(lines.iter().all(|line| line.chars().count() <= 3));
        assert_eq!(lines.concat(), input.trim());
    }

    #[test]
    fn exclusive_keyword_splits_once_keeping_the_keyword_in_the_suffix() {
        let rules = WrapRules::new(6).with_keyword(WrapKeyword::exclusive("金紙"));
        let lines = wrap_label("台北市某某商店金紙3份", &rules);
        assert_eq!(lines, ["台北市某某商", "店", "金紙3份"]);
    }

    #[test]
    fn exclusive_keyword_at_the_start_yields_no_prefix() {
        let rules = WrapRules::new(10).with_keyword(WrapKeyword::exclusive("金紙"));
        assert_eq!(wrap_label("金紙3份", &rules), ["金紙3份"]);
    }

    #[test]
    fn repeated_keyword_splits_after_every_occurrence() {
        let rules = WrapRules::new(0).with_keyword(WrapKeyword::new("號"));
        assert_eq!(
            wrap_label("三號五號七巷", &rules),
            ["三號", "五號", "七巷"]
        );
    }

    #[test]
    fn absent_keywords_change_nothing() {
        let rules = WrapRules::new(0)
            .with_keyword(WrapKeyword::exclusive("missing"))
            .with_keyword(WrapKeyword::new("also-missing"));
        assert_eq!(wrap_label("unchanged", &rules), ["unchanged"]);
    }

    #[test]
    fn zero_limit_disables_hard_wrapping() {
        let rules = WrapRules::new(0);
        assert_eq!(wrap_label("a very long label", &rules), ["a very long label"]);
    }

    #[test]
    fn blank_segments_are_dropped() {
        let rules = WrapRules::new(5).with_keyword(WrapKeyword::new(","));
        assert_eq!(wrap_label("a,  ,b", &rules), ["a,", ",", "b"]);
        assert!(wrap_label("   ", &rules.clone()).is_empty());
    }
}
