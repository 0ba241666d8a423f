//! Context excerpts around literal occurrences of the submitted term.
//!
//! Matching is a plain case-insensitive substring scan, unrelated to the
//! analysed terms the index matched on. Offsets and window sizes count
//! characters, not bytes.

use serde::Serialize;

/// Characters of context kept on each side of a match
pub const CONTEXT_CHARS: usize = 100;

/// Length of the leading excerpt shown when the term never occurs literally
pub const LEADING_CHARS: usize = 400;

const ELLIPSIS: &str = "...";

/// A bounded slice of a document body with an optional marked match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Excerpt {
    /// The window starts after the beginning of the text
    pub leading_ellipsis: bool,
    pub before: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
    pub after: String,
    /// The window ends before the end of the text
    pub trailing_ellipsis: bool,
}

impl Excerpt {
    /// Excerpt text with ellipses and no match marking
    pub fn plain(&self) -> String {
        self.marked("", "")
    }

    /// Excerpt text with the match wrapped in `open` and `close`
    pub fn marked(&self, open: &str, close: &str) -> String {
        let mut out = String::new();
        if self.leading_ellipsis {
            out.push_str(ELLIPSIS);
        }
        out.push_str(&self.before);
        if let Some(matched) = &self.matched {
            out.push_str(open);
            out.push_str(matched);
            out.push_str(close);
        }
        out.push_str(&self.after);
        if self.trailing_ellipsis {
            out.push_str(ELLIPSIS);
        }
        out
    }
}

/// Lowercase one character without changing the character count
fn fold(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}

fn find_from(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&at| haystack[at..at + needle.len()] == *needle)
}

/// One excerpt per non-overlapping occurrence of `term` in `text`
pub fn highlight(text: &str, term: &str) -> Vec<Excerpt> {
    if term.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let folded: Vec<char> = chars.iter().copied().map(fold).collect();
    let needle: Vec<char> = term.chars().map(fold).collect();
    let slice = |from: usize, to: usize| chars[from..to].iter().collect::<String>();

    let mut excerpts = Vec::new();
    let mut cursor = 0;
    while let Some(idx) = find_from(&folded, &needle, cursor) {
        let match_end = idx + needle.len();
        let start = idx.saturating_sub(CONTEXT_CHARS);
        let end = (match_end + CONTEXT_CHARS).min(chars.len());

        excerpts.push(Excerpt {
            leading_ellipsis: start > 0,
            before: slice(start, idx),
            matched: Some(slice(idx, match_end)),
            after: slice(match_end, end),
            trailing_ellipsis: end < chars.len(),
        });
        cursor = match_end;
    }
    excerpts
}

/// The beginning of a text, for results without a literal occurrence
pub fn leading_excerpt(text: &str) -> Excerpt {
    let mut chars = text.chars();
    let before: String = chars.by_ref().take(LEADING_CHARS).collect();
    Excerpt {
        leading_ellipsis: false,
        before,
        matched: None,
        after: String::new(),
        trailing_ellipsis: chars.next().is_some(),
    }
}

/// Excerpts to display for a result body: the highlighted occurrences, or the
/// leading excerpt when there are none. An empty body shows nothing.
pub fn excerpts_for(text: Option<&str>, term: &str) -> Vec<Excerpt> {
    let Some(text) = text.filter(|text| !text.is_empty()) else {
        return Vec::new();
    };
    let excerpts = highlight(text, term);
    if excerpts.is_empty() {
        vec![leading_excerpt(text)]
    } else {
        excerpts
    }
}
