//! Reference state machine
//!
//! The tracker follows `\id`, `\c` and `\v` markers and knows the first and
//! last reference of whatever segment is being built. Every segment between
//! two reference-changing markers carries the same pair.

use crate::mapping::{CHAPTER_MARKER, ID_MARKER, VERSE_MARKER};
use crate::reference::{book_number, BcvRef};

const RTL_MARK: char = '\u{200F}';
const UNICODE_HYPHEN: char = '\u{2010}';

/// The leading verse number of a `\v` segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerseLiteral {
    /// Exactly as written, e.g. `2-3a` or `7.`
    pub literal: String,
    pub start: u16,
    pub start_letter: Option<char>,
    /// Right side of a bridge; `None` when absent or left empty (`5-`)
    pub end: Option<u16>,
    pub end_letter: Option<char>,
}

/// Split the text after `\v` into its verse literal and the remaining text
///
/// Returns `None` for the literal when the text does not start with a
/// number; the remainder is then the text with leading whitespace removed.
pub fn parse_verse_literal(text: &str) -> (Option<VerseLiteral>, &str) {
    let text = text.trim_start();
    let Some((start, mut i)) = number_at(text, 0) else {
        return (None, text);
    };
    let mut after_digit = true;

    let start_letter = letter_at(text, i);
    if start_letter.is_some() {
        i += 1;
        after_digit = false;
    }

    let mut end = None;
    let mut end_letter = None;
    if let Some(sep_len) = bridge_separator_at(text, i) {
        i += sep_len;
        after_digit = false;
        if let Some((value, j)) = number_at(text, i) {
            end = Some(value);
            i = j;
            after_digit = true;
            end_letter = letter_at(text, i);
            if end_letter.is_some() {
                i += 1;
                after_digit = false;
            }
        }
    }

    // `7.` keeps its period; after a letter the period is text
    if after_digit && text[i..].starts_with('.') {
        i += 1;
    }

    let literal = VerseLiteral {
        literal: text[..i].to_string(),
        start,
        start_letter,
        end,
        end_letter,
    };
    (Some(literal), skip_one_space(&text[i..]))
}

/// ASCII digits at byte `i`, saturating at `u16::MAX`
fn number_at(text: &str, i: usize) -> Option<(u16, usize)> {
    let digits = text[i..].bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let value = text[i..i + digits]
        .bytes()
        .fold(0u16, |acc, b| acc.saturating_mul(10).saturating_add((b - b'0') as u16));
    Some((value, i + digits))
}

/// A lowercase sub-verse letter at byte `i` that is not the start of a word
fn letter_at(text: &str, i: usize) -> Option<char> {
    let mut chars = text[i..].chars();
    let c = chars.next().filter(char::is_ascii_lowercase)?;
    match chars.next() {
        Some(next) if next.is_alphabetic() => None,
        _ => Some(c),
    }
}

/// Byte length of a bridge hyphen at `i`, optionally wrapped in RTL marks
fn bridge_separator_at(text: &str, i: usize) -> Option<usize> {
    let rest = &text[i..];
    let mut len = 0;
    if rest.starts_with(RTL_MARK) {
        len += RTL_MARK.len_utf8();
    }
    let hyphen = rest[len..].chars().next().filter(|&c| c == '-' || c == UNICODE_HYPHEN)?;
    len += hyphen.len_utf8();
    if rest[len..].starts_with(RTL_MARK) {
        len += RTL_MARK.len_utf8();
    }
    Some(len)
}

fn skip_one_space(text: &str) -> &str {
    match text.chars().next() {
        Some(c) if c.is_whitespace() => &text[c.len_utf8()..],
        _ => text,
    }
}

/// Text and literal verse number after a marker was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceUpdate {
    pub text: String,
    pub literal_verse: Option<String>,
}

/// Current book/chapter/verse/segment state
#[derive(Debug, Clone, Default)]
pub struct ReferenceTracker {
    first: BcvRef,
    last: BcvRef,
    seen_id: bool,
}

impl ReferenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first(&self) -> BcvRef {
        self.first
    }

    pub fn last(&self) -> BcvRef {
        self.last
    }

    /// Whether the current file has had an `\id` line yet
    pub fn seen_id_in_file(&self) -> bool {
        self.seen_id
    }

    fn set(&mut self, first: BcvRef, last: BcvRef) {
        self.first = first;
        self.last = last;
    }

    /// Prepare for the next file of the stream
    ///
    /// A file declared to start a different book implies a book boundary
    /// even when it has no `\id` line; otherwise the state carries over.
    pub fn enter_file(&mut self, declared_book: Option<u16>) {
        self.seen_id = false;
        if let Some(book) = declared_book.filter(|&b| b != self.last.book) {
            let start = BcvRef::book_start(book);
            self.set(start, start);
        }
    }

    /// Apply the segment opened by `marker` and split off its reference text
    pub fn apply(&mut self, marker: &str, text: &str, declared_book: Option<u16>) -> ReferenceUpdate {
        match marker {
            ID_MARKER => {
                self.apply_id(text, declared_book);
                ReferenceUpdate { text: text.to_string(), literal_verse: None }
            }
            CHAPTER_MARKER => ReferenceUpdate { text: self.apply_chapter(text), literal_verse: None },
            VERSE_MARKER => {
                let (literal, rest) = self.apply_verse(text);
                ReferenceUpdate { text: rest, literal_verse: Some(literal) }
            }
            _ => ReferenceUpdate { text: text.to_string(), literal_verse: None },
        }
    }

    fn apply_id(&mut self, text: &str, declared_book: Option<u16>) {
        self.seen_id = true;
        let code = text.split_whitespace().next().unwrap_or("");
        let book = match book_number(code) {
            Some(book) => book,
            None => {
                let fallback = declared_book.unwrap_or(self.last.book);
                tracing::warn!(code, fallback, "unknown book code in \\id line");
                fallback
            }
        };
        let start = BcvRef::book_start(book);
        self.set(start, start);
    }

    fn apply_chapter(&mut self, text: &str) -> String {
        let trimmed = text.trim_start();
        match number_at(trimmed, 0) {
            Some((chapter, end)) => {
                let r = BcvRef::new(self.last.book, chapter, 1);
                self.set(r, r);
                skip_one_space(&trimmed[end..]).to_string()
            }
            None => text.to_string(),
        }
    }

    fn apply_verse(&mut self, text: &str) -> (String, String) {
        let (parsed, rest) = parse_verse_literal(text);
        let Some(lit) = parsed else {
            return (String::new(), rest.to_string());
        };

        let prev = self.last;
        let start_segment = match lit.start_letter {
            Some(_) if lit.start == prev.verse && prev.segment > 0 => prev.segment + 1,
            Some(_) => 1,
            None => 0,
        };
        let (end_verse, end_segment) = match lit.end {
            Some(end) if end >= lit.start => {
                let segment = match lit.end_letter {
                    Some(_) if end == lit.start && start_segment > 0 => start_segment + 1,
                    Some(_) => 1,
                    None => 0,
                };
                (end, segment)
            }
            _ => (lit.start, start_segment),
        };

        let first = BcvRef::new(prev.book, prev.chapter, lit.start).with_segment(start_segment);
        let last = BcvRef::new(prev.book, prev.chapter, end_verse).with_segment(end_segment);
        self.set(first, last);
        (lit.literal, rest.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verse(text: &str) -> (String, &str) {
        let (lit, rest) = parse_verse_literal(text);
        (lit.map(|l| l.literal).unwrap_or_default(), rest)
    }

    fn tracker_in(book: u16, chapter: u16) -> ReferenceTracker {
        let mut t = ReferenceTracker::new();
        t.enter_file(Some(book));
        t.apply("\\c", &format!("{} ", chapter), None);
        t
    }

    #[test]
    fn test_parse_simple_and_bridges() {
        assert_eq!(verse("1 In the beginning "), ("1".to_string(), "In the beginning "));
        assert_eq!(verse("2-3 text "), ("2-3".to_string(), "text "));
        assert_eq!(verse("2a-2b text "), ("2a-2b".to_string(), "text "));
        assert_eq!(verse("3-4a text "), ("3-4a".to_string(), "text "));
    }

    #[test]
    fn test_parse_missing_space_after_literal() {
        assert_eq!(verse("2-3aForgot space! "), ("2-3".to_string(), "aForgot space! "));
        assert_eq!(verse("2-3ab.Missing Space "), ("2-3".to_string(), "ab.Missing Space "));
        assert_eq!(verse("7.a,8.a,9a. testing "), ("7.".to_string(), "a,8.a,9a. testing "));
    }

    #[test]
    fn test_parse_trailing_period() {
        assert_eq!(verse("2-3. text "), ("2-3.".to_string(), "text "));
        assert_eq!(verse("2-3a. text "), ("2-3a".to_string(), ". text "));
    }

    #[test]
    fn test_parse_missing_right_operand() {
        assert_eq!(verse("5-blah "), ("5-".to_string(), "blah "));
        assert_eq!(verse("6- blah "), ("6-".to_string(), "blah "));
        let (lit, _) = parse_verse_literal("5-blah ");
        let lit = lit.unwrap();
        assert_eq!(lit.start, 5);
        assert_eq!(lit.end, None);
    }

    #[test]
    fn test_parse_hyphen_variants() {
        let rtl = "2\u{200F}-\u{200F}3 text ";
        let (lit, rest) = parse_verse_literal(rtl);
        let lit = lit.unwrap();
        assert_eq!(lit.literal, "2\u{200F}-\u{200F}3");
        assert_eq!((lit.start, lit.end), (2, Some(3)));
        assert_eq!(rest, "text ");

        let (lit, _) = parse_verse_literal("2\u{2010}3 ");
        assert_eq!(lit.unwrap().end, Some(3));
    }

    #[test]
    fn test_parse_no_number() {
        let (lit, rest) = parse_verse_literal("  blah ");
        assert!(lit.is_none());
        assert_eq!(rest, "blah ");
    }

    #[test]
    fn test_id_resets_reference() {
        let mut t = tracker_in(49, 3);
        let update = t.apply("\\id", "COL Colossians ", None);
        assert_eq!(update.text, "COL Colossians ");
        assert_eq!(t.first(), BcvRef::new(51, 0, 0));
        assert_eq!(t.last(), BcvRef::new(51, 0, 0));
        assert!(t.seen_id_in_file());
    }

    #[test]
    fn test_unknown_book_code_falls_back() {
        let mut t = ReferenceTracker::new();
        t.apply("\\id", "XYZ ", Some(49));
        assert_eq!(t.first().book, 49);

        let mut t = tracker_in(51, 1);
        t.apply("\\id", "", None);
        assert_eq!(t.first(), BcvRef::new(51, 0, 0));
    }

    #[test]
    fn test_chapter_opens_verse_one_and_keeps_text() {
        let mut t = tracker_in(49, 1);
        let update = t.apply("\\c", "2 Chapter Two ", None);
        assert_eq!(update.text, "Chapter Two ");
        assert_eq!(t.first(), BcvRef::new(49, 2, 1));
        assert_eq!(t.last(), BcvRef::new(49, 2, 1));

        let update = t.apply("\\c", "", None);
        assert_eq!(update.text, "");
        assert_eq!(t.first(), BcvRef::new(49, 2, 1));

        let update = t.apply("\\c", "two ", None);
        assert_eq!(update.text, "two ");
        assert_eq!(t.first(), BcvRef::new(49, 2, 1));
    }

    #[test]
    fn test_verse_bridge_references() {
        let mut t = tracker_in(49, 1);
        let update = t.apply("\\v", "2-3aForgot space! ", None);
        assert_eq!(update.literal_verse.as_deref(), Some("2-3"));
        assert_eq!(update.text, "aForgot space! ");
        assert_eq!(t.first(), BcvRef::new(49, 1, 2));
        assert_eq!(t.last(), BcvRef::new(49, 1, 3));
    }

    #[test]
    fn test_hyphen_variant_bridge_references() {
        let mut t = tracker_in(49, 1);
        let update = t.apply("\\v", "2\u{2010}3 text ", None);
        assert_eq!(update.literal_verse.as_deref(), Some("2\u{2010}3"));
        assert_eq!(update.text, "text ");
        assert_eq!(t.first(), BcvRef::new(49, 1, 2));
        assert_eq!(t.last(), BcvRef::new(49, 1, 3));

        let update = t.apply("\\v", "4\u{200F}-\u{200F}5 text ", None);
        assert_eq!(update.literal_verse.as_deref(), Some("4\u{200F}-\u{200F}5"));
        assert_eq!(update.text, "text ");
        assert_eq!(t.first(), BcvRef::new(49, 1, 4));
        assert_eq!(t.last(), BcvRef::new(49, 1, 5));

        let update = t.apply("\\v", "6\u{200F}-7 text ", None);
        assert_eq!(update.literal_verse.as_deref(), Some("6\u{200F}-7"));
        assert_eq!(t.first(), BcvRef::new(49, 1, 6));
        assert_eq!(t.last(), BcvRef::new(49, 1, 7));
    }

    #[test]
    fn test_segments_number_by_occurrence() {
        let mut t = tracker_in(49, 1);
        t.apply("\\v", "1a first ", None);
        assert_eq!(t.first().segment, 1);
        t.apply("\\v", "1c second ", None);
        assert_eq!(t.first().segment, 2);
        t.apply("\\v", "1e third ", None);
        assert_eq!(t.first().segment, 3);
        assert_eq!(t.first().verse, 1);
        t.apply("\\v", "2 next ", None);
        assert_eq!(t.first(), BcvRef::new(49, 1, 2));
    }

    #[test]
    fn test_lettered_bridges() {
        let mut t = tracker_in(49, 1);
        t.apply("\\v", "2a-2b text ", None);
        assert_eq!(t.first(), BcvRef::new(49, 1, 2).with_segment(1));
        assert_eq!(t.last(), BcvRef::new(49, 1, 2).with_segment(2));
        t.apply("\\v", "2c more ", None);
        assert_eq!(t.first(), BcvRef::new(49, 1, 2).with_segment(3));

        t.apply("\\v", "3-4a text ", None);
        assert_eq!(t.first(), BcvRef::new(49, 1, 3));
        assert_eq!(t.last(), BcvRef::new(49, 1, 4).with_segment(1));
    }

    #[test]
    fn test_backwards_bridge_collapses() {
        let mut t = tracker_in(49, 1);
        t.apply("\\v", "5-3 text ", None);
        assert_eq!(t.first(), BcvRef::new(49, 1, 5));
        assert_eq!(t.last(), BcvRef::new(49, 1, 5));
    }

    #[test]
    fn test_verse_without_number_keeps_reference() {
        let mut t = tracker_in(49, 1);
        t.apply("\\v", "4 text ", None);
        let update = t.apply("\\v", "blah ", None);
        assert_eq!(update.literal_verse.as_deref(), Some(""));
        assert_eq!(update.text, "blah ");
        assert_eq!(t.first(), BcvRef::new(49, 1, 4));
    }

    #[test]
    fn test_enter_file_implies_book_boundary() {
        let mut t = tracker_in(49, 3);
        t.enter_file(Some(49));
        assert_eq!(t.first(), BcvRef::new(49, 3, 1));
        assert!(!t.seen_id_in_file());
        t.enter_file(Some(51));
        assert_eq!(t.first(), BcvRef::new(51, 0, 0));
        t.enter_file(None);
        assert_eq!(t.first(), BcvRef::new(51, 0, 0));
    }

    #[test]
    fn test_other_markers_leave_state_alone() {
        let mut t = tracker_in(49, 1);
        let update = t.apply("\\p", "text ", None);
        assert_eq!(update, ReferenceUpdate { text: "text ".to_string(), literal_verse: None });
        assert_eq!(t.first(), BcvRef::new(49, 1, 1));
    }
}
