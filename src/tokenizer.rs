//! Splitting lines into marker/text pieces

use crate::mapping::{InlineRole, MappingList};
use crate::settings::Dialect;

/// Whether a marker opens a paragraph-level segment or sits inside text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Line,
    Inline(InlineRole),
}

/// A marker found in a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerToken {
    /// Spelling as it appeared, reported as the segment's marker
    pub spelling: String,
    /// Spelling used to look the marker up in the mapping list
    pub key: String,
    pub kind: MarkerKind,
}

impl MarkerToken {
    fn new(spelling: impl Into<String>, key: impl Into<String>, kind: MarkerKind) -> Self {
        Self { spelling: spelling.into(), key: key.into(), kind }
    }
}

/// A run of text and the marker that introduced it
///
/// Only the first piece of a line can lack a marker; its text continues
/// whatever segment was open before the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePiece {
    pub marker: Option<MarkerToken>,
    pub text: String,
}

/// Stateless line tokenizer driven by a mapping list
pub struct MarkerTokenizer<'m> {
    mappings: &'m MappingList,
    dialect: Dialect,
}

impl<'m> MarkerTokenizer<'m> {
    pub fn new(mappings: &'m MappingList, dialect: Dialect) -> Self {
        Self { mappings, dialect }
    }

    /// Split one physical line
    ///
    /// Trailing whitespace is dropped and a single space stands in for the
    /// line break, so text from consecutive lines joins with one space.
    /// Blank lines produce nothing.
    pub fn tokenize(&self, line: &str) -> Vec<LinePiece> {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            return Vec::new();
        }
        let mut text = String::with_capacity(trimmed.len() + 1);
        text.push_str(trimmed);
        text.push(' ');

        let mut pieces = Vec::new();
        let mut marker: Option<MarkerToken> = None;
        let mut piece_start = 0;
        let mut pos = 0;

        while pos < text.len() {
            let rest = &text[pos..];
            if rest.starts_with("\\\\") {
                pos += 2;
                continue;
            }
            if let Some((token, consumed)) = self.match_marker(rest) {
                if marker.is_some() || pos > piece_start {
                    pieces.push(LinePiece { marker: marker.take(), text: text[piece_start..pos].to_string() });
                }
                marker = Some(token);
                pos += consumed;
                piece_start = pos;
                continue;
            }
            pos += rest.chars().next().map_or(1, char::len_utf8);
        }

        if marker.is_some() || piece_start < text.len() {
            pieces.push(LinePiece { marker, text: text[piece_start..].to_string() });
        }
        pieces
    }

    /// Longest marker starting at the beginning of `rest`, with the number
    /// of bytes it consumes
    fn match_marker(&self, rest: &str) -> Option<(MarkerToken, usize)> {
        let inline = self.match_inline(rest);
        let line = self.match_line_marker(rest);
        match (inline, line) {
            (Some(i), Some(l)) => {
                if i.0.key.len() > l.0.key.len() {
                    Some(i)
                } else {
                    Some(l)
                }
            }
            (i, l) => i.or(l),
        }
    }

    fn match_inline(&self, rest: &str) -> Option<(MarkerToken, usize)> {
        let spellings = self.mappings.inline_spellings();

        // Longest first, so a longer registered spelling always wins over a
        // shorter one that is its prefix (`\it*` over `\i`)
        if let Some(spelling) = spellings.iter().find(|s| rest.starts_with(s.spelling.as_str())) {
            let mut consumed = spelling.spelling.len();
            let mut token = MarkerToken::new(&spelling.spelling, &spelling.spelling, MarkerKind::Inline(spelling.role));

            // USFM begin markers own the space that follows them
            if self.dialect == Dialect::Paratext5
                && spelling.role == InlineRole::Begin
                && spelling.spelling.starts_with('\\')
                && !spelling.spelling.ends_with(char::is_whitespace)
                && rest[consumed..].starts_with(' ')
            {
                token.spelling.push(' ');
                consumed += 1;
            }
            return Some((token, consumed));
        }

        // A space-delimited spelling written without its space (`\f+ note`)
        // is still that marker
        spellings.iter().find_map(|s| {
            let trimmed = s.spelling.trim_end();
            if trimmed.len() == s.spelling.len() || trimmed.is_empty() || !rest.starts_with(trimmed) {
                return None;
            }
            if !inline_boundary_ok(trimmed, &rest[trimmed.len()..]) {
                return None;
            }
            Some((MarkerToken::new(trimmed, &s.spelling, MarkerKind::Inline(s.role)), trimmed.len()))
        })
    }

    fn match_line_marker(&self, rest: &str) -> Option<(MarkerToken, usize)> {
        let name = rest.strip_prefix('\\')?;
        let name_len = name.find(|c: char| c.is_whitespace() || c == '\\').unwrap_or(name.len());
        if name_len == 0 {
            return None;
        }
        let token = &rest[..name_len + 1];
        if !self.mappings.is_line_marker(token) {
            return None;
        }
        // One whitespace character delimits the marker; a following
        // backslash means the space was left out
        let consumed = match rest[token.len()..].chars().next() {
            Some(c) if c.is_whitespace() => token.len() + c.len_utf8(),
            _ => token.len(),
        };
        Some((MarkerToken::new(token, token, MarkerKind::Line), consumed))
    }
}

/// `\f` cut from a mapped `\f ` must not match the start of `\fig`
fn inline_boundary_ok(spelling: &str, after: &str) -> bool {
    let needs_boundary = spelling.starts_with('\\') && spelling.ends_with(|c: char| c.is_ascii_alphanumeric());
    !needs_boundary || !after.starts_with(|c: char| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingEntry;

    fn mappings() -> MappingList {
        MappingList::from_entries([
            MappingEntry::line("\\mt", "Title Main"),
            MappingEntry::line("\\p", "Paragraph"),
            MappingEntry::line("\\s", "Section Head"),
            MappingEntry::inline("\\it ", Some("\\it*"), "Emphasis"),
            MappingEntry::inline("\\f ", Some("\\f*"), "Footnote"),
            MappingEntry::inline("\\i", Some("\\i*"), "Emphasis"),
            MappingEntry::inline("|i", Some("|r"), "Emphasis"),
            MappingEntry::inline("|u", Some("|r"), "Underline"),
            MappingEntry::inline("%b~", Some("~"), "Bold"),
            MappingEntry::inline("|f{", Some("}"), "Foreign"),
        ])
    }

    fn pairs(pieces: &[LinePiece]) -> Vec<(Option<&str>, &str)> {
        pieces
            .iter()
            .map(|p| (p.marker.as_ref().map(|m| m.spelling.as_str()), p.text.as_str()))
            .collect()
    }

    #[test]
    fn test_line_marker_and_text() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        assert_eq!(pairs(&t.tokenize("\\p Some text")), vec![(Some("\\p"), "Some text ")]);
    }

    #[test]
    fn test_continuation_line_has_no_marker() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        assert_eq!(pairs(&t.tokenize("more text   ")), vec![(None, "more text ")]);
    }

    #[test]
    fn test_blank_line_is_empty() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        assert!(t.tokenize("   \r").is_empty());
    }

    #[test]
    fn test_marker_alone_has_empty_text() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        assert_eq!(pairs(&t.tokenize("\\p")), vec![(Some("\\p"), "")]);
    }

    #[test]
    fn test_line_marker_followed_by_inline() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        assert_eq!(
            pairs(&t.tokenize("\\mt \\it fun\\it*")),
            vec![(Some("\\mt"), ""), (Some("\\it "), "fun"), (Some("\\it*"), " ")]
        );
    }

    #[test]
    fn test_unregistered_backslash_sequences_are_text() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        assert_eq!(
            pairs(&t.tokenize("\\p look at c:\\scr\\files\\pic1.jpg now")),
            vec![(Some("\\p"), "look at c:\\scr\\files\\pic1.jpg now ")]
        );
        assert_eq!(pairs(&t.tokenize("\\p \\\\abi here")), vec![(Some("\\p"), "\\\\abi here ")]);
        assert_eq!(pairs(&t.tokenize("\\xyz unknown")), vec![(None, "\\xyz unknown ")]);
    }

    #[test]
    fn test_doubled_backslash_before_marker_name() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        assert_eq!(pairs(&t.tokenize("text \\\\p more")), vec![(None, "text \\\\p more ")]);
    }

    #[test]
    fn test_mid_line_verse_markers() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        assert_eq!(
            pairs(&t.tokenize("\\p \\v 1 first \\v 2 second")),
            vec![(Some("\\p"), ""), (Some("\\v"), "1 first "), (Some("\\v"), "2 second ")]
        );
    }

    #[test]
    fn test_missing_space_between_line_markers() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        assert_eq!(pairs(&t.tokenize("\\p\\v 3 text")), vec![(Some("\\p"), ""), (Some("\\v"), "3 text ")]);
    }

    #[test]
    fn test_back_to_back_inline_markers() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        assert_eq!(
            pairs(&t.tokenize("\\p |iitalic|r |uunder|r end")),
            vec![
                (Some("\\p"), ""),
                (Some("|i"), "italic"),
                (Some("|r"), " "),
                (Some("|u"), "under"),
                (Some("|r"), " end "),
            ]
        );
    }

    #[test]
    fn test_non_backslash_multichar_markers() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        assert_eq!(
            pairs(&t.tokenize("\\p a %b~bold~ and |f{word} x")),
            vec![
                (Some("\\p"), "a "),
                (Some("%b~"), "bold"),
                (Some("~"), " and "),
                (Some("|f{"), "word"),
                (Some("}"), " x "),
            ]
        );
    }

    #[test]
    fn test_non_space_delimited_inline_keeps_space_in_text() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        assert_eq!(
            pairs(&t.tokenize("\\p a \\i word\\i* b")),
            vec![(Some("\\p"), "a "), (Some("\\i"), " word"), (Some("\\i*"), " b ")]
        );
    }

    #[test]
    fn test_inline_marker_without_delimiter() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        assert_eq!(
            pairs(&t.tokenize("\\p a \\iword\\i* b")),
            vec![(Some("\\p"), "a "), (Some("\\i"), "word"), (Some("\\i*"), " b ")]
        );
    }

    #[test]
    fn test_longer_inline_spelling_wins() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        assert_eq!(
            pairs(&t.tokenize("\\p \\it x\\it*\\i y\\i*")),
            vec![
                (Some("\\p"), ""),
                (Some("\\it "), "x"),
                (Some("\\it*"), ""),
                (Some("\\i"), " y"),
                (Some("\\i*"), " "),
            ]
        );
    }

    #[test]
    fn test_space_delimited_marker_with_dropped_space() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        let pieces = t.tokenize("\\p text\\f+ note\\f* more");
        assert_eq!(
            pairs(&pieces),
            vec![(Some("\\p"), "text"), (Some("\\f"), "+ note"), (Some("\\f*"), " more ")]
        );
        let begin = pieces[1].marker.as_ref().unwrap();
        assert_eq!(begin.key, "\\f ");
        assert_eq!(begin.kind, MarkerKind::Inline(InlineRole::Begin));
    }

    #[test]
    fn test_dropped_space_needs_word_boundary() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        assert_eq!(pairs(&t.tokenize("\\p see \\fig here")), vec![(Some("\\p"), "see \\fig here ")]);
    }

    #[test]
    fn test_space_delimited_footnote() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Generic);
        let pieces = t.tokenize("\\v 1 text\\f + note\\f* more");
        assert_eq!(
            pairs(&pieces),
            vec![(Some("\\v"), "1 text"), (Some("\\f "), "+ note"), (Some("\\f*"), " more ")]
        );
        assert_eq!(pieces[0].marker.as_ref().unwrap().kind, MarkerKind::Line);
        assert_eq!(pieces[1].marker.as_ref().unwrap().kind, MarkerKind::Inline(InlineRole::Begin));
        assert_eq!(pieces[2].marker.as_ref().unwrap().kind, MarkerKind::Inline(InlineRole::End));
    }

    #[test]
    fn test_paratext5_begin_marker_absorbs_space() {
        let m = mappings();
        let t = MarkerTokenizer::new(&m, Dialect::Paratext5);
        let pieces = t.tokenize("\\p a \\i word\\i* b");
        assert_eq!(pairs(&pieces), vec![(Some("\\p"), "a "), (Some("\\i "), "word"), (Some("\\i*"), " b ")]);
        assert_eq!(pieces[1].marker.as_ref().unwrap().key, "\\i");
    }
}
