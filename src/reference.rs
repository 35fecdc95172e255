//! Scripture references

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Canonical book codes, in canonical order (index + 1 = book number)
pub const BOOK_CODES: [&str; 66] = [
    "GEN", "EXO", "LEV", "NUM", "DEU", "JOS", "JDG", "RUT", "1SA", "2SA",
    "1KI", "2KI", "1CH", "2CH", "EZR", "NEH", "EST", "JOB", "PSA", "PRO",
    "ECC", "SNG", "ISA", "JER", "LAM", "EZK", "DAN", "HOS", "JOL", "AMO",
    "OBA", "JON", "MIC", "NAM", "HAB", "ZEP", "HAG", "ZEC", "MAL", "MAT",
    "MRK", "LUK", "JHN", "ACT", "ROM", "1CO", "2CO", "GAL", "EPH", "PHP",
    "COL", "1TH", "2TH", "1TI", "2TI", "TIT", "PHM", "HEB", "JAS", "1PE",
    "2PE", "1JN", "2JN", "3JN", "JUD", "REV",
];

const BOOK_FACTOR: u32 = 1_000_000;
const CHAPTER_FACTOR: u32 = 1_000;

/// Look up the canonical book number (1-based) for a three-letter book code
pub fn book_number(code: &str) -> Option<u16> {
    BOOK_CODES
        .iter()
        .position(|c| c.eq_ignore_ascii_case(code))
        .map(|i| (i + 1) as u16)
}

/// Look up the book code for a canonical book number
pub fn book_code(book: u16) -> Option<&'static str> {
    if book == 0 {
        return None;
    }
    BOOK_CODES.get(book as usize - 1).copied()
}

/// A book/chapter/verse reference with an optional sub-verse segment
///
/// `segment` is 0 for a whole verse and 1.. for the lettered parts of a
/// verse (1a, 1b, ...), numbered by occurrence. Ordering is lexicographic
/// over `(book, chapter, verse, segment)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BcvRef {
    pub book: u16,
    pub chapter: u16,
    pub verse: u16,
    #[serde(default)]
    pub segment: u16,
}

impl BcvRef {
    pub const fn new(book: u16, chapter: u16, verse: u16) -> Self {
        Self { book, chapter, verse, segment: 0 }
    }

    pub const fn with_segment(mut self, segment: u16) -> Self {
        self.segment = segment;
        self
    }

    /// First reference of a book (its front matter)
    pub const fn book_start(book: u16) -> Self {
        Self::new(book, 0, 0)
    }

    /// Last possible reference of a book
    pub const fn book_end(book: u16) -> Self {
        Self::new(book, u16::MAX, u16::MAX)
    }

    /// Compare book, chapter and verse, ignoring the segment
    pub fn cmp_verse(&self, other: &Self) -> Ordering {
        (self.book, self.chapter, self.verse).cmp(&(other.book, other.chapter, other.verse))
    }

    /// Packed `BBCCCVVV` form; the segment is not part of it
    pub fn packed(&self) -> u32 {
        self.book as u32 * BOOK_FACTOR
            + self.chapter.min(999) as u32 * CHAPTER_FACTOR
            + self.verse.min(999) as u32
    }

    pub fn from_packed(value: u32) -> Self {
        Self::new(
            (value / BOOK_FACTOR) as u16,
            (value % BOOK_FACTOR / CHAPTER_FACTOR) as u16,
            (value % CHAPTER_FACTOR) as u16,
        )
    }

    pub fn book_code(&self) -> Option<&'static str> {
        book_code(self.book)
    }
}

impl fmt::Display for BcvRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.book_code() {
            Some(code) => write!(f, "{} {}:{}", code, self.chapter, self.verse)?,
            None => write!(f, "#{} {}:{}", self.book, self.chapter, self.verse)?,
        }
        if self.segment > 0 {
            let letter = (b'a' + ((self.segment - 1) % 26) as u8) as char;
            write!(f, "{}", letter)?;
        }
        Ok(())
    }
}

/// Error type for reference parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefParseError {
    /// Book code is not one of the canonical codes
    UnknownBook { code: String },
    /// Chapter or verse is not a number
    InvalidNumber { input: String },
    /// Input is empty
    Empty,
}

impl fmt::Display for RefParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefParseError::UnknownBook { code } => write!(f, "Unknown book code: '{}'", code),
            RefParseError::InvalidNumber { input } => write!(f, "Invalid chapter or verse number: '{}'", input),
            RefParseError::Empty => write!(f, "Empty reference"),
        }
    }
}

impl std::error::Error for RefParseError {}

impl FromStr for BcvRef {
    type Err = RefParseError;

    /// Parse `EPH`, `EPH 2` or `EPH 2:3`
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let mut parts = input.splitn(2, char::is_whitespace);
        let code = parts.next().filter(|c| !c.is_empty()).ok_or(RefParseError::Empty)?;
        let book = book_number(code).ok_or_else(|| RefParseError::UnknownBook { code: code.to_string() })?;

        let rest = match parts.next().map(str::trim) {
            Some(rest) if !rest.is_empty() => rest,
            _ => return Ok(Self::book_start(book)),
        };

        let number = |s: &str| {
            s.trim()
                .parse::<u16>()
                .map_err(|_| RefParseError::InvalidNumber { input: s.to_string() })
        };

        match rest.split_once(':') {
            Some((chapter, verse)) => Ok(Self::new(book, number(chapter)?, number(verse)?)),
            None => Ok(Self::new(book, number(rest)?, 0)),
        }
    }
}

/// Versification-aware comparison of verse references
///
/// Implementations map chapter/verse to canonical order for a particular
/// versification scheme. Only `(book, chapter, verse)` is compared.
pub trait Versification: Send + Sync {
    fn compare(&self, a: &BcvRef, b: &BcvRef) -> Ordering;
}

/// Plain numeric ordering
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardVersification;

impl Versification for StandardVersification {
    fn compare(&self, a: &BcvRef, b: &BcvRef) -> Ordering {
        a.cmp_verse(b)
    }
}
