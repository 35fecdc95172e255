//! Marker mappings
//!
//! A mapping list tells the tokenizer which backslash tokens and inline
//! spellings are markers, and tells the enumerator which domain and writing
//! system the text following a marker belongs to.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{BitOr, BitOrAssign};

/// Marker for the book identification line, always recognized
pub const ID_MARKER: &str = "\\id";
/// Chapter marker, always recognized
pub const CHAPTER_MARKER: &str = "\\c";
/// Verse marker, always recognized
pub const VERSE_MARKER: &str = "\\v";

/// Implicit reference markers recognized without a mapping
pub const IMPLICIT_MARKERS: [&str; 3] = [ID_MARKER, CHAPTER_MARKER, VERSE_MARKER];

/// Named member of a [`MarkerDomain`] mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainFlag {
    Default,
    BackTrans,
    Footnote,
    Annotations,
}

/// Combinable set of domains a marker's text belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<DomainFlag>", into = "Vec<DomainFlag>")]
pub struct MarkerDomain(u8);

impl MarkerDomain {
    pub const DEFAULT: MarkerDomain = MarkerDomain(0b0001);
    pub const BACK_TRANS: MarkerDomain = MarkerDomain(0b0010);
    pub const FOOTNOTE: MarkerDomain = MarkerDomain(0b0100);
    pub const ANNOTATIONS: MarkerDomain = MarkerDomain(0b1000);

    pub const fn empty() -> Self {
        MarkerDomain(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: MarkerDomain) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Text that belongs to a translation other than the vernacular one
    pub const fn is_analysis(self) -> bool {
        self.contains(Self::BACK_TRANS) || self.contains(Self::ANNOTATIONS)
    }
}

impl Default for MarkerDomain {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BitOr for MarkerDomain {
    type Output = MarkerDomain;

    fn bitor(self, rhs: Self) -> Self::Output {
        MarkerDomain(self.0 | rhs.0)
    }
}

impl BitOrAssign for MarkerDomain {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<DomainFlag> for MarkerDomain {
    fn from(flag: DomainFlag) -> Self {
        match flag {
            DomainFlag::Default => Self::DEFAULT,
            DomainFlag::BackTrans => Self::BACK_TRANS,
            DomainFlag::Footnote => Self::FOOTNOTE,
            DomainFlag::Annotations => Self::ANNOTATIONS,
        }
    }
}

impl From<Vec<DomainFlag>> for MarkerDomain {
    fn from(flags: Vec<DomainFlag>) -> Self {
        flags.into_iter().fold(MarkerDomain::empty(), |acc, f| acc | f.into())
    }
}

impl From<MarkerDomain> for Vec<DomainFlag> {
    fn from(domain: MarkerDomain) -> Self {
        [
            DomainFlag::Default,
            DomainFlag::BackTrans,
            DomainFlag::Footnote,
            DomainFlag::Annotations,
        ]
        .into_iter()
        .filter(|f| domain.contains((*f).into()))
        .collect()
    }
}

/// How one marker is imported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Marker spelling as it appears in the text (`\p`, `\f `, `|i`)
    pub begin_marker: String,
    /// Closing spelling for inline markers (`\f*`, `|r`)
    #[serde(default)]
    pub end_marker: Option<String>,
    #[serde(default)]
    pub style_name: String,
    /// Writing system override for the marker's text
    #[serde(default)]
    pub writing_system: Option<String>,
    #[serde(default)]
    pub domain: MarkerDomain,
    #[serde(default)]
    pub is_inline: bool,
}

impl MappingEntry {
    /// A paragraph-level (line) marker
    pub fn line(marker: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            begin_marker: marker.into(),
            end_marker: None,
            style_name: style.into(),
            writing_system: None,
            domain: MarkerDomain::DEFAULT,
            is_inline: false,
        }
    }

    /// A character-level marker with an optional end spelling
    pub fn inline(begin: impl Into<String>, end: Option<&str>, style: impl Into<String>) -> Self {
        Self {
            begin_marker: begin.into(),
            end_marker: end.map(str::to_string),
            style_name: style.into(),
            writing_system: None,
            domain: MarkerDomain::DEFAULT,
            is_inline: true,
        }
    }

    pub fn with_domain(mut self, domain: MarkerDomain) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_writing_system(mut self, ws: impl Into<String>) -> Self {
        self.writing_system = Some(ws.into());
        self
    }
}

/// Role of an inline spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineRole {
    Begin,
    End,
    /// Spelled the same as the begin of one entry and the end of another
    Either,
}

/// An inline marker spelling the tokenizer searches for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineSpelling {
    pub spelling: String,
    pub role: InlineRole,
}

/// Lookup table of marker mappings for one import pass
#[derive(Debug, Clone, Default)]
pub struct MappingList {
    entries: Vec<MappingEntry>,
    by_begin: HashMap<String, usize>,
    /// Inline begin/end spellings, longest first
    inline_spellings: Vec<InlineSpelling>,
}

impl MappingList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = MappingEntry>) -> Self {
        let mut list = Self::new();
        for entry in entries {
            list.add(entry);
        }
        list
    }

    /// Add or replace the mapping for `entry.begin_marker`
    pub fn add(&mut self, entry: MappingEntry) {
        match self.by_begin.get(&entry.begin_marker) {
            Some(&idx) => self.entries[idx] = entry,
            None => {
                self.by_begin.insert(entry.begin_marker.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
        self.rebuild_inline_spellings();
    }

    fn rebuild_inline_spellings(&mut self) {
        let mut roles: HashMap<&str, InlineRole> = HashMap::new();
        for entry in self.entries.iter().filter(|e| e.is_inline) {
            let begin = entry.begin_marker.as_str();
            if !begin.is_empty() {
                let role = match roles.get(begin) {
                    Some(InlineRole::End) | Some(InlineRole::Either) => InlineRole::Either,
                    _ => InlineRole::Begin,
                };
                roles.insert(begin, role);
            }
            if let Some(end) = entry.end_marker.as_deref().filter(|e| !e.is_empty()) {
                let role = match roles.get(end) {
                    Some(InlineRole::Begin) | Some(InlineRole::Either) => InlineRole::Either,
                    _ => InlineRole::End,
                };
                roles.insert(end, role);
            }
        }

        let mut spellings: Vec<InlineSpelling> = roles
            .into_iter()
            .map(|(spelling, role)| InlineSpelling { spelling: spelling.to_string(), role })
            .collect();
        spellings.sort_by(|a, b| b.spelling.len().cmp(&a.spelling.len()).then_with(|| a.spelling.cmp(&b.spelling)));
        self.inline_spellings = spellings;
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry whose begin spelling is `marker`
    pub fn lookup(&self, marker: &str) -> Option<&MappingEntry> {
        self.by_begin.get(marker).map(|&idx| &self.entries[idx])
    }

    /// Whether `token` starts a paragraph-level segment
    pub fn is_line_marker(&self, token: &str) -> bool {
        IMPLICIT_MARKERS.contains(&token) || self.lookup(token).is_some_and(|e| !e.is_inline)
    }

    pub fn inline_spellings(&self) -> &[InlineSpelling] {
        &self.inline_spellings
    }
}
