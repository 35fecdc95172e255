//! # sfm-segments
//!
//! Segmentation of Standard Format (backslash marker) text files into
//! reference-tagged segments for import.
//!
//! Standard Format files mark up Scripture drafts, back translations and
//! notes with backslash markers:
//!
//! ```text
//! \id EPH
//! \c 1
//! \p
//! \v 1 Paul, an apostle\f + note\f* of Christ Jesus
//! \v 2-3a Grace to you
//! ```
//!
//! An [`ImportProject`] holds the files of each import domain, the marker
//! [`MappingList`] and the [`ImportSettings`]. Each call to
//! [`ImportProject::create_enumerator`] returns a single-pass
//! [`SegmentEnumerator`] that yields one [`TextSegment`] per marker, with the
//! book/chapter/verse it belongs to.
//!
//! ## Segments
//!
//! - Each marker starts a segment; lines without a leading marker continue
//!   the open one, joined by a single space
//! - `\id`, `\c` and `\v` are always markers and move the reference
//! - Inline markers (`\f `, `\f*`, `|i`, `|r`) split text wherever they occur
//! - Backslash sequences that are not mapped (`c:\scr\pic.jpg`, `\\abi`)
//!   stay in the text
//!
//! ## Verse numbers
//!
//! `\v` accepts simple numbers (`3`), sub-verse letters (`3a`), bridges
//! (`3-4`, `2a-2b`, with `-`, U+2010 or RTL-marked hyphens) and tolerates a
//! missing space after the number (`2-3aForgot space!` → literal `2-3`).
//!
//! ## Files and encodings
//!
//! Files are read lazily, one at a time, and only when their declared
//! reference range overlaps the requested window. Legacy-encoded files are
//! converted per writing system through an injected
//! [`ConverterLookup`]; an unknown converter name is reported the first time
//! it is needed.

pub mod converter;
pub mod enumerator;
pub mod error;
pub mod mapping;
pub mod project;
pub mod reference;
pub mod scan;
pub mod settings;
pub mod source;
pub mod tokenizer;
pub mod tracker;

pub use converter::{CharMapConverter, ConverterFn, ConverterGateway, ConverterLookup, ConverterRegistry};
pub use enumerator::{EnumeratorState, SegmentEnumerator, TextSegment};
pub use error::ImportError;
pub use mapping::{DomainFlag, MappingEntry, MappingList, MarkerDomain};
pub use project::ImportProject;
pub use reference::{BcvRef, RefParseError, StandardVersification, Versification};
pub use scan::{scan_file, FileScan};
pub use settings::{Dialect, ImportDomain, ImportSettings, WritingSystemSettings};
pub use source::{DeclaredEncoding, FileDescriptor, RefRange};
pub use tokenizer::{LinePiece, MarkerTokenizer};
pub use tracker::{parse_verse_literal, ReferenceTracker, VerseLiteral};
