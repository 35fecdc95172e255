//! Import files and the multi-file line stream

use crate::error::ImportError;
use crate::reference::{BcvRef, Versification};
use crate::scan::FileScan;
use crate::settings::ImportDomain;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::sync::Arc;

/// How the bytes of a file are declared to be encoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredEncoding {
    /// UTF-8, or UTF-16 with a byte order mark; never converted
    #[default]
    Unicode,
    /// 8-bit legacy data, converted by the writing system's converter
    Legacy,
}

/// First and last reference a file is known to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefRange {
    pub first: BcvRef,
    pub last: BcvRef,
}

impl RefRange {
    pub fn new(first: BcvRef, last: BcvRef) -> Self {
        Self { first, last }
    }

    /// Whole books `first..=last`
    pub fn books(first: u16, last: u16) -> Self {
        Self::new(BcvRef::book_start(first), BcvRef::book_end(last))
    }

    pub fn overlaps(&self, start: &BcvRef, end: &BcvRef, versification: &dyn Versification) -> bool {
        versification.compare(&self.first, end) != Ordering::Greater
            && versification.compare(&self.last, start) != Ordering::Less
    }
}

/// One physical file of an import domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub path: PathBuf,
    #[serde(default)]
    pub domain: ImportDomain,
    /// Writing system (or locale) of back translation and note files
    #[serde(default)]
    pub writing_system: Option<String>,
    #[serde(default)]
    pub note_type: Option<String>,
    #[serde(default)]
    pub encoding: DeclaredEncoding,
    /// Known reference range; files without one are always read
    #[serde(default)]
    pub declared_range: Option<RefRange>,
}

impl FileDescriptor {
    pub fn new(path: impl Into<PathBuf>, domain: ImportDomain) -> Self {
        Self {
            path: path.into(),
            domain,
            writing_system: None,
            note_type: None,
            encoding: DeclaredEncoding::Unicode,
            declared_range: None,
        }
    }

    pub fn with_writing_system(mut self, ws: impl Into<String>) -> Self {
        self.writing_system = Some(ws.into());
        self
    }

    pub fn with_note_type(mut self, note_type: impl Into<String>) -> Self {
        self.note_type = Some(note_type.into());
        self
    }

    pub fn with_encoding(mut self, encoding: DeclaredEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_range(mut self, range: RefRange) -> Self {
        self.declared_range = Some(range);
        self
    }

    /// Declare the file as holding whole books `first..=last`
    pub fn with_books(self, first: u16, last: u16) -> Self {
        self.with_range(RefRange::books(first, last))
    }

    /// Take the declared range from a pre-scan of the file
    pub fn with_scan(mut self, scan: &FileScan) -> Self {
        self.declared_range = scan.declared_range();
        self
    }

    /// Book the file starts with, if declared
    pub fn declared_book(&self) -> Option<u16> {
        self.declared_range.map(|r| r.first.book).filter(|&b| b > 0)
    }
}

/// Decoding chosen for a file after looking at its byte order mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    /// One byte per character, U+0000..=U+00FF
    Latin1,
}

/// Reads decoded lines without their line terminator
pub struct LineReader<R> {
    inner: R,
    decoding: TextDecoding,
    bytes: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(mut inner: R, encoding: DeclaredEncoding) -> io::Result<Self> {
        let decoding = match encoding {
            DeclaredEncoding::Legacy => TextDecoding::Latin1,
            DeclaredEncoding::Unicode => sniff_bom(&mut inner)?,
        };
        Ok(Self { inner, decoding, bytes: Vec::new() })
    }

    pub fn decoding(&self) -> TextDecoding {
        self.decoding
    }

    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        match self.decoding {
            TextDecoding::Utf16Le | TextDecoding::Utf16Be => self.read_utf16_line(),
            TextDecoding::Utf8 | TextDecoding::Latin1 => self.read_byte_line(),
        }
    }

    fn read_byte_line(&mut self) -> io::Result<Option<String>> {
        self.bytes.clear();
        if self.inner.read_until(b'\n', &mut self.bytes)? == 0 {
            return Ok(None);
        }
        if self.bytes.last() == Some(&b'\n') {
            self.bytes.pop();
        }
        if self.bytes.last() == Some(&b'\r') {
            self.bytes.pop();
        }

        let line = match self.decoding {
            TextDecoding::Latin1 => self.bytes.iter().map(|&b| b as char).collect(),
            _ => match std::str::from_utf8(&self.bytes) {
                Ok(s) => s.to_string(),
                Err(_) => {
                    tracing::warn!("invalid UTF-8 replaced in import line");
                    String::from_utf8_lossy(&self.bytes).into_owned()
                }
            },
        };
        Ok(Some(line))
    }

    fn read_utf16_line(&mut self) -> io::Result<Option<String>> {
        let mut units: Vec<u16> = Vec::new();
        let mut read_any = false;
        loop {
            let mut pair = [0u8; 2];
            // An odd trailing byte is dropped
            if read_full(&mut self.inner, &mut pair)? < 2 {
                break;
            }
            read_any = true;
            let unit = match self.decoding {
                TextDecoding::Utf16Be => u16::from_be_bytes(pair),
                _ => u16::from_le_bytes(pair),
            };
            if unit == 0x000A {
                break;
            }
            units.push(unit);
        }
        if !read_any {
            return Ok(None);
        }
        if units.last() == Some(&0x000D) {
            units.pop();
        }
        Ok(Some(String::from_utf16_lossy(&units)))
    }
}

fn sniff_bom<R: BufRead>(inner: &mut R) -> io::Result<TextDecoding> {
    let buf = inner.fill_buf()?;
    let (decoding, skip) = if buf.starts_with(&[0xEF, 0xBB, 0xBF]) {
        (TextDecoding::Utf8, 3)
    } else if buf.starts_with(&[0xFF, 0xFE]) {
        (TextDecoding::Utf16Le, 2)
    } else if buf.starts_with(&[0xFE, 0xFF]) {
        (TextDecoding::Utf16Be, 2)
    } else {
        (TextDecoding::Utf8, 0)
    };
    inner.consume(skip);
    Ok(decoding)
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// A physical line with its 1-based number within its file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
}

/// What the line stream produced next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// The file at `index` was opened and its lines follow
    FileStart { index: usize },
    Line(SourceLine),
    /// The file at `index` was read to the end and closed
    FileEnd { index: usize },
}

struct OpenFile {
    index: usize,
    reader: LineReader<BufReader<fs::File>>,
    line_number: usize,
}

/// Lines of an ordered list of files, read as one stream
///
/// Files are opened lazily and only when their declared range overlaps the
/// window; skipped files are never touched on disk. At most one handle is
/// open at a time.
pub struct LineSource {
    files: Vec<FileDescriptor>,
    window: Option<(BcvRef, BcvRef)>,
    versification: Arc<dyn Versification>,
    next_index: usize,
    current: Option<OpenFile>,
}

impl LineSource {
    pub fn new(files: Vec<FileDescriptor>, versification: Arc<dyn Versification>) -> Self {
        Self {
            files,
            window: None,
            versification,
            next_index: 0,
            current: None,
        }
    }

    /// Only read files whose declared range overlaps `[start, end]`
    pub fn with_window(mut self, start: BcvRef, end: BcvRef) -> Self {
        self.window = Some((start, end));
        self
    }

    pub fn descriptor(&self, index: usize) -> &FileDescriptor {
        &self.files[index]
    }

    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    /// Whether a file handle is currently held
    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    fn is_needed(&self, descriptor: &FileDescriptor) -> bool {
        match (&descriptor.declared_range, &self.window) {
            (Some(range), Some((start, end))) => range.overlaps(start, end, self.versification.as_ref()),
            _ => true,
        }
    }

    pub fn next_event(&mut self) -> Result<Option<SourceEvent>, ImportError> {
        if let Some(open) = self.current.as_mut() {
            return match open.reader.read_line() {
                Ok(Some(text)) => {
                    open.line_number += 1;
                    Ok(Some(SourceEvent::Line(SourceLine { number: open.line_number, text })))
                }
                Ok(None) => {
                    let index = open.index;
                    self.current = None;
                    tracing::debug!(path = %self.files[index].path.display(), "closed import file");
                    Ok(Some(SourceEvent::FileEnd { index }))
                }
                Err(e) => {
                    let index = open.index;
                    self.current = None;
                    Err(ImportError::file_access(&self.files[index].path, &e))
                }
            };
        }

        while self.next_index < self.files.len() {
            let index = self.next_index;
            self.next_index += 1;

            let descriptor = &self.files[index];
            if !self.is_needed(descriptor) {
                tracing::debug!(path = %descriptor.path.display(), "skipped import file outside range");
                continue;
            }

            let file = fs::File::open(&descriptor.path).map_err(|e| ImportError::file_access(&descriptor.path, &e))?;
            let reader = LineReader::new(BufReader::new(file), descriptor.encoding)
                .map_err(|e| ImportError::file_access(&descriptor.path, &e))?;
            tracing::debug!(path = %descriptor.path.display(), decoding = ?reader.decoding(), "opened import file");

            self.current = Some(OpenFile { index, reader, line_number: 0 });
            return Ok(Some(SourceEvent::FileStart { index }));
        }
        Ok(None)
    }

    /// Release any open file and read nothing more
    pub fn stop(&mut self) {
        self.current = None;
        self.next_index = self.files.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::StandardVersification;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn lines(bytes: &[u8], encoding: DeclaredEncoding) -> Vec<String> {
        let mut reader = LineReader::new(Cursor::new(bytes.to_vec()), encoding).unwrap();
        let mut out = Vec::new();
        while let Some(line) = reader.read_line().unwrap() {
            out.push(line);
        }
        out
    }

    fn utf16(text: &str, big_endian: bool) -> Vec<u8> {
        let mut bytes = if big_endian { vec![0xFE, 0xFF] } else { vec![0xFF, 0xFE] };
        for unit in text.encode_utf16() {
            let pair = if big_endian { unit.to_be_bytes() } else { unit.to_le_bytes() };
            bytes.extend_from_slice(&pair);
        }
        bytes
    }

    #[test]
    fn test_read_utf8_lines_with_crlf_and_bom() {
        let data = b"\xEF\xBB\xBF\\id EPH\r\n\\c 1\nlast";
        assert_eq!(lines(data, DeclaredEncoding::Unicode), vec!["\\id EPH", "\\c 1", "last"]);
    }

    #[test]
    fn test_read_utf16_both_byte_orders() {
        let text = "\\id EPH\r\n\\v 1 \u{05D0}\n";
        assert_eq!(lines(&utf16(text, false), DeclaredEncoding::Unicode), vec!["\\id EPH", "\\v 1 \u{05D0}"]);
        assert_eq!(lines(&utf16(text, true), DeclaredEncoding::Unicode), vec!["\\id EPH", "\\v 1 \u{05D0}"]);
    }

    #[test]
    fn test_read_legacy_bytes_one_char_each() {
        let data = b"\\p caf\xE9\n";
        assert_eq!(lines(data, DeclaredEncoding::Legacy), vec!["\\p caf\u{E9}"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let data = b"\\p bad \xFF byte\n";
        assert_eq!(lines(data, DeclaredEncoding::Unicode), vec!["\\p bad \u{FFFD} byte"]);
    }

    #[test]
    fn test_range_overlap() {
        let v = StandardVersification;
        let eph = RefRange::books(49, 49);
        assert!(eph.overlaps(&BcvRef::new(49, 0, 0), &BcvRef::new(51, 4, 18), &v));
        assert!(eph.overlaps(&BcvRef::new(48, 1, 1), &BcvRef::new(49, 1, 1), &v));
        assert!(!eph.overlaps(&BcvRef::new(50, 0, 0), &BcvRef::new(51, 4, 18), &v));
        assert!(!eph.overlaps(&BcvRef::new(1, 0, 0), &BcvRef::new(48, 6, 18), &v));
    }

    #[test]
    fn test_stream_skips_files_outside_window_without_probing() {
        let dir = tempdir().unwrap();
        let eph = dir.path().join("EPH.sfm");
        fs::write(&eph, "\\id EPH\n\\c 1\n").unwrap();
        let missing = dir.path().join("GEN.sfm");

        let files = vec![
            FileDescriptor::new(&missing, ImportDomain::Main).with_books(1, 1),
            FileDescriptor::new(&eph, ImportDomain::Main).with_books(49, 49),
        ];
        let mut source = LineSource::new(files, Arc::new(StandardVersification))
            .with_window(BcvRef::book_start(49), BcvRef::book_end(49));

        assert_eq!(source.next_event().unwrap(), Some(SourceEvent::FileStart { index: 1 }));
        assert!(source.is_open());
        assert_eq!(
            source.next_event().unwrap(),
            Some(SourceEvent::Line(SourceLine { number: 1, text: "\\id EPH".to_string() }))
        );
        assert_eq!(
            source.next_event().unwrap(),
            Some(SourceEvent::Line(SourceLine { number: 2, text: "\\c 1".to_string() }))
        );
        assert_eq!(source.next_event().unwrap(), Some(SourceEvent::FileEnd { index: 1 }));
        assert!(!source.is_open());
        assert_eq!(source.next_event().unwrap(), None);
    }

    #[test]
    fn test_missing_needed_file_is_file_access_error() {
        let dir = tempdir().unwrap();
        let files = vec![FileDescriptor::new(dir.path().join("nope.sfm"), ImportDomain::Main)];
        let mut source = LineSource::new(files, Arc::new(StandardVersification));
        let err = source.next_event().unwrap_err();
        assert!(err.is_file_access());
    }

    #[test]
    fn test_stop_releases_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.sfm");
        fs::write(&path, "\\id EPH\n").unwrap();
        let mut source = LineSource::new(vec![FileDescriptor::new(&path, ImportDomain::Main)], Arc::new(StandardVersification));
        source.next_event().unwrap();
        assert!(source.is_open());
        source.stop();
        assert!(!source.is_open());
        assert_eq!(source.next_event().unwrap(), None);
    }
}
