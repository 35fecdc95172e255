//! Pre-scan of import files
//!
//! Finds which books a file holds and which backslash markers it uses,
//! without interpreting anything else. The books become the file's declared
//! range so that enumerations can skip it without opening it.

use crate::error::ImportError;
use crate::mapping::ID_MARKER;
use crate::reference::book_number;
use crate::source::{DeclaredEncoding, LineReader, RefRange};
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// What a scan found in one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileScan {
    /// Book numbers of `\id` lines, in order of appearance
    pub books: Vec<u16>,
    /// Distinct backslash markers
    pub markers: BTreeSet<String>,
    pub line_count: usize,
}

impl FileScan {
    /// Whole-book range from the lowest to the highest book found
    pub fn declared_range(&self) -> Option<RefRange> {
        let first = self.books.iter().min()?;
        let last = self.books.iter().max()?;
        Some(RefRange::books(*first, *last))
    }
}

pub fn scan_file(path: &Path, encoding: DeclaredEncoding) -> Result<FileScan, ImportError> {
    let file = fs::File::open(path).map_err(|e| ImportError::file_access(path, &e))?;
    scan_reader(BufReader::new(file), encoding).map_err(|e| ImportError::file_access(path, &e))
}

pub fn scan_reader<R: BufRead>(reader: R, encoding: DeclaredEncoding) -> io::Result<FileScan> {
    let mut reader = LineReader::new(reader, encoding)?;
    let mut scan = FileScan::default();

    while let Some(line) = reader.read_line()? {
        scan.line_count += 1;
        let markers = markers_in(&line);

        if let Some(first) = markers.first().filter(|m| m.0 == 0 && m.1 == ID_MARKER) {
            let code = line[first.1.len()..].split_whitespace().next().unwrap_or("");
            if let Some(book) = book_number(code) {
                if !scan.books.contains(&book) {
                    scan.books.push(book);
                }
            }
        }
        scan.markers.extend(markers.into_iter().map(|(_, m)| m.to_string()));
    }
    Ok(scan)
}

/// Backslash tokens that start a word, with their byte offsets
fn markers_in(line: &str) -> Vec<(usize, &str)> {
    let mut found = Vec::new();
    let mut pos = 0;
    while let Some(offset) = line[pos..].find('\\') {
        let start = pos + offset;
        let rest = &line[start + 1..];
        if rest.starts_with('\\') {
            pos = start + 2;
            continue;
        }
        let len = rest.find(|c: char| c.is_whitespace() || c == '\\').unwrap_or(rest.len());
        let at_word_start = line[..start].chars().next_back().map_or(true, char::is_whitespace);
        if len > 0 && at_word_start {
            found.push((start, &line[start..start + 1 + len]));
        }
        pos = start + 1 + len;
    }
    found
}
