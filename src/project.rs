//! Import project: files, mappings and settings for every domain

use crate::converter::{ConverterGateway, ConverterLookup, ConverterRegistry};
use crate::enumerator::SegmentEnumerator;
use crate::mapping::MappingList;
use crate::reference::{BcvRef, StandardVersification, Versification};
use crate::settings::{ImportDomain, ImportSettings};
use crate::source::{FileDescriptor, LineSource};
use std::sync::Arc;

/// Everything needed to enumerate the segments of an import
///
/// Descriptors are kept in the order they were added; each enumeration reads
/// the descriptors of its domain in that order.
#[derive(Clone)]
pub struct ImportProject {
    files: Vec<FileDescriptor>,
    mappings: Arc<MappingList>,
    settings: Arc<ImportSettings>,
    versification: Arc<dyn Versification>,
    converters: Arc<dyn ConverterLookup>,
}

impl ImportProject {
    pub fn new(mappings: MappingList, settings: ImportSettings) -> Self {
        Self {
            files: Vec::new(),
            mappings: Arc::new(mappings),
            settings: Arc::new(settings),
            versification: Arc::new(StandardVersification),
            converters: Arc::new(ConverterRegistry::new()),
        }
    }

    pub fn with_converters(mut self, converters: Arc<dyn ConverterLookup>) -> Self {
        self.converters = converters;
        self
    }

    pub fn with_versification(mut self, versification: Arc<dyn Versification>) -> Self {
        self.versification = versification;
        self
    }

    pub fn with_file(mut self, file: FileDescriptor) -> Self {
        self.files.push(file);
        self
    }

    pub fn add_file(&mut self, file: FileDescriptor) {
        self.files.push(file);
    }

    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    pub fn mappings(&self) -> &MappingList {
        &self.mappings
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Enumerate the segments of `domain` between `start` and `end` inclusive
    pub fn create_enumerator(&self, domain: ImportDomain, start: BcvRef, end: BcvRef) -> SegmentEnumerator {
        let files: Vec<FileDescriptor> = self.files.iter().filter(|f| f.domain == domain).cloned().collect();
        let source = LineSource::new(files, Arc::clone(&self.versification)).with_window(start, end);
        let converters = ConverterGateway::new(&self.settings, Arc::clone(&self.converters));
        SegmentEnumerator::new(
            domain,
            start,
            end,
            source,
            Arc::clone(&self.mappings),
            Arc::clone(&self.settings),
            Arc::clone(&self.versification),
            converters,
        )
    }

    /// Enumerate everything in `domain`, including text with no book
    pub fn create_full_enumerator(&self, domain: ImportDomain) -> SegmentEnumerator {
        self.create_enumerator(domain, BcvRef::default(), BcvRef::book_end(u16::MAX))
    }
}
