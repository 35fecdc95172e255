//! Pull-based segment enumeration

use crate::converter::ConverterGateway;
use crate::error::ImportError;
use crate::mapping::{InlineRole, MappingEntry, MappingList, MarkerDomain, ID_MARKER};
use crate::reference::{BcvRef, Versification};
use crate::settings::{ImportDomain, ImportSettings};
use crate::source::{LineSource, SourceEvent, SourceLine};
use crate::tokenizer::{MarkerKind, MarkerToken, MarkerTokenizer};
use crate::tracker::ReferenceTracker;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::path::PathBuf;
use std::sync::Arc;

/// One typed, reference-tagged piece of imported text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSegment {
    /// Marker exactly as matched (`\v`, `\f `, `|r`); empty for text before
    /// the first marker of a file
    pub marker: String,
    /// Converted text
    pub text: String,
    pub first_reference: BcvRef,
    pub last_reference: BcvRef,
    /// Raw verse number of a `\v` segment
    pub literal_verse_number: Option<String>,
    /// 1-based line of the marker within its file
    pub line_number: usize,
    pub file: PathBuf,
    /// Note type of the annotation file the segment came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_type: Option<String>,
}

/// Lifecycle of an enumerator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumeratorState {
    NotStarted,
    /// Reading and discarding segments that precede the requested range
    Positioning,
    /// The last segment handed out was in range
    Emitting,
    Exhausted,
}

/// Domain and writing system that a marker's text belongs to
#[derive(Debug, Clone, Default)]
struct MarkerContext {
    domain: MarkerDomain,
    writing_system: Option<String>,
    end_marker: Option<String>,
}

impl MarkerContext {
    fn from_entry(entry: Option<&MappingEntry>) -> Self {
        match entry {
            Some(entry) => Self {
                domain: if entry.domain.is_empty() { MarkerDomain::DEFAULT } else { entry.domain },
                writing_system: entry.writing_system.clone(),
                end_marker: entry.end_marker.clone(),
            },
            None => Self::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingSegment {
    marker: String,
    text: String,
    first: BcvRef,
    last: BcvRef,
    literal_verse: Option<String>,
    line_number: usize,
    file_index: usize,
    writing_system: String,
}

enum Disposition {
    Emit,
    Skip,
    Stop,
}

/// Single-pass iterator over the segments of one import domain
///
/// Lines are pulled from the domain's files on demand. A segment stays open
/// while continuation lines extend it and is handed out once the next marker
/// (or the end of its file) closes it. Segments before `start` are read but
/// not returned; the first segment after `end` ends the enumeration.
pub struct SegmentEnumerator {
    domain: ImportDomain,
    start: BcvRef,
    end: BcvRef,
    mappings: Arc<MappingList>,
    settings: Arc<ImportSettings>,
    versification: Arc<dyn Versification>,
    converters: ConverterGateway,
    source: LineSource,
    tracker: ReferenceTracker,
    state: EnumeratorState,
    pending: Option<PendingSegment>,
    ready: VecDeque<PendingSegment>,
    paragraph: Option<MarkerContext>,
    inline_stack: Vec<MarkerContext>,
    current_file: Option<usize>,
    waiting_for_id: bool,
    /// Segments skipped since the last emitted one
    skipped: usize,
}

impl SegmentEnumerator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        domain: ImportDomain,
        start: BcvRef,
        end: BcvRef,
        source: LineSource,
        mappings: Arc<MappingList>,
        settings: Arc<ImportSettings>,
        versification: Arc<dyn Versification>,
        converters: ConverterGateway,
    ) -> Self {
        Self {
            domain,
            start,
            end,
            mappings,
            settings,
            versification,
            converters,
            source,
            tracker: ReferenceTracker::new(),
            state: EnumeratorState::NotStarted,
            pending: None,
            ready: VecDeque::new(),
            paragraph: None,
            inline_stack: Vec::new(),
            current_file: None,
            waiting_for_id: false,
            skipped: 0,
        }
    }

    pub fn state(&self) -> EnumeratorState {
        self.state
    }

    pub fn domain(&self) -> ImportDomain {
        self.domain
    }

    /// Whether a file handle is currently held
    pub fn holds_open_file(&self) -> bool {
        self.source.is_open()
    }

    /// Next segment in range, or `None` once the range or the files are done
    ///
    /// After `None` or an error every further call returns `None`.
    pub fn next_segment(&mut self) -> Result<Option<TextSegment>, ImportError> {
        if self.state == EnumeratorState::NotStarted {
            tracing::debug!(domain = ?self.domain, start = %self.start, end = %self.end, "starting enumeration");
            self.state = EnumeratorState::Positioning;
        }

        loop {
            if self.state == EnumeratorState::Exhausted {
                return Ok(None);
            }

            if let Some(segment) = self.ready.pop_front() {
                match self.disposition(&segment) {
                    Disposition::Skip => {
                        self.state = EnumeratorState::Positioning;
                        self.skipped += 1;
                        continue;
                    }
                    Disposition::Stop => {
                        tracing::debug!(reference = %segment.first, "passed end of range");
                        self.finish();
                        return Ok(None);
                    }
                    Disposition::Emit => {
                        if self.state == EnumeratorState::Positioning && self.skipped > 0 {
                            tracing::debug!(skipped = self.skipped, reference = %segment.first, "reached start of range");
                            self.skipped = 0;
                        }
                        self.state = EnumeratorState::Emitting;
                        let result = self.emit(segment);
                        if result.is_err() {
                            self.finish();
                        }
                        return result.map(Some);
                    }
                }
            }

            let event = match self.source.next_event() {
                Ok(event) => event,
                Err(e) => {
                    self.finish();
                    return Err(e);
                }
            };
            match event {
                Some(SourceEvent::FileStart { index }) => self.enter_file(index),
                Some(SourceEvent::Line(line)) => self.consume_line(line),
                Some(SourceEvent::FileEnd { .. }) => self.close_pending(),
                None => {
                    self.close_pending();
                    if self.ready.is_empty() {
                        self.finish();
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn finish(&mut self) {
        self.state = EnumeratorState::Exhausted;
        self.pending = None;
        self.ready.clear();
        self.source.stop();
    }

    fn disposition(&self, segment: &PendingSegment) -> Disposition {
        let v = self.versification.as_ref();
        if v.compare(&segment.first, &self.end) == Ordering::Greater {
            return Disposition::Stop;
        }
        if v.compare(&segment.last, &self.start) == Ordering::Less {
            // `\id` line and front matter of a book the range reaches into
            let book = segment.first.book;
            let front_matter = segment.first.chapter == 0 && book > 0 && (self.start.book..=self.end.book).contains(&book);
            return if front_matter { Disposition::Emit } else { Disposition::Skip };
        }
        Disposition::Emit
    }

    fn emit(&mut self, segment: PendingSegment) -> Result<TextSegment, ImportError> {
        let descriptor = self.source.descriptor(segment.file_index);
        let encoding = descriptor.encoding;
        let file = descriptor.path.clone();
        let note_type = descriptor.note_type.clone();
        let text = self.converters.convert(&segment.writing_system, encoding, segment.text)?;
        Ok(TextSegment {
            marker: segment.marker,
            text,
            first_reference: segment.first,
            last_reference: segment.last,
            literal_verse_number: segment.literal_verse,
            line_number: segment.line_number,
            file,
            note_type,
        })
    }

    fn enter_file(&mut self, index: usize) {
        self.close_pending();
        self.current_file = Some(index);
        self.paragraph = None;
        self.inline_stack.clear();
        self.waiting_for_id = self.settings.skip_before_id;
        self.tracker.enter_file(self.source.descriptor(index).declared_book());
    }

    fn close_pending(&mut self) {
        if let Some(segment) = self.pending.take() {
            self.ready.push_back(segment);
        }
    }

    fn consume_line(&mut self, line: SourceLine) {
        let pieces = MarkerTokenizer::new(&self.mappings, self.settings.dialect).tokenize(&line.text);
        for piece in pieces {
            if self.waiting_for_id {
                match &piece.marker {
                    Some(token) if token.key == ID_MARKER => self.waiting_for_id = false,
                    _ => continue,
                }
            }
            match piece.marker {
                Some(token) => self.open_segment(token, &piece.text, line.number),
                None => self.append_text(&piece.text, line.number),
            }
        }
    }

    fn append_text(&mut self, text: &str, line_number: usize) {
        if let Some(pending) = self.pending.as_mut() {
            pending.text.push_str(text);
            return;
        }
        if text.trim().is_empty() {
            return;
        }
        let context = self.paragraph.clone().unwrap_or_default();
        self.pending = Some(self.new_pending(String::new(), text.to_string(), None, &context, line_number));
    }

    fn open_segment(&mut self, token: MarkerToken, text: &str, line_number: usize) {
        self.close_pending();
        let context = self.context_for(&token);
        let declared_book = self.current_file.and_then(|i| self.source.descriptor(i).declared_book());
        let update = self.tracker.apply(&token.key, text, declared_book);
        self.pending = Some(self.new_pending(token.spelling, update.text, update.literal_verse, &context, line_number));
    }

    fn new_pending(
        &self,
        marker: String,
        text: String,
        literal_verse: Option<String>,
        context: &MarkerContext,
        line_number: usize,
    ) -> PendingSegment {
        let file_index = self.current_file.unwrap_or_default();
        let file_ws = self.source.descriptor(file_index).writing_system.as_deref();
        let writing_system =
            self.converters
                .writing_system_for(context.writing_system.as_deref(), context.domain, self.domain, file_ws);
        PendingSegment {
            marker,
            text,
            first: self.tracker.first(),
            last: self.tracker.last(),
            literal_verse,
            line_number,
            file_index,
            writing_system,
        }
    }

    /// Context for the text following `token`, updating the marker stack
    fn context_for(&mut self, token: &MarkerToken) -> MarkerContext {
        match token.kind {
            MarkerKind::Line => {
                let context = MarkerContext::from_entry(self.mappings.lookup(&token.key));
                self.paragraph = Some(context.clone());
                self.inline_stack.clear();
                context
            }
            MarkerKind::Inline(InlineRole::Begin) => self.push_inline(&token.key),
            MarkerKind::Inline(InlineRole::End) => self.pop_inline(&token.key),
            MarkerKind::Inline(InlineRole::Either) => {
                if self.open_inline_index(&token.key).is_some() {
                    self.pop_inline(&token.key)
                } else {
                    self.push_inline(&token.key)
                }
            }
        }
    }

    fn push_inline(&mut self, key: &str) -> MarkerContext {
        let context = MarkerContext::from_entry(self.mappings.lookup(key));
        self.inline_stack.push(context.clone());
        context
    }

    fn open_inline_index(&self, end_marker: &str) -> Option<usize> {
        self.inline_stack
            .iter()
            .rposition(|c| c.end_marker.as_deref() == Some(end_marker))
    }

    /// Close the innermost begin marker ending with `end_marker`; the text
    /// after it belongs to whatever encloses that marker
    fn pop_inline(&mut self, end_marker: &str) -> MarkerContext {
        if let Some(index) = self.open_inline_index(end_marker) {
            self.inline_stack.truncate(index);
        }
        self.inline_stack
            .last()
            .or(self.paragraph.as_ref())
            .cloned()
            .unwrap_or_default()
    }
}

impl Iterator for SegmentEnumerator {
    type Item = Result<TextSegment, ImportError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_segment().transpose()
    }
}

impl FusedIterator for SegmentEnumerator {}
