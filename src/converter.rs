//! Legacy encoding conversion
//!
//! Converters are looked up by name through an injected [`ConverterLookup`].
//! The [`ConverterGateway`] decides which writing system a piece of text
//! belongs to and resolves (and caches) that writing system's converter the
//! first time it is actually needed.

use crate::error::ImportError;
use crate::mapping::MarkerDomain;
use crate::settings::{ImportDomain, ImportSettings};
use crate::source::DeclaredEncoding;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A text conversion function
pub type ConverterFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Named converter registry capability
pub trait ConverterLookup: Send + Sync {
    fn resolve(&self, name: &str) -> Option<ConverterFn>;
}

/// In-memory converter registry
#[derive(Default, Clone)]
pub struct ConverterRegistry {
    converters: HashMap<String, ConverterFn>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, convert: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.converters.insert(name.into(), Arc::new(convert));
    }

    pub fn with<F>(mut self, name: impl Into<String>, convert: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.register(name, convert);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.converters.keys().map(String::as_str)
    }
}

impl ConverterLookup for ConverterRegistry {
    fn resolve(&self, name: &str) -> Option<ConverterFn> {
        self.converters.get(name).cloned()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ConverterRegistry").field("converters", &names).finish()
    }
}

/// Table-driven converter replacing legacy code points with Unicode text
///
/// Keys may be longer than one character; the longest key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharMapConverter {
    rules: Vec<(String, String)>,
}

impl CharMapConverter {
    pub fn from_table<I, K, V>(table: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut rules: Vec<(String, String)> = table
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        rules.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { rules }
    }

    pub fn convert(&self, input: &str) -> String {
        let mut output = String::with_capacity(input.len());
        let mut rest = input;
        'outer: while let Some(c) = rest.chars().next() {
            for (from, to) in &self.rules {
                if let Some(after) = rest.strip_prefix(from.as_str()) {
                    output.push_str(to);
                    rest = after;
                    continue 'outer;
                }
            }
            output.push(c);
            rest = &rest[c.len_utf8()..];
        }
        output
    }

    pub fn into_fn(self) -> ConverterFn {
        Arc::new(move |text: &str| self.convert(text))
    }
}

/// Picks and applies the converter for each segment's writing system
pub struct ConverterGateway {
    lookup: Arc<dyn ConverterLookup>,
    vernacular: String,
    analysis: String,
    names: HashMap<String, String>,
    resolved: HashMap<String, Option<ConverterFn>>,
}

impl ConverterGateway {
    pub fn new(settings: &ImportSettings, lookup: Arc<dyn ConverterLookup>) -> Self {
        let names = settings
            .writing_systems
            .keys()
            .filter_map(|ws| settings.converter_for(ws).map(|name| (ws.clone(), name.to_string())))
            .collect();
        Self {
            lookup,
            vernacular: settings.vernacular_writing_system.clone(),
            analysis: settings.analysis_writing_system.clone(),
            names,
            resolved: HashMap::new(),
        }
    }

    /// Writing system that text with the given marker context belongs to
    ///
    /// A marker's own override wins. Back translation and annotation text
    /// uses the file's writing system (or the analysis default); everything
    /// else, footnotes included, is vernacular.
    pub fn writing_system_for(
        &self,
        marker_ws: Option<&str>,
        domain: MarkerDomain,
        import_domain: ImportDomain,
        file_ws: Option<&str>,
    ) -> String {
        if let Some(ws) = marker_ws {
            return ws.to_string();
        }
        if domain.is_analysis() || import_domain.is_analysis() {
            return file_ws.unwrap_or(&self.analysis).to_string();
        }
        self.vernacular.clone()
    }

    /// Converter for `ws`, or `None` when its data needs no conversion
    pub fn resolve(&mut self, ws: &str) -> Result<Option<ConverterFn>, ImportError> {
        if let Some(cached) = self.resolved.get(ws) {
            return Ok(cached.clone());
        }
        let resolved = match self.names.get(ws) {
            None => None,
            Some(name) => match self.lookup.resolve(name) {
                Some(convert) => {
                    tracing::debug!(writing_system = ws, converter = %name, "resolved encoding converter");
                    Some(convert)
                }
                None => {
                    return Err(ImportError::EncodingConverterNotFound {
                        writing_system: ws.to_string(),
                        converter: name.clone(),
                    })
                }
            },
        };
        self.resolved.insert(ws.to_string(), resolved.clone());
        Ok(resolved)
    }

    /// Convert `text` read from a file with the given declared encoding
    pub fn convert(&mut self, ws: &str, encoding: DeclaredEncoding, text: String) -> Result<String, ImportError> {
        if encoding == DeclaredEncoding::Unicode {
            return Ok(text);
        }
        match self.resolve(ws)? {
            Some(convert) => Ok(convert(&text)),
            None => Ok(text),
        }
    }
}

impl fmt::Debug for ConverterGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterGateway")
            .field("vernacular", &self.vernacular)
            .field("analysis", &self.analysis)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}
