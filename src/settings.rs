//! Import settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Marker conventions of the source project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Mapped spellings are authoritative
    #[default]
    Generic,
    /// Paratext 5 / USFM: backslash inline begin markers own the space after them
    Paratext5,
}

/// Logical channel an import file belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportDomain {
    #[default]
    Main,
    BackTrans,
    Annotations,
}

impl ImportDomain {
    pub fn is_analysis(self) -> bool {
        !matches!(self, ImportDomain::Main)
    }
}

/// Per writing system configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritingSystemSettings {
    /// Name of the legacy encoding converter, if the data is not Unicode
    #[serde(default)]
    pub converter: Option<String>,
}

/// Settings for one import run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub dialect: Dialect,
    /// Writing system of the vernacular (main and footnote) text
    pub vernacular_writing_system: String,
    /// Writing system used for back translations and notes without their own
    pub analysis_writing_system: String,
    pub writing_systems: HashMap<String, WritingSystemSettings>,
    /// Drop anything that precedes the first `\id` of each file
    pub skip_before_id: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            dialect: Dialect::Generic,
            vernacular_writing_system: "vern".to_string(),
            analysis_writing_system: "en".to_string(),
            writing_systems: HashMap::new(),
            skip_before_id: false,
        }
    }
}

impl ImportSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_vernacular(mut self, ws: impl Into<String>) -> Self {
        self.vernacular_writing_system = ws.into();
        self
    }

    pub fn with_analysis(mut self, ws: impl Into<String>) -> Self {
        self.analysis_writing_system = ws.into();
        self
    }

    /// Configure the legacy converter of a writing system
    pub fn with_converter(mut self, ws: impl Into<String>, converter: impl Into<String>) -> Self {
        self.writing_systems.entry(ws.into()).or_default().converter = Some(converter.into());
        self
    }

    pub fn with_skip_before_id(mut self, skip: bool) -> Self {
        self.skip_before_id = skip;
        self
    }

    /// Converter name configured for `ws`
    pub fn converter_for(&self, ws: &str) -> Option<&str> {
        self.writing_systems.get(ws).and_then(|w| w.converter.as_deref())
    }
}
