/// Format handlers: one per kind of source file
pub mod erb;
pub mod glade;
pub mod ruby;

use crate::catalog::Catalog;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Literal syntax error at line {line}: {message}")]
    LiteralSyntax { line: usize, message: String },

    #[error("Markup parse error at line {line}: {message}")]
    StructuralParse { line: usize, message: String },

    #[error("Embedded code region opened at line {line} is never closed")]
    UnclosedRegion { line: usize },

    #[error("Unsupported arguments for {marker} at line {line}")]
    UnsupportedArgumentShape { marker: String, line: usize },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Extraction aborted at {path}: {source}")]
    Aborted {
        path: String,
        source: Box<ExtractError>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Ruby source with gettext marker calls
    Ruby,
    /// Glade / GtkBuilder UI descriptions
    Glade,
    /// ERB templates
    Erb,
}

impl SourceFormat {
    /// Built-in extension table
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "rb" => Some(Self::Ruby),
            "glade" | "ui" => Some(Self::Glade),
            "erb" | "rhtml" => Some(Self::Erb),
            _ => None,
        }
    }
}

/// Trait for format-specific extractors
pub trait FormatHandler: Send + Sync {
    /// Extract every translatable message of one file.
    ///
    /// `path` is only used to build references; `content` is the whole file.
    fn extract(&self, path: &str, content: &[u8]) -> Result<Catalog, ExtractError>;

    /// Get the format this handler supports
    fn format(&self) -> SourceFormat;
}
