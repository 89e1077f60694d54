pub mod catalog;
pub mod config;
pub mod encoding;
pub mod extractor;
pub mod formats;
pub mod scanners;

pub use catalog::{Catalog, EntryKey, SourceLocation, TranslationEntry};
pub use config::{CommentTags, ExtractorConfig, MarkerConfig, MarkerKind, MarkupConfig, TemplateConfig};
pub use extractor::{ExtractionReport, Extractor, FileFailure};
pub use formats::{ExtractError, FormatHandler, SourceFormat};
