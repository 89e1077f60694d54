/// Extraction orchestrator
///
/// Picks a format handler per file by extension, scans the files on the rayon
/// pool and merges the per-file catalogs in input order on the calling thread.

use crate::catalog::Catalog;
use crate::config::ExtractorConfig;
use crate::formats::erb::ErbHandler;
use crate::formats::glade::GladeHandler;
use crate::formats::ruby::RubyHandler;
use crate::formats::{ExtractError, FormatHandler, SourceFormat};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A file that could not be scanned
#[derive(Debug)]
pub struct FileFailure {
    pub path: String,
    pub error: ExtractError,
}

/// Result of one extraction run
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub catalog: Catalog,
    pub failures: Vec<FileFailure>,
    /// Files never started because the run was cancelled
    pub skipped: Vec<String>,
}

enum Outcome {
    Skipped,
    Scanned(Result<Catalog, ExtractError>),
}

pub struct Extractor {
    extensions: HashMap<String, SourceFormat>,
    ruby: RubyHandler,
    glade: GladeHandler,
    erb: ErbHandler,
    strict: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl Extractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        let mut extensions: HashMap<String, SourceFormat> = ["rb", "glade", "ui", "erb", "rhtml"]
            .into_iter()
            .filter_map(|ext| SourceFormat::from_extension(ext).map(|f| (ext.to_string(), f)))
            .collect();
        for ext in &config.template.extensions {
            extensions.insert(normalize_extension(ext), SourceFormat::Erb);
        }

        Self {
            extensions,
            ruby: RubyHandler::from_config(config),
            glade: GladeHandler::from_config(config),
            erb: ErbHandler::from_config(config),
            strict: config.strict,
            cancel: None,
        }
    }

    /// Route files with `ext` to `format`, replacing any previous mapping.
    pub fn register_extension(&mut self, ext: &str, format: SourceFormat) {
        self.extensions.insert(normalize_extension(ext), format);
    }

    /// Share a flag that stops the run from starting further files once set.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn format_for(&self, path: &Path) -> Option<SourceFormat> {
        let ext = path.extension()?.to_str()?;
        self.extensions.get(&normalize_extension(ext)).copied()
    }

    pub fn handler(&self, format: SourceFormat) -> &dyn FormatHandler {
        match format {
            SourceFormat::Ruby => &self.ruby,
            SourceFormat::Glade => &self.glade,
            SourceFormat::Erb => &self.erb,
        }
    }

    /// Scan a single file into its own catalog.
    pub fn extract_file(&self, path: &Path) -> Result<Catalog, ExtractError> {
        let display = path.to_string_lossy();
        let format = self
            .format_for(path)
            .ok_or_else(|| ExtractError::UnsupportedFormat(display.to_string()))?;
        let content = fs::read(path)?;
        let handler = self.handler(format);
        let catalog = handler.extract(&display, &content)?;
        debug!(
            "{}: {} message(s) via {:?} handler",
            display,
            catalog.len(),
            handler.format()
        );
        Ok(catalog)
    }

    /// Scan every path and merge the results in input order.
    ///
    /// A file that fails is recorded in the report, unless the extractor is
    /// strict, in which case the first failure in input order aborts the run.
    pub fn extract<P>(&self, paths: &[P]) -> Result<ExtractionReport, ExtractError>
    where
        P: AsRef<Path> + Sync,
    {
        let outcomes: Vec<Outcome> = paths
            .par_iter()
            .map(|path| {
                if self.is_cancelled() {
                    Outcome::Skipped
                } else {
                    Outcome::Scanned(self.extract_file(path.as_ref()))
                }
            })
            .collect();

        let mut report = ExtractionReport::default();
        for (path, outcome) in paths.iter().zip(outcomes) {
            let path = path.as_ref().to_string_lossy().into_owned();
            match outcome {
                Outcome::Skipped => report.skipped.push(path),
                Outcome::Scanned(Ok(catalog)) => report.catalog.merge(catalog),
                Outcome::Scanned(Err(error)) if self.strict => {
                    return Err(ExtractError::Aborted {
                        path,
                        source: Box::new(error),
                    });
                }
                Outcome::Scanned(Err(error)) => {
                    warn!("Failed to extract {}: {}", path, error);
                    report.failures.push(FileFailure { path, error });
                }
            }
        }

        if !report.skipped.is_empty() {
            warn!("Extraction cancelled, {} file(s) skipped", report.skipped.len());
        }
        info!(
            "Extracted {} message(s) from {} file(s), {} failed",
            report.catalog.len(),
            paths.len() - report.skipped.len() - report.failures.len(),
            report.failures.len()
        );
        Ok(report)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}
