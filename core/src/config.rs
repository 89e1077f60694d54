/// Configuration for message extraction
use crate::formats::ExtractError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Marker identifiers for each call shape
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarkerConfig {
    /// `_("msgid")`
    #[serde(default = "default_simple")]
    pub simple: Vec<String>,

    /// `n_("msgid", "plural", n)`
    #[serde(default = "default_plural")]
    pub plural: Vec<String>,

    /// `p_("context", "msgid")`
    #[serde(default = "default_contextual")]
    pub contextual: Vec<String>,

    /// `N_("msgid")`: marked for the catalog, not translated at runtime
    #[serde(default = "default_mark_only")]
    pub mark_only: Vec<String>,
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn default_simple() -> Vec<String> {
    to_strings(&["_", "gettext", "s_", "sgettext"])
}

fn default_plural() -> Vec<String> {
    to_strings(&["n_", "ngettext", "ns_", "nsgettext", "Nn_"])
}

fn default_contextual() -> Vec<String> {
    to_strings(&["p_", "pgettext"])
}

fn default_mark_only() -> Vec<String> {
    to_strings(&["N_"])
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            simple: default_simple(),
            plural: default_plural(),
            contextual: default_contextual(),
            mark_only: default_mark_only(),
        }
    }
}

/// Call shape a marker identifier stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Simple,
    Plural,
    Contextual,
    MarkOnly,
}

impl MarkerConfig {
    pub fn kind_of(&self, ident: &str) -> Option<MarkerKind> {
        let has = |names: &[String]| names.iter().any(|name| name == ident);
        if has(&self.simple) {
            Some(MarkerKind::Simple)
        } else if has(&self.plural) {
            Some(MarkerKind::Plural)
        } else if has(&self.contextual) {
            Some(MarkerKind::Contextual)
        } else if has(&self.mark_only) {
            Some(MarkerKind::MarkOnly)
        } else {
            None
        }
    }
}

/// Comment tags that attach annotations to the next marker call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommentTags {
    /// Translator note, stored in `comment`
    #[serde(default = "default_note_tag")]
    pub note: String,

    /// Developer hint, stored in `extracted_comment`
    #[serde(default = "default_extracted_tag")]
    pub extracted: String,
}

fn default_note_tag() -> String {
    "NOTE:".to_string()
}

fn default_extracted_tag() -> String {
    "TRANSLATORS:".to_string()
}

impl Default for CommentTags {
    fn default() -> Self {
        Self {
            note: default_note_tag(),
            extracted: default_extracted_tag(),
        }
    }
}

/// Markup names known to carry user-visible text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarkupConfig {
    #[serde(default = "default_markup_elements")]
    pub elements: Vec<String>,

    #[serde(default = "default_markup_attributes")]
    pub attributes: Vec<String>,
}

fn default_markup_elements() -> Vec<String> {
    // Glade 1 stored translatable properties as plain child elements
    to_strings(&[
        "label",
        "title",
        "text",
        "format",
        "copyright",
        "comments",
        "preview_text",
        "tooltip",
    ])
}

fn default_markup_attributes() -> Vec<String> {
    to_strings(&["tooltip_text", "placeholder_text"])
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            elements: default_markup_elements(),
            attributes: default_markup_attributes(),
        }
    }
}

/// Extra file extensions handled by the template scanner
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfig {
    #[serde(default)]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractorConfig {
    #[serde(default)]
    pub markers: MarkerConfig,

    #[serde(default)]
    pub comment_tags: CommentTags,

    #[serde(default)]
    pub markup: MarkupConfig,

    #[serde(default)]
    pub template: TemplateConfig,

    /// Abort the whole run on the first file that fails to scan
    #[serde(default)]
    pub strict: bool,
}

impl ExtractorConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ExtractError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ExtractError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ExtractError::Config(format!("Failed to parse YAML config: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self, ExtractError> {
        serde_json::from_str(json)
            .map_err(|e| ExtractError::Config(format!("Failed to parse JSON config: {}", e)))
    }

    pub fn to_json(&self) -> Result<String, ExtractError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ExtractError::Config(format!("Failed to serialize config: {}", e)))
    }
}
