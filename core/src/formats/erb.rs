/// ERB template format handler
/// Feeds the embedded Ruby of a template to the Ruby handler and maps the
/// reported lines back onto the template

use super::ruby::RubyHandler;
use super::{ExtractError, FormatHandler, SourceFormat};
use crate::catalog::Catalog;
use crate::config::ExtractorConfig;
use crate::encoding;
use crate::scanners::template;
use log::debug;

#[derive(Debug, Clone)]
pub struct ErbHandler {
    ruby: RubyHandler,
}

impl ErbHandler {
    pub fn new(ruby: RubyHandler) -> Self {
        Self { ruby }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(RubyHandler::from_config(config))
    }

    /// Encoding declared in the template's leading comment region, if any
    pub fn detect_encoding(&self, content: &[u8]) -> Option<String> {
        template::detect_encoding(&String::from_utf8_lossy(content))
    }

    /// Extract messages from decoded template text.
    pub fn extract_template(&self, path: &str, text: &str) -> Result<Catalog, ExtractError> {
        let buffer = template::split(text)?;
        let offsets = &buffer.offsets;

        let catalog = self
            .ruby
            .extract_source(path, &buffer.code)
            .map_err(|err| match err {
                ExtractError::LiteralSyntax { line, message } => ExtractError::LiteralSyntax {
                    line: offsets.template_line(line),
                    message,
                },
                other => other,
            })?;

        Ok(catalog.remap_lines(|line| offsets.template_line(line)))
    }
}

impl FormatHandler for ErbHandler {
    fn extract(&self, path: &str, content: &[u8]) -> Result<Catalog, ExtractError> {
        let text = match self.detect_encoding(content) {
            Some(label) => {
                debug!("{}: declared encoding {}", path, label);
                encoding::decode_declared(content, &label)
            }
            None => encoding::decode_source(content),
        };
        self.extract_template(path, &text)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Erb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> ErbHandler {
        ErbHandler::from_config(&ExtractorConfig::default())
    }

    #[test]
    fn test_lines_are_remapped_to_template() {
        let template = "<html>\n<head>\n<title><%= _(\"title\") %></title>\n</head>\n<body>\n<p>\n<%= n_(\"an item\", \"%{n} items\", n) %>\n</p>\n<%\n  label = _(\"label\")\n%>\n</body>\n";
        let catalog = handler().extract_template("view.rhtml", template).unwrap();
        assert_eq!(
            catalog.get("title", None).unwrap().reference_strings(),
            vec!["view.rhtml:3"]
        );
        let plural = catalog.get("an item", None).unwrap();
        assert_eq!(plural.msgid_plural.as_deref(), Some("%{n} items"));
        assert_eq!(plural.reference_strings(), vec!["view.rhtml:7"]);
        assert_eq!(
            catalog.get("label", None).unwrap().reference_strings(),
            vec!["view.rhtml:10"]
        );
    }

    #[test]
    fn test_literal_text_is_not_scanned() {
        let template = "<p>_(\"not code\")</p>\n<%= _('code') %>\n";
        let catalog = handler().extract_template("t.erb", template).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.entries()[0].reference_strings(), vec!["t.erb:2"]);
    }

    #[test]
    fn test_comment_region_carries_translator_hint() {
        let template = "<%# TRANSLATORS: page heading %>\n<h1><%= _(\"Welcome\") %></h1>\n";
        let catalog = handler().extract_template("t.erb", template).unwrap();
        assert_eq!(
            catalog.entries()[0].extracted_comment.as_deref(),
            Some("page heading")
        );
    }

    #[test]
    fn test_translator_hint_does_not_cross_markup() {
        let template = "<%# TRANSLATORS: header only %>\n<p>lots</p>\n<p>more</p>\n<p>text</p>\n<%= _(\"far\") %>\n";
        let catalog = handler().extract_template("t.erb", template).unwrap();
        let entry = catalog.get("far", None).unwrap();
        assert_eq!(entry.reference_strings(), vec!["t.erb:5"]);
        assert!(entry.extracted_comment.is_none());
    }

    #[test]
    fn test_unterminated_literal_reports_template_line() {
        let template = "<p>\n</p>\n<%= _(\"broken %>\n";
        let err = handler().extract_template("t.erb", template).unwrap_err();
        assert!(matches!(err, ExtractError::LiteralSyntax { line: 3, .. }));
    }

    #[test]
    fn test_unclosed_region() {
        let err = handler().extract("t.erb", b"<p>\n<%= _('x')\n").unwrap_err();
        assert!(matches!(err, ExtractError::UnclosedRegion { line: 2 }));
    }

    #[test]
    fn test_declared_encoding_is_used() {
        let mut content = b"<%# -*- coding: iso-8859-1 -*- %>\n<%= _('caf".to_vec();
        content.push(0xE9);
        content.extend_from_slice(b"') %>\n");
        let handler = handler();
        assert_eq!(handler.detect_encoding(&content), Some("ISO-8859-1".to_string()));
        let catalog = handler.extract("menu.rhtml", &content).unwrap();
        assert_eq!(
            catalog.get("café", None).unwrap().reference_strings(),
            vec!["menu.rhtml:2"]
        );
    }
}
