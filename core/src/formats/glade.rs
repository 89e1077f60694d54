/// Glade / GtkBuilder format handler
/// Streams the markup and collects text of elements flagged translatable,
/// elements from the allow-list, and allow-listed attribute values

use super::{ExtractError, FormatHandler, SourceFormat};
use crate::catalog::{Catalog, TranslationEntry};
use crate::config::{ExtractorConfig, MarkupConfig};
use crate::encoding;
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone)]
pub struct GladeHandler {
    config: MarkupConfig,
}

/// Text collected for the translatable element currently open
#[derive(Debug)]
struct Capture {
    line: usize,
    depth: usize,
    context: Option<String>,
    comments: Option<String>,
    text: String,
}

impl GladeHandler {
    pub fn new(config: MarkupConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(config.markup.clone())
    }

    /// Extract messages from decoded markup text.
    pub fn extract_markup(&self, path: &str, xml: &str) -> Result<Catalog, ExtractError> {
        let mut reader = Reader::from_str(xml);
        let line_starts = line_starts_of(xml);
        let line_at = |pos: usize| byte_pos_to_line(pos, &line_starts);

        let mut catalog = Catalog::new();
        let mut open: Vec<(String, usize)> = Vec::new();
        let mut capture: Option<Capture> = None;

        loop {
            let line = line_at(reader.buffer_position() as usize);
            let event = reader.read_event().map_err(|e| ExtractError::StructuralParse {
                line: line_at(reader.buffer_position() as usize),
                message: e.to_string(),
            })?;

            match event {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let attributes = read_attributes(&e, line)?;
                    self.add_attribute_entries(&mut catalog, path, line, &attributes);
                    open.push((name.clone(), line));

                    if capture.is_none() && self.is_translatable(&name, &attributes) {
                        capture = Some(Capture {
                            line,
                            depth: open.len(),
                            context: attribute(&attributes, "context"),
                            comments: attribute(&attributes, "comments"),
                            text: String::new(),
                        });
                    }
                }
                Event::Empty(e) => {
                    let attributes = read_attributes(&e, line)?;
                    self.add_attribute_entries(&mut catalog, path, line, &attributes);
                }
                Event::Text(e) => {
                    if let Some(capture) = capture.as_mut() {
                        let text = e.unescape().map_err(|e| ExtractError::StructuralParse {
                            line,
                            message: e.to_string(),
                        })?;
                        capture.text.push_str(&text);
                    }
                }
                Event::CData(e) => {
                    if let Some(capture) = capture.as_mut() {
                        capture.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Event::End(_) => {
                    if capture.as_ref().map_or(false, |c| c.depth == open.len()) {
                        if let Some(done) = capture.take() {
                            emit(&mut catalog, path, done);
                        }
                    }
                    open.pop();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some((name, line)) = open.pop() {
            return Err(ExtractError::StructuralParse {
                line,
                message: format!("element <{}> is never closed", name),
            });
        }

        Ok(catalog)
    }

    fn is_translatable(&self, name: &str, attributes: &[(String, String)]) -> bool {
        match attribute(attributes, "translatable").as_deref() {
            Some("yes" | "true" | "1") => true,
            Some("no" | "false" | "0") => false,
            _ => self.config.elements.iter().any(|element| element == name),
        }
    }

    fn add_attribute_entries(
        &self,
        catalog: &mut Catalog,
        path: &str,
        line: usize,
        attributes: &[(String, String)],
    ) {
        for (key, value) in attributes {
            if value.trim().is_empty() || !self.config.attributes.contains(key) {
                continue;
            }
            catalog.add(TranslationEntry::new(value.clone()).with_reference(path, line));
        }
    }
}

impl FormatHandler for GladeHandler {
    fn extract(&self, path: &str, content: &[u8]) -> Result<Catalog, ExtractError> {
        let xml = encoding::decode_source(content);
        self.extract_markup(path, &xml)
    }

    fn format(&self) -> SourceFormat {
        SourceFormat::Glade
    }
}

fn emit(catalog: &mut Catalog, path: &str, capture: Capture) {
    if capture.text.trim().is_empty() {
        debug!("{}:{}: skipping empty markup text", path, capture.line);
        return;
    }
    let mut entry = TranslationEntry::new(capture.text).with_reference(path, capture.line);
    entry.msgctxt = capture.context.filter(|c| !c.is_empty());
    entry.extracted_comment = capture.comments.filter(|c| !c.trim().is_empty());
    catalog.add(entry);
}

fn read_attributes(e: &BytesStart<'_>, line: usize) -> Result<Vec<(String, String)>, ExtractError> {
    let malformed = |message: String| ExtractError::StructuralParse { line, message };
    e.attributes()
        .map(|attr| {
            let attr = attr.map_err(|e| malformed(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| malformed(e.to_string()))?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

fn attribute(attributes: &[(String, String)], name: &str) -> Option<String> {
    attributes
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
}

/// Byte offsets where each line starts
fn line_starts_of(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(
        text.bytes()
            .enumerate()
            .filter(|(_, b)| *b == b'\n')
            .map(|(i, _)| i + 1),
    );
    starts
}

/// 1-based line of a byte offset
fn byte_pos_to_line(pos: usize, starts: &[usize]) -> usize {
    starts.partition_point(|&s| s <= pos).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(xml: &str) -> Result<Catalog, ExtractError> {
        GladeHandler::from_config(&ExtractorConfig::default()).extract_markup("test.glade", xml)
    }

    const OLD_STYLE: &str = r#"<?xml version="1.0"?>
<GTK-Interface>
<widget>
  <class>GtkWindow</class>
  <title>window1</title>
  <widget>
    <class>GtkLabel</class>
    <label>1st line
2nd line</label>
  </widget>
  <widget>
    <class>GtkLabel</class>
    <label>&lt;span&gt;&amp;quot;markup&amp;quot;&lt;/span&gt;</label>
  </widget>
</widget>
</GTK-Interface>
"#;

    #[test]
    fn test_old_style_elements() {
        let catalog = extract(OLD_STYLE).unwrap();
        let msgids: Vec<_> = catalog.iter().map(|e| e.msgid.as_str()).collect();
        assert_eq!(
            msgids,
            vec!["window1", "1st line\n2nd line", "<span>&quot;markup&quot;</span>"]
        );
        assert_eq!(
            catalog.get("window1", None).unwrap().reference_strings(),
            vec!["test.glade:5"]
        );
        assert_eq!(
            catalog.get("1st line\n2nd line", None).unwrap().reference_strings(),
            vec!["test.glade:8"]
        );
        // class names are not user-visible text
        assert!(catalog.get("GtkWindow", None).is_none());
    }

    #[test]
    fn test_builder_properties() {
        let xml = r#"<interface>
  <object class="GtkButton">
    <property name="label" translatable="yes" context="menu" comments="File menu entry">_Open</property>
    <property name="name">open_button</property>
    <property name="tooltip_text" translatable="yes">Open a file</property>
  </object>
</interface>
"#;
        let catalog = extract(xml).unwrap();
        assert_eq!(catalog.len(), 2);
        let open = catalog.get("_Open", Some("menu")).unwrap();
        assert_eq!(open.extracted_comment.as_deref(), Some("File menu entry"));
        assert_eq!(open.reference_strings(), vec!["test.glade:3"]);
        assert!(catalog.get("open_button", None).is_none());
    }

    #[test]
    fn test_translatable_no_overrides_allow_list() {
        let xml = "<root><label translatable=\"no\">internal</label><label>shown</label></root>";
        let catalog = extract(xml).unwrap();
        assert!(catalog.get("internal", None).is_none());
        assert!(catalog.get("shown", None).is_some());
    }

    #[test]
    fn test_allow_listed_attributes() {
        let xml = "<root>\n  <entry placeholder_text=\"Search&#8230;\" tooltip_text=\"\"/>\n</root>\n";
        let catalog = extract(xml).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.entries()[0].msgid, "Search\u{2026}");
        assert_eq!(catalog.entries()[0].reference_strings(), vec!["test.glade:2"]);
    }

    #[test]
    fn test_duplicates_merge_locations() {
        let xml = "<root>\n<label>duplicated</label>\n<title>other</title>\n<label>duplicated</label>\n</root>\n";
        let catalog = extract(xml).unwrap();
        assert_eq!(
            catalog.get("duplicated", None).unwrap().reference_strings(),
            vec!["test.glade:2", "test.glade:4"]
        );
    }

    #[test]
    fn test_cdata_and_empty_text() {
        let xml = "<root><label><![CDATA[a <b>bold</b> word]]></label><label>   </label><label/></root>";
        let catalog = extract(xml).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.entries()[0].msgid, "a <b>bold</b> word");
    }

    #[test]
    fn test_mismatched_end_tag_is_error() {
        let err = extract("<root>\n<label>text</title>\n</root>").unwrap_err();
        assert!(matches!(err, ExtractError::StructuralParse { .. }));
    }

    #[test]
    fn test_unclosed_element_is_error() {
        let err = extract("<root>\n  <label>text</label>\n").unwrap_err();
        assert!(matches!(err, ExtractError::StructuralParse { .. }));
    }

    #[test]
    fn test_line_lookup() {
        let starts = line_starts_of("a\nbb\n\nc");
        assert_eq!(byte_pos_to_line(0, &starts), 1);
        assert_eq!(byte_pos_to_line(2, &starts), 2);
        assert_eq!(byte_pos_to_line(5, &starts), 3);
        assert_eq!(byte_pos_to_line(6, &starts), 4);
    }
}
