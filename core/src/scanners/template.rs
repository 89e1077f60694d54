/// ERB template splitting
///
/// Pulls the embedded Ruby out of a template into one code buffer, one region
/// after the other, and keeps a table mapping buffer lines back to template
/// lines. Literal text between regions is never scanned but its lines are
/// counted.

use crate::encoding::declared_encoding;
use crate::formats::ExtractError;

const OPEN: &str = "<%";
const CLOSE: &str = "%>";

/// Maps lines of the code buffer back to template lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineOffsets {
    /// `(buffer_line, template_line)` at the start of each region
    breakpoints: Vec<(usize, usize)>,
}

impl LineOffsets {
    pub fn push(&mut self, buffer_line: usize, template_line: usize) {
        self.breakpoints.push((buffer_line, template_line));
    }

    /// Template line of a 1-based buffer line.
    pub fn template_line(&self, buffer_line: usize) -> usize {
        let idx = self
            .breakpoints
            .partition_point(|&(start, _)| start <= buffer_line);
        match idx.checked_sub(1).map(|i| self.breakpoints[i]) {
            Some((start, template_line)) => template_line + (buffer_line - start),
            None => buffer_line,
        }
    }

    pub fn breakpoints(&self) -> &[(usize, usize)] {
        &self.breakpoints
    }
}

/// Embedded code of a template
#[derive(Debug, Clone, Default)]
pub struct CodeBuffer {
    pub code: String,
    pub offsets: LineOffsets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionKind {
    Code,
    Comment,
}

/// One `<% ... %>` region
#[derive(Debug)]
struct Region<'a> {
    kind: RegionKind,
    /// Text between the delimiters, without the opening flag or trim dash
    body: &'a str,
    /// Byte offset of the `<%`
    start: usize,
    /// Byte offset just past the `%>`
    end: usize,
}

/// Find the next region at or after byte offset `from`.
///
/// `Ok(None)` when no region opens any more; `Err(offset)` with the offset
/// of the `<%` when the region is never closed.
fn next_region(template: &str, from: usize) -> Result<Option<Region<'_>>, usize> {
    let mut search = from;
    let start = loop {
        let Some(found) = template[search..].find(OPEN) else {
            return Ok(None);
        };
        let start = search + found;
        // `<%%` is literal text
        if template[start + OPEN.len()..].starts_with('%') {
            search = start + OPEN.len() + 1;
            continue;
        }
        break start;
    };

    let mut body_start = start + OPEN.len();
    let mut kind = RegionKind::Code;
    let rest = &template[body_start..];
    if rest.starts_with("==") {
        body_start += 2;
    } else if rest.starts_with('=') || rest.starts_with('-') {
        body_start += 1;
    } else if rest.starts_with('#') {
        body_start += 1;
        kind = RegionKind::Comment;
    }

    let mut search = body_start;
    let close = loop {
        let Some(found) = template[search..].find(CLOSE) else {
            return Err(start);
        };
        let close = search + found;
        // `%%>` inside code is a literal `%>`
        if close > body_start && template[..close].ends_with('%') {
            search = close + CLOSE.len();
            continue;
        }
        break close;
    };

    let body = &template[body_start..close];
    let body = body.strip_suffix('-').unwrap_or(body);
    Ok(Some(Region {
        kind,
        body,
        start,
        end: close + CLOSE.len(),
    }))
}

/// Split a template into its code buffer.
pub fn split(template: &str) -> Result<CodeBuffer, ExtractError> {
    let mut buffer = CodeBuffer::default();
    let mut buffer_line = 1;
    let mut template_line = 1;
    let mut pos = 0;

    loop {
        let region = match next_region(template, pos) {
            Ok(Some(region)) => region,
            Ok(None) => break,
            Err(start) => {
                return Err(ExtractError::UnclosedRegion {
                    line: template_line + count_lines(&template[pos..start]),
                });
            }
        };

        let gap_lines = count_lines(&template[pos..region.start]);
        template_line += gap_lines;
        // literal lines between two regions keep them apart in the code too,
        // so a comment region only reaches code on the line right below it
        if gap_lines > 1 && !buffer.code.is_empty() {
            buffer.code.push('\n');
            buffer_line += 1;
        }
        buffer.offsets.push(buffer_line, template_line);

        let code = region.body.replace("%%>", "%>");
        let code = match region.kind {
            RegionKind::Code => code,
            RegionKind::Comment => format!("#{}", code.replace('\n', "\n#")),
        };
        buffer.code.push_str(&code);
        buffer.code.push('\n');

        buffer_line += count_lines(&code) + 1;
        template_line += count_lines(&template[region.start..region.end]);
        pos = region.end;
    }

    Ok(buffer)
}

/// Encoding named by a `coding: NAME` line in the template's first region,
/// when that region is a comment.
pub fn detect_encoding(template: &str) -> Option<String> {
    match next_region(template, 0) {
        Ok(Some(region)) if region.kind == RegionKind::Comment => declared_encoding(region.body),
        _ => None,
    }
}

fn count_lines(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regions_are_concatenated() {
        let template = "<p><%= _(\"aaa\") %></p>\n<% if x -%>\n<b><%= _('bbb') %></b>\n<% end %>\n";
        let buffer = split(template).unwrap();
        assert_eq!(buffer.code, " _(\"aaa\") \n if x \n _('bbb') \n end \n");
        assert_eq!(
            buffer.offsets.breakpoints(),
            &[(1, 1), (2, 2), (3, 3), (4, 4)]
        );
    }

    #[test]
    fn test_literal_text_lines_are_counted() {
        let template = "<html>\n<body>\n\n<%= _(\"first\") %>\n<p>\ntext\n</p>\n<%=\n  _(\"second\")\n%>\n";
        let buffer = split(template).unwrap();
        assert_eq!(buffer.offsets.template_line(1), 4);
        // second region: opens at template line 8, the call is one line down
        assert_eq!(buffer.offsets.breakpoints(), &[(1, 4), (3, 8)]);
        assert_eq!(buffer.offsets.template_line(4), 9);
    }

    #[test]
    fn test_markup_lines_separate_regions() {
        let template = "<%# TRANSLATORS: header only %>\n<p>lots</p>\n<p>text</p>\n<%= _(\"far\") %>\n<%= _(\"near\") %>\n";
        let buffer = split(template).unwrap();
        assert_eq!(
            buffer.code,
            "# TRANSLATORS: header only \n\n _(\"far\") \n _(\"near\") \n"
        );
        assert_eq!(buffer.offsets.breakpoints(), &[(1, 1), (3, 4), (4, 5)]);
    }

    #[test]
    fn test_escapes_and_comments() {
        let template = "<%% not code %>\n<%# TRANSLATORS: greeting\n  shown on top %>\n<%= \"%%>\" %>";
        let buffer = split(template).unwrap();
        assert_eq!(buffer.code, "# TRANSLATORS: greeting\n#  shown on top \n \"%>\" \n");
        assert_eq!(buffer.offsets.breakpoints(), &[(1, 2), (3, 4)]);
    }

    #[test]
    fn test_unclosed_region_reports_opening_line() {
        let err = split("<p>\n</p>\n<%= _(\"never\")\n").unwrap_err();
        assert!(matches!(err, ExtractError::UnclosedRegion { line: 3 }));
    }

    #[test]
    fn test_detect_encoding_in_first_comment_region() {
        assert_eq!(
            detect_encoding("<%#-*- coding: euc-jp -*-%>\n<%= _('x') %>"),
            Some("EUC-JP".to_string())
        );
        assert_eq!(detect_encoding("<%= 1 %><%# coding: euc-jp %>"), None);
        assert_eq!(detect_encoding("no regions at all"), None);
    }

    #[test]
    fn test_template_line_before_first_breakpoint() {
        let offsets = LineOffsets::default();
        assert_eq!(offsets.template_line(7), 7);
    }
}
