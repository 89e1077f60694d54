/// Input decoding: BOM sniffing, declared encodings and newline normalisation

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

/// Emacs/Vim style `coding: NAME` magic comment
static CODING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"coding[:=]\s*([\w.-]+)").expect("valid coding declaration regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    Latin1,
}

impl Encoding {
    /// Map a declared encoding label to a supported encoding.
    ///
    /// Labels are matched case-insensitively. Returns `None` for encodings
    /// this module cannot decode.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "utf-16le" => Some(Self::Utf16Le),
            "utf-16be" | "utf-16" => Some(Self::Utf16Be),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "binary" | "ascii-8bit" => {
                Some(Self::Latin1)
            }
            // ASCII is a subset of UTF-8
            "us-ascii" | "ascii" => Some(Self::Utf8),
            _ => None,
        }
    }
}

/// Detect the encoding of raw bytes from their BOM, falling back to Latin-1
/// when the bytes are not valid UTF-8.
pub fn detect(content: &[u8]) -> Encoding {
    if content.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Encoding::Utf8Bom;
    }

    if content.starts_with(&[0xFF, 0xFE]) {
        return Encoding::Utf16Le;
    }

    if content.starts_with(&[0xFE, 0xFF]) {
        return Encoding::Utf16Be;
    }

    if std::str::from_utf8(content).is_ok() {
        return Encoding::Utf8;
    }

    Encoding::Latin1
}

/// Decode bytes to text with LF newlines.
pub fn decode_source(bytes: &[u8]) -> String {
    normalize_newlines(&decode(bytes, detect(bytes)))
}

/// Decode bytes with a declared encoding label.
///
/// A BOM always wins over the declaration. Unsupported labels fall back to
/// lossy UTF-8.
pub fn decode_declared(bytes: &[u8], label: &str) -> String {
    let detected = detect(bytes);
    let encoding = match detected {
        Encoding::Utf8Bom | Encoding::Utf16Le | Encoding::Utf16Be => detected,
        Encoding::Utf8 | Encoding::Latin1 => match Encoding::from_label(label) {
            Some(declared) => declared,
            None => {
                warn!(
                    "unsupported declared encoding {}, decoding as UTF-8",
                    label
                );
                Encoding::Utf8
            }
        },
    };
    normalize_newlines(&decode(bytes, encoding))
}

fn decode(bytes: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        Encoding::Utf8Bom => String::from_utf8_lossy(&bytes[3..]).into_owned(),
        Encoding::Utf16Le => decode_utf16(strip_bom(bytes, &[0xFF, 0xFE]), u16::from_le_bytes),
        Encoding::Utf16Be => decode_utf16(strip_bom(bytes, &[0xFE, 0xFF]), u16::from_be_bytes),
        // Latin-1 bytes map one-to-one onto U+0000..U+00FF
        Encoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

fn strip_bom<'a>(bytes: &'a [u8], bom: &[u8]) -> &'a [u8] {
    bytes.strip_prefix(bom).unwrap_or(bytes)
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| to_unit([chunk[0], chunk[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Find a `coding: NAME` declaration in `text`, upper-cased.
pub fn declared_encoding(text: &str) -> Option<String> {
    CODING_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str().to_ascii_uppercase())
}

/// Decode a Ruby source file, honouring a magic encoding comment on one of
/// its first two lines.
pub fn decode_ruby_source(bytes: &[u8]) -> String {
    let head = String::from_utf8_lossy(bytes);
    let magic = head
        .lines()
        .take(2)
        .filter(|line| line.trim_start().starts_with('#'))
        .find_map(declared_encoding);
    match magic {
        Some(label) => decode_declared(bytes, &label),
        None => decode_source(bytes),
    }
}

/// Convert CRLF and lone CR line endings to LF.
pub fn normalize_newlines(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_utf8() {
        assert_eq!(detect("Hello, World!".as_bytes()), Encoding::Utf8);
    }

    #[test]
    fn detects_utf8_bom() {
        let mut content = vec![0xEF, 0xBB, 0xBF];
        content.extend_from_slice(b"Hello");
        assert_eq!(detect(&content), Encoding::Utf8Bom);
        assert_eq!(decode_source(&content), "Hello");
    }

    #[test]
    fn decodes_utf16le_with_bom() {
        let mut content = vec![0xFF, 0xFE];
        for unit in "_(\"hi\")".encode_utf16() {
            content.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_source(&content), "_(\"hi\")");
    }

    #[test]
    fn falls_back_to_latin1() {
        let content = [b'c', b'a', b'f', 0xE9];
        assert_eq!(detect(&content), Encoding::Latin1);
        assert_eq!(decode_source(&content), "café");
    }

    #[test]
    fn normalizes_crlf() {
        assert_eq!(decode_source(b"a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn declared_latin1_is_honoured() {
        // 0xE9 would also be Latin-1 by fallback; 0xC3 0xA9 is valid UTF-8
        // but must be read as two Latin-1 characters when declared.
        let content = [0xC3, 0xA9];
        assert_eq!(decode_declared(&content, "ISO-8859-1"), "Ã©");
        assert_eq!(decode_declared(&content, "utf-8"), "é");
    }

    #[test]
    fn finds_coding_declaration() {
        assert_eq!(
            declared_encoding("#-*- coding: euc-jp -*-"),
            Some("EUC-JP".to_string())
        );
        assert_eq!(declared_encoding("# encoding=utf-8"), Some("UTF-8".to_string()));
        assert_eq!(declared_encoding("# just a comment"), None);
    }

    #[test]
    fn ruby_magic_comment_selects_encoding() {
        let mut content = b"# -*- coding: iso-8859-1 -*-\n_('caf".to_vec();
        content.extend_from_slice(&[0xC3, 0xA9]);
        content.extend_from_slice(b"')\n");
        assert!(decode_ruby_source(&content).contains("_('cafÃ©')"));
    }

    #[test]
    fn unsupported_label_falls_back_to_utf8() {
        assert_eq!(decode_declared("わたし".as_bytes(), "EUC-JP"), "わたし");
        assert_eq!(Encoding::from_label("EUC-JP"), None);
        assert_eq!(Encoding::from_label("Latin1"), Some(Encoding::Latin1));
    }
}
