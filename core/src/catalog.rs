/// Translation entries and the catalog they are merged into
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// A `path:line` reference to where a message was found.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub path: String,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(path: impl Into<String>, line: usize) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}

/// One translation unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationEntry {
    pub msgid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msgid_plural: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msgctxt: Option<String>,

    /// Translator note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Developer hint (`#.` in PO files)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_comment: Option<String>,

    /// Always sorted by (path, line) and free of duplicates.
    #[serde(default)]
    pub references: BTreeSet<SourceLocation>,
}

impl TranslationEntry {
    pub fn new(msgid: impl Into<String>) -> Self {
        Self {
            msgid: msgid.into(),
            msgid_plural: None,
            msgctxt: None,
            comment: None,
            extracted_comment: None,
            references: BTreeSet::new(),
        }
    }

    pub fn with_plural(mut self, plural: impl Into<String>) -> Self {
        self.msgid_plural = Some(plural.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.msgctxt = Some(context.into());
        self
    }

    pub fn with_reference(mut self, path: impl Into<String>, line: usize) -> Self {
        self.references.insert(SourceLocation::new(path, line));
        self
    }

    pub fn identity(&self) -> EntryKey {
        EntryKey {
            msgid: self.msgid.clone(),
            msgctxt: self.msgctxt.clone(),
        }
    }

    /// References rendered as `path:line`, in sorted order.
    pub fn reference_strings(&self) -> Vec<String> {
        self.references.iter().map(ToString::to_string).collect()
    }

    /// Fold a later occurrence of the same identity into this entry.
    ///
    /// References are unioned. Plural form and comments take the incoming
    /// value whenever it is present, so the last occurrence with a plural
    /// form wins even if it differs from the first one.
    fn absorb(&mut self, other: TranslationEntry) {
        self.references.extend(other.references);
        if other.msgid_plural.is_some() {
            self.msgid_plural = other.msgid_plural;
        }
        if other.comment.is_some() {
            self.comment = other.comment;
        }
        if other.extracted_comment.is_some() {
            self.extracted_comment = other.extracted_comment;
        }
    }
}

/// Identity of an entry: `msgid` plus optional `msgctxt`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub msgid: String,
    pub msgctxt: Option<String>,
}

/// Entries in first-occurrence order, keyed by identity
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<TranslationEntry>,
    index: HashMap<EntryKey, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one entry: append it if its identity is new, otherwise fold it
    /// into the existing entry.
    pub fn add(&mut self, entry: TranslationEntry) {
        let key = entry.identity();
        match self.index.get(&key) {
            Some(&idx) => self.entries[idx].absorb(entry),
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Merge every entry of `other`, preserving its order for new identities.
    pub fn merge(&mut self, other: Catalog) {
        for entry in other.entries {
            self.add(entry);
        }
    }

    pub fn get(&self, msgid: &str, msgctxt: Option<&str>) -> Option<&TranslationEntry> {
        let key = EntryKey {
            msgid: msgid.to_string(),
            msgctxt: msgctxt.map(str::to_string),
        };
        self.index.get(&key).map(|&idx| &self.entries[idx])
    }

    pub fn entries(&self) -> &[TranslationEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TranslationEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<TranslationEntry> {
        self.entries
    }

    /// Rewrite every reference line through `remap`.
    pub(crate) fn remap_lines<F>(self, remap: F) -> Catalog
    where
        F: Fn(usize) -> usize,
    {
        let mut remapped = Catalog::new();
        for mut entry in self.entries {
            entry.references = entry
                .references
                .into_iter()
                .map(|loc| SourceLocation::new(loc.path, remap(loc.line)))
                .collect();
            remapped.add(entry);
        }
        remapped
    }
}

impl FromIterator<TranslationEntry> for Catalog {
    fn from_iter<I: IntoIterator<Item = TranslationEntry>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for entry in iter {
            catalog.add(entry);
        }
        catalog
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a TranslationEntry;
    type IntoIter = std::slice::Iter<'a, TranslationEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl Serialize for Catalog {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Catalog {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<TranslationEntry>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_are_sorted_and_deduplicated() {
        let entry = TranslationEntry::new("hello")
            .with_reference("b.rb", 3)
            .with_reference("a.rb", 10)
            .with_reference("a.rb", 2)
            .with_reference("a.rb", 10);

        assert_eq!(entry.reference_strings(), vec!["a.rb:2", "a.rb:10", "b.rb:3"]);
    }

    #[test]
    fn same_identity_accumulates_references() {
        let mut catalog = Catalog::new();
        catalog.add(TranslationEntry::new("same").with_reference("x.rb", 28));
        catalog.add(TranslationEntry::new("other").with_reference("x.rb", 30));
        catalog.add(TranslationEntry::new("same").with_reference("x.rb", 32));

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.entries()[0].msgid, "same");
        assert_eq!(
            catalog.get("same", None).unwrap().reference_strings(),
            vec!["x.rb:28", "x.rb:32"]
        );
    }

    #[test]
    fn context_is_part_of_identity() {
        let mut catalog = Catalog::new();
        catalog.add(TranslationEntry::new("name").with_reference("p.rb", 1));
        catalog.add(
            TranslationEntry::new("name")
                .with_context("program")
                .with_reference("p.rb", 2),
        );

        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("name", Some("program")).is_some());
        assert_eq!(
            catalog.get("name", None).unwrap().reference_strings(),
            vec!["p.rb:1"]
        );
    }

    #[test]
    fn later_plural_form_overwrites_earlier_one() {
        // Plural is not part of identity; the last occurrence wins.
        let mut catalog = Catalog::new();
        catalog.add(
            TranslationEntry::new("file")
                .with_plural("files")
                .with_reference("a.rb", 1),
        );
        catalog.add(
            TranslationEntry::new("file")
                .with_plural("many files")
                .with_reference("a.rb", 5),
        );
        catalog.add(TranslationEntry::new("file").with_reference("a.rb", 9));

        let entry = catalog.get("file", None).unwrap();
        assert_eq!(entry.msgid_plural.as_deref(), Some("many files"));
        assert_eq!(entry.reference_strings(), vec!["a.rb:1", "a.rb:5", "a.rb:9"]);
    }

    #[test]
    fn comments_fill_in_when_absent() {
        let mut catalog = Catalog::new();
        catalog.add(TranslationEntry::new("x").with_reference("a.rb", 1));

        let mut hinted = TranslationEntry::new("x").with_reference("a.rb", 2);
        hinted.extracted_comment = Some("a hint".into());
        catalog.add(hinted);
        catalog.add(TranslationEntry::new("x").with_reference("a.rb", 3));

        let entry = catalog.get("x", None).unwrap();
        assert_eq!(entry.extracted_comment.as_deref(), Some("a hint"));
        assert!(entry.comment.is_none());
    }

    #[test]
    fn merge_reference_sets_do_not_depend_on_order() {
        let first: Catalog = vec![
            TranslationEntry::new("a").with_reference("one.rb", 1),
            TranslationEntry::new("b").with_reference("one.rb", 2),
        ]
        .into_iter()
        .collect();
        let second: Catalog = vec![TranslationEntry::new("a").with_reference("two.rb", 7)]
            .into_iter()
            .collect();

        let mut forward = first.clone();
        forward.merge(second.clone());
        let mut backward = second;
        backward.merge(first);

        for msgid in ["a", "b"] {
            assert_eq!(
                forward.get(msgid, None).unwrap().references,
                backward.get(msgid, None).unwrap().references
            );
        }
    }

    #[test]
    fn catalog_serializes_as_entry_list() {
        let catalog: Catalog = vec![TranslationEntry::new("hi").with_reference("a.rb", 4)]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&catalog).unwrap();
        assert_eq!(
            json,
            r#"[{"msgid":"hi","references":[{"path":"a.rb","line":4}]}]"#
        );

        let back: Catalog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entries(), catalog.entries());
    }
}
