use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::language::{Language, LanguageMap};

/// A glossary term with its display form and per-language renderings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    /// Unique term key, referenced from treatise text as `{key}`
    pub key: String,
    /// Canonical display term
    pub term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "type", default)]
    pub entry_type: String,
    #[serde(default)]
    pub definitions: LanguageMap<String>,
    /// Absent language = no equivalence known (not an empty translation)
    #[serde(default)]
    pub translations: LanguageMap<Vec<String>>,
}

impl GlossaryEntry {
    pub fn new(key: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            term: term.into(),
            category: None,
            entry_type: String::new(),
            definitions: LanguageMap::default(),
            translations: LanguageMap::default(),
        }
    }

    pub fn with_translation(mut self, language: Language, text: impl Into<String>) -> Self {
        self.translations
            .get_mut(language)
            .get_or_insert_with(Vec::new)
            .push(text.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>, entry_type: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self.entry_type = entry_type.into();
        self
    }

    fn matches_filter(&self, needle: &str) -> bool {
        let hit = |text: &str| text.to_lowercase().contains(needle);

        hit(self.term.as_str())
            || self.category.as_deref().is_some_and(hit)
            || hit(self.entry_type.as_str())
            || self.definitions.iter().any(|(_, text)| hit(text.as_str()))
            || self
                .translations
                .iter()
                .any(|(_, list)| list.iter().any(|text| hit(text.as_str())))
    }
}

/// Glossary file entry as written on disk (`glossary.yaml`)
#[derive(Debug, Deserialize)]
struct RawGlossaryEntry {
    term: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(rename = "type", default)]
    entry_type: Option<String>,
    #[serde(default)]
    definition: LanguageMap<String>,
    #[serde(default)]
    translation: LanguageMap<OneOrMany>,
}

/// Translations may be written as a single string or as a list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(text) => vec![text],
            OneOrMany::Many(list) => list,
        }
    }
}

/// Term-key → entry table, iterated in key order
#[derive(Debug, Clone, Default, Serialize)]
pub struct GlossaryTable {
    entries: BTreeMap<String, GlossaryEntry>,
}

impl GlossaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from entries. The first entry for a key wins.
    pub fn from_entries(entries: impl IntoIterator<Item = GlossaryEntry>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.insert(entry);
        }
        table
    }

    /// Parse the YAML mapping format used by `glossary.yaml`
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let raw: BTreeMap<String, RawGlossaryEntry> = serde_yaml::from_str(yaml)?;

        let entries = raw.into_iter().map(|(key, raw)| GlossaryEntry {
            key,
            term: raw.term,
            category: raw.category.filter(|c| !c.trim().is_empty()),
            entry_type: raw.entry_type.unwrap_or_default(),
            definitions: raw.definition,
            translations: raw.translation.into_map(OneOrMany::into_vec),
        });

        Ok(Self::from_entries(entries))
    }

    fn insert(&mut self, entry: GlossaryEntry) {
        if self.entries.contains_key(&entry.key) {
            warn!("Duplicate glossary key '{}' ignored", entry.key);
            return;
        }
        self.entries.insert(entry.key.clone(), entry);
    }

    pub fn get(&self, key: &str) -> Option<&GlossaryEntry> {
        self.entries.get(key)
    }

    /// Display term for a marker key, if the key is known and has one
    pub fn display_term(&self, key: &str) -> Option<&str> {
        if key.contains(['{', '}']) {
            return None;
        }
        self.entries
            .get(key)
            .map(|entry| entry.term.as_str())
            .filter(|term| !term.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GlossaryEntry> {
        self.entries.values()
    }

    /// Case-insensitive filter over terms, categories, types, definitions
    /// and translations. An empty query returns every entry.
    pub fn search(&self, query: &str) -> Vec<&GlossaryEntry> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.iter().collect();
        }

        let found: Vec<_> = self
            .iter()
            .filter(|entry| entry.matches_filter(&needle))
            .collect();
        debug!("Glossary filter '{}' matched {} entries", query, found.len());
        found
    }

    /// Sorted unique categories
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = self.iter().filter_map(|e| e.category.as_deref()).collect();
        categories.sort_unstable();
        categories.dedup();
        categories
    }

    /// Category → type → entries, entries sorted by display term
    pub fn group_by_category(&self) -> GroupedGlossary<'_> {
        let mut grouped = GroupedGlossary::default();

        for entry in self.iter() {
            match &entry.category {
                Some(category) => grouped
                    .categories
                    .entry(category.as_str())
                    .or_default()
                    .entry(entry.entry_type.as_str())
                    .or_default()
                    .push(entry),
                None => grouped.uncategorized.push(entry),
            }
        }

        for types in grouped.categories.values_mut() {
            for entries in types.values_mut() {
                sort_by_term(entries);
            }
        }
        sort_by_term(&mut grouped.uncategorized);

        grouped
    }
}

fn sort_by_term(entries: &mut [&GlossaryEntry]) {
    entries.sort_by(|a, b| {
        a.term
            .to_lowercase()
            .cmp(&b.term.to_lowercase())
            .then_with(|| a.term.cmp(&b.term))
    });
}

/// Hierarchical view of the glossary for browsing
#[derive(Debug, Default, Serialize)]
pub struct GroupedGlossary<'a> {
    pub categories: BTreeMap<&'a str, BTreeMap<&'a str, Vec<&'a GlossaryEntry>>>,
    pub uncategorized: Vec<&'a GlossaryEntry>,
}

/// Replace `{key}` markers with the glossary's display term.
///
/// A marker runs from `{` to the next `}`. Unknown keys, empty keys and
/// keys containing a brace are left untouched, braces included. An
/// unterminated `{` is literal text.
pub fn expand_markers<'a>(text: &'a str, glossary: &GlossaryTable) -> Cow<'a, str> {
    if !text.contains('{') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return Cow::Owned(out);
        };

        let key = &after[..close];
        match glossary.display_term(key) {
            Some(term) => out.push_str(term),
            None => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_glossary() -> GlossaryTable {
        GlossaryTable::from_entries([
            GlossaryEntry::new("coda_longa_stretta", "Coda Longa e Stretta")
                .with_category("Guards", "Low guard")
                .with_translation(Language::Fr, "queue longue étroite")
                .with_translation(Language::En, "long narrow tail"),
            GlossaryEntry::new("mandritto", "Mandritto")
                .with_category("Strikes", "Cut")
                .with_translation(Language::Fr, "coup droit"),
            GlossaryEntry::new("roverso", "Roverso").with_translation(Language::En, "backhand"),
        ])
    }

    #[test]
    fn test_expand_known_markers() {
        let glossary = sample_glossary();
        let text = "La guardia di {coda_longa_stretta} e il {mandritto}.";
        assert_eq!(
            expand_markers(text, &glossary),
            "La guardia di Coda Longa e Stretta e il Mandritto."
        );
    }

    #[test]
    fn test_unknown_marker_is_kept() {
        let glossary = sample_glossary();
        assert_eq!(
            expand_markers("Il {falso} e il {roverso}", &glossary),
            "Il {falso} e il Roverso"
        );
        assert_eq!(expand_markers("vuoto {}", &glossary), "vuoto {}");
    }

    #[test]
    fn test_malformed_markers_are_literal() {
        let glossary = sample_glossary();
        assert_eq!(expand_markers("aperto {mandritto", &glossary), "aperto {mandritto");
        assert_eq!(
            expand_markers("{a{mandritto}}", &glossary),
            "{a{mandritto}}"
        );
        assert_eq!(expand_markers("chiuso } {roverso}", &glossary), "chiuso } Roverso");
    }

    #[test]
    fn test_expansion_without_markers_is_identity() {
        let glossary = sample_glossary();
        let text = "Nessun riferimento qui, solo testo: àèìòù.";
        let expanded = expand_markers(text, &glossary);
        assert!(matches!(expanded, Cow::Borrowed(_)));
        assert_eq!(expanded, text);
    }

    #[test]
    fn test_expansion_is_idempotent() {
        let glossary = sample_glossary();
        let text = "{mandritto} poi {ignoto} poi {roverso} e {aperto";
        let once = expand_markers(text, &glossary).into_owned();
        let twice = expand_markers(&once, &glossary).into_owned();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_from_yaml_accepts_string_or_list() {
        let yaml = r#"
mandritto:
  term: Mandritto
  category: Strikes
  type: Cut
  definition:
    fr: Coup droit porté du côté droit
    en: Forehand cut
  translation:
    fr: coup droit
    en: [forehand, forehand cut]
roverso:
  term: Roverso
  translation:
    en: backhand
"#;
        let glossary = GlossaryTable::from_yaml_str(yaml).unwrap();
        assert_eq!(glossary.len(), 2);

        let mandritto = glossary.get("mandritto").unwrap();
        assert_eq!(mandritto.translations.list(Language::Fr), ["coup droit"]);
        assert_eq!(
            mandritto.translations.list(Language::En),
            ["forehand", "forehand cut"]
        );
        assert_eq!(mandritto.translations.get(Language::It), None);
        assert_eq!(mandritto.entry_type, "Cut");

        let roverso = glossary.get("roverso").unwrap();
        assert_eq!(roverso.category, None);
        assert!(roverso.definitions.get(Language::Fr).is_none());
    }

    #[test]
    fn test_duplicate_key_first_wins() {
        let glossary = GlossaryTable::from_entries([
            GlossaryEntry::new("falso", "Falso"),
            GlossaryEntry::new("falso", "Falso Dritto"),
        ]);
        assert_eq!(glossary.len(), 1);
        assert_eq!(glossary.display_term("falso"), Some("Falso"));
    }

    #[test]
    fn test_search_filters_across_fields() {
        let glossary = sample_glossary();

        let keys = |found: Vec<&GlossaryEntry>| -> Vec<String> {
            found.into_iter().map(|e| e.key.clone()).collect()
        };

        assert_eq!(keys(glossary.search("COUP")), vec!["mandritto"]);
        assert_eq!(keys(glossary.search("guards")), vec!["coda_longa_stretta"]);
        assert_eq!(keys(glossary.search("backhand")), vec!["roverso"]);
        assert_eq!(glossary.search("  ").len(), 3);
        assert!(glossary.search("xyz").is_empty());
    }

    #[test]
    fn test_group_by_category() {
        let glossary = sample_glossary();
        let grouped = glossary.group_by_category();

        assert_eq!(grouped.categories.len(), 2);
        assert_eq!(grouped.categories["Guards"]["Low guard"][0].key, "coda_longa_stretta");
        assert_eq!(grouped.uncategorized.len(), 1);
        assert_eq!(glossary.categories(), vec!["Guards", "Strikes"]);
    }
}
