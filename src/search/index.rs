use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use super::matcher::fold_case;
use crate::corpus::{Document, DocumentId};
use crate::glossary::{GlossaryTable, expand_markers};
use crate::language::{Language, LanguageMap};

/// A document as stored in the index: glossary markers already expanded
#[derive(Debug, Clone, Serialize)]
pub struct IndexedDocument {
    pub id: DocumentId,
    pub title: String,
    pub work_title: String,
    /// Expanded text of every populated channel
    pub channels: LanguageMap<String>,
    /// Lowercase concatenation of all channels, for pre-filtering only
    #[serde(skip)]
    pub full_text: String,
}

impl IndexedDocument {
    pub fn channel(&self, language: Language) -> Option<&str> {
        self.channels.get(language).map(String::as_str)
    }

    /// Coarse check: can any of these folded needles occur in this document?
    pub fn may_contain_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|needle| self.full_text.contains(needle))
    }
}

/// Equivalents of one glossary key in each language
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossLanguageTerms {
    /// Term key as written in the glossary
    pub source: String,
    pub equivalents: LanguageMap<Vec<String>>,
}

/// Immutable, queryable snapshot of the corpus
#[derive(Debug, Clone)]
pub struct SearchIndex {
    documents: Vec<IndexedDocument>,
    /// Lowercase term key -> cross-language equivalents
    glossary_terms: HashMap<String, CrossLanguageTerms>,
    built_at: DateTime<Utc>,
}

impl SearchIndex {
    pub fn documents(&self) -> &[IndexedDocument] {
        &self.documents
    }

    pub fn document(&self, id: &DocumentId) -> Option<&IndexedDocument> {
        self.documents.iter().find(|doc| &doc.id == id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Cross-language equivalents for a term key (matched case-insensitively)
    pub fn cross_language_terms(&self, key: &str) -> Option<&CrossLanguageTerms> {
        self.glossary_terms.get(&key.to_lowercase())
    }

    pub fn glossary_term_count(&self) -> usize {
        self.glossary_terms.len()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

/// Build a fresh index from a corpus snapshot.
///
/// Every populated channel is run through the glossary expander so the index
/// holds the text a reader actually sees. Documents without a populated
/// channel, and repeated document ids, are skipped with a warning.
pub fn build_index(documents: &[Document], glossary: &GlossaryTable) -> SearchIndex {
    let mut indexed = Vec::with_capacity(documents.len());
    let mut seen: HashSet<&DocumentId> = HashSet::with_capacity(documents.len());
    let mut skipped = 0usize;

    for document in documents {
        if !document.bodies.has_populated() {
            warn!("Skipping document {}: no populated language channel", document.id);
            skipped += 1;
            continue;
        }
        if !seen.insert(&document.id) {
            warn!("Skipping duplicate document id {}", document.id);
            skipped += 1;
            continue;
        }

        indexed.push(index_document(document, glossary));
    }

    let glossary_terms = project_glossary(glossary);

    info!(
        "Index built: {} documents, {} skipped, {} glossary terms",
        indexed.len(),
        skipped,
        glossary_terms.len()
    );

    SearchIndex {
        documents: indexed,
        glossary_terms,
        built_at: Utc::now(),
    }
}

fn index_document(document: &Document, glossary: &GlossaryTable) -> IndexedDocument {
    let mut channels = LanguageMap::default();
    let mut folded_channels = Vec::with_capacity(Language::ALL.len());

    for (language, text) in document.bodies.populated() {
        let expanded = expand_markers(text, glossary).into_owned();
        folded_channels.push(fold_case(&expanded));
        channels.set(language, expanded);
    }

    debug!(
        "Indexed {} ({} channels)",
        document.id,
        folded_channels.len()
    );

    IndexedDocument {
        id: document.id.clone(),
        title: document.title.clone(),
        work_title: document.work_title.clone(),
        channels,
        full_text: folded_channels.join(" "),
    }
}

/// Glossary projection used by the query planner.
///
/// Italian equivalents start with the canonical display term (the glossary's
/// source language), followed by any explicit translations.
fn project_glossary(glossary: &GlossaryTable) -> HashMap<String, CrossLanguageTerms> {
    let mut projection = HashMap::with_capacity(glossary.len());

    for entry in glossary.iter() {
        let mut equivalents = LanguageMap::<Vec<String>>::empty_lists();

        for language in Language::ALL {
            let mut list: Vec<String> = Vec::new();
            if language == Language::It && !entry.term.is_empty() {
                list.push(entry.term.clone());
            }
            for translation in entry.translations.list(language) {
                if !translation.is_empty() && !list.contains(translation) {
                    list.push(translation.clone());
                }
            }
            equivalents.set(language, list);
        }

        projection
            .entry(entry.key.to_lowercase())
            .or_insert_with(|| CrossLanguageTerms {
                source: entry.key.clone(),
                equivalents,
            });
    }

    projection
}
