use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::index::SearchIndex;
use super::matcher::MatchOptions;
use super::variants::generate_variants;
use crate::language::{Language, LanguageMap};

/// Options recognised on a search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub match_case: bool,
    pub match_whole_word: bool,
    pub use_regex: bool,
    pub include_variants: bool,
    pub include_cross_language: bool,
    /// Channels to scan; `None` scans every channel
    pub languages: Option<Vec<Language>>,
    /// Cap on the number of results returned
    pub max_results: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            match_case: false,
            match_whole_word: false,
            use_regex: false,
            include_variants: true,
            include_cross_language: true,
            languages: None,
            max_results: None,
        }
    }
}

impl SearchOptions {
    /// Plain substring search: no variants, no cross-language expansion
    pub fn literal() -> Self {
        Self {
            include_variants: false,
            include_cross_language: false,
            ..Self::default()
        }
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            match_case: self.match_case,
            match_whole_word: self.match_whole_word,
            use_regex: self.use_regex,
        }
    }

    /// Whether a channel should be scanned under these options
    pub fn allows(&self, language: Language) -> bool {
        self.languages
            .as_ref()
            .is_none_or(|languages| languages.contains(&language))
    }
}

/// A fully resolved query, built once per request
#[derive(Debug, Clone, Serialize)]
pub struct SearchQuery {
    pub query_text: String,
    pub timestamp: DateTime<Utc>,
    pub options: SearchOptions,
    /// Morphological variants of the query text
    pub variants: Vec<String>,
    /// Cross-language equivalents; every language is present, possibly empty
    pub language_mappings: LanguageMap<Vec<String>>,
}

impl SearchQuery {
    /// Variants plus every cross-language equivalent (whichever the options
    /// enable), flattened and de-duplicated, excluding the query text itself
    pub fn extra_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        let variants = self
            .variants
            .iter()
            .filter(|_| self.options.include_variants);
        let mappings = Language::ALL
            .into_iter()
            .filter(|_| self.options.include_cross_language)
            .flat_map(|lang| self.language_mappings.list(lang));

        for term in variants.chain(mappings) {
            if term != &self.query_text && !terms.contains(term) {
                terms.push(term.clone());
            }
        }
        terms
    }

    pub fn is_blank(&self) -> bool {
        self.query_text.trim().is_empty()
    }
}

/// Resolve raw query text into a [`SearchQuery`].
///
/// Variants come from the lowercased text; cross-language equivalents from
/// the index's glossary projection, looked up by lowercased text. A query
/// that is not a glossary key simply gets empty mappings.
pub fn plan_query(raw_text: &str, options: &SearchOptions, index: &SearchIndex) -> SearchQuery {
    let text = raw_text.trim();
    let lower = text.to_lowercase();

    let variants = if options.include_variants && !lower.is_empty() {
        generate_variants(&lower)
    } else {
        Vec::new()
    };

    let mut language_mappings = LanguageMap::<Vec<String>>::empty_lists();
    if options.include_cross_language && !lower.is_empty() {
        if let Some(terms) = index.cross_language_terms(&lower) {
            debug!("Query '{}' resolved to glossary key '{}'", text, terms.source);
            for language in Language::ALL {
                language_mappings.set(language, terms.equivalents.list(language).to_vec());
            }
        }
    }

    SearchQuery {
        query_text: text.to_string(),
        timestamp: Utc::now(),
        options: options.clone(),
        variants,
        language_mappings,
    }
}
