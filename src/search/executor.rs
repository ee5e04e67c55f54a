use serde::Serialize;
use std::time::Instant;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::index::{IndexedDocument, SearchIndex};
use super::matcher::{MatchSpan, Matcher};
use super::planner::SearchQuery;
use super::snippet::PreviewWindow;
use crate::corpus::DocumentId;
use crate::language::Language;

/// A match span together with the channel its offsets refer to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelMatch {
    pub language: Language,
    #[serde(flatten)]
    pub span: MatchSpan,
}

/// One document that matched the query
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub document: DocumentId,
    pub work_title: String,
    pub title: String,
    pub match_count: usize,
    /// Channels with at least one match, in channel order
    pub languages: Vec<Language>,
    pub preview: String,
    pub highlights: Vec<ChannelMatch>,
}

/// Outcome of executing one query
#[derive(Debug, Clone, Serialize)]
pub struct SearchResultSet {
    pub query: SearchQuery,
    pub results: Vec<SearchResult>,
    /// Sum of `match_count` over the returned results
    pub total_matches: usize,
    pub execution_time_ms: f64,
    /// True only when `max_results` removed at least one result
    pub truncated: bool,
}

impl SearchResultSet {
    fn empty(query: &SearchQuery, started: Instant) -> Self {
        Self {
            query: query.clone(),
            results: Vec::new(),
            total_matches: 0,
            execution_time_ms: elapsed_ms(started),
            truncated: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// How documents are visited while executing a query.
///
/// Both modes yield the same results in the same (document) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Sequential,
    #[cfg(feature = "parallel")]
    Parallel,
}

impl Default for ScanMode {
    fn default() -> Self {
        #[cfg(feature = "parallel")]
        return ScanMode::Parallel;
        #[cfg(not(feature = "parallel"))]
        return ScanMode::Sequential;
    }
}

/// Run a resolved query against every document of the index
pub fn execute(index: &SearchIndex, query: &SearchQuery) -> SearchResultSet {
    execute_with_preview(index, query, PreviewWindow::default())
}

/// [`execute`] with a custom preview window
pub fn execute_with_preview(
    index: &SearchIndex,
    query: &SearchQuery,
    window: PreviewWindow,
) -> SearchResultSet {
    execute_with(index, query, window, ScanMode::default())
}

/// [`execute`] with a custom preview window and scan mode.
///
/// Results follow the index's document order. Blank query text
/// short-circuits to an empty result set.
pub fn execute_with(
    index: &SearchIndex,
    query: &SearchQuery,
    window: PreviewWindow,
    mode: ScanMode,
) -> SearchResultSet {
    let started = Instant::now();

    if query.is_blank() {
        return SearchResultSet::empty(query, started);
    }

    let matcher = Matcher::new(
        &query.query_text,
        query.options.match_options(),
        &query.extra_terms(),
    );
    if matcher.matches_nothing() {
        return SearchResultSet::empty(query, started);
    }

    let needles = matcher.folded_needles();
    let scan = |document: &IndexedDocument| {
        if let Some(needles) = &needles {
            if !document.may_contain_any(needles) {
                return None;
            }
        }
        scan_document(document, query, &matcher, window)
    };

    let mut results: Vec<SearchResult> = match mode {
        ScanMode::Sequential => index.documents().iter().filter_map(scan).collect(),
        // Indexed collect keeps document order
        #[cfg(feature = "parallel")]
        ScanMode::Parallel => index.documents().par_iter().filter_map(scan).collect(),
    };

    let mut truncated = false;
    if let Some(cap) = query.options.max_results {
        if results.len() > cap {
            results.truncate(cap);
            truncated = true;
        }
    }

    let total_matches = results.iter().map(|r| r.match_count).sum();
    let execution_time_ms = elapsed_ms(started);

    debug!(
        "Query '{}': {} documents, {} matches in {:.3}ms{}",
        query.query_text,
        results.len(),
        total_matches,
        execution_time_ms,
        if truncated { " (truncated)" } else { "" }
    );

    SearchResultSet {
        query: query.clone(),
        results,
        total_matches,
        execution_time_ms,
        truncated,
    }
}

fn scan_document(
    document: &IndexedDocument,
    query: &SearchQuery,
    matcher: &Matcher,
    window: PreviewWindow,
) -> Option<SearchResult> {
    let mut highlights = Vec::new();
    let mut languages = Vec::new();
    let mut preview = None;

    for (language, text) in document.channels.iter() {
        if !query.options.allows(language) {
            continue;
        }

        let spans = matcher.find(text);
        let Some(first) = spans.first() else {
            continue;
        };

        languages.push(language);
        if preview.is_none() {
            preview = Some(window.preview(text, first));
        }
        highlights.extend(spans.into_iter().map(|span| ChannelMatch { language, span }));
    }

    if highlights.is_empty() {
        return None;
    }

    Some(SearchResult {
        document: document.id.clone(),
        work_title: document.work_title.clone(),
        title: document.title.clone(),
        match_count: highlights.len(),
        languages,
        preview: preview.unwrap_or_default(),
        highlights,
    })
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Document;
    use crate::glossary::{GlossaryEntry, GlossaryTable};
    use crate::search::index::build_index;
    use crate::search::planner::{SearchOptions, plan_query};

    fn index() -> SearchIndex {
        let docs = vec![
            Document::new(DocumentId::new("t.yaml", "a"), "A", "Opera Nova")
                .with_body(Language::It, "La coda lunga e stretta"),
            Document::new(DocumentId::new("t.yaml", "b"), "B", "Opera Nova")
                .with_body(Language::Fr, "La coda longa alta"),
            Document::new(DocumentId::new("t.yaml", "c"), "C", "Opera Nova")
                .with_body(Language::It, "Il {mandritto} cade")
                .with_body(Language::En, "The forehand falls, a forehand again"),
        ];
        let glossary = GlossaryTable::from_entries([GlossaryEntry::new("mandritto", "Mandritto")
            .with_translation(Language::En, "forehand")]);
        build_index(&docs, &glossary)
    }

    fn run(text: &str, options: SearchOptions) -> SearchResultSet {
        let index = index();
        let query = plan_query(text, &options, &index);
        execute(&index, &query)
    }

    #[test]
    fn test_basic_search_hits_both_documents() {
        let results = run("coda", SearchOptions::default());
        assert_eq!(results.results.len(), 2);
        assert!(results.results.iter().all(|r| r.match_count >= 1));
        assert_eq!(results.results[0].languages, vec![Language::It]);
        assert_eq!(results.results[1].languages, vec![Language::Fr]);
        assert!(!results.truncated);
    }

    #[test]
    fn test_regex_preview_contains_match() {
        let options = SearchOptions {
            use_regex: true,
            ..SearchOptions::default()
        };
        let results = run("coda l[ou]nga", options);
        assert!(!results.results.is_empty());
        assert!(
            results
                .results
                .iter()
                .any(|r| r.preview.contains("lunga") || r.preview.contains("longa"))
        );
    }

    #[test]
    fn test_cross_language_hits_count() {
        let results = run("mandritto", SearchOptions::default());
        assert_eq!(results.results.len(), 1);

        let result = &results.results[0];
        assert_eq!(result.languages, vec![Language::It, Language::En]);
        assert_eq!(result.match_count, 3);
        assert_eq!(results.total_matches, 3);
        assert!(result.preview.contains("Mandritto"));

        let literal = run("mandritto", SearchOptions::literal());
        assert_eq!(literal.results[0].match_count, 1);
        assert_eq!(literal.results[0].languages, vec![Language::It]);
    }

    #[test]
    fn test_highlights_index_their_channel() {
        let index = index();
        let query = plan_query("forehand", &SearchOptions::literal(), &index);
        let results = execute(&index, &query);

        let result = &results.results[0];
        let doc = index.document(&result.document).unwrap();
        for hit in &result.highlights {
            let text = doc.channel(hit.language).unwrap();
            assert_eq!(&text[hit.span.start..hit.span.end], "forehand");
        }
    }

    #[test]
    fn test_language_filter() {
        let options = SearchOptions {
            languages: Some(vec![Language::It]),
            ..SearchOptions::default()
        };
        let results = run("coda", options);
        assert_eq!(results.results.len(), 1);
        assert_eq!(results.results[0].document.chapter_id, "a");
    }

    #[test]
    fn test_blank_query_is_empty() {
        for text in ["", "   "] {
            let results = run(text, SearchOptions::default());
            assert!(results.is_empty());
            assert_eq!(results.total_matches, 0);
            assert!(!results.truncated);
            assert!(results.execution_time_ms >= 0.0);
        }
    }

    #[test]
    fn test_invalid_regex_is_empty() {
        let options = SearchOptions {
            use_regex: true,
            ..SearchOptions::default()
        };
        let results = run("[invalid(regex", options);
        assert!(results.is_empty());
    }

    #[test]
    fn test_max_results_truncates() {
        let capped = SearchOptions {
            max_results: Some(1),
            ..SearchOptions::default()
        };
        let results = run("coda", capped);
        assert_eq!(results.results.len(), 1);
        assert!(results.truncated);
        assert_eq!(results.results[0].document.chapter_id, "a");

        let roomy = SearchOptions {
            max_results: Some(5),
            ..SearchOptions::default()
        };
        assert!(!run("coda", roomy).truncated);
    }

    fn many_documents() -> SearchIndex {
        let bodies = [
            "La coda lunga e stretta",
            "Il mandritto e il roverso",
            "Nessuna guardia qui",
            "Coda longa alta, poi coda lunga",
        ];
        let docs: Vec<Document> = (0..200)
            .map(|i| {
                Document::new(DocumentId::new("t.yaml", format!("c{i:03}")), "T", "Opera Nova")
                    .with_body(Language::It, bodies[i % bodies.len()])
                    .with_body(Language::En, if i % 3 == 0 { "a long tail" } else { "a forehand" })
            })
            .collect();
        let glossary = GlossaryTable::from_entries([GlossaryEntry::new("mandritto", "Mandritto")
            .with_translation(Language::En, "forehand")]);
        build_index(&docs, &glossary)
    }

    fn summary(results: &SearchResultSet) -> Vec<(String, usize, Vec<ChannelMatch>)> {
        results
            .results
            .iter()
            .map(|r| (r.document.to_string(), r.match_count, r.highlights.clone()))
            .collect()
    }

    #[test]
    fn test_default_scan_matches_sequential() {
        let index = many_documents();
        for (text, options) in [
            ("coda", SearchOptions::default()),
            ("mandritto", SearchOptions::default()),
            ("cod[ae]", SearchOptions { use_regex: true, ..SearchOptions::default() }),
        ] {
            let query = plan_query(text, &options, &index);
            let window = PreviewWindow::default();
            let sequential = execute_with(&index, &query, window, ScanMode::Sequential);
            let default = execute_with(&index, &query, window, ScanMode::default());

            assert!(!sequential.is_empty());
            assert_eq!(summary(&sequential), summary(&default));
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_scan_keeps_document_order() {
        let index = many_documents();
        let query = plan_query("mandritto", &SearchOptions::default(), &index);
        let window = PreviewWindow::default();

        let sequential = execute_with(&index, &query, window, ScanMode::Sequential);
        let parallel = execute_with(&index, &query, window, ScanMode::Parallel);

        // Only chapters with neither mandritto nor forehand drop out
        assert!(sequential.results.len() > 100);
        assert_eq!(summary(&sequential), summary(&parallel));
        assert_eq!(sequential.total_matches, parallel.total_matches);

        let ids: Vec<_> = parallel.results.iter().map(|r| r.document.chapter_id.clone()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_case_sensitive_skips_prefilter() {
        let options = SearchOptions {
            match_case: true,
            ..SearchOptions::literal()
        };
        assert_eq!(run("La", options.clone()).results.len(), 2);
        assert!(run("LA", options).is_empty());
    }
}
