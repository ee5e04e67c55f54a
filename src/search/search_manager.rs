use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::executor::{SearchResultSet, execute_with_preview};
use super::index::{IndexedDocument, SearchIndex, build_index};
use super::matcher::{MatchSpan, find_matches};
use super::planner::{SearchOptions, plan_query};
use crate::config::Config;
use crate::corpus::{Corpus, CorpusReader, DocumentId};

/// A loaded corpus together with the index built from it
#[derive(Debug)]
pub struct Snapshot {
    pub corpus: Arc<Corpus>,
    pub index: Arc<SearchIndex>,
}

impl Snapshot {
    pub fn build(corpus: Corpus) -> Self {
        let index = build_index(&corpus.documents, &corpus.glossary);
        Self {
            corpus: Arc::new(corpus),
            index: Arc::new(index),
        }
    }
}

/// Shared slot holding the current corpus and index build.
///
/// Readers take an `Arc` snapshot and keep using it even if a rebuild is
/// swapped in meanwhile. The lock is held only for the clone or the swap,
/// and corpus and index are always swapped as one pair.
#[derive(Debug)]
pub struct IndexHandle {
    slot: RwLock<Arc<Snapshot>>,
}

impl IndexHandle {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            slot: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.slot.read())
    }

    /// Install a new build, returning the previous one
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        std::mem::replace(&mut *self.slot.write(), Arc::new(snapshot))
    }
}

/// Index statistics
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub data_dir: PathBuf,
    pub total_documents: usize,
    pub glossary_terms: usize,
    pub built_at: DateTime<Utc>,
}

/// Owns the corpus and the current index, and answers queries against it
#[derive(Debug)]
pub struct SearchManager {
    config: Config,
    handle: IndexHandle,
}

impl SearchManager {
    /// Load the corpus described by `config` and build the first index
    pub fn open(config: Config) -> Result<Self> {
        info!("Opening corpus at {:?}", config.data_dir);
        let corpus = CorpusReader::with_config(&config).load()?;
        Ok(Self::from_corpus(config, corpus))
    }

    /// Build a manager around an already loaded corpus
    pub fn from_corpus(config: Config, corpus: Corpus) -> Self {
        Self {
            config,
            handle: IndexHandle::new(Snapshot::build(corpus)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current corpus and index, taken together
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.handle.current()
    }

    pub fn corpus(&self) -> Arc<Corpus> {
        Arc::clone(&self.handle.current().corpus)
    }

    pub fn index(&self) -> Arc<SearchIndex> {
        Arc::clone(&self.handle.current().index)
    }

    /// Plan and execute `text` against the current index
    pub fn search(&self, text: &str, options: &SearchOptions) -> SearchResultSet {
        let index = self.index();
        let query = plan_query(text, options, &index);
        execute_with_preview(&index, &query, self.config.preview)
    }

    /// Spans `query` would highlight in `text`, with the same expansion
    /// (variants, glossary equivalents) a search would apply
    pub fn highlight(&self, text: &str, query: &str, options: &SearchOptions) -> Vec<MatchSpan> {
        let index = self.index();
        let planned = plan_query(query, options, &index);
        find_matches(
            text,
            &planned.query_text,
            planned.options.match_options(),
            &planned.extra_terms(),
        )
    }

    /// Expanded channels of one document from the current index
    pub fn document(&self, id: &DocumentId) -> Option<IndexedDocument> {
        self.index().document(id).cloned()
    }

    /// Re-read the corpus from disk and swap in a fresh index.
    ///
    /// On failure the previous corpus and index stay in place.
    pub fn reload(&self) -> Result<IndexStats> {
        let corpus = CorpusReader::with_config(&self.config).load()?;
        let previous = self.handle.replace(Snapshot::build(corpus));

        let stats = self.stats();
        info!(
            "Reloaded index: {} -> {} documents",
            previous.index.len(),
            stats.total_documents
        );
        Ok(stats)
    }

    pub fn stats(&self) -> IndexStats {
        let index = self.index();
        IndexStats {
            data_dir: self.config.data_dir.clone(),
            total_documents: index.len(),
            glossary_terms: index.glossary_term_count(),
            built_at: index.built_at(),
        }
    }
}
