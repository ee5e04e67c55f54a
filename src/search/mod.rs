// Module declarations
pub mod executor;
pub mod index;
pub mod matcher;
pub mod planner;
pub mod search_manager;
pub mod snippet;
pub mod variants;

// Re-export public APIs
pub use executor::{
    ChannelMatch, ScanMode, SearchResult, SearchResultSet, execute, execute_with, execute_with_preview,
};
pub use index::{CrossLanguageTerms, IndexedDocument, SearchIndex, build_index};
pub use matcher::{MatchOptions, MatchSpan, Matcher, find_matches, highlight};
pub use planner::{SearchOptions, SearchQuery, plan_query};
pub use search_manager::{IndexHandle, IndexStats, SearchManager, Snapshot};
pub use snippet::PreviewWindow;
pub use variants::generate_variants;
