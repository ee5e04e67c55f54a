use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rmcp::{ServiceExt, transport::stdio};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{self, EnvFilter};

use treatise_search::config::Config;
use treatise_search::language::Language;
use treatise_search::mcp_server::TreatiseServer;
use treatise_search::search::{SearchManager, SearchOptions, SearchResultSet, highlight};

#[derive(Parser, Debug)]
#[command(
    name = "treatise-search",
    about = "Multilingual search over historical fencing treatises",
    version
)]
struct Cli {
    /// Corpus directory (overrides the config file)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search the corpus and print matching chapters
    Search {
        query: String,

        #[command(flatten)]
        flags: SearchFlags,

        /// Maximum number of results to return
        #[arg(long)]
        max_results: Option<usize>,

        /// Print the full result set as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark the matches of a query inside arbitrary text
    Highlight {
        query: String,

        text: String,

        #[command(flatten)]
        flags: SearchFlags,

        /// Print spans as JSON
        #[arg(long)]
        json: bool,
    },

    /// List glossary entries, optionally filtered
    Glossary {
        filter: Option<String>,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics
    Stats,

    /// Serve the corpus over MCP (stdio)
    Serve,
}

#[derive(Args, Debug)]
struct SearchFlags {
    /// Case-sensitive matching
    #[arg(long, overrides_with = "no_match_case")]
    match_case: bool,

    /// Case-insensitive matching, even if the config enables case
    #[arg(long, overrides_with = "match_case")]
    no_match_case: bool,

    /// Only match whole words
    #[arg(long, overrides_with = "no_whole_word")]
    whole_word: bool,

    /// Match inside words, even if the config enables whole words
    #[arg(long, overrides_with = "whole_word")]
    no_whole_word: bool,

    /// Treat the query as a regular expression
    #[arg(long, overrides_with = "no_regex")]
    regex: bool,

    /// Treat the query literally, even if the config enables regex
    #[arg(long, overrides_with = "regex")]
    no_regex: bool,

    /// Do not expand the query with plural variants
    #[arg(long)]
    no_variants: bool,

    /// Do not expand the query with glossary equivalents
    #[arg(long)]
    no_cross_language: bool,

    /// Language channels to search, e.g. it,fr
    #[arg(long, value_delimiter = ',')]
    lang: Vec<Language>,
}

/// `Some` when either side of an on/off flag pair was given
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

impl SearchFlags {
    fn apply(&self, base: &SearchOptions) -> SearchOptions {
        let mut options = base.clone();
        if let Some(value) = switch(self.match_case, self.no_match_case) {
            options.match_case = value;
        }
        if let Some(value) = switch(self.whole_word, self.no_whole_word) {
            options.match_whole_word = value;
        }
        if let Some(value) = switch(self.regex, self.no_regex) {
            options.use_regex = value;
        }
        if self.no_variants {
            options.include_variants = false;
        }
        if self.no_cross_language {
            options.include_cross_language = false;
        }
        if !self.lang.is_empty() {
            options.languages = Some(self.lang.clone());
        }
        options
    }
}

/// Logs go to stderr (stdout carries MCP traffic and command output) or to
/// `log_file` through a non-blocking writer whose guard must outlive main.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .init();
            Ok(None)
        }
    }
}

fn print_results(results: &SearchResultSet) {
    println!(
        "{} results, {} matches in {:.2}ms{}",
        results.results.len(),
        results.total_matches,
        results.execution_time_ms,
        if results.truncated { " (truncated)" } else { "" }
    );

    for result in &results.results {
        let languages: Vec<&str> = result.languages.iter().map(|l| l.code()).collect();
        println!();
        println!(
            "[{}] {} / {} ({}; {} matches)",
            result.document,
            result.work_title,
            result.title,
            languages.join(", "),
            result.match_count
        );
        println!("    {}", result.preview);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data) = cli.data {
        config.data_dir = data;
    }

    let manager = SearchManager::open(config)?;

    match cli.command {
        Commands::Search {
            query,
            flags,
            max_results,
            json,
        } => {
            let mut options = flags.apply(&manager.config().default_options);
            if max_results.is_some() {
                options.max_results = max_results;
            }

            let results = manager.search(&query, &options);
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&results);
            }
        }
        Commands::Highlight {
            query,
            text,
            flags,
            json,
        } => {
            let options = flags.apply(&manager.config().default_options);
            let spans = manager.highlight(&text, &query, &options);
            if json {
                println!("{}", serde_json::to_string_pretty(&spans)?);
            } else {
                println!("{}", highlight(&text, &spans, "[", "]"));
            }
        }
        Commands::Glossary { filter, json } => {
            let corpus = manager.corpus();
            let entries = corpus.glossary.search(filter.as_deref().unwrap_or_default());
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in entries {
                    match &entry.category {
                        Some(category) => println!("{} ({}) [{}]", entry.term, entry.key, category),
                        None => println!("{} ({})", entry.term, entry.key),
                    }
                }
            }
        }
        Commands::Stats => {
            println!("{}", serde_json::to_string_pretty(&manager.stats())?);
        }
        Commands::Serve => {
            tracing::info!("Starting treatise search MCP server");
            let server = TreatiseServer::new(Arc::new(manager));

            // Serve the MCP server
            let service = server.serve(stdio()).await?;
            service.waiting().await?;
        }
    }

    Ok(())
}
