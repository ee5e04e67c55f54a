use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars,
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::corpus::DocumentId;
use crate::language::Language;
use crate::search::{SearchManager, SearchOptions, highlight};

const DOCUMENTS_URI: &str = "treatise://documents";
const GLOSSARY_URI: &str = "treatise://glossary";

// Tool request/response types
#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct MatchFlags {
    #[schemars(description = "Case-sensitive matching (default: false)")]
    pub match_case: Option<bool>,
    #[schemars(description = "Only match whole words (default: false)")]
    pub whole_word: Option<bool>,
    #[schemars(description = "Treat the query as a regular expression (default: false)")]
    pub regex: Option<bool>,
    #[schemars(description = "Also match plural/singular variants (default: true)")]
    pub variants: Option<bool>,
    #[schemars(description = "Also match glossary equivalents in other languages (default: true)")]
    pub cross_language: Option<bool>,
    #[schemars(description = "Language channels to search: any of it, fr, en (default: all)")]
    pub languages: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchTreatisesRequest {
    #[schemars(description = "Text to search for in the treatises")]
    pub query: String,
    #[serde(flatten)]
    pub flags: MatchFlags,
    #[schemars(description = "Maximum number of results (default: 20)")]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct HighlightTextRequest {
    #[schemars(description = "Text to highlight matches in")]
    pub text: String,
    #[schemars(description = "Query whose matches should be highlighted")]
    pub query: String,
    #[serde(flatten)]
    pub flags: MatchFlags,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LookupGlossaryRequest {
    #[schemars(description = "Filter over terms, categories, definitions and translations; empty lists everything")]
    pub query: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetChapterRequest {
    #[schemars(description = "Treatise file name, e.g. marozzo_opera_nova.yaml")]
    pub treatise_file: String,
    #[schemars(description = "Chapter id within the treatise")]
    pub chapter_id: String,
}

impl MatchFlags {
    /// Overlay these flags on `base`
    fn apply(&self, base: &SearchOptions) -> Result<SearchOptions, String> {
        let mut options = base.clone();
        if let Some(value) = self.match_case {
            options.match_case = value;
        }
        if let Some(value) = self.whole_word {
            options.match_whole_word = value;
        }
        if let Some(value) = self.regex {
            options.use_regex = value;
        }
        if let Some(value) = self.variants {
            options.include_variants = value;
        }
        if let Some(value) = self.cross_language {
            options.include_cross_language = value;
        }
        if let Some(codes) = &self.languages {
            let languages = codes
                .iter()
                .map(|code| code.parse::<Language>().map_err(|e| e.to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            options.languages = Some(languages);
        }
        Ok(options)
    }
}

fn json_result<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let content =
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("Error serializing results: {e}"));
    Ok(CallToolResult::success(vec![Content::text(content)]))
}

#[derive(Debug, Clone)]
pub struct TreatiseServer {
    pub manager: Arc<SearchManager>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl TreatiseServer {
    pub fn new(manager: Arc<SearchManager>) -> Self {
        Self {
            manager,
            tool_router: Self::tool_router(),
        }
    }

    fn create_resource(&self, uri: &str, name: &str, description: &str) -> Resource {
        let mut resource = RawResource::new(uri, name.to_string());
        resource.description = Some(description.to_string());
        resource.mime_type = Some("application/json".to_string());
        resource.no_annotation()
    }

    #[tool(description = "Search the treatise corpus in Italian, French and English. Expands the query with plural variants and glossary equivalents unless disabled.")]
    fn search_treatises(
        &self,
        Parameters(req): Parameters<SearchTreatisesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let config = self.manager.config();
        let mut options = match req.flags.apply(&config.default_options) {
            Ok(options) => options,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Invalid search options: {e}"
                ))]));
            }
        };
        options.max_results = Some(req.limit.unwrap_or(config.default_limit));

        let results = self.manager.search(&req.query, &options);
        json_result(&results)
    }

    #[tool(description = "Find the spans a query would highlight in a piece of text")]
    fn highlight_text(
        &self,
        Parameters(req): Parameters<HighlightTextRequest>,
    ) -> Result<CallToolResult, McpError> {
        let options = match req.flags.apply(&self.manager.config().default_options) {
            Ok(options) => options,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Invalid search options: {e}"
                ))]));
            }
        };

        let spans = self.manager.highlight(&req.text, &req.query, &options);
        let response = json!({
            "spans": spans,
            "highlighted": highlight(&req.text, &spans, "**", "**"),
        });
        json_result(&response)
    }

    #[tool(description = "Look up fencing terms in the glossary")]
    fn lookup_glossary(
        &self,
        Parameters(req): Parameters<LookupGlossaryRequest>,
    ) -> Result<CallToolResult, McpError> {
        let corpus = self.manager.corpus();
        let entries = corpus.glossary.search(req.query.as_deref().unwrap_or_default());

        let response = json!({
            "entries": entries,
            "total": entries.len(),
        });
        json_result(&response)
    }

    #[tool(description = "Get the expanded text of one treatise chapter in every available language")]
    fn get_chapter(
        &self,
        Parameters(req): Parameters<GetChapterRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = DocumentId::new(req.treatise_file, req.chapter_id);
        match self.manager.document(&id) {
            Some(document) => json_result(&document),
            None => Ok(CallToolResult::error(vec![Content::text(format!(
                "No chapter {id} in the index"
            ))])),
        }
    }

    #[tool(description = "Get index status")]
    fn get_index_status(&self) -> Result<CallToolResult, McpError> {
        json_result(&self.manager.stats())
    }

    #[tool(description = "Re-read the corpus from disk and rebuild the index")]
    fn reload_index(&self) -> Result<CallToolResult, McpError> {
        match self.manager.reload() {
            Ok(stats) => json_result(&stats),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Error reloading corpus: {e:#}"
            ))])),
        }
    }
}

impl TreatiseServer {
    pub fn documents_json(&self) -> Result<String, McpError> {
        let index = self.manager.index();
        let documents: Vec<_> = index
            .documents()
            .iter()
            .map(|doc| {
                json!({
                    "treatise_file": doc.id.treatise_file,
                    "chapter_id": doc.id.chapter_id,
                    "title": doc.title,
                    "work_title": doc.work_title,
                    "languages": doc.channels.iter().map(|(lang, _)| lang).collect::<Vec<_>>(),
                })
            })
            .collect();

        serde_json::to_string_pretty(&documents).map_err(|e| McpError::internal_error(e.to_string(), None))
    }

    pub fn glossary_json(&self) -> Result<String, McpError> {
        let corpus = self.manager.corpus();
        serde_json::to_string_pretty(&corpus.glossary.group_by_category())
            .map_err(|e| McpError::internal_error(e.to_string(), None))
    }
}

#[tool_handler]
impl ServerHandler for TreatiseServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "treatise-search".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some("Treatise search server for historical fencing texts. Search chapters across Italian, French and English, highlight matches, browse the glossary and read whole chapters.".to_string()),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let resources = vec![
            self.create_resource(
                DOCUMENTS_URI,
                "Treatise Chapters",
                "Every indexed chapter with its available languages",
            ),
            self.create_resource(
                GLOSSARY_URI,
                "Glossary",
                "Glossary entries grouped by category and type",
            ),
        ];

        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let uri = request.uri;
        let content = match uri.as_str() {
            DOCUMENTS_URI => self.documents_json()?,
            GLOSSARY_URI => self.glossary_json()?,
            _ => {
                return Err(McpError::resource_not_found(
                    format!("Unknown resource: {uri}"),
                    Some(json!({ "uri": uri })),
                ));
            }
        };

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(content, uri)],
        })
    }
}
