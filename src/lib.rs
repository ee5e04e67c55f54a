pub mod config;
pub mod corpus;
pub mod glossary;
pub mod language;
pub mod mcp_server;
pub mod search;
