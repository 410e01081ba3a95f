pub mod answer;
pub mod chunker;
pub mod config;
pub mod context;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod llm;
pub mod query;
pub mod rank;
pub mod retrieve;
pub mod store;
pub mod suggest;
pub mod types;
pub mod vector;

// Re-export the primary surface for consumers (the HTTP server and tests).
pub use config::SiftConfig;
pub use context::RequestContext;
pub use engine::{HealthReport, SearchEngine, StatsReport};
pub use error::{Result, SearchError};
pub use types::{
    Document, IndexReport, IndexRequest, QueryIntent, SearchRequest, SearchResponse,
};
