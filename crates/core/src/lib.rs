pub mod analyzer;
pub mod chunking;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod planner;
pub mod ranker;
pub mod store;
pub mod tokenizer;
pub mod traits;

pub use analyzer::{AnalyzerConfig, QueryAnalyzer};
pub use chunking::{chunk_document, document_digest, ChunkCache, ChunkingConfig};
pub use error::{ResolutionFailure, SearchError, StoreError};
pub use models::{
    CatalogSchema, DocumentEvidence, EvidenceBundle, Product, QueryIntent, ScoredChunk,
    SearchResult, SearchStage, TextChunk,
};
pub use orchestrator::{EngineConfig, ResolutionCoordinator};
pub use planner::{PlannerConfig, SearchPlanner};
pub use ranker::{ChunkRanker, RankerConfig};
pub use store::{Row, SqlParam, Statement};
pub use tokenizer::{extract_numbers, extract_terms, StopWords};
pub use traits::{StoreConnector, StoreSession};
