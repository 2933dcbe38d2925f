use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of the store boundary. Recovered by the planner into an
/// unsuccessful [`crate::SearchResult`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("closing connection failed: {0}")]
    Close(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("malformed row, column `{column}`: {details}")]
    MalformedRow { column: String, details: String },

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
}

/// Expected "no answer" outcomes. These never propagate as errors; they are
/// carried in the `success = false` results handed to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionFailure {
    #[error("No se encontraron términos válidos para buscar")]
    NoSearchSignal,

    #[error("Error consultando base de datos: {0}")]
    StoreError(String),

    #[error("No se encontraron productos que coincidan con tu búsqueda")]
    NoMatch,

    #[error("No se pudo extraer el texto del catálogo.")]
    DocumentUnavailable,

    #[error("No se encontró información relevante en el catálogo")]
    NoRelevantChunk,
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;
