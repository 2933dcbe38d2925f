use crate::store::{Row, SqlParam};
use crate::StoreError;
use async_trait::async_trait;

/// Hands out one store session per search. Sessions are never pooled by the
/// engine.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn StoreSession>, StoreError>;
}

#[async_trait]
pub trait StoreSession: Send {
    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>, StoreError>;

    /// Releases the connection. Called once on every exit path of a search.
    async fn close(&mut self) -> Result<(), StoreError>;
}
