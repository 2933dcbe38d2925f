use crate::analyzer::{AnalyzerConfig, QueryAnalyzer};
use crate::chunking::{ChunkCache, ChunkingConfig};
use crate::models::{DocumentEvidence, EvidenceBundle, QueryIntent, SearchResult};
use crate::planner::{PlannerConfig, SearchPlanner};
use crate::ranker::{ChunkRanker, RankerConfig};
use crate::traits::StoreConnector;
use crate::{ResolutionFailure, SearchError};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Every tunable of the engine, loadable from JSON with per-field defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub analyzer: AnalyzerConfig,
    pub planner: PlannerConfig,
    pub chunking: ChunkingConfig,
    pub ranker: RankerConfig,
}

pub struct ResolutionCoordinator {
    analyzer: QueryAnalyzer,
    planner: SearchPlanner,
    ranker: ChunkRanker,
    chunking: ChunkingConfig,
    chunk_cache: ChunkCache,
}

impl ResolutionCoordinator {
    pub fn new(config: EngineConfig) -> Result<Self, SearchError> {
        config.chunking.validate()?;

        Ok(Self {
            analyzer: QueryAnalyzer::new(config.analyzer)?,
            planner: SearchPlanner::new(config.planner)?,
            ranker: ChunkRanker::new(config.ranker)?,
            chunking: config.chunking,
            chunk_cache: ChunkCache::new(),
        })
    }

    pub fn analyze(&self, query: &str) -> QueryIntent {
        self.analyzer.analyze(query)
    }

    pub async fn search_store(
        &self,
        query: &str,
        connector: &dyn StoreConnector,
    ) -> Result<SearchResult, SearchError> {
        let intent = self.analyzer.analyze(query);
        self.planner.search(&intent, connector).await
    }

    /// Ranks passages of `document_text` against the raw query. Chunks are
    /// computed once per document snapshot.
    pub fn search_document(&self, query: &str, document_text: &str) -> DocumentEvidence {
        if document_text.trim().is_empty() {
            return DocumentEvidence::failed(ResolutionFailure::DocumentUnavailable);
        }

        let chunks = self.chunk_cache.chunks_for(document_text, &self.chunking);
        let scored = self.ranker.score_chunks(&chunks, query);

        if scored.first().is_some_and(|best| best.score > 0.0) {
            DocumentEvidence::found(scored.into_iter().map(|item| item.chunk.text).collect())
        } else {
            DocumentEvidence::failed(ResolutionFailure::NoRelevantChunk)
        }
    }

    /// Collects store and document evidence for one query. Phrasing the
    /// answer is left to the consumer of the bundle.
    pub async fn resolve(
        &self,
        query: &str,
        connector: &dyn StoreConnector,
        document_text: &str,
    ) -> Result<EvidenceBundle, SearchError> {
        let intent = self.analyzer.analyze(query);
        let db_evidence = self.planner.search(&intent, connector).await?;
        let doc_evidence = self.search_document(query, document_text);

        info!(
            db_success = db_evidence.success,
            product_count = db_evidence.products.len(),
            stage = ?db_evidence.stage,
            doc_success = doc_evidence.success,
            passage_count = doc_evidence.chunks.len(),
            "query resolved"
        );

        Ok(EvidenceBundle {
            query: query.to_string(),
            db_evidence,
            doc_evidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{Row, SqlParam};
    use crate::traits::StoreSession;
    use crate::SearchStage;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns the same rows for every statement.
    struct FixedConnector {
        rows: Vec<Row>,
        connects: AtomicUsize,
    }

    struct FixedSession {
        rows: Vec<Row>,
    }

    #[async_trait]
    impl StoreConnector for FixedConnector {
        async fn connect(&self) -> Result<Box<dyn StoreSession>, StoreError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FixedSession {
                rows: self.rows.clone(),
            }))
        }
    }

    #[async_trait]
    impl StoreSession for FixedSession {
        async fn execute(&mut self, _sql: &str, _params: &[SqlParam]) -> Result<Vec<Row>, StoreError> {
            Ok(self.rows.clone())
        }

        async fn close(&mut self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn connector(rows: Vec<Row>) -> FixedConnector {
        FixedConnector {
            rows,
            connects: AtomicUsize::new(0),
        }
    }

    fn monitor_row() -> Row {
        let value = json!({
            "codigo": "MON-24",
            "nombre": "Monitor LG 24",
            "descripcion": "IPS Full HD",
            "precio": 480,
            "stock": 7,
            "categoria": "monitor",
            "imagen_url": "https://example.com/mon.png"
        });
        value.as_object().cloned().unwrap_or_default()
    }

    const CATALOG: &str = "Catálogo de equipos\n\
                           Monitor LG 24 pulgadas IPS a 480 soles\n\
                           Laptop Lenovo a 2500 soles";

    fn coordinator() -> ResolutionCoordinator {
        ResolutionCoordinator::new(EngineConfig {
            chunking: ChunkingConfig {
                target_size: 40,
                overlap: 0,
                ..ChunkingConfig::default()
            },
            ..EngineConfig::default()
        })
        .expect("default config is valid")
    }

    #[tokio::test]
    async fn bundle_keeps_both_evidence_sets() {
        let store = connector(vec![monitor_row()]);
        let bundle = coordinator()
            .resolve("monitores menos de 500", &store, CATALOG)
            .await
            .expect("resolve should succeed");

        assert_eq!(bundle.query, "monitores menos de 500");
        assert!(bundle.db_evidence.success);
        assert_eq!(bundle.db_evidence.stage, Some(SearchStage::PriceOnly));
        assert_eq!(bundle.db_evidence.products[0].code, "MON-24");
        assert!(bundle.doc_evidence.success);
        assert!(bundle.doc_evidence.chunks[0].contains("Monitor LG"));
        assert!(bundle.has_evidence());
    }

    #[tokio::test]
    async fn missing_document_is_reported_without_failing_the_store_search() {
        let store = connector(vec![monitor_row()]);
        let bundle = coordinator()
            .resolve("monitor", &store, "  \n ")
            .await
            .expect("resolve should succeed");

        assert!(bundle.db_evidence.success);
        assert!(!bundle.doc_evidence.success);
        assert_eq!(
            bundle.doc_evidence.failure,
            Some(ResolutionFailure::DocumentUnavailable)
        );
    }

    #[tokio::test]
    async fn query_without_signal_yields_no_evidence() {
        let store = connector(vec![monitor_row()]);
        let bundle = coordinator()
            .resolve("¿y de la?", &store, CATALOG)
            .await
            .expect("resolve should succeed");

        assert_eq!(
            bundle.db_evidence.failure,
            Some(ResolutionFailure::NoSearchSignal)
        );
        assert_eq!(
            bundle.doc_evidence.failure,
            Some(ResolutionFailure::NoRelevantChunk)
        );
        assert!(!bundle.has_evidence());
        assert_eq!(store.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn document_is_chunked_once_across_queries() {
        let coordinator = coordinator();
        coordinator.search_document("monitor", CATALOG);
        coordinator.search_document("laptop", CATALOG);
        assert_eq!(coordinator.chunk_cache.len(), 1);
    }
}
