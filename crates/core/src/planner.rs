use crate::error::{ResolutionFailure, SearchError};
use crate::models::{CatalogSchema, Product, QueryIntent, SearchResult, SearchStage};
use crate::store::{SqlParam, Statement};
use crate::traits::{StoreConnector, StoreSession};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub schema: CatalogSchema,
    /// Stages tried in order until one returns rows.
    pub stages: Vec<SearchStage>,
    /// Price widening used by the combined and flexible stages.
    pub combined_price_slack: f64,
    /// Price widening used by the last-resort price stage.
    pub wide_price_slack: f64,
    pub keyword_weight: u32,
    pub category_weight: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            schema: CatalogSchema::default(),
            stages: vec![
                SearchStage::PriceOnly,
                SearchStage::Combined,
                SearchStage::Flexible,
                SearchStage::WidePrice,
            ],
            combined_price_slack: 0.05,
            wide_price_slack: 0.15,
            keyword_weight: 1,
            category_weight: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchPlanner {
    config: PlannerConfig,
}

impl SearchPlanner {
    pub fn new(config: PlannerConfig) -> Result<Self, SearchError> {
        for slack in [config.combined_price_slack, config.wide_price_slack] {
            if !(0.0..1.0).contains(&slack) {
                return Err(SearchError::InvalidConfig(format!(
                    "price slack must be in [0, 1), got {slack}"
                )));
            }
        }
        if config.stages.is_empty() {
            return Err(SearchError::InvalidConfig(
                "at least one search stage is required".to_string(),
            ));
        }

        Ok(Self { config })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Runs the stage cascade for `intent` on a fresh store session.
    ///
    /// Store failures come back as an unsuccessful result; only rows that
    /// cannot be decoded into a [`Product`] are returned as `Err`.
    pub async fn search(
        &self,
        intent: &QueryIntent,
        connector: &dyn StoreConnector,
    ) -> Result<SearchResult, SearchError> {
        if !intent.has_signal() {
            info!("query has no usable search terms");
            return Ok(SearchResult::failed(ResolutionFailure::NoSearchSignal));
        }

        let mut session = match connector.connect().await {
            Ok(session) => session,
            Err(error) => {
                warn!(%error, "store connection failed");
                return Ok(SearchResult::failed(ResolutionFailure::StoreError(
                    error.to_string(),
                )));
            }
        };

        let outcome = self.run_cascade(intent, session.as_mut()).await;

        if let Err(error) = session.close().await {
            warn!(%error, "store connection did not close cleanly");
        }

        match outcome {
            Ok(Some(result)) => Ok(result),
            Ok(None) => {
                info!("search cascade exhausted without matches");
                Ok(SearchResult::failed(ResolutionFailure::NoMatch))
            }
            Err(SearchError::Store(error)) => {
                warn!(%error, "store query failed");
                Ok(SearchResult::failed(ResolutionFailure::StoreError(
                    error.to_string(),
                )))
            }
            Err(error) => Err(error),
        }
    }

    async fn run_cascade(
        &self,
        intent: &QueryIntent,
        session: &mut dyn StoreSession,
    ) -> Result<Option<SearchResult>, SearchError> {
        for &stage in &self.config.stages {
            let Some(statement) = self.plan(stage, intent) else {
                debug!(?stage, "stage not applicable");
                continue;
            };

            debug!(?stage, sql = %statement.sql, params = ?statement.params, "executing stage");
            let rows = session.execute(&statement.sql, &statement.params).await?;
            if rows.is_empty() {
                debug!(?stage, "stage returned no rows");
                continue;
            }

            let mut products = rows
                .iter()
                .map(|row| Product::from_row(row, &self.config.schema))
                .collect::<Result<Vec<_>, _>>()?;

            if stage == SearchStage::PriceOnly && intent.has_lexical_terms() {
                self.rerank(&mut products, intent);
            }

            info!(?stage, product_count = products.len(), "stage matched");
            let message = self.stage_message(stage, products.len());
            return Ok(Some(SearchResult::matched(stage, products, message)));
        }

        Ok(None)
    }

    /// Builds the statement for `stage`, or `None` when the stage does not
    /// apply to this intent.
    pub fn plan(&self, stage: SearchStage, intent: &QueryIntent) -> Option<Statement> {
        match stage {
            SearchStage::PriceOnly => self.price_statement(intent, 0.0),
            SearchStage::Combined => self.lexical_statement(intent, " AND "),
            SearchStage::Flexible => {
                // A disjunction of one condition is the combined query again.
                if self.condition_groups(intent) < 2 {
                    return None;
                }
                self.lexical_statement(intent, " OR ")
            }
            SearchStage::WidePrice => self.price_statement(intent, self.config.wide_price_slack),
        }
    }

    fn condition_groups(&self, intent: &QueryIntent) -> usize {
        [
            !intent.keywords().is_empty(),
            !intent.categories().is_empty(),
            intent.has_price_bound(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }

    fn price_statement(&self, intent: &QueryIntent, slack: f64) -> Option<Statement> {
        if !intent.has_price_bound() {
            return None;
        }

        let mut statement = Statement::default();
        let condition = self.price_condition(&mut statement, intent, slack)?;
        statement.sql = format!(
            "{} WHERE {} ORDER BY {} ASC",
            self.config.schema.select_clause(),
            condition,
            self.config.schema.price
        );
        Some(statement)
    }

    fn lexical_statement(&self, intent: &QueryIntent, joiner: &str) -> Option<Statement> {
        let schema = &self.config.schema;
        let mut statement = Statement::default();
        let mut conditions = Vec::new();

        if !intent.keywords().is_empty() {
            let keyword_conditions = intent
                .keywords()
                .iter()
                .map(|keyword| {
                    let pattern = format!("%{keyword}%");
                    let columns = [&schema.code, &schema.name, &schema.description, &schema.category]
                        .into_iter()
                        .map(|column| {
                            let placeholder = statement.bind(SqlParam::Text(pattern.clone()));
                            format!("LOWER({column}) LIKE {placeholder}")
                        })
                        .collect::<Vec<_>>();
                    format!("({})", columns.join(" OR "))
                })
                .collect::<Vec<_>>();
            conditions.push(format!("({})", keyword_conditions.join(" OR ")));
        }

        if !intent.categories().is_empty() {
            let category_conditions = intent
                .categories()
                .iter()
                .map(|category| {
                    let placeholder = statement.bind(SqlParam::Text(format!("%{category}%")));
                    format!("LOWER({}) LIKE {placeholder}", schema.category)
                })
                .collect::<Vec<_>>();
            conditions.push(format!("({})", category_conditions.join(" OR ")));
        }

        if let Some(condition) =
            self.price_condition(&mut statement, intent, self.config.combined_price_slack)
        {
            conditions.push(condition);
        }

        if conditions.is_empty() {
            return None;
        }

        statement.sql = format!(
            "{} WHERE {} ORDER BY {} ASC",
            schema.select_clause(),
            conditions.join(joiner),
            schema.price
        );
        Some(statement)
    }

    /// `(price >= $a AND price <= $b)` with both bounds widened by `slack`.
    fn price_condition(
        &self,
        statement: &mut Statement,
        intent: &QueryIntent,
        slack: f64,
    ) -> Option<String> {
        let column = &self.config.schema.price;
        let mut bounds = Vec::new();

        if let Some(min) = intent.price_min() {
            let widened = (min - (min * slack).round()).max(0.0);
            let placeholder = statement.bind(SqlParam::Number(widened));
            bounds.push(format!("{column} >= {placeholder}"));
        }
        if let Some(max) = intent.price_max() {
            let widened = max + (max * slack).round();
            let placeholder = statement.bind(SqlParam::Number(widened));
            bounds.push(format!("{column} <= {placeholder}"));
        }

        match bounds.len() {
            0 => None,
            1 => bounds.pop(),
            _ => Some(format!("({})", bounds.join(" AND "))),
        }
    }

    /// Stable descending sort by lexical relevance; price order survives
    /// among equal scores.
    fn rerank(&self, products: &mut [Product], intent: &QueryIntent) {
        products.sort_by_cached_key(|product| std::cmp::Reverse(self.relevance(product, intent)));
    }

    fn relevance(&self, product: &Product, intent: &QueryIntent) -> u32 {
        let text = product.searchable_text();
        let category = product.category.to_lowercase();

        let keyword_hits = intent
            .keywords()
            .iter()
            .filter(|keyword| text.contains(keyword.as_str()))
            .count() as u32;
        let category_hits = intent
            .categories()
            .iter()
            .filter(|mentioned| category.contains(mentioned.as_str()))
            .count() as u32;

        keyword_hits * self.config.keyword_weight + category_hits * self.config.category_weight
    }

    fn stage_message(&self, stage: SearchStage, count: usize) -> String {
        match stage {
            SearchStage::PriceOnly => {
                format!("Se encontraron {count} productos en el rango de precio solicitado")
            }
            SearchStage::Combined => format!("Se encontraron {count} productos relacionados"),
            SearchStage::Flexible => {
                format!("Se encontraron {count} productos relacionados (búsqueda ampliada)")
            }
            SearchStage::WidePrice => format!(
                "Se encontraron {count} productos en un rango de precio similar (±{}%)",
                (self.config.wide_price_slack * 100.0).round()
            ),
        }
    }
}
