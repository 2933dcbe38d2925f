use crate::error::{ResolutionFailure, SearchError};
use crate::store::Row;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured reading of a free-text query.
///
/// Fields are private so an intent cannot change after construction;
/// [`QueryIntent::new`] enforces `price_min <= price_max`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueryIntent {
    keywords: Vec<String>,
    categories: Vec<String>,
    price_min: Option<f64>,
    price_max: Option<f64>,
}

impl QueryIntent {
    pub fn new(
        keywords: Vec<String>,
        categories: Vec<String>,
        price_min: Option<f64>,
        price_max: Option<f64>,
    ) -> Self {
        let (price_min, price_max) = match (price_min, price_max) {
            (Some(min), Some(max)) if min > max => (Some(max), Some(min)),
            bounds => bounds,
        };

        Self {
            keywords,
            categories,
            price_min,
            price_max,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn price_min(&self) -> Option<f64> {
        self.price_min
    }

    pub fn price_max(&self) -> Option<f64> {
        self.price_max
    }

    pub fn has_price_bound(&self) -> bool {
        self.price_min.is_some() || self.price_max.is_some()
    }

    pub fn has_lexical_terms(&self) -> bool {
        !self.keywords.is_empty() || !self.categories.is_empty()
    }

    /// False when nothing usable was recognized. Such an intent must not be
    /// treated as "match everything".
    pub fn has_signal(&self) -> bool {
        self.has_lexical_terms() || self.has_price_bound()
    }
}

/// Table and column names of the inventory store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSchema {
    pub table: String,
    pub code: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub stock: String,
    pub category: String,
    pub image_url: String,
}

impl Default for CatalogSchema {
    fn default() -> Self {
        Self {
            table: "productos".to_string(),
            code: "codigo".to_string(),
            name: "nombre".to_string(),
            description: "descripcion".to_string(),
            price: "precio".to_string(),
            stock: "stock".to_string(),
            category: "categoria".to_string(),
            image_url: "imagen_url".to_string(),
        }
    }
}

impl CatalogSchema {
    pub fn select_clause(&self) -> String {
        format!(
            "SELECT {}, {}, {}, {}, {}, {}, {} FROM {}",
            self.code,
            self.name,
            self.description,
            self.price,
            self.stock,
            self.category,
            self.image_url,
            self.table
        )
    }
}

/// Read-only projection of an inventory row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i64,
    pub category: String,
    pub image_url: Option<String>,
}

impl Product {
    pub fn from_row(row: &Row, schema: &CatalogSchema) -> Result<Self, SearchError> {
        Ok(Self {
            code: required_text(row, &schema.code)?,
            name: required_text(row, &schema.name)?,
            description: optional_text(row, &schema.description)?,
            price: required_number(row, &schema.price)?,
            stock: required_integer(row, &schema.stock)?,
            category: required_text(row, &schema.category)?,
            image_url: optional_text(row, &schema.image_url)?,
        })
    }

    /// Lowercased `code name description category`, the text keywords are
    /// matched against.
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.code,
            self.name,
            self.description.as_deref().unwrap_or_default(),
            self.category
        )
        .to_lowercase()
    }
}

fn malformed(column: &str, details: impl Into<String>) -> SearchError {
    SearchError::MalformedRow {
        column: column.to_string(),
        details: details.into(),
    }
}

fn column<'a>(row: &'a Row, column: &str) -> Result<&'a Value, SearchError> {
    row.get(column)
        .ok_or_else(|| malformed(column, "column missing from row"))
}

fn required_text(row: &Row, name: &str) -> Result<String, SearchError> {
    match column(row, name)? {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(malformed(name, format!("expected text, found {other}"))),
    }
}

fn optional_text(row: &Row, name: &str) -> Result<Option<String>, SearchError> {
    match row.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(other) => Err(malformed(name, format!("expected text or null, found {other}"))),
    }
}

fn required_number(row: &Row, name: &str) -> Result<f64, SearchError> {
    match column(row, name)? {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| malformed(name, "number out of range")),
        // NUMERIC columns arrive as text from some drivers.
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|error| malformed(name, error.to_string())),
        other => Err(malformed(name, format!("expected number, found {other}"))),
    }
}

fn required_integer(row: &Row, name: &str) -> Result<i64, SearchError> {
    match column(row, name)? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|value| value.fract() == 0.0).map(|value| value as i64))
            .ok_or_else(|| malformed(name, format!("expected integer, found {number}"))),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|error| malformed(name, error.to_string())),
        other => Err(malformed(name, format!("expected integer, found {other}"))),
    }
}

/// Cascade stage that produced a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchStage {
    PriceOnly,
    Combined,
    Flexible,
    WidePrice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub success: bool,
    pub products: Vec<Product>,
    pub message: String,
    pub stage: Option<SearchStage>,
    pub failure: Option<ResolutionFailure>,
}

impl SearchResult {
    pub fn matched(stage: SearchStage, products: Vec<Product>, message: String) -> Self {
        Self {
            success: true,
            products,
            message,
            stage: Some(stage),
            failure: None,
        }
    }

    pub fn failed(failure: ResolutionFailure) -> Self {
        Self {
            success: false,
            products: Vec::new(),
            message: failure.to_string(),
            stage: None,
            failure: Some(failure),
        }
    }
}

/// A bounded segment of the reference document. `index` is the creation
/// order within the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEvidence {
    pub success: bool,
    pub chunks: Vec<String>,
    pub message: String,
    pub failure: Option<ResolutionFailure>,
}

impl DocumentEvidence {
    pub fn found(chunks: Vec<String>) -> Self {
        Self {
            success: true,
            message: format!(
                "Se encontraron {} secciones relevantes en el catálogo",
                chunks.len()
            ),
            chunks,
            failure: None,
        }
    }

    pub fn failed(failure: ResolutionFailure) -> Self {
        Self {
            success: false,
            chunks: Vec::new(),
            message: failure.to_string(),
            failure: Some(failure),
        }
    }
}

/// Both evidence sets for one query, kept apart so the consumer can treat
/// the store evidence as authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub query: String,
    pub db_evidence: SearchResult,
    pub doc_evidence: DocumentEvidence,
}

impl EvidenceBundle {
    pub fn has_evidence(&self) -> bool {
        (self.db_evidence.success && !self.db_evidence.products.is_empty())
            || (self.doc_evidence.success && !self.doc_evidence.chunks.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn intent_swaps_reversed_price_bounds() {
        let intent = QueryIntent::new(Vec::new(), Vec::new(), Some(1200.0), Some(800.0));
        assert_eq!(intent.price_min(), Some(800.0));
        assert_eq!(intent.price_max(), Some(1200.0));
    }

    #[test]
    fn empty_intent_has_no_signal() {
        assert!(!QueryIntent::default().has_signal());
        assert!(QueryIntent::new(Vec::new(), vec!["tv".to_string()], None, None).has_signal());
        assert!(QueryIntent::new(Vec::new(), Vec::new(), None, Some(10.0)).has_signal());
    }

    #[test]
    fn product_decodes_nulls_and_numeric_text() {
        let schema = CatalogSchema::default();
        let product = Product::from_row(
            &row(json!({
                "codigo": "LP-01",
                "nombre": "Laptop Lenovo",
                "descripcion": null,
                "precio": "990.50",
                "stock": 11,
                "categoria": "Laptop",
                "imagen_url": null
            })),
            &schema,
        )
        .expect("row should decode");

        assert_eq!(product.price, 990.5);
        assert_eq!(product.stock, 11);
        assert!(product.description.is_none());
        assert_eq!(product.searchable_text(), "lp-01 laptop lenovo  laptop");
    }

    #[test]
    fn product_rejects_missing_price_column() {
        let schema = CatalogSchema::default();
        let error = Product::from_row(
            &row(json!({
                "codigo": "X",
                "nombre": "X",
                "stock": 1,
                "categoria": "x"
            })),
            &schema,
        )
        .expect_err("price is required");

        assert!(matches!(error, SearchError::MalformedRow { ref column, .. } if column == "precio"));
    }

    #[test]
    fn failed_result_carries_failure_message() {
        let result = SearchResult::failed(ResolutionFailure::NoMatch);
        assert!(!result.success);
        assert_eq!(
            result.message,
            "No se encontraron productos que coincidan con tu búsqueda"
        );
    }
}
