use async_trait::async_trait;
use catalog_query_core::{Row, SqlParam, StoreConnector, StoreError, StoreSession};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};
use serde_json::{Number, Value};
use std::path::PathBuf;
use tokio::task;
use tracing::debug;

/// Opens a read-only SQLite connection per search. `$n` placeholders bind
/// positionally because they appear in increasing order.
pub struct SqliteConnector {
    path: PathBuf,
}

impl SqliteConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StoreConnector for SqliteConnector {
    async fn connect(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let path = self.path.clone();
        let connection = task::spawn_blocking(move || open_catalog(&path))
            .await
            .map_err(|error| StoreError::Connect(format!("connect task failed: {error}")))?
            .map_err(|error| StoreError::Connect(format!("{}: {error}", self.path.display())))?;

        debug!(path = %self.path.display(), "sqlite connection opened");
        Ok(Box::new(SqliteSession {
            connection: Some(connection),
        }))
    }
}

fn open_catalog(path: &std::path::Path) -> rusqlite::Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let connection = Connection::open_with_flags(path, flags)?;
    register_unicode_lower(&connection)?;
    Ok(connection)
}

/// Replaces the built-in `lower`, which only folds ASCII letters.
fn register_unicode_lower(connection: &Connection) -> rusqlite::Result<()> {
    connection.create_scalar_function(
        "lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|text| text.to_lowercase())),
    )
}

pub struct SqliteSession {
    connection: Option<Connection>,
}

#[async_trait]
impl StoreSession for SqliteSession {
    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>, StoreError> {
        let connection = self
            .connection
            .take()
            .ok_or_else(|| StoreError::Query("connection already closed".to_string()))?;
        let sql = sql.to_string();
        let params = params.to_vec();

        let (connection, rows) = task::spawn_blocking(move || {
            let rows = query_rows(&connection, &sql, &params);
            (connection, rows)
        })
        .await
        .map_err(|error| StoreError::Query(format!("query task failed: {error}")))?;
        self.connection = Some(connection);

        rows.map_err(|error| StoreError::Query(error.to_string()))
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        let Some(connection) = self.connection.take() else {
            return Ok(());
        };

        task::spawn_blocking(move || connection.close())
            .await
            .map_err(|error| StoreError::Close(format!("close task failed: {error}")))?
            .map_err(|(_, error)| StoreError::Close(error.to_string()))?;
        debug!("sqlite connection closed");
        Ok(())
    }
}

fn query_rows(connection: &Connection, sql: &str, params: &[SqlParam]) -> rusqlite::Result<Vec<Row>> {
    let mut statement = connection.prepare(sql)?;
    let columns = statement
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let values = params
        .iter()
        .map(|param| match param {
            SqlParam::Text(text) => SqlValue::Text(text.clone()),
            SqlParam::Number(number) => SqlValue::Real(*number),
        })
        .collect::<Vec<_>>();

    let mut rows = statement.query(params_from_iter(values.iter()))?;
    let mut result = Vec::new();

    while let Some(row) = rows.next()? {
        let mut mapped = Row::new();
        for (index, column) in columns.iter().enumerate() {
            mapped.insert(column.clone(), json_value(row.get_ref(index)?));
        }
        result.push(mapped);
    }

    Ok(result)
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => Value::Null,
        ValueRef::Integer(integer) => Value::Number(integer.into()),
        ValueRef::Real(real) => Number::from_f64(real).map_or(Value::Null, Value::Number),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::{open_catalog, SqliteConnector};
    use catalog_query_core::{
        PlannerConfig, QueryIntent, ResolutionFailure, SearchPlanner, SearchStage, StoreConnector,
    };
    use rusqlite::{params, Connection};
    use tempfile::tempdir;

    fn seed(path: &std::path::Path) -> rusqlite::Result<()> {
        let connection = Connection::open(path)?;
        connection.execute_batch(
            "CREATE TABLE productos (
                codigo TEXT PRIMARY KEY,
                nombre TEXT NOT NULL,
                descripcion TEXT,
                precio REAL NOT NULL,
                stock INTEGER NOT NULL,
                categoria TEXT NOT NULL,
                imagen_url TEXT
            );",
        )?;
        for (code, name, description, price, category) in [
            ("LP-01", "Laptop Lenovo IdeaPad", Some("Core i5, 8GB"), 990.0, "Laptop"),
            ("LP-02", "Laptop HP Pavilion", None, 1150.0, "Laptop"),
            ("MN-01", "Monitor LG 24", Some("IPS Full HD"), 480.0, "Monitor"),
            ("MC-01", "Mochila DISEÑO urbano", None, 120.0, "Accesorio"),
        ] {
            connection.execute(
                "INSERT INTO productos VALUES (?1, ?2, ?3, ?4, 5, ?5, NULL)",
                params![code, name, description, price, category],
            )?;
        }
        Ok(())
    }

    fn planner() -> SearchPlanner {
        SearchPlanner::new(PlannerConfig::default()).expect("default config is valid")
    }

    #[tokio::test]
    async fn price_range_is_answered_from_sqlite() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("catalogo.db");
        seed(&path)?;

        let intent = QueryIntent::new(
            vec!["laptops".to_string()],
            vec!["laptop".to_string()],
            Some(800.0),
            Some(1200.0),
        );
        let result = planner().search(&intent, &SqliteConnector::new(&path)).await?;

        assert!(result.success);
        assert_eq!(result.stage, Some(SearchStage::PriceOnly));
        let codes = result
            .products
            .iter()
            .map(|product| product.code.as_str())
            .collect::<Vec<_>>();
        assert_eq!(codes, vec!["LP-01", "LP-02"]);
        assert_eq!(result.products[1].description, None);
        Ok(())
    }

    #[tokio::test]
    async fn keyword_stage_matches_with_like_parameters() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("catalogo.db");
        seed(&path)?;

        let intent = QueryIntent::new(vec!["ips".to_string()], Vec::new(), None, None);
        let result = planner().search(&intent, &SqliteConnector::new(&path)).await?;

        assert_eq!(result.stage, Some(SearchStage::Combined));
        assert_eq!(result.products.len(), 1);
        assert_eq!(result.products[0].code, "MN-01");
        Ok(())
    }

    #[tokio::test]
    async fn accented_keywords_match_uppercase_accented_text(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("catalogo.db");
        seed(&path)?;

        let intent = QueryIntent::new(vec!["diseño".to_string()], Vec::new(), None, None);
        let result = planner().search(&intent, &SqliteConnector::new(&path)).await?;

        assert!(result.success);
        assert_eq!(result.stage, Some(SearchStage::Combined));
        assert_eq!(result.products.len(), 1);
        assert_eq!(result.products[0].code, "MC-01");
        Ok(())
    }

    #[test]
    fn catalog_connections_lowercase_unicode() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("catalogo.db");
        seed(&path)?;

        let connection = open_catalog(&path)?;
        let lowered: String =
            connection.query_row("SELECT LOWER('CÁMARA DISEÑO')", [], |row| row.get(0))?;
        assert_eq!(lowered, "cámara diseño");
        Ok(())
    }

    #[tokio::test]
    async fn missing_database_is_a_store_failure() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let connector = SqliteConnector::new(dir.path().join("absent.db"));
        assert!(connector.connect().await.is_err());

        let intent = QueryIntent::new(Vec::new(), vec!["tv".to_string()], None, None);
        let result = planner().search(&intent, &connector).await?;
        assert!(matches!(result.failure, Some(ResolutionFailure::StoreError(_))));
        Ok(())
    }
}
