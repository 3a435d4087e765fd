//! SQLite-backed [`Store`]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, Statement};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{error, info};

use crate::application::errors::StorageError;
use crate::domain::traits::{Params, Row, Store};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS guild_prefixes (
        guild_id TEXT PRIMARY KEY,
        prefixes TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS kv (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadyState {
    Pending,
    Ready,
    Failed(String),
}

/// Store over a single SQLite connection.
///
/// Statements run on the blocking pool. Every operation waits until
/// [`init`](SqliteStore::init) has created the schema.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    state: watch::Sender<ReadyState>,
}

impl SqliteStore {
    /// Open (or create) the database file. `:memory:` opens a private in-memory database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path.as_ref())?;
        info!("Opened database at {}", path.as_ref().display());
        let (state, _) = watch::channel(ReadyState::Pending);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            state,
        })
    }

    /// Create the schema and open the readiness gate
    pub async fn init(&self) -> Result<(), StorageError> {
        let conn = Arc::clone(&self.conn);
        let outcome = tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            lock(&conn).execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Worker(e.to_string()))
        .and_then(|result| result);

        match &outcome {
            Ok(()) => {
                self.state.send_replace(ReadyState::Ready);
            }
            Err(e) => {
                error!("Database initialization failed: {}", e);
                self.state.send_replace(ReadyState::Failed(e.to_string()));
            }
        }
        outcome
    }

    async fn blocking<T, F>(&self, sql: &str, params: Params, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Statement<'_>) -> Result<T, StorageError> + Send + 'static,
    {
        self.ready().await?;
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            let mut stmt = conn.prepare(&sql)?;
            bind(&mut stmt, &params)?;
            op(&mut stmt)
        })
        .await
        .map_err(|e| StorageError::Worker(e.to_string()))?
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn ready(&self) -> Result<(), StorageError> {
        let mut state = self.state.subscribe();
        loop {
            let current = state.borrow_and_update().clone();
            match current {
                ReadyState::Ready => return Ok(()),
                ReadyState::Failed(reason) => return Err(StorageError::NotReady(reason)),
                ReadyState::Pending => {}
            }
            state
                .changed()
                .await
                .map_err(|_| StorageError::NotReady("store was dropped".to_string()))?;
        }
    }

    async fn run(&self, sql: &str, params: Params) -> Result<usize, StorageError> {
        self.blocking(sql, params, |stmt| Ok(stmt.raw_execute()?)).await
    }

    async fn get(&self, sql: &str, params: Params) -> Result<Option<Row>, StorageError> {
        let rows = self.blocking(sql, params, |stmt| collect_rows(stmt, Some(1))).await?;
        Ok(rows.into_iter().next())
    }

    async fn all(&self, sql: &str, params: Params) -> Result<Vec<Row>, StorageError> {
        self.blocking(sql, params, |stmt| collect_rows(stmt, None)).await
    }
}

fn lock(conn: &Mutex<Connection>) -> std::sync::MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|e| e.into_inner())
}

fn bind(stmt: &mut Statement<'_>, params: &Params) -> Result<(), StorageError> {
    match params {
        Params::None => {}
        Params::Positional(values) => {
            for (i, value) in values.iter().enumerate() {
                stmt.raw_bind_parameter(i + 1, to_sql(value))?;
            }
        }
        Params::Named(values) => {
            for (name, value) in values {
                let index = stmt
                    .parameter_index(name)?
                    .ok_or_else(|| rusqlite::Error::InvalidParameterName(name.clone()))?;
                stmt.raw_bind_parameter(index, to_sql(value))?;
            }
        }
    }
    Ok(())
}

fn collect_rows(stmt: &mut Statement<'_>, limit: Option<usize>) -> Result<Vec<Row>, StorageError> {
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.raw_query();
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (i, name) in columns.iter().enumerate() {
            record.insert(name.clone(), from_sql(row.get_ref(i)?));
        }
        out.push(record);
        if limit.is_some_and(|max| out.len() >= max) {
            break;
        }
    }
    Ok(out)
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        // Nested structures are stored as their JSON text.
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::from(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    async fn store() -> SqliteStore {
        let store = SqliteStore::open(":memory:").unwrap();
        store.init().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_positional_and_named_parameters() {
        let store = store().await;
        let changed = store
            .run(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)",
                Params::positional(["greeting", "hello"]),
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let row = store
            .get("SELECT value FROM kv WHERE key = :key", Params::named([(":key", "greeting")]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get("value"), Some(&json!("hello")));

        let missing = store
            .get("SELECT value FROM kv WHERE key = ?1", Params::positional(["nope"]))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_all_converts_column_types() {
        let store = store().await;
        let rows = store
            .all("SELECT 1 AS one, 2.5 AS half, NULL AS empty, 'x' AS text", Params::None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("one"), Some(&json!(1)));
        assert_eq!(rows[0].get("half"), Some(&json!(2.5)));
        assert_eq!(rows[0].get("empty"), Some(&Value::Null));
        assert_eq!(rows[0].get("text"), Some(&json!("x")));
    }

    #[tokio::test]
    async fn test_unknown_named_parameter_is_an_error() {
        let store = store().await;
        let err = store
            .get("SELECT value FROM kv WHERE key = :key", Params::named([(":other", "x")]))
            .await;
        assert!(matches!(err, Err(StorageError::Sqlite(_))));
    }

    #[tokio::test]
    async fn test_operations_wait_for_init() {
        let store = Arc::new(SqliteStore::open(":memory:").unwrap());

        let pending = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.all("SELECT key FROM kv", Params::None).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        store.init().await.unwrap();
        let rows = pending.await.unwrap().unwrap();
        assert!(rows.is_empty());
    }
}
