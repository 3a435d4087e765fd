use async_trait::async_trait;
use serde_json::Value;

use crate::application::errors::StorageError;

/// A result row, keyed by column name
pub type Row = serde_json::Map<String, Value>;

/// Statement parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<Value>),
    /// Names include their sigil, e.g. `:guild`
    Named(Vec<(String, Value)>),
}

impl Params {
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn named<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Params::Named(values.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Store trait - prepared-statement style access to persistent data
#[async_trait]
pub trait Store: Send + Sync {
    /// Resolves once the store has finished its asynchronous initialization
    async fn ready(&self) -> Result<(), StorageError>;

    /// Execute a statement, returning the number of changed rows
    async fn run(&self, sql: &str, params: Params) -> Result<usize, StorageError>;

    /// Fetch the first row of a query
    async fn get(&self, sql: &str, params: Params) -> Result<Option<Row>, StorageError>;

    /// Fetch every row of a query
    async fn all(&self, sql: &str, params: Params) -> Result<Vec<Row>, StorageError>;
}
