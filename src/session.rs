//! Interface to the external graph database session.
//!
//! The mapper never talks to a wire protocol; it hands [`Statement`]s to a
//! [`GraphSession`] and reads rows back as JSON maps.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::cypher::Statement;
use crate::errors::{GraphMapError, SessionError};

/// One result row, keyed by column alias.
pub type Row = Map<String, Value>;

/// Executes Cypher statements.
#[async_trait]
pub trait CypherExecutor: Send + Sync {
    /// Runs a statement whose result rows are not needed.
    async fn run(&self, statement: &Statement) -> Result<(), SessionError>;

    /// Runs a statement and returns every row.
    async fn fetch(&self, statement: &Statement) -> Result<Vec<Row>, SessionError>;
}

/// An open transaction.
///
/// Dropping a unit of work without calling [`UnitOfWork::commit`] must discard
/// its writes.
#[async_trait]
pub trait UnitOfWork: CypherExecutor {
    async fn commit(self: Box<Self>) -> Result<(), SessionError>;
    async fn rollback(self: Box<Self>) -> Result<(), SessionError>;
}

/// Connection-level handle; statements run outside a unit of work auto-commit.
#[async_trait]
pub trait GraphSession: CypherExecutor {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, SessionError>;
}

/// Decodes `column` of every row into `T`.
pub async fn fetch_column<E, T>(
    executor: &E,
    statement: &Statement,
    column: &str,
) -> Result<Vec<T>, GraphMapError>
where
    E: CypherExecutor + ?Sized,
    T: DeserializeOwned,
{
    let rows = executor.fetch(statement).await?;
    rows.into_iter()
        .map(|mut row| decode_column(&mut row, column))
        .collect()
}

/// Decodes `column` of the first row, or `None` when there are no rows.
pub async fn first_column<E, T>(
    executor: &E,
    statement: &Statement,
    column: &str,
) -> Result<Option<T>, GraphMapError>
where
    E: CypherExecutor + ?Sized,
    T: DeserializeOwned,
{
    let rows = executor.fetch(statement).await?;
    match rows.into_iter().next() {
        Some(mut row) => decode_column(&mut row, column).map(Some),
        None => Ok(None),
    }
}

/// Takes `column` out of `row` and deserializes it.
///
/// A missing column decodes from `null`, so optional targets read as `None`.
pub fn decode_column<T: DeserializeOwned>(row: &mut Row, column: &str) -> Result<T, GraphMapError> {
    let value = row.remove(column).unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| GraphMapError::decode(format!("column `{column}`: {e}")))
}
