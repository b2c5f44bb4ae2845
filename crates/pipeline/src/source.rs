//! Row source trait.

use async_trait::async_trait;
use overseer_core::Row;

use crate::error::SourceError;

/// Executes a task query and returns its rows in source order.
///
/// Implementations are shared by every task and must be safe for
/// concurrent use.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Run `query` with `cursor` bound as its only parameter, returning at
    /// most `limit` rows. On error no rows are returned.
    async fn query(&self, query: &str, cursor: i64, limit: usize) -> Result<Vec<Row>, SourceError>;
}
