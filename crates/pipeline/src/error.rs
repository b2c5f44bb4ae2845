//! Pipeline error types.

use thiserror::Error;

/// Row source failures (query or connection).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("query failed: {0}")]
    Query(String),
}

/// Key-value cache failures.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Failures of one extractor iteration.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("row queue closed")]
    QueueClosed,
}
