//! Cursor-based incremental row extraction.
//!
//! Each iteration queries the source for rows past the cursor, pushes them
//! onto the bounded row queue (blocking while it is full) and advances the
//! cursor to the highest identifier pushed. The cursor lives only in memory.
//!
//! A row without an integer identifier can never move the cursor, so the
//! same query would return it on every poll. Such rows are counted and
//! dropped instead of being pushed.

use std::sync::Arc;
use std::time::Duration;

use overseer_core::Row;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ExtractError;
use crate::source::RowSource;

pub struct RowExtractor {
    task: String,
    source: Arc<dyn RowSource>,
    query: String,
    id_field: String,
    limit: usize,
    cursor: i64,
    skipped: u64,
    poll_interval: Duration,
}

impl RowExtractor {
    pub fn new(
        task: impl Into<String>,
        source: Arc<dyn RowSource>,
        query: impl Into<String>,
        id_field: impl Into<String>,
        limit: usize,
        start_cursor: i64,
    ) -> Self {
        Self {
            task: task.into(),
            source,
            query: query.into(),
            id_field: id_field.into(),
            limit: limit.max(1),
            cursor: start_cursor,
            skipped: 0,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Minimum duration of one loop iteration in [`run`](Self::run).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Highest identifier extracted so far.
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// Rows dropped so far for lacking an integer identifier.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Fetch the next portion of rows and push them onto `queue`.
    ///
    /// Returns the number of rows pushed. Rows without an integer identifier
    /// are dropped. A query failure pushes nothing and leaves the cursor
    /// untouched. Cancellation stops pushing; the cursor then covers exactly
    /// the rows already pushed.
    pub async fn extract_next(
        &mut self,
        queue: &mpsc::Sender<Row>,
        cancel: &CancellationToken,
    ) -> Result<usize, ExtractError> {
        let rows = self.source.query(&self.query, self.cursor, self.limit).await?;

        let mut count = 0;
        let mut skipped = 0;
        for row in rows {
            let Some(id) = row.get(&self.id_field).and_then(|v| v.as_i64()) else {
                skipped += 1;
                continue;
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(task = %self.task, pushed = count, "extraction interrupted by shutdown");
                    return Ok(count);
                }
                sent = queue.send(row) => {
                    sent.map_err(|_| ExtractError::QueueClosed)?;
                }
            }
            count += 1;
            if id > self.cursor {
                self.cursor = id;
            }
        }

        if skipped > 0 {
            self.skipped += skipped;
            error!(
                task = %self.task,
                field = %self.id_field,
                skipped,
                "rows without an integer identifier dropped; check that the query selects it"
            );
        }
        Ok(count)
    }

    /// Poll until cancelled or the row queue closes. Returns the final cursor.
    ///
    /// Failed iterations are logged and retried on the next tick; there is
    /// no backoff beyond the poll interval.
    pub async fn run(mut self, queue: mpsc::Sender<Row>, cancel: CancellationToken) -> i64 {
        info!(task = %self.task, cursor = self.cursor, limit = self.limit, "extractor started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let started = Instant::now();

            match self.extract_next(&queue, &cancel).await {
                Ok(0) => {}
                Ok(count) => info!(task = %self.task, count, cursor = self.cursor, "found rows"),
                Err(ExtractError::QueueClosed) => {
                    warn!(task = %self.task, "row queue closed; stopping extractor");
                    break;
                }
                Err(e) => warn!(task = %self.task, cursor = self.cursor, error = %e, "extraction failed"),
            }

            let remaining = self.poll_interval.saturating_sub(started.elapsed());
            if !remaining.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(remaining) => {}
                }
            }
        }
        info!(task = %self.task, cursor = self.cursor, skipped = self.skipped, "extractor stopped");
        self.cursor
    }
}
