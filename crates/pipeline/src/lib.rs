//! Streaming validation pipeline.
//!
//! Per configured task:
//!
//! ```text
//! RowSource → RowExtractor → row queue → ValidationPool ─→ report queue → ReportAggregator → Notifier
//!                                                      └─→ AlertWriter → AlertCache
//! ```
//!
//! Every stage handles its own errors; only rows and violation messages
//! cross stage boundaries, through bounded `tokio::sync::mpsc` queues.

pub mod alert;
pub mod cache;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod postgres;
pub mod report;
pub mod service;
pub mod shutdown;
pub mod source;
pub mod task;
pub mod worker;

pub use alert::AlertWriter;
pub use cache::{AlertCache, MemoryCache, RedisCache};
pub use error::{CacheError, ExtractError, SourceError};
pub use extractor::RowExtractor;
pub use postgres::PgRowSource;
pub use report::{ReportAggregator, ReportBatcher};
pub use service::Overseer;
pub use source::RowSource;
pub use task::{Collaborators, TaskDriver, TaskSettings, TaskSummary};
pub use worker::ValidationPool;
