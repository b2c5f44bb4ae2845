//! overseer: streaming data-quality daemon.
//!
//! Polls every configured task's query, validates each row against the
//! task's rules, mails batched violation reports and caches the latest alert
//! per entity.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use overseer_core::config::load_dotenv;
use overseer_core::OverseerConfig;
use overseer_pipeline::logging::{init_logging, LogFormat};
use overseer_pipeline::shutdown::spawn_signal_handler;
use overseer_pipeline::{AlertCache, Collaborators, MemoryCache, Overseer, PgRowSource, RedisCache};
use overseer_rules::RuleRegistry;

// ── CLI ─────────────────────────────────────────────────────────────

/// Data overseer: validates streaming rows and reports violations.
#[derive(Parser, Debug)]
#[command(name = "overseer", version, about)]
struct Cli {
    /// Path to the YAML config file.
    #[arg(long, short, env = "OVERSEER_CONFIG", default_value = "config.yml")]
    config: PathBuf,

    /// Append log lines to this file instead of stdout.
    #[arg(long, env = "OVERSEER_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[arg(long, value_enum, env = "OVERSEER_LOG_FORMAT", default_value_t = LogFormat::Plain)]
    log_format: LogFormat,

    /// Rows per extraction and queue capacity (overrides pipeline.tps).
    #[arg(long, env = "OVERSEER_TPS")]
    tps: Option<u32>,

    /// Violations per report (overrides pipeline.report_size).
    #[arg(long = "rsize", env = "OVERSEER_REPORT_SIZE")]
    report_size: Option<usize>,

    /// Concurrent validations per task.
    #[arg(long, env = "OVERSEER_PARALLELISM")]
    parallelism: Option<usize>,

    /// Send a test notification to admin_email and exit.
    #[arg(long)]
    test_notify: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_file.as_deref())?;
    info!("hello");

    let mut config = OverseerConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    if let Some(tps) = cli.tps {
        config.pipeline.tps = tps;
    }
    if let Some(size) = cli.report_size {
        config.pipeline.report_size = size;
    }
    if let Some(n) = cli.parallelism {
        config.pipeline.parallelism = Some(n);
    }
    config.validate().context("invalid command line overrides")?;
    config.log_summary();

    let notifier: Arc<dyn overseer_notify::Notifier> =
        Arc::from(overseer_notify::from_config(&config.mailer).context("failed to set up mailer")?);

    if cli.test_notify {
        notifier
            .test(&config.admin_email)
            .await
            .context("test notification failed")?;
        info!(to = %config.admin_email, channel = notifier.channel_name(), "test notification sent");
        return Ok(());
    }

    let source = PgRowSource::connect(&config.connection)
        .await
        .context("failed to connect to the database")?;

    let cache: Arc<dyn AlertCache> = match &config.redis {
        Some(redis) => Arc::new(
            RedisCache::connect(redis)
                .await
                .context("failed to connect to redis")?,
        ),
        None => {
            warn!("no redis section configured; alerts are kept in process memory");
            Arc::new(MemoryCache::new())
        }
    };

    let overseer = Overseer::new(
        Arc::new(RuleRegistry::with_builtins()),
        Collaborators {
            source: Arc::new(source),
            cache,
            notifier,
        },
        config.pipeline.clone(),
        config.admin_email.clone(),
    );

    let cancel = CancellationToken::new();
    let signals = spawn_signal_handler(cancel.clone());

    let summaries = overseer.run(&config.tasks, cancel.clone()).await;
    cancel.cancel();
    signals.abort();

    for summary in &summaries {
        info!(
            task = %summary.name,
            cursor = ?summary.final_cursor,
            rows = summary.pool.rows,
            violations = summary.pool.violations,
            alerts = summary.pool.alerts_stored,
            reports = summary.reports.reports_sent,
            failed_reports = summary.reports.reports_failed,
            "task summary"
        );
    }
    if summaries.len() < config.tasks.len() {
        warn!(
            finished = summaries.len(),
            configured = config.tasks.len(),
            "some tasks did not finish cleanly"
        );
    }

    info!("goodbye");
    Ok(())
}
