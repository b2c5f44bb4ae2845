//! overseer-demo-data: fills a PostgreSQL database with demo device metrics.
//!
//! Creates `users`, `devices` and `device_metrics` if missing, adds a batch
//! of random users and devices, then inserts one random metric row per
//! interval until interrupted.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sqlx::PgPool;
use tracing::{debug, info};

use overseer_core::config::load_dotenv;
use overseer_core::OverseerConfig;
use overseer_pipeline::logging::{init_logging, LogFormat};
use overseer_pipeline::shutdown::os_signal;
use overseer_pipeline::PgRowSource;

/// Demo data generator for the overseer.
#[derive(Parser, Debug)]
#[command(name = "overseer-demo-data", version, about)]
struct Cli {
    /// Path to the YAML config file (only `connection` is used).
    #[arg(long, short, env = "OVERSEER_CONFIG", default_value = "config.yml")]
    config: PathBuf,

    /// Delay between metric inserts in milliseconds.
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,

    #[arg(long, default_value_t = 10)]
    users: usize,

    #[arg(long, default_value_t = 20)]
    devices: usize,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        email VARCHAR(255) NOT NULL UNIQUE,
        name VARCHAR(255) NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS devices (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        user_id BIGINT NOT NULL REFERENCES users (id)
    )",
    "CREATE TABLE IF NOT EXISTS device_metrics (
        id BIGSERIAL PRIMARY KEY,
        device_id BIGINT NOT NULL REFERENCES devices (id),
        metric_1 INTEGER,
        metric_2 INTEGER,
        metric_3 INTEGER,
        metric_4 INTEGER,
        metric_5 INTEGER,
        local_time TIMESTAMPTZ,
        server_time TIMESTAMPTZ
    )",
];

fn random_word(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

async fn create_schema(pool: &PgPool) -> anyhow::Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("failed to create demo tables")?;
    }
    Ok(())
}

async fn insert_users(pool: &PgPool, rng: &mut StdRng, count: usize) -> anyhow::Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        let email = format!(
            "{}@{}.{}",
            random_word(rng, 8),
            random_word(rng, 5),
            random_word(rng, 3)
        );
        let name = format!("{} {}", random_word(rng, 8), random_word(rng, 12));
        let id: Option<i64> = sqlx::query_scalar(
            "INSERT INTO users (email, name) VALUES ($1, $2) ON CONFLICT (email) DO NOTHING RETURNING id",
        )
        .bind(&email)
        .bind(&name)
        .fetch_optional(pool)
        .await
        .context("failed to insert user")?;
        if let Some(id) = id {
            info!(user_id = id, "added user");
            ids.push(id);
        }
    }
    Ok(ids)
}

async fn insert_devices(
    pool: &PgPool,
    rng: &mut StdRng,
    users: &[i64],
    count: usize,
) -> anyhow::Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        let user_id = users[rng.gen_range(0..users.len())];
        let name = format!(
            "{}-{}-{}-{}",
            random_word(rng, 6),
            random_word(rng, 6),
            random_word(rng, 6),
            random_word(rng, 14)
        );
        let id: i64 = sqlx::query_scalar("INSERT INTO devices (name, user_id) VALUES ($1, $2) RETURNING id")
            .bind(&name)
            .bind(user_id)
            .fetch_one(pool)
            .await
            .context("failed to insert device")?;
        info!(device_id = id, user_id, "added device");
        ids.push(id);
    }
    Ok(ids)
}

async fn insert_metric(pool: &PgPool, rng: &mut StdRng, devices: &[i64]) -> anyhow::Result<()> {
    let device_id = devices[rng.gen_range(0..devices.len())];
    let mut query = sqlx::query(
        "INSERT INTO device_metrics (device_id, metric_1, metric_2, metric_3, metric_4, metric_5, local_time, server_time)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(device_id);
    for _ in 0..5 {
        query = query.bind(rng.gen_range(1..=100_i32));
    }
    let now = Utc::now();
    query
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("failed to insert metric")?;
    debug!(device_id, "added metric");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    init_logging(LogFormat::Plain, None)?;

    if cli.users == 0 || cli.devices == 0 {
        bail!("--users and --devices must be greater than 0");
    }

    let config = OverseerConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    let source = PgRowSource::connect(&config.connection)
        .await
        .context("failed to connect to the database")?;
    let pool = source.pool();

    let mut rng = StdRng::from_entropy();
    create_schema(pool).await?;
    let users = insert_users(pool, &mut rng, cli.users).await?;
    if users.is_empty() {
        bail!("no users were inserted");
    }
    let devices = insert_devices(pool, &mut rng, &users, cli.devices).await?;

    info!(interval_ms = cli.interval_ms, "inserting metrics until interrupted");
    let interval = Duration::from_millis(cli.interval_ms);
    let mut inserted: u64 = 0;
    let shutdown = os_signal();
    tokio::pin!(shutdown);
    loop {
        insert_metric(pool, &mut rng, &devices).await?;
        inserted += 1;
        if inserted % 100 == 0 {
            info!(inserted, "metrics inserted");
        }
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!(inserted, "goodbye");
    Ok(())
}
