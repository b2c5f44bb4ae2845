use std::collections::HashMap;
use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Raw rule parameters as written in the task configuration.
pub type RuleParams = HashMap<String, serde_yaml::Value>;

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverseerConfig {
    /// Destination for violation reports.
    pub admin_email: String,
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub mailer: MailerConfig,
    /// Without a redis section alerts are kept in an in-process cache.
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub tasks: Vec<TaskConfig>,
}

impl OverseerConfig {
    /// Read, parse and validate a YAML config file, then apply env overrides
    /// for secrets (call `load_dotenv()` first).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = serde_yaml::from_str(&raw)?;
        config.apply_env_overrides();
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate YAML without touching the environment.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(raw)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(pass) = env_opt("OVERSEER_DB_PASSWORD") {
            self.connection.pass = pass;
        }
        if let Some(user) = env_opt("SMTP_USERNAME") {
            self.mailer.user = user;
        }
        if let Some(pass) = env_opt("SMTP_PASSWORD") {
            self.mailer.pass = pass;
        }
        if let (Some(redis), Some(pass)) = (self.redis.as_mut(), env_opt("REDIS_PASSWORD")) {
            redis.pass = pass;
        }
    }

    /// Give unnamed tasks a positional name so log lines stay attributable.
    fn normalize(&mut self) {
        for (i, task) in self.tasks.iter_mut().enumerate() {
            if task.name.trim().is_empty() {
                task.name = format!("task-{}", i + 1);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tasks.is_empty() {
            return Err(ConfigError::Invalid("at least one task is required".into()));
        }
        if self.pipeline.tps == 0 {
            return Err(ConfigError::Invalid("pipeline.tps must be greater than 0".into()));
        }
        if self.pipeline.report_size == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.report_size must be greater than 0".into(),
            ));
        }
        for task in &self.tasks {
            if task.query.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("task '{}': query is empty", task.name)));
            }
            if task.field_id.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "task '{}': fieldId is empty",
                    task.name
                )));
            }
            if task.tps == Some(0) || task.report_size == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "task '{}': tps and report_size must be greater than 0",
                    task.name
                )));
            }
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  connection: {}://{}:{}/{}", self.connection.driver, self.connection.host, self.connection.port, self.connection.name);
        tracing::info!("  mailer:     type={:?}, to={}", self.mailer.kind, self.admin_email);
        match &self.redis {
            Some(r) => tracing::info!("  redis:      {}:{} db={}", r.host, r.port, r.db),
            None => tracing::info!("  redis:      (none, in-memory alert cache)"),
        }
        tracing::info!(
            "  pipeline:   tps={}, report_size={}, parallelism={}, poll_interval_ms={}",
            self.pipeline.tps,
            self.pipeline.report_size,
            self.pipeline.effective_parallelism(),
            self.pipeline.poll_interval_ms
        );
        for task in &self.tasks {
            tracing::info!(
                "  task:       {} (fieldId={}, entity={}, subjects={})",
                task.name,
                task.field_id,
                task.entity_field(),
                task.subjects.len()
            );
        }
    }
}

// ── Connection ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    pub name: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_driver() -> String {
    "postgres".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_max_connections() -> u32 {
    10
}

// ── Mailer ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailerKind {
    /// smtp.gmail.com:587 with STARTTLS.
    Gmail,
    /// Explicit `host` and `port`.
    Smtp,
    /// Reports go to the log instead of a mailbox.
    #[default]
    Log,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailerConfig {
    #[serde(rename = "type", default)]
    pub kind: MailerKind,
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    /// Sender address; defaults to `user`.
    pub from: Option<String>,
    pub tls: Option<bool>,
}

impl MailerConfig {
    pub fn sender(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.user)
    }
}

// ── Redis ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub pass: String,
    #[serde(default)]
    pub db: i64,
}

impl RedisConfig {
    pub fn url(&self) -> String {
        if self.pass.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://:{}@{}:{}/{}", self.pass, self.host, self.port, self.db)
        }
    }
}

fn default_redis_port() -> u16 {
    6379
}

// ── Pipeline defaults ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rows fetched per extractor iteration; also sizes the queues.
    #[serde(default = "default_tps")]
    pub tps: u32,
    /// Violation messages per report.
    #[serde(default = "default_report_size")]
    pub report_size: usize,
    /// Concurrent validations per task. `None` = available parallelism.
    #[serde(default)]
    pub parallelism: Option<usize>,
    /// Minimum duration of one extractor iteration.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_alert_ttl_secs")]
    pub alert_ttl_secs: u64,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    #[serde(default = "default_report_subject")]
    pub report_subject: String,
}

impl PipelineConfig {
    pub fn effective_parallelism(&self) -> usize {
        self.parallelism
            .filter(|n| *n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tps: default_tps(),
            report_size: default_report_size(),
            parallelism: None,
            poll_interval_ms: default_poll_interval_ms(),
            alert_ttl_secs: default_alert_ttl_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            report_subject: default_report_subject(),
        }
    }
}

fn default_tps() -> u32 {
    500
}

fn default_report_size() -> usize {
    5000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_alert_ttl_secs() -> u64 {
    15 * 60
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_report_subject() -> String {
    "Metrics report".to_string()
}

// ── Tasks ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub name: String,
    /// Query with the cursor bound as `$1`, ordered ascending by `field_id`.
    pub query: String,
    /// Integer identifier column that drives the cursor.
    #[serde(rename = "fieldId")]
    pub field_id: String,
    /// Column whose value keys the alert cache (e.g. `device_id`).
    /// Defaults to `fieldId`.
    #[serde(default, alias = "kvKey")]
    pub entity_field: Option<String>,
    #[serde(default)]
    pub start_cursor: i64,
    pub tps: Option<u32>,
    pub report_size: Option<usize>,
    #[serde(default)]
    pub subjects: Vec<SubjectConfig>,
}

impl TaskConfig {
    pub fn entity_field(&self) -> &str {
        self.entity_field
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(self.field_id.as_str())
    }

    pub fn tps_or(&self, defaults: &PipelineConfig) -> u32 {
        self.tps.unwrap_or(defaults.tps)
    }

    pub fn report_size_or(&self, defaults: &PipelineConfig) -> usize {
        self.report_size.unwrap_or(defaults.report_size)
    }
}

/// One (rule type, columns, params) entry of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectConfig {
    #[serde(rename = "type")]
    pub rule_type: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub params: RuleParams,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
admin_email: ops@example.com
connection:
  host: db.local
  name: metrics
  user: overseer
  pass: secret
mailer:
  type: gmail
  user: reports@example.com
  pass: app-password
redis:
  host: cache.local
  port: 6380
pipeline:
  tps: 200
  report_size: 50
tasks:
  - query: "SELECT * FROM device_metrics WHERE id > $1 ORDER BY id ASC"
    fieldId: id
    subjects:
      - type: in-range
        columns: [metric_1, metric_2]
        params: { min: 0, max: 100 }
      - type: in-list
        columns: [status]
        params:
          list: [ok, degraded]
  - name: devices
    query: "SELECT * FROM devices WHERE id > $1"
    fieldId: id
    kvKey: device_id
    tps: 10
"#;

    #[test]
    fn parse_sample_config() {
        let config = OverseerConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.admin_email, "ops@example.com");
        assert_eq!(config.connection.driver, "postgres");
        assert_eq!(config.connection.port, 5432);
        assert_eq!(config.mailer.kind, MailerKind::Gmail);
        assert_eq!(config.mailer.sender(), "reports@example.com");
        assert_eq!(config.redis.as_ref().unwrap().port, 6380);
        assert_eq!(config.pipeline.tps, 200);
        assert_eq!(config.pipeline.alert_ttl_secs, 900);

        assert_eq!(config.tasks.len(), 2);
        assert_eq!(config.tasks[0].name, "task-1");
        assert_eq!(config.tasks[0].subjects.len(), 2);
        assert_eq!(config.tasks[0].subjects[0].rule_type, "in-range");
        assert_eq!(config.tasks[0].subjects[1].columns, vec!["status"]);
        assert_eq!(config.tasks[1].name, "devices");
        assert_eq!(config.tasks[1].tps_or(&config.pipeline), 10);
        assert_eq!(config.tasks[1].report_size_or(&config.pipeline), 50);
    }

    #[test]
    fn entity_field_defaults_to_field_id() {
        let config = OverseerConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.tasks[0].entity_field(), "id");
        assert_eq!(config.tasks[1].entity_field(), "device_id");

        let mut task = config.tasks[0].clone();
        task.entity_field = Some("  ".into());
        assert_eq!(task.entity_field(), "id");
    }

    #[test]
    fn redis_url_with_and_without_password() {
        let mut redis = RedisConfig {
            host: "localhost".into(),
            port: 6379,
            pass: String::new(),
            db: 0,
        };
        assert_eq!(redis.url(), "redis://localhost:6379/0");
        redis.pass = "pw".into();
        assert_eq!(redis.url(), "redis://:pw@localhost:6379/0");
    }

    #[test]
    fn mailer_defaults_to_log() {
        let raw = r#"
admin_email: a@b.c
connection: { name: m }
tasks:
  - { query: "SELECT 1 WHERE $1 > 0", fieldId: id }
"#;
        let config = OverseerConfig::from_yaml_str(raw).unwrap();
        assert_eq!(config.mailer.kind, MailerKind::Log);
        assert!(config.redis.is_none());
        assert_eq!(config.pipeline.report_size, 5000);
    }

    #[test]
    fn rejects_empty_task_list() {
        let raw = "admin_email: a@b.c\nconnection: { name: m }\ntasks: []\n";
        let err = OverseerConfig::from_yaml_str(raw).unwrap_err();
        assert!(err.to_string().contains("at least one task"), "got: {err}");
    }

    #[test]
    fn rejects_zero_tps() {
        let raw = r#"
admin_email: a@b.c
connection: { name: m }
pipeline: { tps: 0 }
tasks:
  - { query: "q", fieldId: id }
"#;
        assert!(OverseerConfig::from_yaml_str(raw).is_err());
    }

    #[test]
    fn rejects_missing_field_id() {
        let raw = r#"
admin_email: a@b.c
connection: { name: m }
tasks:
  - { query: "q", fieldId: "" }
"#;
        let err = OverseerConfig::from_yaml_str(raw).unwrap_err();
        assert!(err.to_string().contains("fieldId"), "got: {err}");
    }

    #[test]
    fn effective_parallelism_ignores_zero() {
        let pipeline = PipelineConfig {
            parallelism: Some(0),
            ..PipelineConfig::default()
        };
        assert!(pipeline.effective_parallelism() >= 1);
        let pipeline = PipelineConfig {
            parallelism: Some(3),
            ..PipelineConfig::default()
        };
        assert_eq!(pipeline.effective_parallelism(), 3);
    }

    #[test]
    fn from_file_reads_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = OverseerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.tasks.len(), 2);
    }

    #[test]
    fn from_file_missing_path() {
        let err = OverseerConfig::from_file("/nonexistent/overseer.yml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
