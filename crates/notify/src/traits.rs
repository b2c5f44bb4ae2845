//! Notifier trait definition and shared error types.

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A report ready for delivery to one destination.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    /// Destination address.
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Trait for notification channel implementations.
///
/// Implementations must be safe to share between tasks; the pipeline holds
/// one notifier behind an `Arc` for every configured task.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification through this channel.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Test connectivity with a sample notification.
    async fn test(&self, to: &str) -> Result<(), NotifyError> {
        let test_notification = Notification::new(
            to,
            "[TEST] Data overseer",
            "This is a test notification from the data overseer.",
        );
        self.send(&test_notification).await
    }

    /// Human-readable name for this channel (e.g., "email", "log").
    fn channel_name(&self) -> &str;
}
