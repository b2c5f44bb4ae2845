//! Notifier that writes reports to the log.

use crate::traits::{Notification, Notifier, NotifyError};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            channel = "log",
            to = %notification.to,
            subject = %notification.subject,
            lines = notification.body.lines().count(),
            "report\n{}",
            notification.body
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
