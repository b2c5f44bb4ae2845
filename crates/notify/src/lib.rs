//! Report delivery for the overseer pipeline.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable report channels
//! - SMTP email notifier (lettre) with a Gmail preset
//! - Log notifier for runs without a mail server

pub mod email;
pub mod log;
pub mod traits;

pub use email::EmailNotifier;
pub use log::LogNotifier;
pub use traits::{Notification, Notifier, NotifyError};

use overseer_core::config::{MailerConfig, MailerKind};

/// Build the notifier selected by the `mailer` config section.
pub fn from_config(config: &MailerConfig) -> Result<Box<dyn Notifier>, NotifyError> {
    match config.kind {
        MailerKind::Gmail => Ok(Box::new(EmailNotifier::gmail(&config.user, &config.pass)?)),
        MailerKind::Smtp => {
            let host = config.host.as_deref().ok_or_else(|| {
                NotifyError::Config("smtp mailer requires host and port".to_string())
            })?;
            let port = config.port.ok_or_else(|| {
                NotifyError::Config("smtp mailer requires host and port".to_string())
            })?;
            Ok(Box::new(EmailNotifier::from_config(
                host,
                Some(port),
                config.tls,
                config.sender(),
                Some((config.user.as_str(), config.pass.as_str())),
            )?))
        }
        MailerKind::Log => Ok(Box::new(LogNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smtp_without_host_is_rejected() {
        let config = MailerConfig {
            kind: MailerKind::Smtp,
            port: Some(25),
            user: "alerts@example.com".into(),
            ..MailerConfig::default()
        };
        let err = from_config(&config).err().unwrap();
        assert!(err.to_string().contains("host and port"), "got: {err}");
    }

    #[test]
    fn builds_each_kind() {
        let log = from_config(&MailerConfig::default()).unwrap();
        assert_eq!(log.channel_name(), "log");

        let gmail = from_config(&MailerConfig {
            kind: MailerKind::Gmail,
            user: "reports@gmail.com".into(),
            pass: "app-password".into(),
            ..MailerConfig::default()
        })
        .unwrap();
        assert_eq!(gmail.channel_name(), "email");

        let smtp = from_config(&MailerConfig {
            kind: MailerKind::Smtp,
            host: Some("smtp.example.com".into()),
            port: Some(2525),
            tls: Some(false),
            user: "alerts@example.com".into(),
            ..MailerConfig::default()
        })
        .unwrap();
        assert_eq!(smtp.channel_name(), "email");
    }
}
