//! Violation report batching and delivery.
//!
//! The aggregator drains the report queue, groups messages into batches of
//! the task's report size and hands each full batch to the notifier. The
//! remainder is delivered when the queue closes at shutdown.

use std::sync::Arc;

use overseer_notify::{Notification, Notifier};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Accumulates violation messages into fixed-size report batches.
pub struct ReportBatcher {
    buffer: Vec<String>,
    max_size: usize,
}

impl ReportBatcher {
    /// Create a batcher that is ready to flush at `max_size` messages.
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            buffer: Vec::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    pub fn push(&mut self, message: String) {
        self.buffer.push(message);
    }

    /// `true` once the buffer holds `max_size` messages.
    pub fn should_flush(&self) -> bool {
        self.buffer.len() >= self.max_size
    }

    /// Take everything buffered, leaving the batcher empty.
    pub fn flush(&mut self) -> Vec<String> {
        std::mem::take(&mut self.buffer)
    }

    /// Flush only if the batch is full, otherwise return `None`.
    pub fn try_flush(&mut self) -> Option<Vec<String>> {
        if self.should_flush() {
            Some(self.flush())
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Report body: one message per line, in queue order.
pub fn render_body(batch: &[String]) -> String {
    let mut body = String::with_capacity(batch.iter().map(|m| m.len() + 1).sum());
    for message in batch {
        body.push_str(message);
        body.push('\n');
    }
    body
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub messages: u64,
    pub reports_sent: u64,
    pub reports_failed: u64,
}

pub struct ReportAggregator {
    task: String,
    notifier: Arc<dyn Notifier>,
    to: String,
    subject: String,
    batch_size: usize,
}

impl ReportAggregator {
    pub fn new(
        task: impl Into<String>,
        notifier: Arc<dyn Notifier>,
        to: impl Into<String>,
        subject: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            task: task.into(),
            notifier,
            to: to.into(),
            subject: subject.into(),
            batch_size,
        }
    }

    /// Collect messages until the report queue closes.
    ///
    /// Deliveries happen one at a time in batch order. A failed delivery is
    /// logged and its batch dropped; collection continues.
    pub async fn collect(self, mut reports: mpsc::Receiver<String>) -> ReportStats {
        let mut batcher = ReportBatcher::new(self.batch_size);
        let mut stats = ReportStats::default();

        while let Some(message) = reports.recv().await {
            stats.messages += 1;
            batcher.push(message);
            if let Some(batch) = batcher.try_flush() {
                self.deliver(batch, &mut stats).await;
            }
        }

        if !batcher.is_empty() {
            info!(task = %self.task, pending = batcher.len(), "flushing partial report");
            let batch = batcher.flush();
            self.deliver(batch, &mut stats).await;
        }
        stats
    }

    async fn deliver(&self, batch: Vec<String>, stats: &mut ReportStats) {
        let notification = Notification::new(&self.to, &self.subject, render_body(&batch));
        match self.notifier.send(&notification).await {
            Ok(()) => {
                stats.reports_sent += 1;
                info!(
                    task = %self.task,
                    channel = self.notifier.channel_name(),
                    messages = batch.len(),
                    "report sent"
                );
            }
            Err(e) => {
                stats.reports_failed += 1;
                warn!(
                    task = %self.task,
                    channel = self.notifier.channel_name(),
                    messages = batch.len(),
                    error = %e,
                    "report delivery failed; batch dropped"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use overseer_notify::NotifyError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn flush_on_size() {
        let mut batcher = ReportBatcher::new(3);
        batcher.push("a".into());
        batcher.push("b".into());
        assert!(!batcher.should_flush());
        assert!(batcher.try_flush().is_none());
        batcher.push("c".into());
        assert_eq!(batcher.try_flush(), Some(vec!["a".into(), "b".into(), "c".into()]));
        assert!(batcher.is_empty());
    }

    #[test]
    fn zero_size_means_one() {
        let mut batcher = ReportBatcher::new(0);
        batcher.push("a".into());
        assert!(batcher.should_flush());
    }

    #[test]
    fn body_has_one_line_per_message() {
        assert_eq!(render_body(&["x".into(), "y".into()]), "x\ny\n");
        assert_eq!(render_body(&[]), "");
    }

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<Notification>>,
        fail_first: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for Recording {
        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.fail_first {
                return Err(NotifyError::Smtp("421 try later".into()));
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }

        fn channel_name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn full_batches_then_remainder_on_close() {
        let notifier = Arc::new(Recording::default());
        let aggregator = ReportAggregator::new("t", notifier.clone(), "ops@example.com", "Metrics report", 3);
        let (tx, rx) = mpsc::channel(16);
        for i in 0..7 {
            tx.send(format!("m{i}")).await.unwrap();
        }
        drop(tx);

        let stats = aggregator.collect(rx).await;
        assert_eq!(stats.messages, 7);
        assert_eq!(stats.reports_sent, 3);

        let sent = notifier.sent.lock().unwrap();
        let bodies: Vec<_> = sent.iter().map(|n| n.body.as_str()).collect();
        assert_eq!(bodies, vec!["m0\nm1\nm2\n", "m3\nm4\nm5\n", "m6\n"]);
        assert!(sent.iter().all(|n| n.to == "ops@example.com" && n.subject == "Metrics report"));
    }

    #[tokio::test]
    async fn failed_delivery_drops_batch_and_continues() {
        let notifier = Arc::new(Recording {
            fail_first: 1,
            ..Default::default()
        });
        let aggregator = ReportAggregator::new("t", notifier.clone(), "ops@example.com", "r", 2);
        let (tx, rx) = mpsc::channel(16);
        for i in 0..4 {
            tx.send(format!("m{i}")).await.unwrap();
        }
        drop(tx);

        let stats = aggregator.collect(rx).await;
        assert_eq!(stats.reports_failed, 1);
        assert_eq!(stats.reports_sent, 1);
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "m2\nm3\n");
    }

    #[tokio::test]
    async fn empty_queue_sends_nothing() {
        let notifier = Arc::new(Recording::default());
        let aggregator = ReportAggregator::new("t", notifier.clone(), "a@b.c", "r", 5);
        let (tx, rx) = mpsc::channel::<String>(1);
        drop(tx);
        assert_eq!(aggregator.collect(rx).await, ReportStats::default());
        assert!(notifier.sent.lock().unwrap().is_empty());
    }
}
