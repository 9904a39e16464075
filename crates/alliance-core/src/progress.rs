//! Typed progress reporting.
//!
//! Long sync phases push [`ProgressEvent`]s onto an unbounded channel the
//! caller subscribes to. Sending never blocks the engine, and a closed or
//! absent receiver is silently ignored.

use serde::Serialize;
use tokio::sync::mpsc;

/// A point-in-time progress update from a sync phase.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// Phase identifier, e.g. `partners:upsert`.
    pub stage: String,
    /// Records handled so far within the stage.
    pub current: usize,
    /// Total records the stage will handle, when known.
    pub total: usize,
    /// Optional human-readable detail for the current record.
    pub label: Option<String>,
}

/// Sending half handed to the engine. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    sender: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressReporter {
    /// A reporter that drops every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Emits a progress event. A missing or closed receiver is not an error.
    pub fn report(&self, stage: &str, current: usize, total: usize, label: Option<String>) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(ProgressEvent {
                stage: stage.to_string(),
                current,
                total,
                label,
            });
        }
    }
}

/// Creates a connected reporter/receiver pair.
#[must_use]
pub fn progress_channel() -> (ProgressReporter, mpsc::UnboundedReceiver<ProgressEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressReporter { sender: Some(tx) }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (reporter, mut rx) = progress_channel();
        reporter.report("partners:fetch", 1, 3, None);
        reporter.report("partners:fetch", 2, 3, Some("Acme".to_string()));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.stage, "partners:fetch");
        assert_eq!(first.current, 1);

        let second = rx.try_recv().unwrap();
        assert_eq!(second.label.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_disabled_reporter_is_silent() {
        let reporter = ProgressReporter::disabled();
        // Must not panic or block.
        reporter.report("noop", 0, 0, None);
    }

    #[test]
    fn test_dropped_receiver_ignored() {
        let (reporter, rx) = progress_channel();
        drop(rx);
        reporter.report("partners:fetch", 1, 1, None);
    }
}
