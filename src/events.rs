// src/events.rs

//! Event queue between workers and their owning context.
//!
//! Every [`ProcessWorker`](crate::worker::ProcessWorker) publishes its
//! stream output and its single termination event here, tagged with the
//! originating worker id. The queue is a plain unbounded mpsc handle: the
//! pump loop must be able to publish without blocking (it never holds the
//! worker mutex across a publish, and it must not stall behind a slow
//! consumer either).

use tokio::sync::mpsc;

/// Identifier assigned to each worker at spawn time, unique per process.
pub type WorkerId = u64;

/// Kind tag for [`WorkerEvent`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    StdoutData,
    StderrData,
    Termination,
}

/// Payload of the single termination event a worker publishes.
///
/// `exit_status` is only meaningful when the child exited on its own
/// (`has_started && !forced`); after a forced kill or a startup failure it
/// holds a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationInfo {
    /// Whether the child process ever started successfully.
    pub has_started: bool,
    /// True when termination was caused by an explicit kill request rather
    /// than the child exiting on its own.
    pub forced: bool,
    /// Child exit status; valid only for natural termination.
    pub exit_status: i32,
    /// Pid of the child, if startup succeeded.
    pub pid: Option<u32>,
}

/// Event payloads. Output events own their bytes: the pump loop hands its
/// read buffer contents off and allocates afresh.
#[derive(Debug, Clone)]
pub enum EventPayload {
    StdoutData(Vec<u8>),
    StderrData(Vec<u8>),
    Termination(TerminationInfo),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::StdoutData(_) => EventKind::StdoutData,
            EventPayload::StderrData(_) => EventKind::StderrData,
            EventPayload::Termination(_) => EventKind::Termination,
        }
    }
}

/// One event from one worker.
#[derive(Debug, Clone)]
pub struct WorkerEvent {
    pub worker: WorkerId,
    pub payload: EventPayload,
}

/// Sending half of the event queue, cloned into every worker.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl EventQueue {
    /// Create a queue and the receiver the owning context drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publish an event. Returns false when the consumer has gone away;
    /// termination waits do not depend on delivery.
    pub fn publish(&self, event: WorkerEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_kind_matches_variant() {
        let term = TerminationInfo {
            has_started: true,
            forced: false,
            exit_status: 0,
            pid: Some(42),
        };
        assert_eq!(
            EventPayload::StdoutData(vec![1]).kind(),
            EventKind::StdoutData
        );
        assert_eq!(
            EventPayload::StderrData(vec![2]).kind(),
            EventKind::StderrData
        );
        assert_eq!(
            EventPayload::Termination(term).kind(),
            EventKind::Termination
        );
    }

    #[tokio::test]
    async fn publish_reports_missing_consumer() {
        let (queue, rx) = EventQueue::channel();
        let event = WorkerEvent {
            worker: 1,
            payload: EventPayload::StdoutData(b"x".to_vec()),
        };
        assert!(queue.publish(event.clone()));
        drop(rx);
        assert!(!queue.publish(event));
    }
}
