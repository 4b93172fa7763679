use serde::Serialize;
use tokio::sync::broadcast;

/// Percentage of the requested frames sampled so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub progress: u8,
}

impl ProgressEvent {
    pub fn from_counts(done: usize, target: usize) -> Self {
        let percent = if target == 0 {
            100
        } else {
            (100 * done / target).min(100)
        };
        Self {
            progress: percent as u8,
        }
    }
}

/// Message pushed to WebSocket listeners.
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum WsMessage {
    Progress(ProgressEvent),
}

/// Fire-and-forget fan-out of progress events to every connected listener.
///
/// Publishing never blocks. Events sent while nobody listens are dropped, and
/// a listener that falls more than `capacity` events behind skips ahead.
#[derive(Debug, Clone)]
pub struct ProgressHub {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: ProgressEvent) {
        // Only fails when there are no receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
