//! Event fan-out to attached client channels (C5).
//!
//! Each channel is an unbounded queue of serialized frames, so a slow
//! consumer never blocks the session or its peers. Closed channels are
//! pruned on the next send.

use forge_contract::SessionEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

pub type ChannelId = u64;

struct Channel {
    id: ChannelId,
    tx: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
pub struct EventBus {
    channels: Mutex<Vec<Channel>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new client channel; the receiver yields serialized frames
    /// in FIFO order.
    pub fn attach(&self) -> (ChannelId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.channels
            .lock()
            .expect("event bus lock poisoned")
            .push(Channel { id, tx });
        (id, rx)
    }

    pub fn detach(&self, id: ChannelId) {
        self.channels
            .lock()
            .expect("event bus lock poisoned")
            .retain(|c| c.id != id);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.lock().expect("event bus lock poisoned").len()
    }

    /// Broadcast to every attached channel.
    pub fn broadcast(&self, event: &SessionEvent) {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(event = event.event_type(), error = %e, "event serialization failed");
                return;
            }
        };
        self.channels
            .lock()
            .expect("event bus lock poisoned")
            .retain(|c| c.tx.send(frame.clone()).is_ok());
    }

    /// Send to a single channel; used for replies and per-channel errors.
    pub fn send_to(&self, id: ChannelId, event: &SessionEvent) {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(event = event.event_type(), error = %e, "event serialization failed");
                return;
            }
        };
        let mut channels = self.channels.lock().expect("event bus lock poisoned");
        if let Some(pos) = channels.iter().position(|c| c.id == id) {
            if channels[pos].tx.send(frame).is_err() {
                channels.remove(pos);
            }
        }
    }

    /// Per-channel error frame.
    pub fn send_error(&self, id: ChannelId, message: impl Into<String>) {
        self.send_to(
            id,
            &SessionEvent::Error {
                error: message.into(),
            },
        );
    }
}
