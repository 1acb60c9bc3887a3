use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tracing::{trace, warn};
use uuid::Uuid;

use mochiport_types::events::RealtimeEvent;

const BROADCAST_CAPACITY: usize = 1024;

/// An event serialized once and shared by every connection.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    /// `None` for events every client receives.
    pub conversation_id: Option<Uuid>,
    pub json: Arc<str>,
}

/// Fans change events out to all connected realtime clients.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
    connected: AtomicUsize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connected: AtomicUsize::new(0),
            }),
        }
    }

    /// Subscribe to change events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish an event to every connected client. With nobody listening the
    /// event is dropped.
    pub fn publish(&self, event: RealtimeEvent) {
        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize realtime event: {}", e);
                return;
            }
        };
        let message = BroadcastMessage {
            conversation_id: event.conversation_id(),
            json: json.into(),
        };
        if self.inner.broadcast_tx.send(message).is_err() {
            trace!("No realtime listeners, event dropped");
        }
    }

    pub fn connection_opened(&self) -> usize {
        self.inner.connected.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn connection_closed(&self) -> usize {
        self.inner.connected.fetch_sub(1, Ordering::Relaxed) - 1
    }

    /// Number of open realtime sockets.
    pub fn connected_clients(&self) -> usize {
        self.inner.connected.load(Ordering::Relaxed)
    }
}
