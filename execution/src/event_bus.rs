//! Event Bus (spec §4.5): a bounded, non-blocking fan-out channel every
//! component publishes `Event`s onto. Mirrors the teacher's general
//! bounded-inbox discipline (drop and log on a full channel rather than
//! block the publisher).

use engine_core::Event;
use tokio::sync::mpsc;
use tracing::warn;

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Publishes an event without blocking. Drops and logs on a full bus
    /// rather than applying backpressure to the caller (a price tick or
    /// order-fill handler should never stall waiting on the event bus).
    pub fn publish(&self, event: Event) {
        if self.tx.try_send(event).is_err() {
            warn!("event bus full, dropping event");
        }
    }
}
