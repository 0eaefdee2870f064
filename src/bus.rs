//! The publish/subscribe bus boundary (`SPEC_FULL.md` §9: "the bus client is
//! modelled as a blocking-send / stream-receive capability"). `Bus` is the
//! only interface agents depend on; a networked implementation is out of
//! scope for this crate (§1), but `InMemoryBus` is enough to run the whole
//! epoch loop synchronously for the demo binary and the integration tests.

use crate::message::Message;

/// A publish capability. Agents only ever call `publish`; delivery/fan-out to
/// subscribers is the bus implementation's job, not the agents'.
pub trait Bus {
    fn publish(&mut self, message: Message);
}

/// A single-process bus: every published message is appended to a log in
/// publish order. A driver loop (`runner.rs`) drains this log and feeds each
/// message to every agent, which is sufficient to exercise the full protocol
/// without a real broker.
#[derive(Debug, Default)]
pub struct InMemoryBus {
    log: Vec<Message>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains and returns every message published since the last drain, in
    /// publish order.
    pub fn drain(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.log)
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}

impl Bus for InMemoryBus {
    fn publish(&mut self, message: Message) {
        self.log.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Envelope, GridLoadStatusPayload};
    use chrono::Utc;

    #[test]
    fn publish_then_drain_preserves_order() {
        let mut bus = InMemoryBus::new();
        for load_status in [true, false, true] {
            bus.publish(Message::GridLoadStatus(Envelope::new(
                "s",
                "p",
                1,
                Utc::now(),
                GridLoadStatusPayload { load_status },
            )));
        }
        let drained = bus.drain();
        assert_eq!(drained.len(), 3);
        assert!(bus.is_empty());
    }
}
