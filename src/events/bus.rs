//! Double-buffered event bus

use serde::{Deserialize, Serialize};

use crate::core::types::SectorId;
use crate::events::types::{Event, EventPayload, Topic};

/// Buffered publish/subscribe hub.
///
/// `publish` always appends to the next-step buffer; the orchestrator calls
/// [`EventBus::swap`] exactly once at the step boundary, after which
/// [`EventBus::take_current`] drains the events published in the previous
/// step. Delivery fan-out per subscriber happens in the orchestrator so a
/// failing subscriber cannot stop delivery to the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventBus {
    next: Vec<Event>,
    current: Vec<Event>,
    subscriptions: Vec<(Topic, SectorId)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sector` for `topic`. Registration order is delivery order
    /// among subscribers of the same event.
    pub fn subscribe(&mut self, topic: Topic, sector: SectorId) {
        if !self.subscriptions.contains(&(topic, sector)) {
            self.subscriptions.push((topic, sector));
        }
    }

    /// Append an event to the next-step buffer.
    pub fn publish(&mut self, payload: EventPayload) {
        self.next.push(Event::new(payload));
    }

    /// Step boundary: events published last step become deliverable.
    ///
    /// Any not-yet-drained current events are discarded; per the bus
    /// contract an event is offered to subscribers exactly once.
    pub fn swap(&mut self) {
        self.current = std::mem::take(&mut self.next);
    }

    /// Drain the current-step buffer, FIFO in publish order.
    pub fn take_current(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.current)
    }

    /// Subscribers of `topic`, in registration order.
    pub fn subscribers(&self, topic: Topic) -> Vec<SectorId> {
        self.subscriptions
            .iter()
            .filter(|(t, _)| *t == topic)
            .map(|(_, s)| *s)
            .collect()
    }

    /// Number of events awaiting the next swap.
    pub fn pending(&self) -> usize {
        self.next.len()
    }
}
