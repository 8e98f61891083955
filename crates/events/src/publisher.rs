//! Publishing façade used by application services.

use std::sync::Arc;

use tracing::info;

use crate::bus::{BusError, EventBus, PublishOutcome};
use crate::domain::DomainEvent;
use crate::event::Event;

/// Logs and forwards events to the bus.
///
/// Cheap to clone; all clones share the same bus.
#[derive(Clone)]
pub struct EventPublisher {
    bus: Arc<dyn EventBus>,
}

impl EventPublisher {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.bus
    }

    /// Publish one event and wait for its handlers.
    pub async fn publish(&self, event: impl Into<DomainEvent>) -> Result<PublishOutcome, BusError> {
        let event = event.into();
        info!(
            event_type = event.event_type(),
            event_id = %event.event_id(),
            product_id = %event.product_id(),
            "publishing event"
        );
        self.bus.publish(event).await
    }

    /// Publish events one after another, in iteration order.
    ///
    /// Dispatch of event `n` (including all of its handlers) finishes before dispatch of
    /// event `n + 1` starts. Stops at the first bus failure.
    pub async fn publish_many<I>(&self, events: I) -> Result<Vec<PublishOutcome>, BusError>
    where
        I: IntoIterator<Item = DomainEvent>,
    {
        let mut outcomes = Vec::new();
        for event in events {
            outcomes.push(self.publish(event).await?);
        }
        Ok(outcomes)
    }
}

impl core::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventPublisher").finish_non_exhaustive()
    }
}
