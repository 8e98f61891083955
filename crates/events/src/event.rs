use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::EventId;

use crate::domain::DomainEvent;

/// A domain event: an immutable fact about inventory state.
///
/// Events are:
/// - **immutable** (treat them as facts; handlers only ever see shared references or clones)
/// - **versioned** (schema version is fixed per event kind)
/// - **transient** (dispatched in-process, never stored or replayed)
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Globally unique identity, assigned at construction.
    fn event_id(&self) -> EventId;

    /// Stable event name/type identifier (e.g. "inventory.stock.updated").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event was created.
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Tag identifying an event kind. Handlers are registered per tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    StockUpdated,
    StockLow,
    ProductDepleted,
    EntryRegistered,
    ExitRegistered,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::StockUpdated,
        EventKind::StockLow,
        EventKind::ProductDepleted,
        EventKind::EntryRegistered,
        EventKind::ExitRegistered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::StockUpdated => "inventory.stock.updated",
            EventKind::StockLow => "inventory.stock.low",
            EventKind::ProductDepleted => "inventory.product.depleted",
            EventKind::EntryRegistered => "inventory.entry.registered",
            EventKind::ExitRegistered => "inventory.exit.registered",
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and timestamp stamped onto every event at construction.
///
/// Fields are private and there is no mutable accessor, so metadata cannot change
/// once an event exists.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    id: EventId,
    occurred_on: DateTime<Utc>,
}

impl EventMetadata {
    /// Fresh metadata: new id, current time.
    pub fn now() -> Self {
        Self {
            id: EventId::new(),
            occurred_on: Utc::now(),
        }
    }

    /// Explicit metadata, for deterministic tests.
    pub fn with(id: EventId, occurred_on: DateTime<Utc>) -> Self {
        Self { id, occurred_on }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn occurred_on(&self) -> DateTime<Utc> {
        self.occurred_on
    }
}

/// A concrete event kind that can travel through the bus as a [`DomainEvent`].
///
/// The bus keys handlers by [`EventKind`] and stores them type-erased; the concrete
/// type is restored with [`TypedEvent::from_domain`] inside the wrapper closure.
pub trait TypedEvent: Event + Into<DomainEvent> {
    const KIND: EventKind;
    const VERSION: u32;

    fn metadata(&self) -> &EventMetadata;

    fn from_domain(event: &DomainEvent) -> Option<&Self>;
}
