//! In-process domain events for the inventory system: event types, the
//! publish/subscribe bus, and the publishing façade used by application services.

pub mod bus;
pub mod domain;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod publisher;

pub use bus::{
    BusError, ErasedHandler, EventBus, EventBusExt, HandlerError, HandlerResult, PublishOutcome,
    SubscriptionId,
};
pub use domain::{
    DomainEvent, EntryRegistered, ExitRegistered, MovementType, ProductDepleted, StockLow,
    StockUpdated,
};
pub use event::{Event, EventKind, EventMetadata, TypedEvent};
pub use handler::{EventHandler, subscribe_handler};
pub use in_memory_bus::InMemoryEventBus;
pub use publisher::EventPublisher;
