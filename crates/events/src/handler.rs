use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::{BusError, EventBus, EventBusExt, HandlerResult, SubscriptionId};
use crate::event::TypedEvent;

/// Reacts to one event kind.
///
/// A type can implement this for several event kinds (one impl per kind). Kinds it
/// does not implement are never routed to it, because subscription is per kind.
#[async_trait]
pub trait EventHandler<E: TypedEvent>: Send + Sync {
    async fn handle(&self, event: E) -> HandlerResult;
}

/// Register an [`EventHandler`] implementation for `E` on `bus`.
///
/// The bus keeps its own `Arc` to the handler for as long as the subscription exists.
pub fn subscribe_handler<E, H, B>(bus: &B, handler: Arc<H>) -> Result<SubscriptionId, BusError>
where
    E: TypedEvent,
    H: EventHandler<E> + 'static,
    B: EventBus + ?Sized,
{
    bus.subscribe(move |event: E| {
        let handler = Arc::clone(&handler);
        async move { handler.handle(event).await }
    })
}
