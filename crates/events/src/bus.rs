//! Event publishing/subscription abstraction (in-process fan-out).
//!
//! This module provides the **event bus pattern**: a registry mapping an
//! [`EventKind`] to an ordered list of asynchronous handler callbacks.
//!
//! ## Delivery Semantics
//!
//! - **Per-kind routing**: a published event reaches every handler registered for
//!   its exact kind, and nothing else.
//! - **Parallel fan-out**: handlers for one event run concurrently; `publish`
//!   returns once all of them finished or failed. Relative completion order
//!   between handlers is unspecified.
//! - **Handler isolation**: an error (or panic) in one handler is logged and
//!   counted; it never fails `publish` and never stops sibling handlers.
//! - **No persistence**: events are dispatched once and discarded. There is no
//!   event store and no replay.
//! - **No timeouts**: a handler that never completes stalls the `publish` call
//!   that started it.
//!
//! ## Typed Handlers
//!
//! Handlers are stored type-erased (`Arc<DomainEvent>` in, boxed future out).
//! [`EventBusExt::subscribe`] wraps a typed callback (`Fn(StockUpdated) -> Fut`)
//! and restores the concrete event type inside the wrapper closure, so callers
//! never deal with the erased form.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use thiserror::Error;

use crate::domain::DomainEvent;
use crate::event::{EventKind, TypedEvent};

/// Error type returned by event handlers.
///
/// Any `std::error::Error + Send + Sync + 'static` converts into it with `?`.
pub type HandlerError = anyhow::Error;

pub type HandlerResult = Result<(), HandlerError>;

/// Type-erased handler as stored in the registry.
pub type ErasedHandler =
    Arc<dyn Fn(Arc<DomainEvent>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Token returned by `subscribe`; pass it to `unsubscribe` to remove that registration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What happened during a single `publish` call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub kind: EventKind,
    /// Handlers registered for the kind at the moment of publication.
    pub handlers: usize,
    pub succeeded: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

impl PublishOutcome {
    pub fn empty(kind: EventKind) -> Self {
        Self {
            kind,
            handlers: 0,
            succeeded: 0,
            failed: 0,
        }
    }

    pub fn had_subscribers(&self) -> bool {
        self.handlers > 0
    }
}

/// Failure of the dispatch mechanism itself (never of a handler).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The handler registry lock was poisoned by a panic while held.
    #[error("event handler registry is poisoned")]
    Poisoned,

    /// A dispatched handler task could not be joined (e.g. runtime shutting down).
    #[error("event dispatch failed: {0}")]
    Dispatch(String),
}

/// In-process event bus (pub/sub port).
///
/// Implementations must allow `publish`, `subscribe_erased` and `unsubscribe` to be
/// called concurrently from many tasks/threads without losing registrations.
/// `subscribe_erased`/`unsubscribe` are short synchronous mutations and must not
/// block on an in-flight `publish`.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Deliver `event` to every handler registered for its kind and wait for all of them.
    ///
    /// Zero subscribers is not an error. Handler failures are logged and counted in the
    /// returned outcome. `Err` means the dispatch mechanism itself is broken.
    async fn publish(&self, event: DomainEvent) -> Result<PublishOutcome, BusError>;

    /// Append a type-erased handler for `kind`. Registrations are additive (no dedup).
    fn subscribe_erased(
        &self,
        kind: EventKind,
        handler: ErasedHandler,
    ) -> Result<SubscriptionId, BusError>;

    /// Remove a registration. Unknown ids are a no-op and return `Ok(false)`.
    fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> Result<bool, BusError>;

    /// Number of handlers currently registered for `kind`.
    fn handler_count(&self, kind: EventKind) -> Result<usize, BusError>;
}

/// Typed subscription on top of any [`EventBus`] (including `dyn EventBus`).
pub trait EventBusExt: EventBus {
    /// Register `handler` for events of type `E`.
    ///
    /// ```ignore
    /// bus.subscribe(move |ev: StockLow| {
    ///     let notifier = notifier.clone();
    ///     async move { notifier.send_low_stock_notice(&ev.product_name, ev.current_quantity, ev.minimum_threshold).await }
    /// })?;
    /// ```
    fn subscribe<E, F, Fut, Err>(&self, handler: F) -> Result<SubscriptionId, BusError>
    where
        E: TypedEvent,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Err>> + Send + 'static,
        Err: Into<HandlerError>,
    {
        let erased: ErasedHandler = Arc::new(move |event: Arc<DomainEvent>| {
            match E::from_domain(&event) {
                Some(typed) => handler(typed.clone())
                    .map(|res| res.map_err(Into::into))
                    .boxed(),
                None => {
                    // Only reachable if a registry routes by the wrong key.
                    let expected = E::KIND;
                    let found = event.kind();
                    async move {
                        Err(anyhow::anyhow!(
                            "handler for {expected} received {found}"
                        ))
                    }
                    .boxed()
                }
            }
        });

        self.subscribe_erased(E::KIND, erased)
    }
}

impl<B: EventBus + ?Sized> EventBusExt for B {}
