//! Startup wiring of the stock event handler onto the event bus.
//!
//! [`EventSubscriptionService::start`] runs once per process. It resolves the bus and
//! the handler, registers the handler for `StockUpdated`, `StockLow` and
//! `ProductDepleted`, and hands back the registrations. Any failure here must abort
//! startup: without these subscriptions every stock event is silently dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use stockroom_events::{
    BusError, EventBus, EventHandler, EventKind, ProductDepleted, StockLow, StockUpdated,
    SubscriptionId, TypedEvent, subscribe_handler,
};
use stockroom_inventory::StockEventHandler;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to resolve {0}")]
    Unresolved(String),

    #[error("failed to register subscription: {0}")]
    Subscription(#[from] BusError),

    #[error("event subscriptions already started")]
    AlreadyStarted,
}

/// Supplies the services the bootstrap needs.
pub trait ServiceResolver: Send + Sync {
    fn event_bus(&self) -> Result<Arc<dyn EventBus>, BootstrapError>;
    fn stock_event_handler(&self) -> Result<Arc<StockEventHandler>, BootstrapError>;
}

pub struct EventSubscriptionService {
    resolver: Arc<dyn ServiceResolver>,
    started: AtomicBool,
}

impl EventSubscriptionService {
    pub fn new(resolver: Arc<dyn ServiceResolver>) -> Self {
        Self {
            resolver,
            started: AtomicBool::new(false),
        }
    }

    /// Register the stock handler for its three event kinds.
    ///
    /// A second call fails with [`BootstrapError::AlreadyStarted`], even if the first
    /// one failed. If one registration fails, the ones already made are removed.
    pub fn start(&self) -> Result<ActiveSubscriptions, BootstrapError> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BootstrapError::AlreadyStarted);
        }

        info!("configuring event subscriptions");

        let bus = self.resolver.event_bus()?;
        let handler = self.resolver.stock_event_handler()?;

        let mut active = ActiveSubscriptions {
            bus,
            registrations: Vec::with_capacity(3),
        };

        if let Err(err) = active.register_stock_handler(&handler) {
            active.release();
            return Err(err);
        }

        info!(subscriptions = active.len(), "event subscriptions configured");
        Ok(active)
    }
}

impl core::fmt::Debug for EventSubscriptionService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventSubscriptionService")
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Registrations made by the bootstrap. They stay on the bus until released.
pub struct ActiveSubscriptions {
    bus: Arc<dyn EventBus>,
    registrations: Vec<(EventKind, SubscriptionId)>,
}

impl ActiveSubscriptions {
    fn register_stock_handler(
        &mut self,
        handler: &Arc<StockEventHandler>,
    ) -> Result<(), BootstrapError> {
        self.register::<StockUpdated>(handler)?;
        self.register::<StockLow>(handler)?;
        self.register::<ProductDepleted>(handler)?;
        Ok(())
    }

    fn register<E>(&mut self, handler: &Arc<StockEventHandler>) -> Result<(), BootstrapError>
    where
        E: TypedEvent,
        StockEventHandler: EventHandler<E>,
    {
        let id = subscribe_handler::<E, _, _>(self.bus.as_ref(), Arc::clone(handler))?;
        self.registrations.push((E::KIND, id));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn registrations(&self) -> &[(EventKind, SubscriptionId)] {
        &self.registrations
    }

    /// Keep the subscriptions alive until `cancel` fires, then release them.
    ///
    /// Returns the number of registrations removed.
    pub async fn hold(self, cancel: CancellationToken) -> usize {
        cancel.cancelled().await;
        info!("shutdown requested, releasing event subscriptions");
        self.release()
    }

    /// Unsubscribe everything now. Returns the number of registrations removed.
    pub fn release(self) -> usize {
        let mut removed = 0;
        for (kind, id) in &self.registrations {
            match self.bus.unsubscribe(*kind, *id) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(event_type = %kind, subscription = %id, error = %err, "failed to unsubscribe")
                }
            }
        }
        removed
    }
}

impl core::fmt::Debug for ActiveSubscriptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActiveSubscriptions")
            .field("registrations", &self.registrations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use stockroom_core::ProductId;
    use stockroom_events::{
        DomainEvent, ErasedHandler, InMemoryEventBus, MovementType, PublishOutcome,
    };
    use stockroom_inventory::{
        Notice, RecordingNotificationService, RecordingPromotionService, StockHandlerConfig,
    };

    use super::*;

    struct Fixed {
        bus: Option<Arc<dyn EventBus>>,
        handler: Arc<StockEventHandler>,
    }

    impl ServiceResolver for Fixed {
        fn event_bus(&self) -> Result<Arc<dyn EventBus>, BootstrapError> {
            match &self.bus {
                Some(bus) => Ok(bus.clone()),
                None => Err(BootstrapError::Unresolved("event bus".into())),
            }
        }

        fn stock_event_handler(&self) -> Result<Arc<StockEventHandler>, BootstrapError> {
            Ok(self.handler.clone())
        }
    }

    fn stock_handler(notifications: Arc<RecordingNotificationService>) -> Arc<StockEventHandler> {
        Arc::new(StockEventHandler::new(
            notifications,
            Arc::new(RecordingPromotionService::new()),
            StockHandlerConfig::default(),
        ))
    }

    fn setup(
        with_bus: bool,
    ) -> (
        EventSubscriptionService,
        Arc<InMemoryEventBus>,
        Arc<RecordingNotificationService>,
    ) {
        let bus = Arc::new(InMemoryEventBus::new());
        let notifications = Arc::new(RecordingNotificationService::new());
        let resolver = Fixed {
            bus: with_bus.then(|| bus.clone() as Arc<dyn EventBus>),
            handler: stock_handler(notifications.clone()),
        };
        (
            EventSubscriptionService::new(Arc::new(resolver)),
            bus,
            notifications,
        )
    }

    /// In-memory bus that refuses its `refuse_on`-th registration (1-based).
    struct RefusingBus {
        inner: InMemoryEventBus,
        refuse_on: usize,
        subscribes: AtomicUsize,
    }

    #[async_trait]
    impl EventBus for RefusingBus {
        async fn publish(&self, event: DomainEvent) -> Result<PublishOutcome, BusError> {
            self.inner.publish(event).await
        }

        fn subscribe_erased(
            &self,
            kind: EventKind,
            handler: ErasedHandler,
        ) -> Result<SubscriptionId, BusError> {
            let call = self.subscribes.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.refuse_on {
                return Err(BusError::Poisoned);
            }
            self.inner.subscribe_erased(kind, handler)
        }

        fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> Result<bool, BusError> {
            self.inner.unsubscribe(kind, id)
        }

        fn handler_count(&self, kind: EventKind) -> Result<usize, BusError> {
            self.inner.handler_count(kind)
        }
    }

    #[tokio::test]
    async fn start_registers_three_stock_kinds() {
        let (service, bus, notifications) = setup(true);

        let active = service.start().unwrap();

        assert_eq!(active.len(), 3);
        assert_eq!(bus.handler_count(EventKind::StockUpdated).unwrap(), 1);
        assert_eq!(bus.handler_count(EventKind::StockLow).unwrap(), 1);
        assert_eq!(bus.handler_count(EventKind::ProductDepleted).unwrap(), 1);
        assert_eq!(bus.handler_count(EventKind::EntryRegistered).unwrap(), 0);

        bus.publish(StockLow::new(ProductId::new(), "Bolt", 3, 10, "B2").into())
            .await
            .unwrap();
        assert_eq!(notifications.notices().len(), 1);
        assert!(matches!(notifications.notices()[0], Notice::LowStock { .. }));
    }

    #[test]
    fn second_start_is_rejected() {
        let (service, bus, _) = setup(true);

        let _active = service.start().unwrap();
        let err = service.start().unwrap_err();

        assert!(matches!(err, BootstrapError::AlreadyStarted));
        assert_eq!(bus.handler_count(EventKind::StockUpdated).unwrap(), 1);
    }

    #[test]
    fn unresolvable_bus_fails_startup() {
        let (service, bus, _) = setup(false);

        let err = service.start().unwrap_err();

        assert!(matches!(err, BootstrapError::Unresolved(_)));
        assert_eq!(bus.handler_count(EventKind::StockUpdated).unwrap(), 0);
    }

    #[tokio::test]
    async fn hold_releases_subscriptions_on_cancel() {
        let (service, bus, notifications) = setup(true);
        let active = service.start().unwrap();
        let cancel = CancellationToken::new();

        let held = tokio::spawn(active.hold(cancel.clone()));
        tokio::task::yield_now().await;
        assert!(!held.is_finished());

        cancel.cancel();
        let removed = tokio::time::timeout(Duration::from_secs(1), held)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(removed, 3);
        for kind in EventKind::ALL {
            assert_eq!(bus.handler_count(kind).unwrap(), 0);
        }

        bus.publish(
            StockUpdated::new(ProductId::new(), "Widget", 1, 2, MovementType::Entry, "A1").into(),
        )
        .await
        .unwrap();
        assert!(notifications.notices().is_empty());
    }

    #[test]
    fn failed_registration_removes_earlier_ones() {
        let bus = Arc::new(RefusingBus {
            inner: InMemoryEventBus::new(),
            refuse_on: 3,
            subscribes: AtomicUsize::new(0),
        });
        let resolver = Fixed {
            bus: Some(bus.clone() as Arc<dyn EventBus>),
            handler: stock_handler(Arc::new(RecordingNotificationService::new())),
        };
        let service = EventSubscriptionService::new(Arc::new(resolver));

        let err = service.start().unwrap_err();

        assert!(matches!(err, BootstrapError::Subscription(BusError::Poisoned)));
        assert_eq!(bus.subscribes.load(Ordering::SeqCst), 3);
        for kind in EventKind::ALL {
            assert_eq!(bus.handler_count(kind).unwrap(), 0);
        }
        assert!(matches!(service.start(), Err(BootstrapError::AlreadyStarted)));
    }
}
