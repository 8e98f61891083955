//! In-memory event bus.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::bus::{BusError, ErasedHandler, EventBus, PublishOutcome, SubscriptionId};
use crate::domain::DomainEvent;
use crate::event::{Event, EventKind};

struct Registration {
    id: SubscriptionId,
    handler: ErasedHandler,
}

/// In-process pub/sub bus keyed by [`EventKind`].
///
/// - Registry is an `RwLock<HashMap<..>>`; the lock is never held across an `.await`
/// - `publish` snapshots the handler list, then spawns one tokio task per handler
///   and joins them all (must be called from within a tokio runtime)
/// - Handlers subscribed while a publish is in flight see the *next* event, not the
///   current one
pub struct InMemoryEventBus {
    handlers: RwLock<HashMap<EventKind, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self, kind: EventKind) -> Result<Vec<(SubscriptionId, ErasedHandler)>, BusError> {
        let map = self.handlers.read().map_err(|_| BusError::Poisoned)?;
        Ok(map
            .get(&kind)
            .map(|regs| {
                regs.iter()
                    .map(|r| (r.id, Arc::clone(&r.handler)))
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl core::fmt::Debug for InMemoryEventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kinds: Vec<(EventKind, usize)> = match self.handlers.read() {
            Ok(map) => map.iter().map(|(k, v)| (*k, v.len())).collect(),
            Err(_) => Vec::new(),
        };
        f.debug_struct("InMemoryEventBus")
            .field("handlers", &kinds)
            .finish()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: DomainEvent) -> Result<PublishOutcome, BusError> {
        let kind = event.kind();
        let event_id = event.event_id();
        let handlers = self.snapshot(kind)?;

        if handlers.is_empty() {
            warn!(event_type = %kind, %event_id, "no handlers registered for event");
            return Ok(PublishOutcome::empty(kind));
        }

        debug!(event_type = %kind, %event_id, handler_count = handlers.len(), "dispatching event");

        let event = Arc::new(event);
        let (ids, tasks): (Vec<_>, Vec<_>) = handlers
            .into_iter()
            .map(|(id, handler)| {
                let event = Arc::clone(&event);
                (id, tokio::spawn(async move { handler(event).await }))
            })
            .unzip();

        let mut outcome = PublishOutcome {
            kind,
            handlers: ids.len(),
            succeeded: 0,
            failed: 0,
        };
        let mut dispatch_failure = None;

        for (id, joined) in ids.into_iter().zip(join_all(tasks).await) {
            match joined {
                Ok(Ok(())) => outcome.succeeded += 1,
                Ok(Err(err)) => {
                    outcome.failed += 1;
                    error!(event_type = %kind, %event_id, subscription = %id, error = %err, "event handler failed");
                }
                Err(join_err) if join_err.is_panic() => {
                    outcome.failed += 1;
                    error!(event_type = %kind, %event_id, subscription = %id, "event handler panicked");
                }
                Err(join_err) => {
                    dispatch_failure.get_or_insert_with(|| join_err.to_string());
                }
            }
        }

        if let Some(reason) = dispatch_failure {
            error!(event_type = %kind, %event_id, %reason, "event dispatch failed");
            return Err(BusError::Dispatch(reason));
        }

        Ok(outcome)
    }

    fn subscribe_erased(
        &self,
        kind: EventKind,
        handler: ErasedHandler,
    ) -> Result<SubscriptionId, BusError> {
        let id = SubscriptionId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut map = self.handlers.write().map_err(|_| BusError::Poisoned)?;
        map.entry(kind).or_default().push(Registration { id, handler });

        info!(event_type = %kind, subscription = %id, "event handler registered");
        Ok(id)
    }

    fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> Result<bool, BusError> {
        let mut map = self.handlers.write().map_err(|_| BusError::Poisoned)?;

        let Some(regs) = map.get_mut(&kind) else {
            debug!(event_type = %kind, subscription = %id, "unsubscribe for kind with no handlers");
            return Ok(false);
        };

        let before = regs.len();
        regs.retain(|r| r.id != id);
        let removed = regs.len() != before;

        if regs.is_empty() {
            map.remove(&kind);
        }

        if removed {
            info!(event_type = %kind, subscription = %id, "event handler unregistered");
        }
        Ok(removed)
    }

    fn handler_count(&self, kind: EventKind) -> Result<usize, BusError> {
        let map = self.handlers.read().map_err(|_| BusError::Poisoned)?;
        Ok(map.get(&kind).map(Vec::len).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use proptest::prelude::*;
    use stockroom_core::ProductId;
    use tokio::sync::Barrier;

    use super::*;
    use crate::bus::EventBusExt;
    use crate::domain::{MovementType, ProductDepleted, StockLow, StockUpdated};

    fn stock_updated(new_quantity: i64) -> DomainEvent {
        StockUpdated::new(ProductId::new(), "Widget", 50, new_quantity, MovementType::Entry, "A1")
            .into()
    }

    fn counting_handler(
        bus: &InMemoryEventBus,
        counter: Arc<AtomicUsize>,
    ) -> SubscriptionId {
        bus.subscribe(move |_ev: StockUpdated| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), anyhow::Error>(())
            }
        })
        .unwrap()
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let bus = InMemoryEventBus::new();

        for kind_event in [
            stock_updated(10),
            StockLow::new(ProductId::new(), "Widget", 3, 10, "A1").into(),
            ProductDepleted::new(ProductId::new(), "Gadget", "G-1", "B2").into(),
        ] {
            let outcome = bus.publish(kind_event).await.unwrap();
            assert!(!outcome.had_subscribers());
        }
    }

    #[tokio::test]
    async fn subscribed_handler_receives_each_publish_exactly_once() {
        let bus = InMemoryEventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        counting_handler(&bus, Arc::clone(&calls));

        bus.publish(stock_updated(10)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        bus.publish(stock_updated(11)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn handler_receives_the_published_payload() {
        let bus = InMemoryEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(move |ev: StockUpdated| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push((ev.product_name, ev.previous_quantity, ev.new_quantity));
                Ok::<(), anyhow::Error>(())
            }
        })
        .unwrap();

        bus.publish(stock_updated(150)).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![("Widget".to_string(), 50, 150)]);
    }

    #[tokio::test]
    async fn routing_is_per_kind() {
        let bus = InMemoryEventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        counting_handler(&bus, Arc::clone(&calls));

        let outcome = bus
            .publish(StockLow::new(ProductId::new(), "Widget", 3, 10, "A1").into())
            .await
            .unwrap();

        assert_eq!(outcome.handlers, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn subscriptions_are_additive() {
        let bus = InMemoryEventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        counting_handler(&bus, Arc::clone(&calls));
        counting_handler(&bus, Arc::clone(&calls));

        let outcome = bus.publish(stock_updated(10)).await.unwrap();
        assert_eq!(outcome.handlers, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unsubscribed_handler_is_not_invoked() {
        let bus = InMemoryEventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let id = counting_handler(&bus, Arc::clone(&calls));

        assert!(bus.unsubscribe(EventKind::StockUpdated, id).unwrap());
        assert_eq!(bus.handler_count(EventKind::StockUpdated).unwrap(), 0);

        bus.publish(stock_updated(10)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsubscribe_unknown_is_a_noop() {
        let bus = InMemoryEventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        counting_handler(&bus, Arc::clone(&calls));

        let bogus = SubscriptionId::from_raw(9_999);
        assert!(!bus.unsubscribe(EventKind::StockUpdated, bogus).unwrap());
        assert!(!bus.unsubscribe(EventKind::StockLow, bogus).unwrap());
        assert_eq!(bus.handler_count(EventKind::StockUpdated).unwrap(), 1);
    }

    #[tokio::test]
    async fn failing_handler_does_not_affect_siblings() {
        let bus = InMemoryEventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        counting_handler(&bus, Arc::clone(&calls));
        bus.subscribe(|_ev: StockUpdated| async {
            Err::<(), _>(anyhow::anyhow!("notification transport down"))
        })
        .unwrap();
        counting_handler(&bus, Arc::clone(&calls));

        let outcome = bus.publish(stock_updated(10)).await.unwrap();

        assert_eq!(outcome.handlers, 3);
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn panicking_handler_is_isolated() {
        let bus = InMemoryEventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe(|ev: StockUpdated| async move {
            if ev.new_quantity >= 0 {
                panic!("handler bug");
            }
            Ok::<(), anyhow::Error>(())
        })
        .unwrap();
        counting_handler(&bus, Arc::clone(&calls));

        let outcome = bus.publish(stock_updated(10)).await.unwrap();

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handlers_run_concurrently() {
        // Each handler waits for the other; a sequential dispatcher would deadlock.
        let bus = InMemoryEventBus::new();
        let barrier = Arc::new(Barrier::new(2));
        for _ in 0..2 {
            let barrier = Arc::clone(&barrier);
            bus.subscribe(move |_ev: StockUpdated| {
                let barrier = Arc::clone(&barrier);
                async move {
                    barrier.wait().await;
                    Ok::<(), anyhow::Error>(())
                }
            })
            .unwrap();
        }

        let outcome = tokio::time::timeout(Duration::from_secs(5), bus.publish(stock_updated(10)))
            .await
            .expect("handlers were not dispatched concurrently")
            .unwrap();
        assert_eq!(outcome.succeeded, 2);
    }

    #[tokio::test]
    async fn publish_waits_for_slow_handlers() {
        let bus = InMemoryEventBus::new();
        let done = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&done);
        bus.subscribe(move |_ev: StockUpdated| {
            let flag = Arc::clone(&flag);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                flag.fetch_add(1, Ordering::SeqCst);
                Ok::<(), anyhow::Error>(())
            }
        })
        .unwrap();

        bus.publish(stock_updated(10)).await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_subscribe_and_publish_lose_no_registrations() {
        let bus = Arc::new(InMemoryEventBus::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut joins = Vec::new();
        for i in 0..32 {
            let bus = Arc::clone(&bus);
            let calls = Arc::clone(&calls);
            joins.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    bus.subscribe(move |_ev: StockUpdated| {
                        let calls = Arc::clone(&calls);
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok::<(), anyhow::Error>(())
                        }
                    })
                    .map(|_| ())
                } else {
                    bus.publish(stock_updated(i)).await.map(|_| ())
                }
            }));
        }
        for j in joins {
            j.await.unwrap().unwrap();
        }

        assert_eq!(bus.handler_count(EventKind::StockUpdated).unwrap(), 16);

        let before = calls.load(Ordering::SeqCst);
        let outcome = bus.publish(stock_updated(1)).await.unwrap();
        assert_eq!(outcome.succeeded, 16);
        assert_eq!(calls.load(Ordering::SeqCst) - before, 16);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 32, ..ProptestConfig::default() })]

        /// Property: with N handlers of which some fail, all N run and publish still succeeds.
        #[test]
        fn every_handler_runs_regardless_of_failures(
            outcomes in proptest::collection::vec(any::<bool>(), 1..12)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let bus = InMemoryEventBus::new();
            let invoked = Arc::new(AtomicUsize::new(0));

            for ok in outcomes.clone() {
                let invoked = Arc::clone(&invoked);
                bus.subscribe(move |_ev: StockUpdated| {
                    let invoked = Arc::clone(&invoked);
                    async move {
                        invoked.fetch_add(1, Ordering::SeqCst);
                        if ok { Ok(()) } else { Err(anyhow::anyhow!("boom")) }
                    }
                })
                .unwrap();
            }

            let outcome = rt.block_on(bus.publish(stock_updated(5))).unwrap();
            let expected_failed = outcomes.iter().filter(|ok| !**ok).count();

            prop_assert_eq!(invoked.load(Ordering::SeqCst), outcomes.len());
            prop_assert_eq!(outcome.handlers, outcomes.len());
            prop_assert_eq!(outcome.failed, expected_failed);
            prop_assert_eq!(outcome.succeeded, outcomes.len() - expected_failed);
        }
    }
}
