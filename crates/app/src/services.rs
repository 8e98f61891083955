use std::sync::Arc;

use stockroom_events::{EventBus, EventPublisher, InMemoryEventBus};
use stockroom_infra::{
    AppConfig, BootstrapError, ServiceResolver, TracingNotificationService,
    TracingPromotionService,
};
use stockroom_inventory::{
    InMemoryInventoryRepository, InventoryService, NotificationService, PromotionService,
    StockEventHandler,
};

pub type Inventory = InventoryService<Arc<InMemoryInventoryRepository>>;

/// Process-wide service graph. One bus, one handler, one inventory service.
#[derive(Clone)]
pub struct AppServices {
    pub config: AppConfig,
    pub event_bus: Arc<InMemoryEventBus>,
    pub publisher: EventPublisher,
    pub stock_handler: Arc<StockEventHandler>,
    pub repository: Arc<InMemoryInventoryRepository>,
    pub inventory: Arc<Inventory>,
}

impl AppServices {
    /// Default wiring: side effects are logged.
    pub fn build(config: AppConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(TracingNotificationService),
            Arc::new(TracingPromotionService),
        )
    }

    pub fn with_collaborators(
        config: AppConfig,
        notifications: Arc<dyn NotificationService>,
        promotions: Arc<dyn PromotionService>,
    ) -> Self {
        let event_bus = Arc::new(InMemoryEventBus::new());
        let publisher = EventPublisher::new(event_bus.clone());
        let stock_handler = Arc::new(StockEventHandler::new(
            notifications,
            promotions,
            config.stock,
        ));
        let repository = Arc::new(InMemoryInventoryRepository::new());
        let inventory = Arc::new(InventoryService::new(
            repository.clone(),
            publisher.clone(),
        ));

        Self {
            config,
            event_bus,
            publisher,
            stock_handler,
            repository,
            inventory,
        }
    }
}

impl ServiceResolver for AppServices {
    fn event_bus(&self) -> Result<Arc<dyn EventBus>, BootstrapError> {
        Ok(self.event_bus.clone())
    }

    fn stock_event_handler(&self) -> Result<Arc<StockEventHandler>, BootstrapError> {
        Ok(self.stock_handler.clone())
    }
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("config", &self.config)
            .field("event_bus", &self.event_bus)
            .finish_non_exhaustive()
    }
}
