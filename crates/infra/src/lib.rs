//! Infrastructure layer: configuration, side-effect adapters, startup wiring of
//! event subscriptions, background workers.

pub mod adapters;
pub mod config;
pub mod processor;
pub mod subscriptions;

pub use adapters::{TracingNotificationService, TracingPromotionService};
pub use config::{AppConfig, ConfigError, EventsConfig};
pub use processor::BackgroundEventProcessor;
pub use subscriptions::{
    ActiveSubscriptions, BootstrapError, EventSubscriptionService, ServiceResolver,
};
