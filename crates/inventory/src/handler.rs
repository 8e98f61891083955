//! Reactions to stock events: notifications and automatic promotions.
//!
//! The handler does not recover from collaborator failures. Errors are returned to
//! the bus, which logs them and keeps sibling handlers running.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use stockroom_events::{EventHandler, HandlerResult, ProductDepleted, StockLow, StockUpdated};

use crate::ports::{NotificationError, NotificationService, PromotionError, PromotionService};

/// Quantity above which a stock update triggers an automatic promotion.
pub const DEFAULT_EXCESS_THRESHOLD: i64 = 100;

#[derive(Debug, Error)]
pub enum StockHandlerError {
    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error(transparent)]
    Promotion(#[from] PromotionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockHandlerConfig {
    /// Strict upper bound: `new_quantity > excess_threshold` creates a promotion.
    pub excess_threshold: i64,
}

impl Default for StockHandlerConfig {
    fn default() -> Self {
        Self {
            excess_threshold: DEFAULT_EXCESS_THRESHOLD,
        }
    }
}

pub struct StockEventHandler {
    notifications: Arc<dyn NotificationService>,
    promotions: Arc<dyn PromotionService>,
    config: StockHandlerConfig,
}

impl StockEventHandler {
    pub fn new(
        notifications: Arc<dyn NotificationService>,
        promotions: Arc<dyn PromotionService>,
        config: StockHandlerConfig,
    ) -> Self {
        Self {
            notifications,
            promotions,
            config,
        }
    }

    pub fn config(&self) -> &StockHandlerConfig {
        &self.config
    }

    pub async fn handle_stock_updated(&self, event: &StockUpdated) -> Result<(), StockHandlerError> {
        info!(
            product = %event.product_name,
            product_id = %event.product_id,
            previous = event.previous_quantity,
            new = event.new_quantity,
            movement_type = event.movement_type.as_str(),
            location = %event.location,
            "stock updated"
        );

        self.notifications
            .send_stock_changed_notice(
                &event.product_name,
                event.previous_quantity,
                event.new_quantity,
                event.movement_type,
            )
            .await?;

        // The threshold is passed as the promotion's maximum; the product's own
        // maximum_stock is not carried by the event.
        if event.new_quantity > self.config.excess_threshold {
            info!(
                product_id = %event.product_id,
                quantity = event.new_quantity,
                threshold = self.config.excess_threshold,
                "excess stock, creating automatic promotion"
            );
            self.promotions
                .create_automatic_promotion(
                    event.product_id,
                    event.new_quantity,
                    self.config.excess_threshold,
                )
                .await?;
        }

        Ok(())
    }

    pub async fn handle_stock_low(&self, event: &StockLow) -> Result<(), StockHandlerError> {
        warn!(
            product = %event.product_name,
            product_id = %event.product_id,
            current = event.current_quantity,
            minimum = event.minimum_threshold,
            location = %event.location,
            "stock low"
        );

        self.notifications
            .send_low_stock_notice(
                &event.product_name,
                event.current_quantity,
                event.minimum_threshold,
            )
            .await?;
        Ok(())
    }

    pub async fn handle_product_depleted(
        &self,
        event: &ProductDepleted,
    ) -> Result<(), StockHandlerError> {
        error!(
            product = %event.product_name,
            product_id = %event.product_id,
            code = %event.code,
            location = %event.location,
            "product depleted"
        );

        self.notifications
            .send_depleted_notice(&event.product_name)
            .await?;
        Ok(())
    }
}

impl core::fmt::Debug for StockEventHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StockEventHandler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventHandler<StockUpdated> for StockEventHandler {
    async fn handle(&self, event: StockUpdated) -> HandlerResult {
        Ok(self.handle_stock_updated(&event).await?)
    }
}

#[async_trait]
impl EventHandler<StockLow> for StockEventHandler {
    async fn handle(&self, event: StockLow) -> HandlerResult {
        Ok(self.handle_stock_low(&event).await?)
    }
}

#[async_trait]
impl EventHandler<ProductDepleted> for StockEventHandler {
    async fn handle(&self, event: ProductDepleted) -> HandlerResult {
        Ok(self.handle_product_depleted(&event).await?)
    }
}
