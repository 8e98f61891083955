//! Log-only implementations of the notification and promotion ports.
//!
//! These are the default process wiring. Real transports (mail, SMS, a promotion
//! engine) plug in behind the same traits.

use async_trait::async_trait;
use tracing::{info, warn};

use stockroom_core::ProductId;
use stockroom_events::MovementType;
use stockroom_inventory::{NotificationError, NotificationService, PromotionError, PromotionService};

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotificationService;

#[async_trait]
impl NotificationService for TracingNotificationService {
    async fn send_low_stock_notice(
        &self,
        product_name: &str,
        current: i64,
        minimum: i64,
    ) -> Result<(), NotificationError> {
        warn!(
            target: "stockroom::notifications",
            product = product_name,
            current,
            minimum,
            "low stock notice"
        );
        Ok(())
    }

    async fn send_depleted_notice(&self, product_name: &str) -> Result<(), NotificationError> {
        warn!(
            target: "stockroom::notifications",
            product = product_name,
            "product depleted notice"
        );
        Ok(())
    }

    async fn send_stock_changed_notice(
        &self,
        product_name: &str,
        previous: i64,
        new: i64,
        movement_type: MovementType,
    ) -> Result<(), NotificationError> {
        info!(
            target: "stockroom::notifications",
            product = product_name,
            previous,
            new,
            movement_type = movement_type.as_str(),
            "stock changed notice"
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPromotionService;

#[async_trait]
impl PromotionService for TracingPromotionService {
    async fn create_automatic_promotion(
        &self,
        product_id: ProductId,
        current: i64,
        maximum: i64,
    ) -> Result<(), PromotionError> {
        info!(
            target: "stockroom::promotions",
            product_id = %product_id,
            current,
            maximum,
            excess = current - maximum,
            "automatic promotion created"
        );
        Ok(())
    }
}
