//! Side-effect ports used by the stock event handler.
//!
//! Implementations live at the edges (email, SMS, promotion engine). This module
//! also ships recording adapters for tests/dev.

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use stockroom_core::ProductId;
use stockroom_events::MovementType;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PromotionError {
    #[error("promotion rejected: {0}")]
    Rejected(String),
}

/// Outbound stock notifications.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_low_stock_notice(
        &self,
        product_name: &str,
        current: i64,
        minimum: i64,
    ) -> Result<(), NotificationError>;

    async fn send_depleted_notice(&self, product_name: &str) -> Result<(), NotificationError>;

    async fn send_stock_changed_notice(
        &self,
        product_name: &str,
        previous: i64,
        new: i64,
        movement_type: MovementType,
    ) -> Result<(), NotificationError>;
}

/// Promotion engine.
#[async_trait]
pub trait PromotionService: Send + Sync {
    /// Create a clearance promotion for a product holding more than `maximum` units.
    async fn create_automatic_promotion(
        &self,
        product_id: ProductId,
        current: i64,
        maximum: i64,
    ) -> Result<(), PromotionError>;
}

/// A notification captured by [`RecordingNotificationService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    LowStock {
        product_name: String,
        current: i64,
        minimum: i64,
    },
    Depleted {
        product_name: String,
    },
    StockChanged {
        product_name: String,
        previous: i64,
        new: i64,
        movement_type: MovementType,
    },
}

/// Records every notice; optionally fails every call after recording it.
#[derive(Debug, Default)]
pub struct RecordingNotificationService {
    notices: Mutex<Vec<Notice>>,
    failure: Option<String>,
}

impl RecordingNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records calls, then returns `NotificationError::Delivery(reason)`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            notices: Mutex::new(Vec::new()),
            failure: Some(reason.into()),
        }
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    fn record(&self, notice: Notice) -> Result<(), NotificationError> {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
        match &self.failure {
            Some(reason) => Err(NotificationError::Delivery(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NotificationService for RecordingNotificationService {
    async fn send_low_stock_notice(
        &self,
        product_name: &str,
        current: i64,
        minimum: i64,
    ) -> Result<(), NotificationError> {
        self.record(Notice::LowStock {
            product_name: product_name.to_string(),
            current,
            minimum,
        })
    }

    async fn send_depleted_notice(&self, product_name: &str) -> Result<(), NotificationError> {
        self.record(Notice::Depleted {
            product_name: product_name.to_string(),
        })
    }

    async fn send_stock_changed_notice(
        &self,
        product_name: &str,
        previous: i64,
        new: i64,
        movement_type: MovementType,
    ) -> Result<(), NotificationError> {
        self.record(Notice::StockChanged {
            product_name: product_name.to_string(),
            previous,
            new,
            movement_type,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionRequest {
    pub product_id: ProductId,
    pub current: i64,
    pub maximum: i64,
}

/// Records every promotion request.
#[derive(Debug, Default)]
pub struct RecordingPromotionService {
    requests: Mutex<Vec<PromotionRequest>>,
}

impl RecordingPromotionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<PromotionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PromotionService for RecordingPromotionService {
    async fn create_automatic_promotion(
        &self,
        product_id: ProductId,
        current: i64,
        maximum: i64,
    ) -> Result<(), PromotionError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(PromotionRequest {
                product_id,
                current,
                maximum,
            });
        }
        Ok(())
    }
}
