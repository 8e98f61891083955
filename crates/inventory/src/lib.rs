//! Inventory module: records, collaborator ports, the stock event handler and the
//! application service that turns inventory changes into domain events.
//!
//! Storage and side-effect transports are ports; this crate ships in-memory and
//! recording implementations of them for tests and local runs.

pub mod handler;
pub mod ports;
pub mod records;
pub mod repository;
pub mod service;

pub use handler::{DEFAULT_EXCESS_THRESHOLD, StockEventHandler, StockHandlerConfig, StockHandlerError};
pub use ports::{
    Notice, NotificationError, NotificationService, PromotionError, PromotionRequest,
    PromotionService, RecordingNotificationService, RecordingPromotionService,
};
pub use records::{
    Category, CategoryUpdate, DEFAULT_MINIMUM_STOCK, Movement, NewEntry, NewExit, NewProduct,
    Product, ProductEntry, ProductExit, ProductStock, ProductUpdate, StockChange, StockLevel,
    StockTransition, Supplier, SupplierUpdate,
};
pub use repository::{InMemoryInventoryRepository, InventoryRepository, RepositoryError};
pub use service::{
    InventoryError, InventoryResult, InventoryService, MovementReport, StockReport,
    stock_change_events,
};
