//! Inventory domain events.
//!
//! Each concrete event carries its own [`EventMetadata`] (stamped at construction)
//! plus the fact-specific payload. [`DomainEvent`] is the sum type the bus moves
//! around; [`EventKind`] is its tag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{EntryId, EventId, ExitId, ProductId, SupplierId};

use crate::event::{Event, EventKind, EventMetadata, TypedEvent};

/// Direction of a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    /// Goods received (stock goes up).
    Entry,
    /// Goods issued (stock goes down).
    Exit,
    /// Manual correction to an absolute quantity.
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entry => "Entry",
            MovementType::Exit => "Exit",
            MovementType::Adjustment => "Adjustment",
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event: the stock level of a product changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdated {
    meta: EventMetadata,
    pub product_id: ProductId,
    pub product_name: String,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub movement_type: MovementType,
    pub location: String,
}

impl StockUpdated {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        previous_quantity: i64,
        new_quantity: i64,
        movement_type: MovementType,
        location: impl Into<String>,
    ) -> Self {
        Self {
            meta: EventMetadata::now(),
            product_id,
            product_name: product_name.into(),
            previous_quantity,
            new_quantity,
            movement_type,
            location: location.into(),
        }
    }
}

/// Event: a product's stock fell to or below its configured minimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLow {
    meta: EventMetadata,
    pub product_id: ProductId,
    pub product_name: String,
    pub current_quantity: i64,
    pub minimum_threshold: i64,
    pub location: String,
}

impl StockLow {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        current_quantity: i64,
        minimum_threshold: i64,
        location: impl Into<String>,
    ) -> Self {
        Self {
            meta: EventMetadata::now(),
            product_id,
            product_name: product_name.into(),
            current_quantity,
            minimum_threshold,
            location: location.into(),
        }
    }
}

/// Event: a product ran out of stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDepleted {
    meta: EventMetadata,
    pub product_id: ProductId,
    pub product_name: String,
    pub code: String,
    pub location: String,
}

impl ProductDepleted {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        code: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            meta: EventMetadata::now(),
            product_id,
            product_name: product_name.into(),
            code: code.into(),
            location: location.into(),
        }
    }
}

/// Event: goods were received from a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRegistered {
    meta: EventMetadata,
    pub entry_id: EntryId,
    pub product_id: ProductId,
    pub product_name: String,
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub quantity: i64,
    /// Unit price in the smallest currency unit (e.g. cents).
    pub unit_price: u64,
    pub invoice_number: Option<String>,
}

impl EntryRegistered {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry_id: EntryId,
        product_id: ProductId,
        product_name: impl Into<String>,
        supplier_id: SupplierId,
        supplier_name: impl Into<String>,
        quantity: i64,
        unit_price: u64,
        invoice_number: Option<String>,
    ) -> Self {
        Self {
            meta: EventMetadata::now(),
            entry_id,
            product_id,
            product_name: product_name.into(),
            supplier_id,
            supplier_name: supplier_name.into(),
            quantity,
            unit_price,
            invoice_number,
        }
    }
}

/// Event: goods left the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRegistered {
    meta: EventMetadata,
    pub exit_id: ExitId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    pub reason: String,
    pub responsible_party: Option<String>,
}

impl ExitRegistered {
    pub fn new(
        exit_id: ExitId,
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: i64,
        reason: impl Into<String>,
        responsible_party: Option<String>,
    ) -> Self {
        Self {
            meta: EventMetadata::now(),
            exit_id,
            product_id,
            product_name: product_name.into(),
            quantity,
            reason: reason.into(),
            responsible_party,
        }
    }
}

/// Union of all inventory events; the unit the bus dispatches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "event")]
pub enum DomainEvent {
    StockUpdated(StockUpdated),
    StockLow(StockLow),
    ProductDepleted(ProductDepleted),
    EntryRegistered(EntryRegistered),
    ExitRegistered(ExitRegistered),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::StockUpdated(_) => EventKind::StockUpdated,
            DomainEvent::StockLow(_) => EventKind::StockLow,
            DomainEvent::ProductDepleted(_) => EventKind::ProductDepleted,
            DomainEvent::EntryRegistered(_) => EventKind::EntryRegistered,
            DomainEvent::ExitRegistered(_) => EventKind::ExitRegistered,
        }
    }

    pub fn product_id(&self) -> ProductId {
        match self {
            DomainEvent::StockUpdated(e) => e.product_id,
            DomainEvent::StockLow(e) => e.product_id,
            DomainEvent::ProductDepleted(e) => e.product_id,
            DomainEvent::EntryRegistered(e) => e.product_id,
            DomainEvent::ExitRegistered(e) => e.product_id,
        }
    }

    fn metadata(&self) -> &EventMetadata {
        match self {
            DomainEvent::StockUpdated(e) => &e.meta,
            DomainEvent::StockLow(e) => &e.meta,
            DomainEvent::ProductDepleted(e) => &e.meta,
            DomainEvent::EntryRegistered(e) => &e.meta,
            DomainEvent::ExitRegistered(e) => &e.meta,
        }
    }

    fn schema_version(&self) -> u32 {
        match self {
            DomainEvent::StockUpdated(_) => StockUpdated::VERSION,
            DomainEvent::StockLow(_) => StockLow::VERSION,
            DomainEvent::ProductDepleted(_) => ProductDepleted::VERSION,
            DomainEvent::EntryRegistered(_) => EntryRegistered::VERSION,
            DomainEvent::ExitRegistered(_) => ExitRegistered::VERSION,
        }
    }
}

impl Event for DomainEvent {
    fn event_id(&self) -> EventId {
        self.metadata().id()
    }

    fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }

    fn version(&self) -> u32 {
        self.schema_version()
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.metadata().occurred_on()
    }
}

macro_rules! impl_typed_event {
    ($t:ident, $version:literal) => {
        impl TypedEvent for $t {
            const KIND: EventKind = EventKind::$t;
            const VERSION: u32 = $version;

            fn metadata(&self) -> &EventMetadata {
                &self.meta
            }

            fn from_domain(event: &DomainEvent) -> Option<&Self> {
                match event {
                    DomainEvent::$t(e) => Some(e),
                    _ => None,
                }
            }
        }

        impl Event for $t {
            fn event_id(&self) -> EventId {
                self.meta.id()
            }

            fn event_type(&self) -> &'static str {
                EventKind::$t.as_str()
            }

            fn version(&self) -> u32 {
                $version
            }

            fn occurred_at(&self) -> DateTime<Utc> {
                self.meta.occurred_on()
            }
        }

        impl From<$t> for DomainEvent {
            fn from(value: $t) -> Self {
                DomainEvent::$t(value)
            }
        }
    };
}

impl_typed_event!(StockUpdated, 1);
impl_typed_event!(StockLow, 1);
impl_typed_event!(ProductDepleted, 1);
impl_typed_event!(EntryRegistered, 1);
impl_typed_event!(ExitRegistered, 1);
