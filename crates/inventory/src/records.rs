//! Inventory records as returned by the repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{
    CategoryId, DomainError, DomainResult, EntryId, ExitId, ProductId, SupplierId,
};
use stockroom_events::MovementType;

/// Minimum stock level assigned to products that do not specify one.
pub const DEFAULT_MINIMUM_STOCK: i64 = 10;

/// Catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    /// Prices in smallest currency unit (e.g. cents).
    pub purchase_price: Option<u64>,
    pub sale_price: Option<u64>,
    pub minimum_stock: i64,
    pub maximum_stock: Option<i64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// `0 < quantity <= minimum_stock`.
    pub fn is_low(&self, quantity: i64) -> bool {
        quantity > 0 && quantity <= self.minimum_stock
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// Must name an existing category.
    pub category_id: Option<CategoryId>,
    pub purchase_price: Option<u64>,
    pub sale_price: Option<u64>,
    pub minimum_stock: Option<i64>,
    pub maximum_stock: Option<i64>,
    /// Warehouse location of the initial (empty) stock record.
    pub location: Option<String>,
}

/// Replacement values for a product's descriptive fields. Stock limits have their
/// own operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: String,
    pub description: Option<String>,
    pub purchase_price: Option<u64>,
    pub sale_price: Option<u64>,
}

/// Grouping of catalog products. Names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUpdate {
    pub name: String,
    pub description: Option<String>,
}

/// Current stock of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub quantity: i64,
    pub location: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StockLevel {
    pub fn location_label(&self) -> String {
        self.location.clone().unwrap_or_default()
    }
}

/// A product together with its current stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub product: Product,
    pub stock: StockLevel,
}

/// Result of applying a [`StockChange`]: the quantity before, and the stored level after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockTransition {
    pub previous: i64,
    pub current: StockLevel,
}

/// A requested change to a stock level.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockChange {
    Increase(i64),
    Decrease(i64),
    /// Set to an absolute quantity.
    Set(i64),
}

impl StockChange {
    /// Compute the new quantity from `current`, enforcing the stock invariants.
    pub fn apply(self, current: i64) -> DomainResult<i64> {
        match self {
            StockChange::Increase(qty) => {
                ensure_positive(qty)?;
                current
                    .checked_add(qty)
                    .ok_or_else(|| DomainError::invariant("stock quantity overflow"))
            }
            StockChange::Decrease(qty) => {
                ensure_positive(qty)?;
                if current < qty {
                    return Err(DomainError::invariant(format!(
                        "insufficient stock (available: {current}, requested: {qty})"
                    )));
                }
                Ok(current - qty)
            }
            StockChange::Set(qty) => {
                if qty < 0 {
                    return Err(DomainError::validation("stock quantity cannot be negative"));
                }
                Ok(qty)
            }
        }
    }

    pub fn movement_type(&self) -> MovementType {
        match self {
            StockChange::Increase(_) => MovementType::Entry,
            StockChange::Decrease(_) => MovementType::Exit,
            StockChange::Set(_) => MovementType::Adjustment,
        }
    }
}

fn ensure_positive(qty: i64) -> DomainResult<()> {
    if qty <= 0 {
        return Err(DomainError::validation("quantity must be greater than zero"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub contact: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierUpdate {
    pub name: String,
    pub contact: Option<String>,
}

/// Goods received from a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEntry {
    pub id: EntryId,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub quantity: i64,
    pub unit_price: u64,
    pub received_at: DateTime<Utc>,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub quantity: i64,
    pub unit_price: u64,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
}

/// Goods issued from the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductExit {
    pub id: ExitId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: String,
    pub issued_at: DateTime<Utc>,
    pub responsible_party: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExit {
    pub product_id: ProductId,
    pub quantity: i64,
    pub reason: String,
    pub responsible_party: Option<String>,
    pub notes: Option<String>,
}

/// One line of a product's movement history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Movement {
    Entry(ProductEntry),
    Exit(ProductExit),
}

impl Movement {
    pub fn product_id(&self) -> ProductId {
        match self {
            Movement::Entry(e) => e.product_id,
            Movement::Exit(e) => e.product_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Movement::Entry(e) => e.received_at,
            Movement::Exit(e) => e.issued_at,
        }
    }

    pub fn quantity(&self) -> i64 {
        match self {
            Movement::Entry(e) => e.quantity,
            Movement::Exit(e) => -e.quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increase_adds_positive_quantity() {
        assert_eq!(StockChange::Increase(5).apply(10).unwrap(), 15);
    }

    #[test]
    fn zero_or_negative_quantities_are_rejected() {
        assert!(matches!(
            StockChange::Increase(0).apply(10),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            StockChange::Decrease(-3).apply(10),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            StockChange::Set(-1).apply(10),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn decrease_cannot_go_negative() {
        assert_eq!(StockChange::Decrease(10).apply(10).unwrap(), 0);
        assert!(matches!(
            StockChange::Decrease(11).apply(10),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn set_replaces_quantity() {
        assert_eq!(StockChange::Set(0).apply(42).unwrap(), 0);
        assert_eq!(StockChange::Set(7).movement_type(), MovementType::Adjustment);
    }

    #[test]
    fn low_means_positive_and_at_or_below_minimum() {
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(),
            code: "W-1".into(),
            name: "Widget".into(),
            description: None,
            category_id: None,
            purchase_price: None,
            sale_price: None,
            minimum_stock: 10,
            maximum_stock: None,
            active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(product.is_low(10));
        assert!(product.is_low(1));
        assert!(!product.is_low(0));
        assert!(!product.is_low(11));
    }

    proptest::proptest! {
        #[test]
        fn applied_changes_never_produce_negative_stock(
            current in 0i64..10_000,
            qty in -50i64..10_000,
            kind in 0u8..3,
        ) {
            let change = match kind {
                0 => StockChange::Increase(qty),
                1 => StockChange::Decrease(qty),
                _ => StockChange::Set(qty),
            };
            if let Ok(next) = change.apply(current) {
                proptest::prop_assert!(next >= 0);
            }
        }
    }
}
