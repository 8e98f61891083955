//! Read-only inventory reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::DomainError;

use super::{InventoryResult, InventoryService};
use crate::records::{Movement, ProductStock};
use crate::repository::InventoryRepository;

/// Current stock of every active product, with totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReport {
    pub generated_at: DateTime<Utc>,
    pub products: Vec<ProductStock>,
    pub total_units: i64,
    pub low_stock: usize,
    pub depleted: usize,
}

/// Entries and exits recorded in `[from, to]`, with totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub entries: usize,
    pub exits: usize,
    pub units_received: i64,
    pub units_issued: i64,
    pub movements: Vec<Movement>,
}

impl<R> InventoryService<R>
where
    R: InventoryRepository,
{
    /// Entries and exits of all products with `from <= occurred_at <= to`, oldest first.
    pub fn movements_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> InventoryResult<Vec<Movement>> {
        if from > to {
            return Err(DomainError::validation("report range starts after it ends").into());
        }
        Ok(self.repo.movements_between(from, to)?)
    }

    pub fn movement_report(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> InventoryResult<MovementReport> {
        let movements = self.movements_between(from, to)?;

        let (received, issued): (Vec<i64>, Vec<i64>) = movements
            .iter()
            .map(Movement::quantity)
            .partition(|qty| *qty > 0);

        Ok(MovementReport {
            from,
            to,
            generated_at: Utc::now(),
            entries: received.len(),
            exits: issued.len(),
            units_received: received.iter().sum(),
            units_issued: -issued.iter().sum::<i64>(),
            movements,
        })
    }

    pub fn stock_report(&self) -> InventoryResult<StockReport> {
        let products = self.products_with_stock(|_, _| true)?;

        Ok(StockReport {
            generated_at: Utc::now(),
            total_units: products.iter().map(|ps| ps.stock.quantity).sum(),
            low_stock: products
                .iter()
                .filter(|ps| ps.product.is_low(ps.stock.quantity))
                .count(),
            depleted: products.iter().filter(|ps| ps.stock.quantity == 0).count(),
            products,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use stockroom_events::{EventPublisher, InMemoryEventBus};

    use super::*;
    use crate::records::{NewEntry, NewExit, NewProduct};
    use crate::repository::InMemoryInventoryRepository;
    use crate::service::InventoryError;

    fn service() -> InventoryService<InMemoryInventoryRepository> {
        InventoryService::new(
            InMemoryInventoryRepository::new(),
            EventPublisher::new(Arc::new(InMemoryEventBus::new())),
        )
    }

    #[tokio::test]
    async fn movement_report_totals_the_window() {
        let svc = service();
        let product = svc
            .create_product(NewProduct {
                code: "W-1".into(),
                name: "Widget".into(),
                ..NewProduct::default()
            })
            .unwrap();
        let supplier = svc.register_supplier("Acme", None).unwrap();
        let start = Utc::now();

        for (quantity, invoice) in [(30, "INV-1"), (12, "INV-2")] {
            svc.register_entry(NewEntry {
                product_id: product.id,
                supplier_id: supplier.id,
                quantity,
                unit_price: 100,
                invoice_number: Some(invoice.into()),
                notes: None,
            })
            .await
            .unwrap();
        }
        svc.register_exit(NewExit {
            product_id: product.id,
            quantity: 7,
            reason: "sale".into(),
            responsible_party: None,
            notes: None,
        })
        .await
        .unwrap();
        // Plain stock adjustments are not movements.
        svc.add_stock(product.id, 1).await.unwrap();

        let report = svc.movement_report(start, Utc::now()).unwrap();

        assert_eq!(report.entries, 2);
        assert_eq!(report.exits, 1);
        assert_eq!(report.units_received, 42);
        assert_eq!(report.units_issued, 7);
        assert_eq!(report.movements.len(), 3);

        let later = Utc::now() + Duration::hours(1);
        assert!(svc
            .movements_between(later, later + Duration::hours(1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let svc = service();
        let now = Utc::now();

        let err = svc
            .movements_between(now, now - Duration::seconds(1))
            .unwrap_err();

        assert!(matches!(err, InventoryError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn stock_report_classifies_active_products() {
        let svc = service();
        let mut ids = Vec::new();
        for code in ["A-1", "B-1", "C-1"] {
            let product = svc
                .create_product(NewProduct {
                    code: code.into(),
                    name: format!("Item {code}"),
                    minimum_stock: Some(5),
                    ..NewProduct::default()
                })
                .unwrap();
            ids.push(product.id);
        }
        svc.add_stock(ids[0], 3).await.unwrap();
        svc.add_stock(ids[1], 40).await.unwrap();

        let report = svc.stock_report().unwrap();

        assert_eq!(report.products.len(), 3);
        assert_eq!(report.total_units, 43);
        assert_eq!(report.low_stock, 1);
        assert_eq!(report.depleted, 1);
    }
}
