//! Inventory application service.
//!
//! Validates and applies inventory changes through the repository port, then emits
//! domain events for whatever happened. Event publication is best-effort: a bus failure
//! is logged and never undoes or fails a mutation that already succeeded.

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, instrument};

use stockroom_core::{DomainError, DomainResult, EntryId, ExitId, ProductId, SupplierId};
use stockroom_events::{
    DomainEvent, EntryRegistered, EventPublisher, ExitRegistered, MovementType, ProductDepleted,
    StockLow, StockUpdated,
};

use crate::records::{
    DEFAULT_MINIMUM_STOCK, Movement, NewEntry, NewExit, NewProduct, Product, ProductEntry,
    ProductExit, ProductStock, StockChange, StockLevel, StockTransition, Supplier,
};
use crate::repository::{InventoryRepository, RepositoryError};

mod catalog;
mod reports;

pub use reports::{MovementReport, StockReport};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("repository error: {0}")]
    Repository(String),
}

impl From<RepositoryError> for InventoryError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Domain(domain) => InventoryError::Domain(domain),
            RepositoryError::Unavailable(msg) => InventoryError::Repository(msg),
        }
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;

/// Events that follow a stock change, in publication order.
///
/// Always `StockUpdated`; then `ProductDepleted` if stock went from positive to zero,
/// otherwise `StockLow` if stock went down and is now low for the product.
pub fn stock_change_events(
    product: &Product,
    transition: &StockTransition,
    movement_type: MovementType,
) -> Vec<DomainEvent> {
    let previous = transition.previous;
    let current = transition.current.quantity;
    let location = transition.current.location_label();

    let mut events = vec![
        StockUpdated::new(
            product.id,
            &product.name,
            previous,
            current,
            movement_type,
            &location,
        )
        .into(),
    ];

    if previous > 0 && current == 0 {
        events.push(ProductDepleted::new(product.id, &product.name, &product.code, &location).into());
    } else if current < previous && product.is_low(current) {
        events.push(
            StockLow::new(
                product.id,
                &product.name,
                current,
                product.minimum_stock,
                &location,
            )
            .into(),
        );
    }

    events
}

pub struct InventoryService<R> {
    repo: R,
    publisher: EventPublisher,
}

impl<R> InventoryService<R>
where
    R: InventoryRepository,
{
    pub fn new(repo: R, publisher: EventPublisher) -> Self {
        Self { repo, publisher }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    // ---- catalog -------------------------------------------------------------

    #[instrument(skip(self, input), fields(code = %input.code), err)]
    pub fn create_product(&self, input: NewProduct) -> InventoryResult<Product> {
        let code = required(&input.code, "product code")?;
        let name = required(&input.name, "product name")?;
        let minimum_stock = input.minimum_stock.unwrap_or(DEFAULT_MINIMUM_STOCK);
        validate_limits(minimum_stock, input.maximum_stock)?;

        let now = Utc::now();
        let product = Product {
            id: ProductId::new(),
            code,
            name,
            description: input.description,
            category_id: input.category_id,
            purchase_price: input.purchase_price,
            sale_price: input.sale_price,
            minimum_stock,
            maximum_stock: input.maximum_stock,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let stock = StockLevel {
            product_id: product.id,
            quantity: 0,
            location: input.location,
            updated_at: now,
        };

        self.repo.insert_product(product.clone(), stock)?;

        info!(product_id = %product.id, product = %product.name, "product created");
        Ok(product)
    }

    pub fn update_stock_limits(
        &self,
        product_id: ProductId,
        minimum: i64,
        maximum: Option<i64>,
    ) -> InventoryResult<Product> {
        validate_limits(minimum, maximum)?;

        Ok(self.repo.update_product(product_id, &mut |product| {
            product.minimum_stock = minimum;
            product.maximum_stock = maximum;
            product.updated_at = Utc::now();
            Ok(())
        })?)
    }

    pub fn register_supplier(
        &self,
        name: impl Into<String>,
        contact: Option<String>,
    ) -> InventoryResult<Supplier> {
        let supplier = Supplier {
            id: SupplierId::new(),
            name: required(&name.into(), "supplier name")?,
            contact,
            active: true,
        };
        self.repo.insert_supplier(supplier.clone())?;
        Ok(supplier)
    }

    // ---- stock ---------------------------------------------------------------

    /// Set stock to an absolute quantity.
    #[instrument(skip(self), err)]
    pub async fn adjust_stock(
        &self,
        product_id: ProductId,
        new_quantity: i64,
    ) -> InventoryResult<StockLevel> {
        self.change_stock(product_id, StockChange::Set(new_quantity))
            .await
    }

    #[instrument(skip(self), err)]
    pub async fn add_stock(&self, product_id: ProductId, quantity: i64) -> InventoryResult<StockLevel> {
        self.change_stock(product_id, StockChange::Increase(quantity))
            .await
    }

    #[instrument(skip(self), err)]
    pub async fn reduce_stock(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> InventoryResult<StockLevel> {
        self.change_stock(product_id, StockChange::Decrease(quantity))
            .await
    }

    /// Receive goods from a supplier.
    #[instrument(skip(self, input), fields(product_id = %input.product_id), err)]
    pub async fn register_entry(&self, input: NewEntry) -> InventoryResult<ProductEntry> {
        let product = self.product(input.product_id)?;
        let supplier = self
            .repo
            .supplier(input.supplier_id)?
            .ok_or_else(|| DomainError::not_found(format!("supplier {}", input.supplier_id)))?;

        let entry = ProductEntry {
            id: EntryId::new(),
            product_id: product.id,
            supplier_id: supplier.id,
            quantity: input.quantity,
            unit_price: input.unit_price,
            received_at: Utc::now(),
            invoice_number: input.invoice_number,
            notes: input.notes,
        };
        // Invoice check, stock increase and the entry itself are one repository write.
        let transition = self.repo.record_entry(entry.clone())?;

        let registered = EntryRegistered::new(
            entry.id,
            product.id,
            &product.name,
            supplier.id,
            &supplier.name,
            entry.quantity,
            entry.unit_price,
            entry.invoice_number.clone(),
        );
        self.emit(
            Some(registered.into()),
            stock_change_events(&product, &transition, MovementType::Entry),
        )
        .await;

        Ok(entry)
    }

    /// Issue goods from the warehouse.
    #[instrument(skip(self, input), fields(product_id = %input.product_id), err)]
    pub async fn register_exit(&self, input: NewExit) -> InventoryResult<ProductExit> {
        let product = self.product(input.product_id)?;
        if input.reason.trim().is_empty() {
            return Err(DomainError::validation("exit reason cannot be empty").into());
        }

        let exit = ProductExit {
            id: ExitId::new(),
            product_id: product.id,
            quantity: input.quantity,
            reason: input.reason,
            issued_at: Utc::now(),
            responsible_party: input.responsible_party,
            notes: input.notes,
        };
        let transition = self.repo.record_exit(exit.clone())?;

        let registered = ExitRegistered::new(
            exit.id,
            product.id,
            &product.name,
            exit.quantity,
            &exit.reason,
            exit.responsible_party.clone(),
        );
        self.emit(
            Some(registered.into()),
            stock_change_events(&product, &transition, MovementType::Exit),
        )
        .await;

        Ok(exit)
    }

    // ---- queries -------------------------------------------------------------

    pub fn product(&self, product_id: ProductId) -> InventoryResult<Product> {
        Ok(self
            .repo
            .product(product_id)?
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")))?)
    }

    pub fn product_by_code(&self, code: &str) -> InventoryResult<Option<Product>> {
        Ok(self.repo.product_by_code(code.trim())?)
    }

    pub fn active_products(&self) -> InventoryResult<Vec<Product>> {
        Ok(self
            .repo
            .products()?
            .into_iter()
            .filter(|p| p.active)
            .collect())
    }

    /// Case-insensitive match on name or code among active products.
    pub fn search_products(&self, term: &str) -> InventoryResult<Vec<Product>> {
        let needle = term.trim().to_lowercase();
        let all = self.active_products()?;
        if needle.is_empty() {
            return Ok(all);
        }
        Ok(all
            .into_iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle) || p.code.to_lowercase().contains(&needle)
            })
            .collect())
    }

    pub fn stock(&self, product_id: ProductId) -> InventoryResult<StockLevel> {
        Ok(self
            .repo
            .stock(product_id)?
            .ok_or_else(|| DomainError::not_found(format!("stock for product {product_id}")))?)
    }

    /// Active products with `0 < quantity <= minimum_stock`.
    pub fn low_stock_products(&self) -> InventoryResult<Vec<ProductStock>> {
        self.products_with_stock(|product, stock| product.is_low(stock.quantity))
    }

    pub fn depleted_products(&self) -> InventoryResult<Vec<ProductStock>> {
        self.products_with_stock(|_, stock| stock.quantity == 0)
    }

    pub fn movement_history(&self, product_id: ProductId) -> InventoryResult<Vec<Movement>> {
        self.product(product_id)?;
        Ok(self.repo.movements(product_id)?)
    }

    // ---- internals -----------------------------------------------------------

    async fn change_stock(
        &self,
        product_id: ProductId,
        change: StockChange,
    ) -> InventoryResult<StockLevel> {
        let product = self.product(product_id)?;
        let transition = self.repo.apply_stock_change(product_id, change)?;

        self.emit(
            None,
            stock_change_events(&product, &transition, change.movement_type()),
        )
        .await;

        Ok(transition.current)
    }

    fn products_with_stock(
        &self,
        keep: impl Fn(&Product, &StockLevel) -> bool,
    ) -> InventoryResult<Vec<ProductStock>> {
        let mut out = Vec::new();
        for product in self.active_products()? {
            let Some(stock) = self.repo.stock(product.id)? else {
                continue;
            };
            if keep(&product, &stock) {
                out.push(ProductStock { product, stock });
            }
        }
        Ok(out)
    }

    async fn emit(&self, registration: Option<DomainEvent>, stock_events: Vec<DomainEvent>) {
        let events = registration.into_iter().chain(stock_events);
        if let Err(err) = self.publisher.publish_many(events).await {
            error!(error = %err, "failed to publish inventory events");
        }
    }
}

impl<R> core::fmt::Debug for InventoryService<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InventoryService").finish_non_exhaustive()
    }
}

/// Trimmed `value`, or a validation error naming `what` if nothing is left.
fn required(value: &str, what: &str) -> DomainResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{what} cannot be empty")));
    }
    Ok(value.to_string())
}

fn validate_limits(minimum: i64, maximum: Option<i64>) -> DomainResult<()> {
    if minimum < 0 {
        return Err(DomainError::validation("minimum stock cannot be negative"));
    }
    if let Some(maximum) = maximum {
        if minimum > maximum {
            return Err(DomainError::validation(
                "minimum stock cannot exceed maximum stock",
            ));
        }
    }
    Ok(())
}
