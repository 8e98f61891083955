//! Persistence port for inventory records, plus an in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;

use stockroom_core::{CategoryId, DomainError, DomainResult, ProductId, SupplierId};

use crate::records::{
    Category, Movement, Product, ProductEntry, ProductExit, StockChange, StockLevel,
    StockTransition, Supplier,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Storage abstraction for products, categories, suppliers, stock and movements.
///
/// Every method that checks a uniqueness rule or a stock invariant before writing does
/// both under one critical section. Callers never check first and write later, so two
/// concurrent requests cannot both pass the same check.
///
/// `update_*` methods run the closure against a copy of the stored record and only
/// commit it if the closure and the store's own rules accept the result.
pub trait InventoryRepository: Send + Sync {
    fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
    fn product_by_code(&self, code: &str) -> Result<Option<Product>, RepositoryError>;
    fn products(&self) -> Result<Vec<Product>, RepositoryError>;
    /// Store a new product with its initial stock level.
    ///
    /// `Conflict` if the code is taken; `NotFound` or `Validation` if the product names
    /// a category that is missing or inactive.
    fn insert_product(&self, product: Product, stock: StockLevel) -> Result<(), RepositoryError>;
    fn update_product(
        &self,
        id: ProductId,
        update: &mut dyn FnMut(&mut Product) -> DomainResult<()>,
    ) -> Result<Product, RepositoryError>;

    fn category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError>;
    fn categories(&self) -> Result<Vec<Category>, RepositoryError>;
    /// `Conflict` if another category already uses the name.
    fn insert_category(&self, category: Category) -> Result<(), RepositoryError>;
    /// `Conflict` if the new name belongs to another category, or if the update
    /// deactivates a category that products still reference.
    fn update_category(
        &self,
        id: CategoryId,
        update: &mut dyn FnMut(&mut Category) -> DomainResult<()>,
    ) -> Result<Category, RepositoryError>;

    fn supplier(&self, id: SupplierId) -> Result<Option<Supplier>, RepositoryError>;
    fn suppliers(&self) -> Result<Vec<Supplier>, RepositoryError>;
    fn insert_supplier(&self, supplier: Supplier) -> Result<(), RepositoryError>;
    fn update_supplier(
        &self,
        id: SupplierId,
        update: &mut dyn FnMut(&mut Supplier) -> DomainResult<()>,
    ) -> Result<Supplier, RepositoryError>;

    fn stock(&self, product_id: ProductId) -> Result<Option<StockLevel>, RepositoryError>;
    /// Apply `change` to the product's stock. The quantity check and the write are atomic.
    fn apply_stock_change(
        &self,
        product_id: ProductId,
        change: StockChange,
    ) -> Result<StockTransition, RepositoryError>;

    /// Increase stock by the entry's quantity and store the entry.
    ///
    /// `Conflict` if the entry's invoice number is already recorded. Nothing is written
    /// when any check fails.
    fn record_entry(&self, entry: ProductEntry) -> Result<StockTransition, RepositoryError>;
    /// Decrease stock by the exit's quantity and store the exit. Nothing is written when
    /// the decrease is rejected.
    fn record_exit(&self, exit: ProductExit) -> Result<StockTransition, RepositoryError>;
    /// Entries and exits for a product, oldest first.
    fn movements(&self, product_id: ProductId) -> Result<Vec<Movement>, RepositoryError>;
    /// Entries and exits of every product with `from <= occurred_at <= to`, oldest first.
    fn movements_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Movement>, RepositoryError>;
}

impl<R> InventoryRepository for Arc<R>
where
    R: InventoryRepository + ?Sized,
{
    fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        (**self).product(id)
    }

    fn product_by_code(&self, code: &str) -> Result<Option<Product>, RepositoryError> {
        (**self).product_by_code(code)
    }

    fn products(&self) -> Result<Vec<Product>, RepositoryError> {
        (**self).products()
    }

    fn insert_product(&self, product: Product, stock: StockLevel) -> Result<(), RepositoryError> {
        (**self).insert_product(product, stock)
    }

    fn update_product(
        &self,
        id: ProductId,
        update: &mut dyn FnMut(&mut Product) -> DomainResult<()>,
    ) -> Result<Product, RepositoryError> {
        (**self).update_product(id, update)
    }

    fn category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        (**self).category(id)
    }

    fn categories(&self) -> Result<Vec<Category>, RepositoryError> {
        (**self).categories()
    }

    fn insert_category(&self, category: Category) -> Result<(), RepositoryError> {
        (**self).insert_category(category)
    }

    fn update_category(
        &self,
        id: CategoryId,
        update: &mut dyn FnMut(&mut Category) -> DomainResult<()>,
    ) -> Result<Category, RepositoryError> {
        (**self).update_category(id, update)
    }

    fn supplier(&self, id: SupplierId) -> Result<Option<Supplier>, RepositoryError> {
        (**self).supplier(id)
    }

    fn suppliers(&self) -> Result<Vec<Supplier>, RepositoryError> {
        (**self).suppliers()
    }

    fn insert_supplier(&self, supplier: Supplier) -> Result<(), RepositoryError> {
        (**self).insert_supplier(supplier)
    }

    fn update_supplier(
        &self,
        id: SupplierId,
        update: &mut dyn FnMut(&mut Supplier) -> DomainResult<()>,
    ) -> Result<Supplier, RepositoryError> {
        (**self).update_supplier(id, update)
    }

    fn stock(&self, product_id: ProductId) -> Result<Option<StockLevel>, RepositoryError> {
        (**self).stock(product_id)
    }

    fn apply_stock_change(
        &self,
        product_id: ProductId,
        change: StockChange,
    ) -> Result<StockTransition, RepositoryError> {
        (**self).apply_stock_change(product_id, change)
    }

    fn record_entry(&self, entry: ProductEntry) -> Result<StockTransition, RepositoryError> {
        (**self).record_entry(entry)
    }

    fn record_exit(&self, exit: ProductExit) -> Result<StockTransition, RepositoryError> {
        (**self).record_exit(exit)
    }

    fn movements(&self, product_id: ProductId) -> Result<Vec<Movement>, RepositoryError> {
        (**self).movements(product_id)
    }

    fn movements_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Movement>, RepositoryError> {
        (**self).movements_between(from, to)
    }
}

#[derive(Debug, Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    categories: HashMap<CategoryId, Category>,
    suppliers: HashMap<SupplierId, Supplier>,
    stock: HashMap<ProductId, StockLevel>,
    entries: Vec<ProductEntry>,
    exits: Vec<ProductExit>,
}

impl Tables {
    fn change_stock(
        &mut self,
        product_id: ProductId,
        change: StockChange,
    ) -> Result<StockTransition, RepositoryError> {
        let level = self
            .stock
            .get_mut(&product_id)
            .ok_or_else(|| DomainError::not_found(format!("stock for product {product_id}")))?;

        let previous = level.quantity;
        level.quantity = change.apply(previous)?;
        level.updated_at = Utc::now();

        Ok(StockTransition {
            previous,
            current: level.clone(),
        })
    }

    fn category_name_taken(&self, name: &str, except: Option<CategoryId>) -> bool {
        self.categories
            .values()
            .any(|c| c.name == name && Some(c.id) != except)
    }

    fn movements<'a>(
        &'a self,
        keep: impl Fn(&Movement) -> bool + 'a,
    ) -> impl Iterator<Item = Movement> + 'a {
        let entries = self.entries.iter().cloned().map(Movement::Entry);
        let exits = self.exits.iter().cloned().map(Movement::Exit);
        entries.chain(exits).filter(move |m| keep(m))
    }
}

/// In-memory repository for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryInventoryRepository {
    inner: RwLock<Tables>,
}

impl InMemoryInventoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, RepositoryError> {
        let tables = self.inner.read().map_err(|_| poisoned())?;
        Ok(f(&tables))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> Result<T, RepositoryError> {
        let mut tables = self.inner.write().map_err(|_| poisoned())?;
        Ok(f(&mut tables))
    }
}

fn poisoned() -> RepositoryError {
    RepositoryError::Unavailable("in-memory store lock poisoned".to_string())
}

/// Apply `update` to a copy of `record`; the copy is returned only if the update succeeds.
fn staged<T: Clone>(
    record: &T,
    update: &mut dyn FnMut(&mut T) -> DomainResult<()>,
) -> Result<T, RepositoryError> {
    let mut next = record.clone();
    update(&mut next)?;
    Ok(next)
}

impl InventoryRepository for InMemoryInventoryRepository {
    fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.read(|t| t.products.get(&id).cloned())
    }

    fn product_by_code(&self, code: &str) -> Result<Option<Product>, RepositoryError> {
        self.read(|t| t.products.values().find(|p| p.code == code).cloned())
    }

    fn products(&self) -> Result<Vec<Product>, RepositoryError> {
        self.read(|t| {
            let mut all: Vec<_> = t.products.values().cloned().collect();
            all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            all
        })
    }

    fn insert_product(&self, product: Product, stock: StockLevel) -> Result<(), RepositoryError> {
        self.write(|t| -> Result<(), RepositoryError> {
            if t.products.values().any(|p| p.code == product.code) {
                return Err(DomainError::conflict(format!(
                    "product code '{}' already exists",
                    product.code
                ))
                .into());
            }
            if let Some(category_id) = product.category_id {
                match t.categories.get(&category_id) {
                    None => {
                        return Err(
                            DomainError::not_found(format!("category {category_id}")).into()
                        );
                    }
                    Some(category) if !category.active => {
                        return Err(DomainError::validation(format!(
                            "category '{}' is inactive",
                            category.name
                        ))
                        .into());
                    }
                    Some(_) => {}
                }
            }

            t.stock.insert(product.id, StockLevel { product_id: product.id, ..stock });
            t.products.insert(product.id, product);
            Ok(())
        })?
    }

    fn update_product(
        &self,
        id: ProductId,
        update: &mut dyn FnMut(&mut Product) -> DomainResult<()>,
    ) -> Result<Product, RepositoryError> {
        self.write(|t| -> Result<Product, RepositoryError> {
            let current = t
                .products
                .get_mut(&id)
                .ok_or_else(|| DomainError::not_found(format!("product {id}")))?;
            let next = staged(current, update)?;
            *current = next.clone();
            Ok(next)
        })?
    }

    fn category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        self.read(|t| t.categories.get(&id).cloned())
    }

    fn categories(&self) -> Result<Vec<Category>, RepositoryError> {
        self.read(|t| {
            let mut all: Vec<_> = t.categories.values().cloned().collect();
            all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            all
        })
    }

    fn insert_category(&self, category: Category) -> Result<(), RepositoryError> {
        self.write(|t| -> Result<(), RepositoryError> {
            if t.category_name_taken(&category.name, None) {
                return Err(DomainError::conflict(format!(
                    "category '{}' already exists",
                    category.name
                ))
                .into());
            }
            t.categories.insert(category.id, category);
            Ok(())
        })?
    }

    fn update_category(
        &self,
        id: CategoryId,
        update: &mut dyn FnMut(&mut Category) -> DomainResult<()>,
    ) -> Result<Category, RepositoryError> {
        self.write(|t| -> Result<Category, RepositoryError> {
            let current = t
                .categories
                .get(&id)
                .ok_or_else(|| DomainError::not_found(format!("category {id}")))?;
            let next = staged(current, update)?;

            if t.category_name_taken(&next.name, Some(id)) {
                return Err(
                    DomainError::conflict(format!("category '{}' already exists", next.name))
                        .into(),
                );
            }
            if current.active
                && !next.active
                && t.products.values().any(|p| p.category_id == Some(id))
            {
                return Err(DomainError::conflict(format!(
                    "category '{}' still has products",
                    current.name
                ))
                .into());
            }

            t.categories.insert(id, next.clone());
            Ok(next)
        })?
    }

    fn supplier(&self, id: SupplierId) -> Result<Option<Supplier>, RepositoryError> {
        self.read(|t| t.suppliers.get(&id).cloned())
    }

    fn suppliers(&self) -> Result<Vec<Supplier>, RepositoryError> {
        self.read(|t| {
            let mut all: Vec<_> = t.suppliers.values().cloned().collect();
            all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            all
        })
    }

    fn insert_supplier(&self, supplier: Supplier) -> Result<(), RepositoryError> {
        self.write(|t| {
            t.suppliers.insert(supplier.id, supplier);
        })
    }

    fn update_supplier(
        &self,
        id: SupplierId,
        update: &mut dyn FnMut(&mut Supplier) -> DomainResult<()>,
    ) -> Result<Supplier, RepositoryError> {
        self.write(|t| -> Result<Supplier, RepositoryError> {
            let current = t
                .suppliers
                .get_mut(&id)
                .ok_or_else(|| DomainError::not_found(format!("supplier {id}")))?;
            let next = staged(current, update)?;
            *current = next.clone();
            Ok(next)
        })?
    }

    fn stock(&self, product_id: ProductId) -> Result<Option<StockLevel>, RepositoryError> {
        self.read(|t| t.stock.get(&product_id).cloned())
    }

    fn apply_stock_change(
        &self,
        product_id: ProductId,
        change: StockChange,
    ) -> Result<StockTransition, RepositoryError> {
        self.write(|t| t.change_stock(product_id, change))?
    }

    fn record_entry(&self, entry: ProductEntry) -> Result<StockTransition, RepositoryError> {
        self.write(|t| -> Result<StockTransition, RepositoryError> {
            if let Some(invoice) = entry.invoice_number.as_deref() {
                let taken = t
                    .entries
                    .iter()
                    .any(|e| e.invoice_number.as_deref() == Some(invoice));
                if taken {
                    return Err(DomainError::conflict(format!(
                        "invoice '{invoice}' already registered"
                    ))
                    .into());
                }
            }

            let transition =
                t.change_stock(entry.product_id, StockChange::Increase(entry.quantity))?;
            t.entries.push(entry);
            Ok(transition)
        })?
    }

    fn record_exit(&self, exit: ProductExit) -> Result<StockTransition, RepositoryError> {
        self.write(|t| -> Result<StockTransition, RepositoryError> {
            let transition = t.change_stock(exit.product_id, StockChange::Decrease(exit.quantity))?;
            t.exits.push(exit);
            Ok(transition)
        })?
    }

    fn movements(&self, product_id: ProductId) -> Result<Vec<Movement>, RepositoryError> {
        self.read(|t| {
            let mut all: Vec<_> = t.movements(move |m| m.product_id() == product_id).collect();
            all.sort_by_key(Movement::occurred_at);
            all
        })
    }

    fn movements_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Movement>, RepositoryError> {
        self.read(|t| {
            let mut all: Vec<_> = t
                .movements(move |m| (from..=to).contains(&m.occurred_at()))
                .collect();
            all.sort_by_key(Movement::occurred_at);
            all
        })
    }
}
