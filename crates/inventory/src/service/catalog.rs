//! Catalog maintenance: product details, categories and suppliers.
//!
//! None of these operations touch stock, so none of them publish events.

use chrono::Utc;
use tracing::{info, instrument};

use stockroom_core::{CategoryId, DomainError, ProductId, SupplierId};

use super::{InventoryResult, InventoryService, required};
use crate::records::{Category, CategoryUpdate, Product, ProductUpdate, Supplier, SupplierUpdate};
use crate::repository::InventoryRepository;

impl<R> InventoryService<R>
where
    R: InventoryRepository,
{
    /// Replace a product's name, description and prices.
    #[instrument(skip(self, update), err)]
    pub fn update_product(
        &self,
        product_id: ProductId,
        update: ProductUpdate,
    ) -> InventoryResult<Product> {
        let name = required(&update.name, "product name")?;

        let product = self.repo.update_product(product_id, &mut |product| {
            product.name = name.clone();
            product.description = update.description.clone();
            product.purchase_price = update.purchase_price;
            product.sale_price = update.sale_price;
            product.updated_at = Utc::now();
            Ok(())
        })?;

        info!(product = %product.name, "product updated");
        Ok(product)
    }

    // ---- categories ----------------------------------------------------------

    #[instrument(skip(self, name, description), err)]
    pub fn create_category(
        &self,
        name: impl Into<String>,
        description: Option<String>,
    ) -> InventoryResult<Category> {
        let category = Category {
            id: CategoryId::new(),
            name: required(&name.into(), "category name")?,
            description,
            active: true,
            created_at: Utc::now(),
        };
        self.repo.insert_category(category.clone())?;

        info!(category_id = %category.id, category = %category.name, "category created");
        Ok(category)
    }

    #[instrument(skip(self, update), err)]
    pub fn update_category(
        &self,
        category_id: CategoryId,
        update: CategoryUpdate,
    ) -> InventoryResult<Category> {
        let name = required(&update.name, "category name")?;

        Ok(self.repo.update_category(category_id, &mut |category| {
            category.name = name.clone();
            category.description = update.description.clone();
            Ok(())
        })?)
    }

    pub fn activate_category(&self, category_id: CategoryId) -> InventoryResult<Category> {
        self.set_category_active(category_id, true)
    }

    /// Fails with `Conflict` while any product belongs to the category.
    pub fn deactivate_category(&self, category_id: CategoryId) -> InventoryResult<Category> {
        self.set_category_active(category_id, false)
    }

    pub fn category(&self, category_id: CategoryId) -> InventoryResult<Category> {
        Ok(self
            .repo
            .category(category_id)?
            .ok_or_else(|| DomainError::not_found(format!("category {category_id}")))?)
    }

    pub fn active_categories(&self) -> InventoryResult<Vec<Category>> {
        Ok(self
            .repo
            .categories()?
            .into_iter()
            .filter(|c| c.active)
            .collect())
    }

    /// Case-insensitive name match over all categories, active or not.
    pub fn search_categories(&self, term: &str) -> InventoryResult<Vec<Category>> {
        let needle = term.trim().to_lowercase();
        Ok(self
            .repo
            .categories()?
            .into_iter()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .collect())
    }

    pub fn products_in_category(&self, category_id: CategoryId) -> InventoryResult<Vec<Product>> {
        self.category(category_id)?;
        Ok(self
            .repo
            .products()?
            .into_iter()
            .filter(|p| p.category_id == Some(category_id))
            .collect())
    }

    // ---- suppliers -----------------------------------------------------------

    #[instrument(skip(self, update), err)]
    pub fn update_supplier(
        &self,
        supplier_id: SupplierId,
        update: SupplierUpdate,
    ) -> InventoryResult<Supplier> {
        let name = required(&update.name, "supplier name")?;

        Ok(self.repo.update_supplier(supplier_id, &mut |supplier| {
            supplier.name = name.clone();
            supplier.contact = update.contact.clone();
            Ok(())
        })?)
    }

    pub fn activate_supplier(&self, supplier_id: SupplierId) -> InventoryResult<Supplier> {
        self.set_supplier_active(supplier_id, true)
    }

    pub fn deactivate_supplier(&self, supplier_id: SupplierId) -> InventoryResult<Supplier> {
        self.set_supplier_active(supplier_id, false)
    }

    pub fn supplier(&self, supplier_id: SupplierId) -> InventoryResult<Supplier> {
        Ok(self
            .repo
            .supplier(supplier_id)?
            .ok_or_else(|| DomainError::not_found(format!("supplier {supplier_id}")))?)
    }

    pub fn active_suppliers(&self) -> InventoryResult<Vec<Supplier>> {
        Ok(self
            .repo
            .suppliers()?
            .into_iter()
            .filter(|s| s.active)
            .collect())
    }

    /// Case-insensitive match on name or contact over all suppliers.
    pub fn search_suppliers(&self, term: &str) -> InventoryResult<Vec<Supplier>> {
        let needle = term.trim().to_lowercase();
        Ok(self
            .repo
            .suppliers()?
            .into_iter()
            .filter(|s| {
                s.name.to_lowercase().contains(&needle)
                    || s
                        .contact
                        .as_deref()
                        .is_some_and(|c| c.to_lowercase().contains(&needle))
            })
            .collect())
    }

    fn set_category_active(
        &self,
        category_id: CategoryId,
        active: bool,
    ) -> InventoryResult<Category> {
        let category = self.repo.update_category(category_id, &mut |category| {
            category.active = active;
            Ok(())
        })?;
        info!(%category_id, active, "category status changed");
        Ok(category)
    }

    fn set_supplier_active(
        &self,
        supplier_id: SupplierId,
        active: bool,
    ) -> InventoryResult<Supplier> {
        let supplier = self.repo.update_supplier(supplier_id, &mut |supplier| {
            supplier.active = active;
            Ok(())
        })?;
        info!(%supplier_id, active, "supplier status changed");
        Ok(supplier)
    }
}
