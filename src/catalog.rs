//! Catalog store
//!
//! The product catalog is an external collaborator to the cart and checkout
//! paths; [`Catalog`] is the contract the engine requires of it, and
//! [`InMemoryCatalog`] is the reference implementation used by tests and
//! demos.

use std::sync::{PoisonError, RwLock};

use rusty_money::iso::Currency;
use slotmap::SlotMap;
use thiserror::Error;

use crate::products::{Product, ProductKey};

/// Errors that can occur when adjusting catalog stock.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// The product key is not present in the catalog.
    #[error("product {0:?} not found")]
    ProductNotFound(ProductKey),

    /// The requested quantity exceeds the units currently in stock.
    #[error("{name} only has {available} items in stock (requested {requested})")]
    InsufficientStock {
        /// Name of the limiting product
        name: String,

        /// Units currently in stock
        available: u32,

        /// Units the caller asked for
        requested: u32,
    },
}

/// Read and stock-adjustment contract the engine requires from the product
/// catalog.
///
/// Implementations must make [`Catalog::decrement_stock`] conditional and
/// atomic: the stock check and the subtraction happen as one storage
/// operation with respect to other decrements of the same product, so two
/// checkouts racing for the last units can never both succeed.
pub trait Catalog: Send + Sync {
    /// Currency all catalog prices are denominated in.
    fn currency(&self) -> &'static Currency;

    /// Fetch a point-in-time snapshot of a product.
    fn product(&self, key: ProductKey) -> Option<Product>;

    /// Decrement a product's stock, failing without any change when fewer
    /// than `quantity` units remain.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::ProductNotFound`]: the key is not in the catalog.
    /// - [`CatalogError::InsufficientStock`]: fewer than `quantity` units
    ///   remain; stock is left untouched.
    fn decrement_stock(&self, key: ProductKey, quantity: u32) -> Result<(), CatalogError>;

    /// Return previously decremented units to a product's stock.
    ///
    /// This is the compensation primitive used when a checkout has to be
    /// rolled back after some decrements were already applied.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::ProductNotFound`]: the key is not in the catalog.
    fn restock(&self, key: ProductKey, quantity: u32) -> Result<(), CatalogError>;

    /// Distinct category names currently in the catalog, sorted.
    fn categories(&self) -> Vec<String>;
}

/// Thread-safe in-memory catalog.
///
/// All stock adjustments run under the write lock, which makes the
/// check-and-subtract in [`Catalog::decrement_stock`] atomic per the trait
/// contract.
#[derive(Debug)]
pub struct InMemoryCatalog {
    products: RwLock<SlotMap<ProductKey, Product>>,
    currency: &'static Currency,
}

impl InMemoryCatalog {
    /// Creates an empty catalog priced in the given currency.
    #[must_use]
    pub fn new(currency: &'static Currency) -> Self {
        InMemoryCatalog {
            products: RwLock::new(SlotMap::with_key()),
            currency,
        }
    }

    /// Adds a product, returning its key.
    pub fn insert(&self, product: Product) -> ProductKey {
        self.write().insert(product)
    }

    /// Removes a product, returning it if it was present.
    ///
    /// Carts referencing a removed key see the line silently dropped from
    /// priced views; checkout reports it as no longer existing.
    pub fn remove(&self, key: ProductKey) -> Option<Product> {
        self.write().remove(key)
    }

    /// Applies an arbitrary mutation to a product (price changes,
    /// deactivation, manual stock corrections).
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ProductNotFound`] if the key is absent.
    pub fn update(
        &self,
        key: ProductKey,
        f: impl FnOnce(&mut Product),
    ) -> Result<(), CatalogError> {
        let mut products = self.write();
        let product = products
            .get_mut(key)
            .ok_or(CatalogError::ProductNotFound(key))?;
        f(product);
        Ok(())
    }

    /// Number of products in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the catalog holds no products.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SlotMap<ProductKey, Product>> {
        self.products.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SlotMap<ProductKey, Product>> {
        self.products
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Catalog for InMemoryCatalog {
    fn currency(&self) -> &'static Currency {
        self.currency
    }

    fn product(&self, key: ProductKey) -> Option<Product> {
        self.read().get(key).cloned()
    }

    fn decrement_stock(&self, key: ProductKey, quantity: u32) -> Result<(), CatalogError> {
        let mut products = self.write();
        let product = products
            .get_mut(key)
            .ok_or(CatalogError::ProductNotFound(key))?;

        if product.stock < quantity {
            return Err(CatalogError::InsufficientStock {
                name: product.name.clone(),
                available: product.stock,
                requested: quantity,
            });
        }

        product.stock -= quantity;
        Ok(())
    }

    fn restock(&self, key: ProductKey, quantity: u32) -> Result<(), CatalogError> {
        let mut products = self.write();
        let product = products
            .get_mut(key)
            .ok_or(CatalogError::ProductNotFound(key))?;

        product.stock = product.stock.saturating_add(quantity);
        Ok(())
    }

    fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .read()
            .values()
            .map(|product| product.category.clone())
            .collect();

        categories.sort();
        categories.dedup();
        categories
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::USD};

    use super::*;

    fn widget(stock: u32) -> Product {
        Product::new("Widget", Money::from_minor(5_00, USD), "tools", stock)
    }

    #[test]
    fn decrement_is_conditional() {
        let catalog = InMemoryCatalog::new(USD);
        let key = catalog.insert(widget(3));

        catalog.decrement_stock(key, 2).unwrap();

        let err = catalog.decrement_stock(key, 2).unwrap_err();
        assert_eq!(
            err,
            CatalogError::InsufficientStock {
                name: "Widget".to_owned(),
                available: 1,
                requested: 2,
            }
        );

        // The failed decrement left stock untouched.
        assert_eq!(catalog.product(key).unwrap().stock, 1);
    }

    #[test]
    fn decrement_of_missing_product_fails() {
        let catalog = InMemoryCatalog::new(USD);
        let key = catalog.insert(widget(1));
        catalog.remove(key);

        assert_eq!(
            catalog.decrement_stock(key, 1),
            Err(CatalogError::ProductNotFound(key))
        );
    }

    #[test]
    fn restock_reverses_a_decrement() {
        let catalog = InMemoryCatalog::new(USD);
        let key = catalog.insert(widget(5));

        catalog.decrement_stock(key, 4).unwrap();
        catalog.restock(key, 4).unwrap();

        assert_eq!(catalog.product(key).unwrap().stock, 5);
    }

    #[test]
    fn categories_are_distinct_and_sorted() {
        let catalog = InMemoryCatalog::new(USD);
        catalog.insert(widget(1));
        catalog.insert(widget(1));
        catalog.insert(Product::new(
            "Apple",
            Money::from_minor(1_00, USD),
            "produce",
            9,
        ));

        assert_eq!(catalog.categories(), vec!["produce", "tools"]);
    }

    #[test]
    fn update_mutates_in_place() {
        let catalog = InMemoryCatalog::new(USD);
        let key = catalog.insert(widget(1));

        catalog.update(key, |product| product.is_active = false).unwrap();

        assert!(!catalog.product(key).unwrap().is_active);
    }
}
