//! Carts
//!
//! One mutable cart per session, created lazily and never deleted. Cart
//! mutations are validated against live catalog stock at the instant of the
//! call; nothing is pinned across calls, so the add-time capacity check is
//! advisory and the hard stock guarantee lives in the checkout commit path.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use rustc_hash::FxHashMap;
use rusty_money::MoneyError;
use smallvec::SmallVec;
use thiserror::Error;
use tracing::debug;

use crate::{
    catalog::Catalog,
    pricing::{PricedCartView, price_cart},
    products::ProductKey,
    sessions::SessionId,
};

/// Errors rejecting a malformed line quantity before any service logic runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    /// The quantity was zero.
    #[error("quantity must be a positive integer")]
    Zero,

    /// The quantity was negative.
    #[error("quantity must be a positive integer, got {0}")]
    Negative(i64),

    /// The quantity does not fit the supported range.
    #[error("quantity {0} is out of range")]
    OutOfRange(i64),
}

/// A strictly positive line quantity.
///
/// Construction is the single validation gate: callers parse untrusted input
/// into a `Quantity` first, and every signature past that point can assume
/// positivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(u32);

impl Quantity {
    /// Creates a quantity, rejecting zero.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::Zero`] for a zero value.
    pub fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 {
            return Err(QuantityError::Zero);
        }

        Ok(Quantity(value))
    }

    /// The quantity as a plain integer.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Adds two quantities, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_add(other.0).map(Quantity)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Err(QuantityError::Zero),
            v if v < 0 => Err(QuantityError::Negative(v)),
            v => u32::try_from(v)
                .map(Quantity)
                .map_err(|_| QuantityError::OutOfRange(v)),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One product/quantity pair in a cart.
///
/// No price is stored here; prices are always re-derived from the catalog at
/// read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLineItem {
    /// Product the line refers to
    pub product: ProductKey,

    /// Units of the product in the cart
    pub quantity: Quantity,
}

/// A session's mutable cart.
#[derive(Debug, Clone)]
pub struct Cart {
    session: SessionId,
    items: SmallVec<[CartLineItem; 4]>,
}

impl Cart {
    /// Creates an empty cart owned by the given session.
    #[must_use]
    pub fn empty(session: SessionId) -> Self {
        Cart {
            session,
            items: SmallVec::new(),
        }
    }

    /// The owning session.
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// The line items, in insertion order.
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// The line for a product, if present.
    pub fn line(&self, product: ProductKey) -> Option<&CartLineItem> {
        self.items.iter().find(|line| line.product == product)
    }

    /// Sets a line's quantity, appending a new line if the product is not in
    /// the cart yet.
    pub fn set_line(&mut self, product: ProductKey, quantity: Quantity) {
        match self.items.iter_mut().find(|line| line.product == product) {
            Some(line) => line.quantity = quantity,
            None => self.items.push(CartLineItem { product, quantity }),
        }
    }

    /// Filters a product out of the cart. Removing an absent product is a
    /// no-op.
    pub fn remove_line(&mut self, product: ProductKey) {
        self.items.retain(|line| line.product != product);
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Whether the cart has no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One cart per session, created lazily with get-or-create semantics.
///
/// Mutations run under the store's write lock, so same-session mutations are
/// serialised rather than racing on a read-modify-write cycle (see
/// DESIGN.md).
#[derive(Debug, Default)]
pub struct CartStore {
    carts: RwLock<FxHashMap<SessionId, Cart>>,
}

impl CartStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        CartStore::default()
    }

    /// Point-in-time copy of a session's cart, if one exists.
    pub fn snapshot(&self, session: &SessionId) -> Option<Cart> {
        self.carts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session)
            .cloned()
    }

    /// Runs `f` against the session's cart under the write lock, creating an
    /// empty cart first if the session has none.
    pub fn update<R>(&self, session: &SessionId, f: impl FnOnce(&mut Cart) -> R) -> R {
        let mut carts = self.carts.write().unwrap_or_else(PoisonError::into_inner);
        let cart = carts
            .entry(session.clone())
            .or_insert_with(|| Cart::empty(session.clone()));
        f(cart)
    }

    /// Runs `f` against the session's cart only if one exists.
    pub fn update_existing<R>(
        &self,
        session: &SessionId,
        f: impl FnOnce(&mut Cart) -> R,
    ) -> Option<R> {
        let mut carts = self.carts.write().unwrap_or_else(PoisonError::into_inner);
        carts.get_mut(session).map(f)
    }

    /// Empties the session's cart, creating one if the session had none.
    /// Idempotent.
    pub fn clear(&self, session: &SessionId) {
        self.update(session, Cart::clear);
    }
}

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product is not in the catalog.
    #[error("product {0:?} not found")]
    ProductNotFound(ProductKey),

    /// The session has no cart yet.
    #[error("no cart for session {0}")]
    CartNotFound(SessionId),

    /// The product is not one of the cart's line items.
    #[error("product {0:?} is not in the cart")]
    LineNotFound(ProductKey),

    /// The requested quantity exceeds current stock.
    #[error("{name} only has {available} items in stock (requested {requested})")]
    InsufficientStock {
        /// Name of the limiting product
        name: String,

        /// Units currently in stock
        available: u32,

        /// Units the cart would hold after the operation
        requested: u32,
    },

    /// Accumulated line quantity overflowed.
    #[error("quantity overflow for product {0:?}")]
    QuantityOverflow(ProductKey),

    /// Money arithmetic error while pricing the view.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Session-scoped cart operations validated against live catalog stock.
///
/// Every operation returns the refreshed [`PricedCartView`], with prices
/// joined in from the catalog at read time.
#[derive(Debug)]
pub struct CartService<C> {
    catalog: Arc<C>,
    carts: Arc<CartStore>,
}

impl<C> Clone for CartService<C> {
    fn clone(&self) -> Self {
        CartService {
            catalog: Arc::clone(&self.catalog),
            carts: Arc::clone(&self.carts),
        }
    }
}

impl<C: Catalog> CartService<C> {
    /// Creates a cart service over the given catalog and cart store.
    pub fn new(catalog: Arc<C>, carts: Arc<CartStore>) -> Self {
        CartService { catalog, carts }
    }

    /// The priced view of the session's cart; an empty view if the session
    /// has no cart. Lines whose product has disappeared from the catalog are
    /// silently dropped from the view.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Money`] on money arithmetic failure.
    pub fn get(&self, session: &SessionId) -> Result<PricedCartView, CartError> {
        let cart = self
            .carts
            .snapshot(session)
            .unwrap_or_else(|| Cart::empty(session.clone()));

        Ok(price_cart(self.catalog.as_ref(), &cart)?)
    }

    /// Adds `quantity` units of a product to the session's cart.
    ///
    /// If the product is already a line item, the new quantity is added to
    /// the existing one and the combined quantity is re-checked against
    /// current stock — a second, independent capacity check.
    ///
    /// # Errors
    ///
    /// - [`CartError::ProductNotFound`]: the product is not in the catalog.
    /// - [`CartError::InsufficientStock`]: the requested (or combined)
    ///   quantity exceeds current stock.
    /// - [`CartError::QuantityOverflow`]: the combined quantity overflowed.
    /// - [`CartError::Money`]: money arithmetic failure pricing the view.
    pub fn add(
        &self,
        session: &SessionId,
        product: ProductKey,
        quantity: Quantity,
    ) -> Result<PricedCartView, CartError> {
        let current = self
            .catalog
            .product(product)
            .ok_or(CartError::ProductNotFound(product))?;

        if quantity.get() > current.stock {
            return Err(CartError::InsufficientStock {
                name: current.name,
                available: current.stock,
                requested: quantity.get(),
            });
        }

        self.carts.update(session, |cart| {
            let requested = match cart.line(product) {
                Some(line) => {
                    let combined = line
                        .quantity
                        .checked_add(quantity)
                        .ok_or(CartError::QuantityOverflow(product))?;

                    if combined.get() > current.stock {
                        return Err(CartError::InsufficientStock {
                            name: current.name.clone(),
                            available: current.stock,
                            requested: combined.get(),
                        });
                    }

                    combined
                }
                None => quantity,
            };

            cart.set_line(product, requested);
            Ok(())
        })?;

        debug!(session = %session, ?product, %quantity, "added product to cart");
        self.get(session)
    }

    /// Sets (replaces, not adds) a line item's quantity.
    ///
    /// # Errors
    ///
    /// - [`CartError::CartNotFound`]: the session has no cart.
    /// - [`CartError::LineNotFound`]: the product is not a cart line item.
    /// - [`CartError::ProductNotFound`]: the product no longer exists.
    /// - [`CartError::InsufficientStock`]: the quantity exceeds current
    ///   stock.
    /// - [`CartError::Money`]: money arithmetic failure pricing the view.
    pub fn update(
        &self,
        session: &SessionId,
        product: ProductKey,
        quantity: Quantity,
    ) -> Result<PricedCartView, CartError> {
        self.carts
            .update_existing(session, |cart| {
                if cart.line(product).is_none() {
                    return Err(CartError::LineNotFound(product));
                }

                let current = self
                    .catalog
                    .product(product)
                    .ok_or(CartError::ProductNotFound(product))?;

                if quantity.get() > current.stock {
                    return Err(CartError::InsufficientStock {
                        name: current.name,
                        available: current.stock,
                        requested: quantity.get(),
                    });
                }

                cart.set_line(product, quantity);
                Ok(())
            })
            .ok_or_else(|| CartError::CartNotFound(session.clone()))??;

        debug!(session = %session, ?product, %quantity, "updated cart line");
        self.get(session)
    }

    /// Filters a product out of the session's cart. Removing a product that
    /// is not in the cart is a no-op, not an error.
    ///
    /// # Errors
    ///
    /// - [`CartError::CartNotFound`]: the session has no cart.
    /// - [`CartError::Money`]: money arithmetic failure pricing the view.
    pub fn remove(
        &self,
        session: &SessionId,
        product: ProductKey,
    ) -> Result<PricedCartView, CartError> {
        self.carts
            .update_existing(session, |cart| cart.remove_line(product))
            .ok_or_else(|| CartError::CartNotFound(session.clone()))?;

        self.get(session)
    }

    /// Empties the session's cart regardless of prior state. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Money`] on money arithmetic failure pricing the
    /// (empty) view.
    pub fn clear(&self, session: &SessionId) -> Result<PricedCartView, CartError> {
        self.carts.clear(session);
        self.get(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_rejects_non_positive_values() {
        assert_eq!(Quantity::new(0), Err(QuantityError::Zero));
        assert_eq!(Quantity::try_from(0i64), Err(QuantityError::Zero));
        assert_eq!(Quantity::try_from(-3i64), Err(QuantityError::Negative(-3)));
        assert_eq!(
            Quantity::try_from(i64::from(u32::MAX) + 1),
            Err(QuantityError::OutOfRange(i64::from(u32::MAX) + 1))
        );
        assert_eq!(Quantity::try_from(2i64).map(Quantity::get), Ok(2));
    }

    #[test]
    fn set_line_replaces_and_appends() {
        let mut cart = Cart::empty(SessionId::anonymous());
        let product = ProductKey::default();

        cart.set_line(product, Quantity(2));
        cart.set_line(product, Quantity(5));

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.line(product).map(|line| line.quantity.get()), Some(5));
    }

    #[test]
    fn remove_line_is_a_noop_when_absent() {
        let mut cart = Cart::empty(SessionId::anonymous());
        cart.remove_line(ProductKey::default());

        assert!(cart.is_empty());
    }

    #[test]
    fn store_creates_carts_lazily() {
        let store = CartStore::new();
        let session = SessionId::new("s-1");

        assert!(store.snapshot(&session).is_none());

        store.update(&session, |cart| {
            cart.set_line(ProductKey::default(), Quantity(1));
        });

        assert_eq!(store.snapshot(&session).map(|cart| cart.items().len()), Some(1));
    }

    #[test]
    fn update_existing_skips_unknown_sessions() {
        let store = CartStore::new();

        assert!(store.update_existing(&SessionId::new("ghost"), |_| ()).is_none());
    }
}
