//! Checkout
//!
//! Converts a session's cart into a durable, priced order while protecting
//! the shared stock pool. Validation is read-only and aggregates every
//! per-line problem; checkout treats any problem as fatal and commits
//! nothing unless the whole cart is purchasable.
//!
//! The commit sequence is: persist the order, then apply one conditional
//! stock decrement per line, then clear the cart. A decrement can still
//! fail if a concurrent checkout won the remaining stock between validation
//! and commit; in that case every already-applied decrement is restocked
//! and the order is removed, leaving the catalog and order store exactly as
//! they were before the attempt.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    carts::{Cart, CartStore},
    catalog::{Catalog, CatalogError},
    orders::{Order, OrderError, OrderKey, OrderLineItem, OrderStatus, OrderStore},
    pricing::{PricedLineItem, PricingPolicy, line_total, sum_line_totals},
    products::ProductKey,
    sessions::SessionId,
    stats::{OrderStats, order_stats},
};

/// A per-line problem found while validating a cart against the live
/// catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// The backing product has been removed from the catalog.
    ProductMissing,

    /// The product is no longer marked for sale.
    Inactive {
        /// Product name
        name: String,
    },

    /// No units are left in stock.
    OutOfStock {
        /// Product name
        name: String,
    },

    /// Fewer units remain than the line requests.
    InsufficientStock {
        /// Product name
        name: String,

        /// Units currently in stock
        available: u32,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::ProductMissing => f.write_str("product no longer exists"),
            ValidationIssue::Inactive { name } => write!(f, "{name} is no longer available"),
            ValidationIssue::OutOfStock { name } => write!(f, "{name} is out of stock"),
            ValidationIssue::InsufficientStock { name, available } => {
                write!(f, "{name} only has {available} items in stock")
            }
        }
    }
}

/// Outcome of validating a cart without mutating anything.
///
/// Pricing is always computed from the valid subset, so a partially broken
/// cart still shows the shopper what the purchasable remainder would cost.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether every line passed
    pub valid: bool,

    /// One entry per failing line, in cart order
    pub issues: Vec<ValidationIssue>,

    /// Lines that passed, priced
    pub items: Vec<PricedLineItem>,

    /// Sum of line totals over passing lines
    pub subtotal: Money<'static, Currency>,

    /// Shipping on the passing subset
    pub shipping: Money<'static, Currency>,

    /// Tax on the passing subset
    pub tax: Money<'static, Currency>,

    /// `subtotal + shipping + tax`
    pub total: Money<'static, Currency>,
}

/// Errors from validation and checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has no line items at all.
    #[error("cart is empty")]
    EmptyCart,

    /// Lines exist but none survived validation.
    #[error("no valid items in cart")]
    NoValidItems,

    /// One or more lines failed validation; nothing was persisted or
    /// mutated.
    #[error("checkout rejected with {} issue(s)", .issues.len())]
    Rejected {
        /// Per-line problems, in cart order
        issues: Vec<ValidationIssue>,
    },

    /// Money arithmetic error while pricing the cart.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Converts carts into durable orders while protecting the shared stock
/// pool, and answers session-scoped order queries.
#[derive(Debug)]
pub struct CheckoutService<C> {
    catalog: Arc<C>,
    carts: Arc<CartStore>,
    orders: Arc<OrderStore>,
    policy: PricingPolicy,
}

impl<C> Clone for CheckoutService<C> {
    fn clone(&self) -> Self {
        CheckoutService {
            catalog: Arc::clone(&self.catalog),
            carts: Arc::clone(&self.carts),
            orders: Arc::clone(&self.orders),
            policy: self.policy.clone(),
        }
    }
}

impl<C: Catalog> CheckoutService<C> {
    /// Creates a checkout service over the given stores and charge rules.
    pub fn new(
        catalog: Arc<C>,
        carts: Arc<CartStore>,
        orders: Arc<OrderStore>,
        policy: PricingPolicy,
    ) -> Self {
        CheckoutService {
            catalog,
            carts,
            orders,
            policy,
        }
    }

    /// Validates the session's cart against the live catalog without
    /// mutating stock or the cart, aggregating every per-line problem so
    /// the shopper can fix them before retrying.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::EmptyCart`]: the cart has no line items.
    /// - [`CheckoutError::Money`]: money arithmetic failure while pricing.
    pub fn validate(&self, session: &SessionId) -> Result<ValidationResult, CheckoutError> {
        let cart = self.cart(session);

        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let (issues, items) = self.appraise(&cart);
        self.price(issues, items)
    }

    /// Converts the session's cart into a persisted order: re-validates
    /// every line, freezes names and prices, decrements stock and clears
    /// the cart — all or nothing.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::EmptyCart`]: the cart has no line items.
    /// - [`CheckoutError::NoValidItems`]: lines exist but none survived
    ///   validation.
    /// - [`CheckoutError::Rejected`]: at least one line failed validation,
    ///   or a concurrent checkout won the remaining stock during commit.
    ///   Nothing is persisted and no stock is changed.
    /// - [`CheckoutError::Money`]: money arithmetic failure while pricing.
    pub fn checkout(&self, session: &SessionId) -> Result<(OrderKey, Order), CheckoutError> {
        let cart = self.cart(session);

        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let (issues, items) = self.appraise(&cart);

        if items.is_empty() {
            return Err(CheckoutError::NoValidItems);
        }

        if !issues.is_empty() {
            debug!(session = %session, issues = issues.len(), "checkout rejected at validation");
            return Err(CheckoutError::Rejected { issues });
        }

        let subtotal = sum_line_totals(&items, self.policy.currency())?;
        let charges = self.policy.charges(subtotal)?;

        let order = Order {
            session: session.clone(),
            items: items.into_iter().map(freeze_line).collect(),
            subtotal,
            shipping: charges.shipping,
            tax: charges.tax,
            total: charges.total,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };

        let key = self.orders.insert(order.clone());
        self.commit_stock(key, &order)?;
        self.carts.clear(session);

        info!(
            session = %session,
            order = ?key,
            total = %order.total,
            "order committed"
        );

        Ok((key, order))
    }

    /// The session's orders, newest first.
    pub fn orders(&self, session: &SessionId) -> Vec<(OrderKey, Order)> {
        self.orders.for_session(session)
    }

    /// Fetches one of the session's orders.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NotFound`] when the key is absent or the order
    /// belongs to another session; a guessed key never leaks another
    /// session's order.
    pub fn order(&self, key: OrderKey, session: &SessionId) -> Result<Order, OrderError> {
        self.orders
            .get(key)
            .filter(|order| &order.session == session)
            .ok_or(OrderError::NotFound(key))
    }

    /// Advances an order's status. Operator action, unscoped by session.
    ///
    /// # Errors
    ///
    /// - [`OrderError::NotFound`]: the key is absent.
    /// - [`OrderError::InvalidTransition`]: the move is not legal from the
    ///   order's current status.
    pub fn update_status(&self, key: OrderKey, status: OrderStatus) -> Result<Order, OrderError> {
        self.orders.update_status(key, status)
    }

    /// Aggregate statistics over committed orders; scoped to one session
    /// when given, global otherwise.
    #[must_use]
    pub fn stats(&self, session: Option<&SessionId>) -> OrderStats {
        order_stats(self.orders.as_ref(), session, self.policy.currency())
    }

    fn cart(&self, session: &SessionId) -> Cart {
        self.carts
            .snapshot(session)
            .unwrap_or_else(|| Cart::empty(session.clone()))
    }

    /// Walks the cart in line order, splitting it into per-line issues and
    /// purchasable priced lines. Read-only; never aborts early.
    fn appraise(&self, cart: &Cart) -> (Vec<ValidationIssue>, Vec<PricedLineItem>) {
        let mut issues = Vec::new();
        let mut items = Vec::new();

        for line in cart.items() {
            match self.catalog.product(line.product) {
                None => issues.push(ValidationIssue::ProductMissing),
                Some(product) if !product.is_active => {
                    issues.push(ValidationIssue::Inactive { name: product.name });
                }
                Some(product) if product.stock == 0 => {
                    issues.push(ValidationIssue::OutOfStock { name: product.name });
                }
                Some(product) if product.stock < line.quantity.get() => {
                    issues.push(ValidationIssue::InsufficientStock {
                        name: product.name,
                        available: product.stock,
                    });
                }
                Some(product) => items.push(PricedLineItem {
                    product: line.product,
                    name: product.name,
                    unit_price: product.price,
                    image: product.image,
                    quantity: line.quantity,
                    line_total: line_total(product.price, line.quantity),
                }),
            }
        }

        (issues, items)
    }

    fn price(
        &self,
        issues: Vec<ValidationIssue>,
        items: Vec<PricedLineItem>,
    ) -> Result<ValidationResult, CheckoutError> {
        let subtotal = sum_line_totals(&items, self.policy.currency())?;
        let charges = self.policy.charges(subtotal)?;

        Ok(ValidationResult {
            valid: issues.is_empty(),
            issues,
            items,
            subtotal,
            shipping: charges.shipping,
            tax: charges.tax,
            total: charges.total,
        })
    }

    /// Applies one conditional decrement per order line, compensating on
    /// partial failure so a lost race leaves no trace.
    fn commit_stock(&self, key: OrderKey, order: &Order) -> Result<(), CheckoutError> {
        let mut applied: Vec<(ProductKey, u32)> = Vec::with_capacity(order.items.len());

        for item in &order.items {
            if let Err(err) = self
                .catalog
                .decrement_stock(item.product, item.quantity.get())
            {
                warn!(
                    session = %order.session,
                    order = ?key,
                    product = ?item.product,
                    error = %err,
                    "stock commit lost a race, rolling back"
                );
                self.rollback(key, &applied);
                return Err(CheckoutError::Rejected {
                    issues: vec![issue_from_catalog_error(err)],
                });
            }

            applied.push((item.product, item.quantity.get()));
        }

        Ok(())
    }

    fn rollback(&self, key: OrderKey, applied: &[(ProductKey, u32)]) {
        for &(product, quantity) in applied {
            // A product deleted mid-flight has no stock row to return units
            // to; there is nothing further to compensate.
            if let Err(err) = self.catalog.restock(product, quantity) {
                warn!(?product, quantity, error = %err, "restock failed during rollback");
            }
        }

        self.orders.remove(key);
    }
}

/// Converts a catalog commit failure into the matching validation issue.
fn issue_from_catalog_error(err: CatalogError) -> ValidationIssue {
    match err {
        CatalogError::ProductNotFound(_) => ValidationIssue::ProductMissing,
        CatalogError::InsufficientStock { name, available, .. } => {
            if available == 0 {
                ValidationIssue::OutOfStock { name }
            } else {
                ValidationIssue::InsufficientStock { name, available }
            }
        }
    }
}

fn freeze_line(item: PricedLineItem) -> OrderLineItem {
    OrderLineItem {
        product: item.product,
        name: item.name,
        unit_price: item.unit_price,
        quantity: item.quantity,
        image: item.image,
    }
}
