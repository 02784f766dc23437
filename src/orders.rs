//! Orders
//!
//! A committed order is a frozen copy of the purchased lines at the moment
//! of checkout: name, price and image are captured from the catalog and
//! never change afterwards, even if the backing product is edited or
//! deleted. `status` is the only field that moves after creation.

use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use rusty_money::{Money, iso::Currency};
use slotmap::{SlotMap, new_key_type};
use thiserror::Error;

use crate::{carts::Quantity, products::ProductKey, sessions::SessionId};

new_key_type! {
    /// Order Key
    pub struct OrderKey;
}

/// Errors from order lookups and status changes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// The order does not exist, or does not belong to the calling session.
    #[error("order {0:?} not found")]
    NotFound(OrderKey),

    /// The requested status change is not a legal transition.
    #[error("order cannot move from {from} to {to}")]
    InvalidTransition {
        /// Status the order is currently in
        from: OrderStatus,

        /// Status the caller asked for
        to: OrderStatus,
    },

    /// The status string is not a recognised status.
    #[error("unknown order status: {0}")]
    UnknownStatus(String),
}

/// Lifecycle states an order moves through after checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Committed, not yet picked up by an operator
    Pending,

    /// Being prepared
    Processing,

    /// Handed to the carrier
    Shipped,

    /// Received by the customer
    Delivered,

    /// Abandoned before shipping
    Cancelled,
}

impl OrderStatus {
    /// Whether an order may move from `self` to `next`.
    ///
    /// Transitions are forward-only: pending → processing → shipped →
    /// delivered, and an order can be cancelled until it ships. Delivered
    /// and cancelled are terminal.
    #[must_use]
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processing)
                | (OrderStatus::Processing, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
                | (
                    OrderStatus::Pending | OrderStatus::Processing,
                    OrderStatus::Cancelled
                )
        )
    }

    /// The canonical lowercase name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_owned())),
        }
    }
}

/// Frozen copy of a purchased product at the moment of checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLineItem {
    /// Product the line was priced from
    pub product: ProductKey,

    /// Product name at purchase time
    pub name: String,

    /// Unit price at purchase time
    pub unit_price: Money<'static, Currency>,

    /// Units purchased
    pub quantity: Quantity,

    /// Product image at purchase time
    pub image: Option<String>,
}

/// A committed, priced order snapshot.
#[derive(Debug, Clone)]
pub struct Order {
    /// Session the order belongs to
    pub session: SessionId,

    /// Frozen purchased lines
    pub items: Vec<OrderLineItem>,

    /// Sum of line totals at purchase time
    pub subtotal: Money<'static, Currency>,

    /// Shipping charged
    pub shipping: Money<'static, Currency>,

    /// Tax charged
    pub tax: Money<'static, Currency>,

    /// `subtotal + shipping + tax`
    pub total: Money<'static, Currency>,

    /// Current lifecycle status
    pub status: OrderStatus,

    /// Commit timestamp
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Total units across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0, |acc, item| acc.saturating_add(item.quantity.get()))
    }
}

/// Store of committed orders.
///
/// Orders are inserted exactly once by the checkout path; afterwards only
/// `status` may change. Removal exists solely for the checkout compensation
/// path and is crate-private.
#[derive(Debug, Default)]
pub struct OrderStore {
    orders: RwLock<SlotMap<OrderKey, Order>>,
}

impl OrderStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        OrderStore::default()
    }

    /// Persists an order, returning its key.
    pub fn insert(&self, order: Order) -> OrderKey {
        self.write().insert(order)
    }

    /// Fetches an order by key, unscoped.
    pub fn get(&self, key: OrderKey) -> Option<Order> {
        self.read().get(key).cloned()
    }

    /// Removes an order. Compensation path of a failed checkout only.
    pub(crate) fn remove(&self, key: OrderKey) -> Option<Order> {
        self.write().remove(key)
    }

    /// A session's orders, newest first.
    pub fn for_session(&self, session: &SessionId) -> Vec<(OrderKey, Order)> {
        let mut orders: Vec<(OrderKey, Order)> = self
            .read()
            .iter()
            .filter(|(_, order)| &order.session == session)
            .map(|(key, order)| (key, order.clone()))
            .collect();

        orders.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at));
        orders
    }

    /// Every order in the store, newest first.
    pub fn all(&self) -> Vec<(OrderKey, Order)> {
        let mut orders: Vec<(OrderKey, Order)> = self
            .read()
            .iter()
            .map(|(key, order)| (key, order.clone()))
            .collect();

        orders.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at));
        orders
    }

    /// Advances an order's status, enforcing the transition table.
    ///
    /// # Errors
    ///
    /// - [`OrderError::NotFound`]: the key is absent.
    /// - [`OrderError::InvalidTransition`]: the move is not legal from the
    ///   order's current status.
    pub fn update_status(&self, key: OrderKey, status: OrderStatus) -> Result<Order, OrderError> {
        let mut orders = self.write();
        let order = orders.get_mut(key).ok_or(OrderError::NotFound(key))?;

        if !order.status.can_transition_to(status) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: status,
            });
        }

        order.status = status;
        Ok(order.clone())
    }

    /// Number of orders in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the store holds no orders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SlotMap<OrderKey, Order>> {
        self.orders.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SlotMap<OrderKey, Order>> {
        self.orders.write().unwrap_or_else(PoisonError::into_inner)
    }
}
