//! Tally prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    carts::{Cart, CartError, CartLineItem, CartService, CartStore, Quantity, QuantityError},
    catalog::{Catalog, CatalogError, InMemoryCatalog},
    checkout::{CheckoutError, CheckoutService, ValidationIssue, ValidationResult},
    fixtures::{CatalogFixture, FixtureError},
    orders::{Order, OrderError, OrderKey, OrderLineItem, OrderStatus, OrderStore},
    pricing::{Charges, PricedCartView, PricedLineItem, PricingPolicy, price_cart},
    products::{Product, ProductKey},
    sessions::SessionId,
    stats::{OrderStats, order_stats},
};
