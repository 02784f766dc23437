//! Tally
//!
//! Tally is a storefront cart and checkout engine: session-scoped carts
//! validated against a live product catalog with finite stock, an
//! all-or-nothing checkout that freezes prices into durable orders while
//! conditionally decrementing inventory, and read-only order statistics.

pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod fixtures;
pub mod orders;
pub mod prelude;
pub mod pricing;
pub mod products;
pub mod sessions;
pub mod stats;
