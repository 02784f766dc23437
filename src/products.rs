//! Products

use rusty_money::{Money, iso::Currency};
use slotmap::new_key_type;

new_key_type! {
    /// Product Key
    pub struct ProductKey;
}

/// A catalog product as seen by the cart and checkout paths.
///
/// Products are read-mostly references: carts never cache prices, and only
/// the checkout commit path may change `stock`, through the catalog's
/// conditional decrement.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Product name
    pub name: String,

    /// Unit price
    pub price: Money<'static, Currency>,

    /// Catalog category
    pub category: String,

    /// Optional image URL
    pub image: Option<String>,

    /// Units currently available for sale
    pub stock: u32,

    /// Whether the product can currently be purchased
    pub is_active: bool,
}

impl Product {
    /// Creates an active product with no image.
    pub fn new(
        name: impl Into<String>,
        price: Money<'static, Currency>,
        category: impl Into<String>,
        stock: u32,
    ) -> Self {
        Product {
            name: name.into(),
            price,
            category: category.into(),
            image: None,
            stock,
            is_active: true,
        }
    }
}
