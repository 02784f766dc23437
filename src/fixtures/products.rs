//! Product Fixtures

use rust_decimal::{Decimal, prelude::ToPrimitive};
use rusty_money::{
    Money,
    iso::{Currency, EUR, GBP, USD},
};
use serde::Deserialize;

use crate::{fixtures::FixtureError, products::Product};

/// Product Fixture
#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    /// Product name
    pub name: String,

    /// Product price (e.g., "2.99 USD")
    pub price: String,

    /// Catalog category
    pub category: String,

    /// Units in stock
    pub stock: u32,

    /// Optional image URL
    #[serde(default)]
    pub image: Option<String>,

    /// Whether the product is for sale; defaults to true
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ProductFixture {
    /// Converts the fixture into a [`Product`] and its price currency.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::InvalidPrice`] or
    /// [`FixtureError::UnknownCurrency`] if the price does not parse.
    pub fn to_product(&self) -> Result<(Product, &'static Currency), FixtureError> {
        let (minor_units, currency) = parse_price(&self.price)?;

        let product = Product {
            name: self.name.clone(),
            price: Money::from_minor(minor_units, currency),
            category: self.category.clone(),
            image: self.image.clone(),
            stock: self.stock,
            is_active: self.active,
        };

        Ok((product, currency))
    }
}

/// Parse price string (e.g., "2.99 USD") into minor units and currency
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY",
/// if the amount cannot be parsed as a decimal, or if the currency code
/// is not recognized.
pub fn parse_price(s: &str) -> Result<(i64, &'static Currency), FixtureError> {
    let parts: Vec<&str> = s.split_whitespace().collect();

    if parts.len() != 2 {
        return Err(FixtureError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    }

    let amount = parts
        .first()
        .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?
        .parse::<Decimal>()
        .map_err(|_err| FixtureError::InvalidPrice(s.to_string()))?;

    let minor_units = amount
        .checked_mul(Decimal::new(100, 0))
        .and_then(|value| value.round_dp(0).to_i64())
        .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?;

    let currency_code = parts
        .get(1)
        .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?;

    let currency = match *currency_code {
        "GBP" => GBP,
        "USD" => USD,
        "EUR" => EUR,
        other => return Err(FixtureError::UnknownCurrency(other.to_string())),
    };

    Ok((minor_units, currency))
}
