//! Fixtures
//!
//! YAML catalog fixtures used by tests and demos to seed an
//! [`InMemoryCatalog`] with named products.

use std::{fs, path::Path};

use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;

use crate::{catalog::InMemoryCatalog, products::ProductKey};

pub mod products;

use products::ProductFixture;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Catalog prices must share one currency
    #[error("Mixed currencies in catalog fixture: {expected} and {found}")]
    MixedCurrencies {
        /// Currency of the first product parsed
        expected: &'static str,

        /// The differing currency encountered
        found: &'static str,
    },

    /// The fixture holds no products, so no catalog currency can be chosen
    #[error("Fixture contains no products")]
    Empty,
}

/// A catalog fixture: a map of slug → product.
#[derive(Debug, Deserialize)]
pub struct CatalogFixture {
    /// Map of product slug -> product fixture
    pub products: FxHashMap<String, ProductFixture>,
}

impl CatalogFixture {
    /// Parses a fixture from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Yaml`] if the text is not a valid fixture
    /// document.
    pub fn parse(yaml: &str) -> Result<Self, FixtureError> {
        Ok(serde_norway::from_str(yaml)?)
    }

    /// Reads and parses a fixture file.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Io`] if the file cannot be read, or
    /// [`FixtureError::Yaml`] if it does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Builds a catalog seeded with every fixture product, returning the
    /// catalog and a slug → key map so callers can address what was seeded.
    ///
    /// # Errors
    ///
    /// - [`FixtureError::Empty`]: the fixture holds no products.
    /// - [`FixtureError::InvalidPrice`] / [`FixtureError::UnknownCurrency`]:
    ///   a product price does not parse.
    /// - [`FixtureError::MixedCurrencies`]: product prices disagree on
    ///   currency.
    pub fn seed(&self) -> Result<(InMemoryCatalog, FxHashMap<String, ProductKey>), FixtureError> {
        let mut parsed = Vec::with_capacity(self.products.len());
        let mut currency = None;

        for (slug, fixture) in &self.products {
            let (product, product_currency) = fixture.to_product()?;

            match currency {
                None => currency = Some(product_currency),
                Some(expected) if expected != product_currency => {
                    return Err(FixtureError::MixedCurrencies {
                        expected: expected.iso_alpha_code,
                        found: product_currency.iso_alpha_code,
                    });
                }
                Some(_) => {}
            }

            parsed.push((slug.clone(), product));
        }

        let currency = currency.ok_or(FixtureError::Empty)?;
        let catalog = InMemoryCatalog::new(currency);
        let mut keys = FxHashMap::default();

        for (slug, product) in parsed {
            keys.insert(slug, catalog.insert(product));
        }

        Ok((catalog, keys))
    }
}
