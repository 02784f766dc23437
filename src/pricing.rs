//! Pricing
//!
//! Priced projections of carts and the charge rules applied on top of a
//! subtotal at validation and checkout time. All arithmetic is carried out
//! in minor units; fractional computation (tax) goes through
//! [`rust_decimal::Decimal`] and is rounded half-away-from-zero back to
//! whole minor units.

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{
    Money, MoneyError,
    iso::{Currency, USD},
};

use crate::{
    carts::{Cart, Quantity},
    catalog::Catalog,
    products::ProductKey,
};

/// A cart line joined with live catalog data.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLineItem {
    /// Product the line refers to
    pub product: ProductKey,

    /// Product name at read time
    pub name: String,

    /// Unit price at read time
    pub unit_price: Money<'static, Currency>,

    /// Product image at read time
    pub image: Option<String>,

    /// Units of the product in the cart
    pub quantity: Quantity,

    /// `unit_price × quantity`
    pub line_total: Money<'static, Currency>,
}

/// Read-only projection of a cart with current prices joined in from the
/// catalog.
///
/// Recomputed on every read and never persisted; lines whose backing product
/// has disappeared are dropped silently.
#[derive(Debug, Clone)]
pub struct PricedCartView {
    /// Surviving lines with prices and totals
    pub items: Vec<PricedLineItem>,

    /// Sum of line totals over surviving lines
    pub subtotal: Money<'static, Currency>,

    /// Sum of quantities over surviving lines
    pub item_count: u32,
}

impl PricedCartView {
    /// An empty view in the given currency.
    #[must_use]
    pub fn empty(currency: &'static Currency) -> Self {
        PricedCartView {
            items: Vec::new(),
            subtotal: Money::from_minor(0, currency),
            item_count: 0,
        }
    }

    /// Whether the view has no surviving lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// `unit_price × quantity` in minor units.
pub(crate) fn line_total(
    unit_price: Money<'static, Currency>,
    quantity: Quantity,
) -> Money<'static, Currency> {
    Money::from_minor(
        unit_price.to_minor_units() * i64::from(quantity.get()),
        unit_price.currency(),
    )
}

/// Computes the priced view of a cart against a live catalog.
///
/// # Errors
///
/// Returns a [`MoneyError`] on currency mismatch or arithmetic failure while
/// summing line totals.
pub fn price_cart<C: Catalog>(catalog: &C, cart: &Cart) -> Result<PricedCartView, MoneyError> {
    let mut items = Vec::with_capacity(cart.items().len());
    let mut item_count: u32 = 0;

    for line in cart.items() {
        // A vanished product is not the caller's fault; the line is dropped
        // from the view rather than surfaced as an error.
        let Some(product) = catalog.product(line.product) else {
            continue;
        };

        item_count = item_count.saturating_add(line.quantity.get());
        items.push(PricedLineItem {
            product: line.product,
            name: product.name,
            unit_price: product.price,
            image: product.image,
            quantity: line.quantity,
            line_total: line_total(product.price, line.quantity),
        });
    }

    let subtotal = sum_line_totals(&items, catalog.currency())?;

    Ok(PricedCartView {
        items,
        subtotal,
        item_count,
    })
}

/// Sums line totals, minting a zero in `currency` for an empty slice.
pub(crate) fn sum_line_totals(
    items: &[PricedLineItem],
    currency: &'static Currency,
) -> Result<Money<'static, Currency>, MoneyError> {
    items
        .iter()
        .try_fold(Money::from_minor(0, currency), |acc, item| {
            acc.add(item.line_total)
        })
}

/// Shipping, tax and grand total derived from a subtotal.
#[derive(Debug, Clone, Copy)]
pub struct Charges {
    /// Flat shipping charge, or zero above the free-shipping threshold
    pub shipping: Money<'static, Currency>,

    /// Tax on the subtotal
    pub tax: Money<'static, Currency>,

    /// `subtotal + shipping + tax`
    pub total: Money<'static, Currency>,
}

/// Charge rules applied on top of a cart subtotal.
///
/// Plain data: construct one per storefront and hand it to the checkout
/// service. The stock rules are 8% tax, a 10.00 flat shipping charge, and
/// free shipping for subtotals strictly above 100.00.
#[derive(Debug, Clone)]
pub struct PricingPolicy {
    /// Fraction of the subtotal charged as tax
    pub tax_rate: Percentage,

    /// Flat shipping charge below the free-shipping threshold
    pub flat_shipping: Money<'static, Currency>,

    /// Subtotals strictly above this value ship free
    pub free_shipping_threshold: Money<'static, Currency>,
}

impl PricingPolicy {
    /// The standard rules in the given currency.
    #[must_use]
    pub fn for_currency(currency: &'static Currency) -> Self {
        PricingPolicy {
            tax_rate: Percentage::from(0.08),
            flat_shipping: Money::from_minor(10_00, currency),
            free_shipping_threshold: Money::from_minor(100_00, currency),
        }
    }

    /// Currency the policy's charges are denominated in.
    #[must_use]
    pub fn currency(&self) -> &'static Currency {
        self.flat_shipping.currency()
    }

    /// Computes shipping, tax and total for a subtotal.
    ///
    /// Shipping is waived only when the subtotal is strictly greater than
    /// the threshold; a subtotal exactly at the threshold still pays flat
    /// shipping.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] on currency mismatch between the subtotal
    /// and the policy, or on arithmetic failure.
    pub fn charges(&self, subtotal: Money<'static, Currency>) -> Result<Charges, MoneyError> {
        let subtotal_minor = subtotal.to_minor_units();

        let shipping = if subtotal_minor > self.free_shipping_threshold.to_minor_units() {
            Money::from_minor(0, subtotal.currency())
        } else {
            self.flat_shipping
        };

        let tax_minor = (self.tax_rate * Decimal::from(subtotal_minor))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or(MoneyError::InvalidAmount)?;
        let tax = Money::from_minor(tax_minor, subtotal.currency());

        let total = subtotal.add(shipping)?.add(tax)?;

        Ok(Charges {
            shipping,
            tax,
            total,
        })
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        PricingPolicy::for_currency(USD)
    }
}
