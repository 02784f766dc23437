//! End-to-end checkout behaviour over a fixture-seeded catalog.
//!
//! Covers the all-or-nothing contract: a fully valid cart becomes a frozen,
//! priced order and decrements stock; any per-line problem rejects the whole
//! attempt and leaves the catalog, cart and order store untouched.

use std::sync::Arc;

use rusty_money::{Money, iso::USD};
use testresult::TestResult;

use tally::prelude::*;

const CATALOG_YAML: &str = r"
products:
  keyboard:
    name: Keyboard
    price: 20.00 USD
    category: peripherals
    stock: 10
  mouse:
    name: Mouse
    price: 15.50 USD
    category: peripherals
    stock: 5
  monitor:
    name: Monitor
    price: 89.00 USD
    category: displays
    stock: 2
";

struct Storefront {
    catalog: Arc<InMemoryCatalog>,
    carts: CartService<InMemoryCatalog>,
    checkout: CheckoutService<InMemoryCatalog>,
    keys: rustc_hash::FxHashMap<String, ProductKey>,
}

fn storefront() -> TestResult<Storefront> {
    let (catalog, keys) = CatalogFixture::parse(CATALOG_YAML)?.seed()?;
    let catalog = Arc::new(catalog);
    let cart_store = Arc::new(CartStore::new());
    let order_store = Arc::new(OrderStore::new());

    Ok(Storefront {
        carts: CartService::new(Arc::clone(&catalog), Arc::clone(&cart_store)),
        checkout: CheckoutService::new(
            Arc::clone(&catalog),
            cart_store,
            order_store,
            PricingPolicy::for_currency(USD),
        ),
        catalog,
        keys,
    })
}

impl Storefront {
    fn key(&self, slug: &str) -> ProductKey {
        *self.keys.get(slug).expect("product not seeded")
    }
}

#[test]
fn a_valid_cart_becomes_a_priced_order() -> TestResult {
    let store = storefront()?;
    let session = SessionId::new("s-1");
    let keyboard = store.key("keyboard");

    let view = store.carts.add(&session, keyboard, Quantity::new(2)?)?;
    assert_eq!(view.subtotal, Money::from_minor(40_00, USD));

    let (_, order) = store.checkout.checkout(&session)?;

    // 40.00 subtotal + 10.00 shipping + 3.20 tax.
    assert_eq!(order.subtotal, Money::from_minor(40_00, USD));
    assert_eq!(order.shipping, Money::from_minor(10_00, USD));
    assert_eq!(order.tax, Money::from_minor(3_20, USD));
    assert_eq!(order.total, Money::from_minor(53_20, USD));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.unit_count(), 2);

    // Stock was decremented and the cart cleared.
    assert_eq!(store.catalog.product(keyboard).expect("keyboard").stock, 8);
    assert!(store.carts.get(&session)?.is_empty());
    Ok(())
}

#[test]
fn validate_reports_every_issue_without_mutating() -> TestResult {
    let store = storefront()?;
    let session = SessionId::new("s-1");
    let keyboard = store.key("keyboard");
    let mouse = store.key("mouse");
    let monitor = store.key("monitor");

    store.carts.add(&session, keyboard, Quantity::new(1)?)?;
    store.carts.add(&session, mouse, Quantity::new(1)?)?;
    store.carts.add(&session, monitor, Quantity::new(2)?)?;

    store.catalog.update(mouse, |product| product.is_active = false)?;
    store.catalog.update(monitor, |product| product.stock = 1)?;

    let result = store.checkout.validate(&session)?;
    assert!(!result.valid);
    assert_eq!(
        result.issues,
        vec![
            ValidationIssue::Inactive {
                name: "Mouse".to_owned()
            },
            ValidationIssue::InsufficientStock {
                name: "Monitor".to_owned(),
                available: 1,
            },
        ]
    );

    // Pricing reflects only the valid subset (the keyboard).
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.subtotal, Money::from_minor(20_00, USD));
    assert_eq!(result.shipping, Money::from_minor(10_00, USD));

    // Nothing moved: stock, cart and order store are untouched, and a
    // second validation says the same thing.
    assert_eq!(store.catalog.product(keyboard).expect("keyboard").stock, 10);
    assert_eq!(store.carts.get(&session)?.item_count, 4);
    assert!(!store.checkout.validate(&session)?.valid);
    assert!(store.checkout.orders(&session).is_empty());
    Ok(())
}

#[test]
fn empty_carts_cannot_validate_or_check_out() -> TestResult {
    let store = storefront()?;
    let session = SessionId::new("s-1");

    assert!(matches!(
        store.checkout.validate(&session),
        Err(CheckoutError::EmptyCart)
    ));
    assert!(matches!(
        store.checkout.checkout(&session),
        Err(CheckoutError::EmptyCart)
    ));

    // An explicitly cleared cart counts as empty too.
    store.carts.clear(&session)?;
    assert!(matches!(
        store.checkout.checkout(&session),
        Err(CheckoutError::EmptyCart)
    ));
    Ok(())
}

#[test]
fn a_cart_with_no_surviving_lines_is_rejected_distinctly() -> TestResult {
    let store = storefront()?;
    let session = SessionId::new("s-1");
    let keyboard = store.key("keyboard");

    store.carts.add(&session, keyboard, Quantity::new(1)?)?;
    store.catalog.remove(keyboard);

    assert!(matches!(
        store.checkout.checkout(&session),
        Err(CheckoutError::NoValidItems)
    ));
    assert!(store.checkout.orders(&session).is_empty());
    Ok(())
}

#[test]
fn one_bad_line_rejects_the_whole_checkout() -> TestResult {
    let store = storefront()?;
    let session = SessionId::new("s-1");
    let keyboard = store.key("keyboard");
    let mouse = store.key("mouse");

    store.carts.add(&session, keyboard, Quantity::new(1)?)?;
    store.carts.add(&session, mouse, Quantity::new(1)?)?;
    store.catalog.remove(mouse);

    // The cart view silently drops the vanished product...
    let view = store.carts.get(&session)?;
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.subtotal, Money::from_minor(20_00, USD));

    // ...but checkout refuses to commit a partially valid cart.
    let err = store.checkout.checkout(&session).unwrap_err();
    match err {
        CheckoutError::Rejected { issues } => {
            assert_eq!(issues, vec![ValidationIssue::ProductMissing]);
        }
        other => panic!("expected Rejected, got {other:?}"),
    }

    // Nothing was persisted or decremented.
    assert!(store.checkout.orders(&session).is_empty());
    assert_eq!(store.catalog.product(keyboard).expect("keyboard").stock, 10);
    Ok(())
}

#[test]
fn committed_orders_are_frozen_snapshots() -> TestResult {
    let store = storefront()?;
    let session = SessionId::new("s-1");
    let keyboard = store.key("keyboard");

    store.carts.add(&session, keyboard, Quantity::new(1)?)?;
    let (key, _) = store.checkout.checkout(&session)?;

    // Reprice and then delete the product entirely.
    store.catalog.update(keyboard, |product| {
        product.price = Money::from_minor(99_99, USD);
        product.name = "Mechanical Keyboard".to_owned();
    })?;
    store.catalog.remove(keyboard);

    let order = store.checkout.order(key, &session)?;
    let line = order.items.first().expect("order line");
    assert_eq!(line.name, "Keyboard");
    assert_eq!(line.unit_price, Money::from_minor(20_00, USD));
    assert_eq!(order.total, Money::from_minor(33_60, USD));
    Ok(())
}

#[test]
fn orders_are_scoped_to_their_session() -> TestResult {
    let store = storefront()?;
    let session = SessionId::new("s-1");
    let keyboard = store.key("keyboard");

    store.carts.add(&session, keyboard, Quantity::new(1)?)?;
    let (key, _) = store.checkout.checkout(&session)?;

    assert!(store.checkout.order(key, &session).is_ok());

    // A guessed key never leaks another session's order.
    let err = store
        .checkout
        .order(key, &SessionId::new("someone-else"))
        .unwrap_err();
    assert_eq!(err, OrderError::NotFound(key));

    assert!(store.checkout.orders(&SessionId::new("someone-else")).is_empty());
    Ok(())
}

#[test]
fn operators_advance_status_through_the_state_machine() -> TestResult {
    let store = storefront()?;
    let session = SessionId::new("s-1");

    store
        .carts
        .add(&session, store.key("keyboard"), Quantity::new(1)?)?;
    let (key, _) = store.checkout.checkout(&session)?;

    let order = store.checkout.update_status(key, "processing".parse()?)?;
    assert_eq!(order.status, OrderStatus::Processing);
    let order = store.checkout.update_status(key, OrderStatus::Shipped)?;
    assert_eq!(order.status, OrderStatus::Shipped);

    // Backwards and post-shipping cancellation moves are rejected.
    assert!(matches!(
        store.checkout.update_status(key, OrderStatus::Pending),
        Err(OrderError::InvalidTransition { .. })
    ));
    assert!(matches!(
        store.checkout.update_status(key, OrderStatus::Cancelled),
        Err(OrderError::InvalidTransition { .. })
    ));
    Ok(())
}

#[test]
fn stats_aggregate_by_scope() -> TestResult {
    let store = storefront()?;
    let alice = SessionId::new("alice");
    let bob = SessionId::new("bob");
    let keyboard = store.key("keyboard");

    store.carts.add(&alice, keyboard, Quantity::new(1)?)?;
    store.checkout.checkout(&alice)?;
    store.carts.add(&bob, keyboard, Quantity::new(2)?)?;
    store.checkout.checkout(&bob)?;

    let global = store.checkout.stats(None);
    assert_eq!(global.total_orders, 2);
    assert_eq!(
        global.status_breakdown.get(&OrderStatus::Pending),
        Some(&2)
    );

    let mine = store.checkout.stats(Some(&alice));
    assert_eq!(mine.total_orders, 1);
    // 20.00 + 10.00 shipping + 1.60 tax.
    assert_eq!(mine.total_revenue, Money::from_minor(33_60, USD));
    assert_eq!(mine.avg_order_value, Money::from_minor(33_60, USD));
    Ok(())
}
