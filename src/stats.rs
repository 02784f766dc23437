//! Order statistics

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};

use crate::{
    orders::{OrderStatus, OrderStore},
    sessions::SessionId,
};

/// Read-only aggregate over committed orders.
#[derive(Debug, Clone)]
pub struct OrderStats {
    /// Number of orders in scope
    pub total_orders: usize,

    /// Sum of order totals
    pub total_revenue: Money<'static, Currency>,

    /// Mean order total, zero when no orders are in scope
    pub avg_order_value: Money<'static, Currency>,

    /// Count per status actually present; statuses with zero orders are
    /// absent from the map
    pub status_breakdown: FxHashMap<OrderStatus, usize>,
}

/// Aggregates orders, scoped to one session when given and global (the
/// operator view) otherwise.
///
/// Revenue and average are whole minor units, i.e. two decimals of the
/// major unit; the average rounds half away from zero.
#[must_use]
pub fn order_stats(
    orders: &OrderStore,
    session: Option<&SessionId>,
    currency: &'static Currency,
) -> OrderStats {
    let scoped = match session {
        Some(session) => orders.for_session(session),
        None => orders.all(),
    };

    let total_orders = scoped.len();
    let mut revenue_minor: i64 = 0;
    let mut status_breakdown: FxHashMap<OrderStatus, usize> = FxHashMap::default();

    for (_, order) in &scoped {
        revenue_minor = revenue_minor.saturating_add(order.total.to_minor_units());
        *status_breakdown.entry(order.status).or_insert(0) += 1;
    }

    let avg_minor = if total_orders == 0 {
        0
    } else {
        (Decimal::from(revenue_minor) / Decimal::from(total_orders))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(0)
    };

    OrderStats {
        total_orders,
        total_revenue: Money::from_minor(revenue_minor, currency),
        avg_order_value: Money::from_minor(avg_minor, currency),
        status_breakdown,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rusty_money::iso::USD;

    use super::*;
    use crate::orders::Order;

    fn order(session: &str, total_minor: i64, status: OrderStatus) -> Order {
        Order {
            session: SessionId::new(session),
            items: Vec::new(),
            subtotal: Money::from_minor(total_minor, USD),
            shipping: Money::from_minor(0, USD),
            tax: Money::from_minor(0, USD),
            total: Money::from_minor(total_minor, USD),
            status,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_scope_is_all_zeroes() {
        let store = OrderStore::new();
        let stats = order_stats(&store, None, USD);

        assert_eq!(stats.total_orders, 0);
        assert_eq!(stats.total_revenue, Money::from_minor(0, USD));
        assert_eq!(stats.avg_order_value, Money::from_minor(0, USD));
        assert!(stats.status_breakdown.is_empty());
    }

    #[test]
    fn aggregates_revenue_average_and_breakdown() {
        let store = OrderStore::new();
        store.insert(order("s-1", 10_00, OrderStatus::Pending));
        store.insert(order("s-1", 20_00, OrderStatus::Shipped));
        store.insert(order("s-2", 60_00, OrderStatus::Pending));

        let stats = order_stats(&store, None, USD);
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.total_revenue, Money::from_minor(90_00, USD));
        assert_eq!(stats.avg_order_value, Money::from_minor(30_00, USD));
        assert_eq!(stats.status_breakdown.get(&OrderStatus::Pending), Some(&2));
        assert_eq!(stats.status_breakdown.get(&OrderStatus::Shipped), Some(&1));
        assert_eq!(stats.status_breakdown.get(&OrderStatus::Delivered), None);
    }

    #[test]
    fn session_scope_restricts_the_aggregate() {
        let store = OrderStore::new();
        store.insert(order("s-1", 10_00, OrderStatus::Pending));
        store.insert(order("s-2", 50_00, OrderStatus::Pending));

        let stats = order_stats(&store, Some(&SessionId::new("s-1")), USD);
        assert_eq!(stats.total_orders, 1);
        assert_eq!(stats.total_revenue, Money::from_minor(10_00, USD));
    }

    #[test]
    fn average_rounds_to_whole_minor_units() {
        let store = OrderStore::new();
        store.insert(order("s-1", 10_01, OrderStatus::Pending));
        store.insert(order("s-1", 10_00, OrderStatus::Pending));

        // 2001 / 2 = 1000.5 minor units, which rounds to 1001.
        let stats = order_stats(&store, None, USD);
        assert_eq!(stats.avg_order_value, Money::from_minor(10_01, USD));
    }
}
