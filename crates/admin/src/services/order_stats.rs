//! Dashboard figures for recent orders.
//!
//! Pure aggregation over rows fetched by
//! [`OrderRepository::stat_rows`](crate::db::OrderRepository::stat_rows).

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use desguace_core::{OrderStatus, PaymentStatus, Price};

use crate::db::OrderStatRow;

/// Window the dashboard covers.
pub const STATS_WINDOW_DAYS: i64 = 30;

/// Window for the "recent" counter.
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Payment methods listed in the breakdown.
const TOP_PAYMENT_METHODS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodStat {
    pub method: String,
    pub count: i64,
    pub revenue: Price,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    /// Every order in the window, trashed ones included.
    pub total_orders: i64,
    pub active_orders: i64,
    pub paid_orders: i64,
    pub pending_orders: i64,
    pub by_status: HashMap<OrderStatus, i64>,
    pub total_revenue: Price,
    pub average_order_value: Price,
    pub registered_customers: i64,
    pub guest_customers: i64,
    pub top_payment_methods: Vec<PaymentMethodStat>,
    pub recent_orders: i64,
}

/// Aggregate `rows` as of `now`. Only trashed orders are excluded from
/// everything but `total_orders`.
#[must_use]
pub fn compute(rows: &[OrderStatRow], now: DateTime<Utc>) -> OrderStats {
    let recent_since = now - Duration::days(RECENT_WINDOW_DAYS);
    let active: Vec<&OrderStatRow> = rows.iter().filter(|r| !r.is_deleted).collect();

    let mut by_status: HashMap<OrderStatus, i64> =
        OrderStatus::ALL.iter().map(|s| (*s, 0)).collect();
    let mut methods: HashMap<&str, (i64, Price)> = HashMap::new();
    let mut stats = OrderStats {
        total_orders: count(rows.len()),
        active_orders: count(active.len()),
        paid_orders: 0,
        pending_orders: 0,
        by_status: HashMap::new(),
        total_revenue: Price::ZERO,
        average_order_value: Price::ZERO,
        registered_customers: 0,
        guest_customers: 0,
        top_payment_methods: Vec::new(),
        recent_orders: 0,
    };

    for row in &active {
        match row.payment_status {
            PaymentStatus::Pagado => stats.paid_orders += 1,
            PaymentStatus::Pendiente => stats.pending_orders += 1,
            PaymentStatus::Fallido | PaymentStatus::Reembolsado => {}
        }
        *by_status.entry(row.order_status).or_default() += 1;
        stats.total_revenue = stats.total_revenue + row.total;
        if row.user_id.is_some() {
            stats.registered_customers += 1;
        } else {
            stats.guest_customers += 1;
        }
        let entry = methods.entry(row.payment_method.as_str()).or_insert((0, Price::ZERO));
        entry.0 += 1;
        entry.1 = entry.1 + row.total;
        if row.created_at >= recent_since {
            stats.recent_orders += 1;
        }
    }

    if stats.active_orders > 0 {
        stats.average_order_value = Price::new(
            (stats.total_revenue.amount() / Decimal::from(stats.active_orders)).round_dp(2),
        );
    }

    let mut top: Vec<PaymentMethodStat> = methods
        .into_iter()
        .map(|(method, (count, revenue))| PaymentMethodStat {
            method: method.to_owned(),
            count,
            revenue,
        })
        .collect();
    top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.method.cmp(&b.method)));
    top.truncate(TOP_PAYMENT_METHODS);

    stats.by_status = by_status;
    stats.top_payment_methods = top;
    stats
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use desguace_core::UserId;

    use super::*;

    fn row(
        cents: i64,
        payment: PaymentStatus,
        method: &str,
        user: Option<i32>,
        deleted: bool,
        days_ago: i64,
        now: DateTime<Utc>,
    ) -> OrderStatRow {
        OrderStatRow {
            total: Price::from_cents(cents),
            payment_status: payment,
            order_status: OrderStatus::PendienteVerificar,
            payment_method: method.to_owned(),
            user_id: user.map(UserId::new),
            is_deleted: deleted,
            created_at: now - Duration::days(days_ago),
        }
    }

    #[test]
    fn test_empty_window() {
        let stats = compute(&[], Utc::now());
        assert_eq!(stats.total_orders, 0);
        assert_eq!(stats.average_order_value, Price::ZERO);
        assert_eq!(stats.by_status.len(), OrderStatus::ALL.len());
        assert!(stats.top_payment_methods.is_empty());
    }

    #[test]
    fn test_trashed_orders_only_count_in_total() {
        let now = Utc::now();
        let rows = vec![
            row(10_000, PaymentStatus::Pagado, "redsys", Some(1), false, 1, now),
            row(5_000, PaymentStatus::Pendiente, "bank_transfer", None, false, 10, now),
            row(99_900, PaymentStatus::Pagado, "redsys", None, true, 2, now),
        ];
        let stats = compute(&rows, now);
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.active_orders, 2);
        assert_eq!(stats.paid_orders, 1);
        assert_eq!(stats.pending_orders, 1);
        assert_eq!(stats.total_revenue, Price::from_cents(15_000));
        assert_eq!(stats.average_order_value, Price::from_cents(7_500));
        assert_eq!(stats.registered_customers, 1);
        assert_eq!(stats.guest_customers, 1);
        assert_eq!(stats.recent_orders, 1);
        assert_eq!(stats.by_status[&OrderStatus::PendienteVerificar], 2);
    }

    #[test]
    fn test_top_payment_methods_ordered_by_count() {
        let now = Utc::now();
        let mut rows = Vec::new();
        for (method, n) in [("redsys", 4), ("stripe", 2), ("paypal", 3), ("cash", 1), ("bank_transfer", 1), ("bizum", 1)] {
            for _ in 0..n {
                rows.push(row(1_000, PaymentStatus::Pagado, method, None, false, 0, now));
            }
        }
        let stats = compute(&rows, now);
        let names: Vec<&str> = stats.top_payment_methods.iter().map(|m| m.method.as_str()).collect();
        assert_eq!(names, ["redsys", "paypal", "stripe", "bank_transfer", "bizum"]);
        assert_eq!(stats.top_payment_methods[0].revenue, Price::from_cents(4_000));
    }
}
