use crate::table::RawTable;
use std::collections::{BTreeMap, HashSet};

/// Totals for one store within one comparison window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreTotals {
    pub sales: f64,
    pub payouts: f64,
    /// Count of distinct order identifiers, not rows.
    pub orders: u64,
}

/// Aggregation result for one window: store id → totals. Every store id seen
/// in the filtered rows is present, even when a metric sums to zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowTotals {
    pub per_store: BTreeMap<String, StoreTotals>,
}

impl WindowTotals {
    pub fn is_empty(&self) -> bool {
        self.per_store.is_empty()
    }

    pub fn store_ids(&self) -> impl Iterator<Item = &String> {
        self.per_store.keys()
    }

    pub fn sales_of(&self, store_id: &str) -> f64 {
        self.per_store.get(store_id).map_or(0.0, |t| t.sales)
    }

    pub fn payouts_of(&self, store_id: &str) -> f64 {
        self.per_store.get(store_id).map_or(0.0, |t| t.payouts)
    }

    pub fn orders_of(&self, store_id: &str) -> f64 {
        self.per_store.get(store_id).map_or(0.0, |t| t.orders as f64)
    }
}

/// Resolved indices of the value columns the aggregator reads.
#[derive(Debug, Clone, Copy)]
pub struct ValueColumns {
    pub store: usize,
    pub sales: usize,
    pub payouts: usize,
    pub orders: usize,
}

/// Coerces an export cell to a number. Exports carry amounts as text, often
/// with currency symbols and thousands separators; anything that still fails
/// to parse becomes 0 rather than poisoning the sum.
pub fn coerce_amount(value: &str) -> f64 {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }
    match cleaned.parse::<f64>() {
        Ok(number) if number.is_finite() => number,
        _ => 0.0,
    }
}

/// Groups the selected rows by store identifier and totals the metric
/// columns: Sales and Payouts are sums, Orders is a distinct count of order
/// identifiers. Rows with a blank store id are dropped before grouping.
pub fn aggregate(table: &RawTable, row_indices: &[usize], columns: &ValueColumns) -> WindowTotals {
    let mut per_store: BTreeMap<String, StoreTotals> = BTreeMap::new();
    let mut seen_orders: BTreeMap<String, HashSet<String>> = BTreeMap::new();

    for &row in row_indices {
        let store_id = table.cell(row, columns.store).trim();
        if store_id.is_empty() {
            continue;
        }

        let totals = per_store.entry(store_id.to_string()).or_default();
        totals.sales += coerce_amount(table.cell(row, columns.sales));
        totals.payouts += coerce_amount(table.cell(row, columns.payouts));

        let order_id = table.cell(row, columns.orders).trim();
        if !order_id.is_empty() {
            seen_orders
                .entry(store_id.to_string())
                .or_default()
                .insert(order_id.to_string());
        }
    }

    for (store_id, orders) in seen_orders {
        if let Some(totals) = per_store.get_mut(&store_id) {
            totals.orders = orders.len() as u64;
        }
    }

    WindowTotals { per_store }
}
