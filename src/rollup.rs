use crate::merge::{guarded_pct, guarded_ratio, ComparisonRecord, ComparisonTable};
use crate::schema::{NewCustomerTotals, SummaryMetric};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One row per metric, aggregated across a selected store set.
///
/// Sales, Payouts, Orders and New Customers are summed; Profitability and AOV
/// are ratios recomputed from the summed bases, never averaged from per-store
/// ratios.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryTable {
    pub rows: BTreeMap<SummaryMetric, ComparisonRecord>,
}

impl SummaryTable {
    pub fn get(&self, metric: SummaryMetric) -> ComparisonRecord {
        self.rows.get(&metric).copied().unwrap_or_default()
    }

    /// Rows in the fixed report order.
    pub fn ordered(&self) -> Vec<(SummaryMetric, ComparisonRecord)> {
        SummaryMetric::ORDERED
            .iter()
            .map(|m| (*m, self.get(*m)))
            .collect()
    }

    pub fn rounded(&self) -> SummaryTable {
        SummaryTable {
            rows: self
                .rows
                .iter()
                .map(|(metric, record)| (*metric, record.rounded()))
                .collect(),
        }
    }
}

/// Where a platform's new-customer figures come from.
///
/// One marketplace reports them per store from its marketing file family; the
/// other reports only a platform-wide count with no store breakdown.
#[derive(Debug, Clone, Copy)]
pub enum NewCustomerRollup<'a> {
    /// Per-store figures. Deliberately NOT filtered by the selected-store
    /// set: the marketing exports carry their own store identifiers, which
    /// do not line up with the transaction exports' identifiers.
    PerStore(&'a ComparisonTable),
    /// Platform-wide totals, used verbatim; `selected_stores` cannot apply
    /// to a figure that has no store breakdown.
    PlatformWide(&'a NewCustomerTotals),
}

fn summed_windows(table: &ComparisonTable, selected: &BTreeSet<String>) -> (f64, f64, f64, f64) {
    table
        .iter()
        .filter(|(store_id, _)| selected.contains(*store_id))
        .fold((0.0, 0.0, 0.0, 0.0), |acc, (_, r)| {
            (
                acc.0 + r.pre,
                acc.1 + r.post,
                acc.2 + r.last_year_pre,
                acc.3 + r.last_year_post,
            )
        })
}

fn new_customer_record(source: NewCustomerRollup<'_>) -> ComparisonRecord {
    match source {
        NewCustomerRollup::PerStore(table) => {
            let (pre, post, ly_pre, ly_post) =
                table.values().fold((0.0, 0.0, 0.0, 0.0), |acc, r| {
                    (
                        acc.0 + r.pre,
                        acc.1 + r.post,
                        acc.2 + r.last_year_pre,
                        acc.3 + r.last_year_post,
                    )
                });
            ComparisonRecord::from_windows(pre, post, ly_pre, ly_post)
        }
        NewCustomerRollup::PlatformWide(totals) => ComparisonRecord::from_windows(
            totals.pre_current,
            totals.post_current,
            totals.pre_prior,
            totals.post_prior,
        ),
    }
}

/// Collapses store-level comparison tables into one summary row per metric.
///
/// The store filter applies before summing; Growth% and YoY% are recomputed
/// from the summed values; Profitability and AOV are derived from the summed
/// Sales/Payouts/Orders of each window.
pub fn rollup(
    sales: &ComparisonTable,
    payouts: &ComparisonTable,
    orders: &ComparisonTable,
    new_customers: NewCustomerRollup<'_>,
    selected_stores: &BTreeSet<String>,
) -> SummaryTable {
    let (s_pre, s_post, s_ly_pre, s_ly_post) = summed_windows(sales, selected_stores);
    let (p_pre, p_post, p_ly_pre, p_ly_post) = summed_windows(payouts, selected_stores);
    let (o_pre, o_post, o_ly_pre, o_ly_post) = summed_windows(orders, selected_stores);

    let mut rows = BTreeMap::new();
    rows.insert(
        SummaryMetric::Sales,
        ComparisonRecord::from_windows(s_pre, s_post, s_ly_pre, s_ly_post),
    );
    rows.insert(
        SummaryMetric::Payouts,
        ComparisonRecord::from_windows(p_pre, p_post, p_ly_pre, p_ly_post),
    );
    rows.insert(
        SummaryMetric::Orders,
        ComparisonRecord::from_windows(o_pre, o_post, o_ly_pre, o_ly_post),
    );
    rows.insert(SummaryMetric::NewCustomers, new_customer_record(new_customers));
    rows.insert(
        SummaryMetric::Profitability,
        ComparisonRecord::from_windows(
            guarded_pct(p_pre, s_pre),
            guarded_pct(p_post, s_post),
            guarded_pct(p_ly_pre, s_ly_pre),
            guarded_pct(p_ly_post, s_ly_post),
        ),
    );
    rows.insert(
        SummaryMetric::Aov,
        ComparisonRecord::from_windows(
            guarded_ratio(s_pre, o_pre),
            guarded_ratio(s_post, o_post),
            guarded_ratio(s_ly_pre, o_ly_pre),
            guarded_ratio(s_ly_post, o_ly_post),
        ),
    );

    SummaryTable { rows }
}

/// Rebuilds the two derived ratio rows of a summary from its absolute rows.
/// Used after reconciliation, where percentages must come from the summed
/// bases rather than from either platform's own ratios.
pub fn rederive_ratio_rows(table: &mut SummaryTable) {
    let sales = table.get(SummaryMetric::Sales);
    let payouts = table.get(SummaryMetric::Payouts);
    let orders = table.get(SummaryMetric::Orders);

    table.rows.insert(
        SummaryMetric::Profitability,
        ComparisonRecord::from_windows(
            guarded_pct(payouts.pre, sales.pre),
            guarded_pct(payouts.post, sales.post),
            guarded_pct(payouts.last_year_pre, sales.last_year_pre),
            guarded_pct(payouts.last_year_post, sales.last_year_post),
        ),
    );
    table.rows.insert(
        SummaryMetric::Aov,
        ComparisonRecord::from_windows(
            guarded_ratio(sales.pre, orders.pre),
            guarded_ratio(sales.post, orders.post),
            guarded_ratio(sales.last_year_pre, orders.last_year_pre),
            guarded_ratio(sales.last_year_post, orders.last_year_post),
        ),
    );
}

/// Store-level pre/post presentation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrePostRow {
    pub store_id: String,
    pub pre: f64,
    pub post: f64,
    pub pre_vs_post: f64,
    pub last_year_pre_vs_post: f64,
    pub growth_pct: f64,
}

/// Store-level year-over-year presentation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YoyRow {
    pub store_id: String,
    pub last_year_post: f64,
    pub post: f64,
    pub yoy: f64,
    pub yoy_pct: f64,
}

/// Projects a comparison table into the pre/post report shape, rounding to
/// one decimal and dropping rows with neither pre nor post activity.
pub fn pre_post_rows(table: &ComparisonTable) -> Vec<PrePostRow> {
    table
        .iter()
        .filter(|(_, r)| r.pre != 0.0 || r.post != 0.0)
        .map(|(store_id, r)| {
            let r = r.rounded();
            PrePostRow {
                store_id: store_id.clone(),
                pre: r.pre,
                post: r.post,
                pre_vs_post: r.pre_vs_post,
                last_year_pre_vs_post: r.last_year_pre_vs_post,
                growth_pct: r.growth_pct,
            }
        })
        .collect()
}

/// Projects a comparison table into the year-over-year report shape.
pub fn yoy_rows(table: &ComparisonTable) -> Vec<YoyRow> {
    table
        .iter()
        .filter(|(_, r)| r.last_year_post != 0.0 || r.post != 0.0)
        .map(|(store_id, r)| {
            let r = r.rounded();
            YoyRow {
                store_id: store_id.clone(),
                last_year_post: r.last_year_post,
                post: r.post,
                yoy: r.yoy,
                yoy_pct: r.yoy_pct,
            }
        })
        .collect()
}
