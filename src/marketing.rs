use crate::assembler::WindowPlan;
use crate::aggregate::coerce_amount;
use crate::merge::{guarded_ratio, merge_values, ComparisonTable};
use crate::table::{resolve_column, resolve_store_column, RawTable};
use crate::window::{filter_window, DateRange};
use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DATE_COLUMN: &str = "Date";
pub const NEW_CUSTOMERS_COLUMN: &str = "New customers acquired";
/// Column carried by the platform that reports only a platform-wide count.
pub const PLATFORM_WIDE_COLUMN: &str = "New customers";
pub const CAMPAIGN_FLAG_COLUMN: &str = "Is self serve campaign";
pub const PROMOTION_SPEND_COLUMN: &str = "Customer discounts from marketing | (Funded by you)";
pub const SPONSORED_SPEND_COLUMN: &str = "Marketing fees | (including any applicable taxes)";

fn store_candidates() -> Vec<String> {
    vec!["Store ID".to_string(), "Shop ID".to_string()]
}

/// Marketing exports collected from the `marketing_*` directory family,
/// already concatenation-ready (one `RawTable` per file).
#[derive(Debug, Clone, Default)]
pub struct MarketingFiles {
    pub promotions: Vec<RawTable>,
    pub sponsored: Vec<RawTable>,
}

/// Sums the new-customer column by store id over one window, across every
/// promotion file. Files missing a required column are skipped with a
/// warning; they never fail the run.
fn new_customers_window(
    tables: &[RawTable],
    range: DateRange,
    excluded: &BTreeSet<NaiveDate>,
) -> BTreeMap<String, f64> {
    let mut per_store: BTreeMap<String, f64> = BTreeMap::new();

    for table in tables {
        let date_column = match resolve_column(&table.headers, &[DATE_COLUMN]) {
            Some(index) => index,
            None => {
                warn!("{}: no '{}' column, skipping", table.source, DATE_COLUMN);
                continue;
            }
        };
        let value_column = match resolve_column(&table.headers, &[NEW_CUSTOMERS_COLUMN]) {
            Some(index) => index,
            None => {
                warn!(
                    "{}: no '{}' column, skipping",
                    table.source, NEW_CUSTOMERS_COLUMN
                );
                continue;
            }
        };
        let store_column = match resolve_store_column(&table.headers, &store_candidates()) {
            Some(index) => index,
            None => {
                warn!("{}: no store-id column, skipping", table.source);
                continue;
            }
        };

        for row in filter_window(table, date_column, range, excluded) {
            let store_id = table.cell(row, store_column).trim();
            if store_id.is_empty() {
                continue;
            }
            *per_store.entry(store_id.to_string()).or_insert(0.0) +=
                coerce_amount(table.cell(row, value_column));
        }
    }

    per_store
}

/// Builds the per-store new-customer comparison table for the platform that
/// reports new customers per store, by aggregating the promotion files over
/// all four comparison windows.
pub fn new_customer_table(
    tables: &[RawTable],
    plan: &WindowPlan,
    excluded: &BTreeSet<NaiveDate>,
) -> ComparisonTable {
    merge_values(
        &new_customers_window(tables, plan.pre_current, excluded),
        &new_customers_window(tables, plan.post_current, excluded),
        &new_customers_window(tables, plan.pre_prior, excluded),
        &new_customers_window(tables, plan.post_prior, excluded),
    )
}

/// Sums the platform-wide new-customer column of one export. No date filter
/// applies to these files; the count is consumed verbatim.
///
/// The pipeline itself reads these figures from
/// [`AnalysisRequest::uber_eats_new_customers`]: the platform ships one
/// export per period, so the caller totals each period's export with this
/// function and fills in the four [`NewCustomerTotals`] fields.
///
/// [`AnalysisRequest::uber_eats_new_customers`]: crate::schema::AnalysisRequest::uber_eats_new_customers
/// [`NewCustomerTotals`]: crate::schema::NewCustomerTotals
pub fn platform_wide_total(table: &RawTable) -> f64 {
    let column = match resolve_column(&table.headers, &[PLATFORM_WIDE_COLUMN]) {
        Some(index) => index,
        None => return 0.0,
    };
    (0..table.rows.len())
        .map(|row| coerce_amount(table.cell(row, column)))
        .sum()
}

/// Campaign-level spend efficiency, keyed by the self-serve flag value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignStats {
    pub orders: f64,
    pub sales: f64,
    pub spend: f64,
    /// Sales / Spend, 0 on zero spend.
    pub roas: f64,
    /// Spend / Orders, 0 on zero orders.
    pub cost_per_order: f64,
}

impl CampaignStats {
    fn derive(orders: f64, sales: f64, spend: f64) -> Self {
        Self {
            orders,
            sales,
            spend,
            roas: guarded_ratio(sales, spend),
            cost_per_order: guarded_ratio(spend, orders),
        }
    }
}

/// Groups marketing rows by the self-serve campaign flag and totals Orders,
/// Sales and Spend, deriving ROAS and Cost per Order from the sums.
///
/// Only the post range filters these rows; files lacking the required
/// columns are skipped with a warning.
pub fn campaign_pivot(
    tables: &[RawTable],
    spend_column: &str,
    post_range: DateRange,
    excluded: &BTreeSet<NaiveDate>,
) -> BTreeMap<String, CampaignStats> {
    let mut sums: BTreeMap<String, (f64, f64, f64)> = BTreeMap::new();

    for table in tables {
        let required = [
            CAMPAIGN_FLAG_COLUMN.to_string(),
            "Orders".to_string(),
            "Sales".to_string(),
            spend_column.to_string(),
        ];
        let mut indices = Vec::with_capacity(required.len());
        let mut missing = None;
        for name in &required {
            match resolve_column(&table.headers, &[name.clone()]) {
                Some(index) => indices.push(index),
                None => {
                    missing = Some(name.clone());
                    break;
                }
            }
        }
        if let Some(name) = missing {
            warn!("{}: no '{}' column, skipping", table.source, name);
            continue;
        }
        let (flag_col, orders_col, sales_col, spend_col) =
            (indices[0], indices[1], indices[2], indices[3]);

        let date_column = match resolve_column(&table.headers, &[DATE_COLUMN]) {
            Some(index) => index,
            None => {
                warn!("{}: no '{}' column, skipping", table.source, DATE_COLUMN);
                continue;
            }
        };

        for row in filter_window(table, date_column, post_range, excluded) {
            let flag = table.cell(row, flag_col).trim().to_string();
            let entry = sums.entry(flag).or_insert((0.0, 0.0, 0.0));
            entry.0 += coerce_amount(table.cell(row, orders_col));
            entry.1 += coerce_amount(table.cell(row, sales_col));
            entry.2 += coerce_amount(table.cell(row, spend_col));
        }
    }

    sums.into_iter()
        .map(|(flag, (orders, sales, spend))| (flag, CampaignStats::derive(orders, sales, spend)))
        .collect()
}

/// Unions two campaign pivots, summing the absolute columns and recomputing
/// the two ratios from the sums.
pub fn combine_pivots(
    a: &BTreeMap<String, CampaignStats>,
    b: &BTreeMap<String, CampaignStats>,
) -> BTreeMap<String, CampaignStats> {
    let mut keys: BTreeSet<&String> = BTreeSet::new();
    keys.extend(a.keys());
    keys.extend(b.keys());

    keys.into_iter()
        .map(|key| {
            let zero = CampaignStats::default();
            let left = a.get(key).unwrap_or(&zero);
            let right = b.get(key).unwrap_or(&zero);
            (
                key.clone(),
                CampaignStats::derive(
                    left.orders + right.orders,
                    left.sales + right.sales,
                    left.spend + right.spend,
                ),
            )
        })
        .collect()
}
