use crate::window::{DateRange, ExcludedDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// The two marketplaces whose exports this crate reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Platform {
    DoorDash,
    UberEats,
}

impl Platform {
    pub fn label(&self) -> &'static str {
        match self {
            Platform::DoorDash => "DoorDash",
            Platform::UberEats => "UberEats",
        }
    }
}

/// Whether a comparison window is one of the operator-entered pair or its
/// derived year-minus-one equivalent. Payout column selection depends on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEpoch {
    Current,
    PriorYear,
}

/// How the transaction date column is located in an export.
///
/// One platform names its date column (with several observed spelling
/// variants); the other carries it at a fixed position and is never resolved
/// by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DateColumn {
    ByName(Vec<String>),
    ByIndex(usize),
}

/// Per-platform parsing and aggregation parameters.
///
/// The two marketplaces share one aggregation pipeline; everything that
/// differs between them lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub platform: Platform,
    pub date_column: DateColumn,
    /// Acceptable store-identifier column names, in preference order.
    pub store_column_candidates: Vec<String>,
    pub sales_column: String,
    pub order_column: String,
    /// Payout column name expected for current-year windows.
    pub payout_column_current: String,
    /// Payout column name expected for prior-year windows.
    pub payout_column_historical: String,
    /// Banner rows preceding the real header row.
    pub header_row_offset: usize,
}

impl PlatformConfig {
    pub fn doordash() -> Self {
        Self {
            platform: Platform::DoorDash,
            date_column: DateColumn::ByName(vec![
                "Timestamp local date".to_string(),
                "Timestamp Local Date".to_string(),
                "Timestamp Local date".to_string(),
                "timestamp local date".to_string(),
                "Date".to_string(),
                "date".to_string(),
                "Timestamp".to_string(),
                "timestamp".to_string(),
            ]),
            store_column_candidates: vec![
                "Merchant store ID".to_string(),
                "Store ID".to_string(),
            ],
            sales_column: "Subtotal".to_string(),
            order_column: "DoorDash order ID".to_string(),
            payout_column_current: "Net total".to_string(),
            payout_column_historical: "Net total (for historical reference only)".to_string(),
            header_row_offset: 0,
        }
    }

    pub fn uber_eats() -> Self {
        Self {
            platform: Platform::UberEats,
            // 9th physical column, never resolved by name.
            date_column: DateColumn::ByIndex(8),
            store_column_candidates: vec!["Store ID".to_string(), "Shop ID".to_string()],
            sales_column: "Sales (excl. tax)".to_string(),
            order_column: "Order ID".to_string(),
            payout_column_current: "Total payout".to_string(),
            payout_column_historical: "Total payout".to_string(),
            header_row_offset: 1,
        }
    }

    /// Payout column names to try for a window, in preference order.
    ///
    /// Current-year windows expect the current name but may fall back to the
    /// historical one; prior-year windows accept only the historical name,
    /// matching how the exports label payouts for older periods.
    pub fn payout_candidates(&self, epoch: WindowEpoch) -> Vec<String> {
        match epoch {
            WindowEpoch::Current => {
                let mut names = vec![self.payout_column_current.clone()];
                if self.payout_column_historical != self.payout_column_current {
                    names.push(self.payout_column_historical.clone());
                }
                names
            }
            WindowEpoch::PriorYear => vec![self.payout_column_historical.clone()],
        }
    }
}

/// The metric families aggregated per store and window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MetricFamily {
    Sales,
    Payouts,
    Orders,
    NewCustomers,
}

/// Rows of a summary table: the four stored families plus two ratios derived
/// from their sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SummaryMetric {
    Sales,
    Payouts,
    Orders,
    NewCustomers,
    Profitability,
    Aov,
}

impl SummaryMetric {
    pub const ORDERED: [SummaryMetric; 6] = [
        SummaryMetric::Sales,
        SummaryMetric::Payouts,
        SummaryMetric::Orders,
        SummaryMetric::NewCustomers,
        SummaryMetric::Profitability,
        SummaryMetric::Aov,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SummaryMetric::Sales => "Sales",
            SummaryMetric::Payouts => "Payouts",
            SummaryMetric::Orders => "Orders",
            SummaryMetric::NewCustomers => "New Customers",
            SummaryMetric::Profitability => "Profitability",
            SummaryMetric::Aov => "AOV",
        }
    }
}

/// Platform-wide new-customer counts for the marketplace that reports them
/// with no store breakdown. Supplied by the caller, consumed verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCustomerTotals {
    pub pre_prior: f64,
    pub post_prior: f64,
    pub pre_current: f64,
    pub post_current: f64,
}

/// Immutable per-run input to the pipeline.
///
/// Produced once per analysis invocation by the upload/config collaborator;
/// nothing in the core mutates it, and every run recomputes from scratch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// DoorDash transaction export, if uploaded.
    pub doordash_file: Option<PathBuf>,
    /// UberEats transaction export, if uploaded.
    pub uber_eats_file: Option<PathBuf>,
    /// Directory containing `marketing_*` subdirectories of promotion and
    /// sponsored-listing exports.
    pub marketing_dir: Option<PathBuf>,
    pub pre_range: Option<DateRange>,
    pub post_range: Option<DateRange>,
    pub excluded_dates: Vec<ExcludedDate>,
    /// `None` means no selection was made and every store is included;
    /// `Some` filters the summary roll-up to exactly that set.
    pub doordash_selected_stores: Option<BTreeSet<String>>,
    pub uber_eats_selected_stores: Option<BTreeSet<String>>,
    /// Platform-wide counts for the marketplace with no store breakdown.
    pub uber_eats_new_customers: NewCustomerTotals,
}

impl AnalysisRequest {
    /// Loads a saved request from a JSON file.
    pub fn from_json_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Saves the request as pretty-printed JSON, so a run can be repeated.
    pub fn to_json_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
