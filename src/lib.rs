//! # Delivery Report Builder
//!
//! A library for turning delivery-platform transaction exports (two
//! marketplaces, each with its own schema and calendar conventions) into
//! comparative "pre vs post" and year-over-year performance reports, broken
//! down per store and aggregated across a selected store set.
//!
//! ## Core Concepts
//!
//! - **Pre/Post windows**: two operator-chosen comparison periods in the
//!   current year; their prior-year equivalents are derived by calendar-aware
//!   year subtraction.
//! - **Four-window assembly**: every metric family is aggregated over
//!   pre/post × current/prior-year, per platform.
//! - **Reconciliation**: the two platforms' store tables and summaries are
//!   merged by summing absolute values and recomputing every percentage from
//!   the summed bases, never by averaging ratios.
//! - **Recoverable schema problems**: a missing column or date range yields a
//!   reported diagnostic and an empty table, never a crash; an empty window
//!   is a valid all-zero result.
//!
//! ## Example
//!
//! ```rust,ignore
//! use delivery_report_builder::*;
//! use chrono::NaiveDate;
//!
//! let request = AnalysisRequest {
//!     doordash_file: Some("dd-data.csv".into()),
//!     uber_eats_file: Some("ue-data.csv".into()),
//!     pre_range: Some(DateRange::new(
//!         NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
//!     )),
//!     post_range: Some(DateRange::new(
//!         NaiveDate::from_ymd_opt(2025, 1, 16).unwrap(),
//!         NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
//!     )),
//!     ..Default::default()
//! };
//!
//! let report = run_analysis(&request).unwrap();
//! println!("{} combined stores", report.combined_sales.len());
//! ```

pub mod aggregate;
pub mod assembler;
pub mod cache;
pub mod error;
pub mod loader;
pub mod marketing;
pub mod merge;
pub mod reconcile;
pub mod rollup;
pub mod schema;
pub mod table;
pub mod window;

pub use aggregate::{aggregate, StoreTotals, ValueColumns, WindowTotals};
pub use assembler::{assemble, FourWindows, WindowPlan};
pub use cache::{WindowCache, WindowKey};
pub use error::{ReportError, Result};
pub use loader::{load_marketing_dir, read_table};
pub use marketing::{
    campaign_pivot, combine_pivots, new_customer_table, platform_wide_total, CampaignStats,
    MarketingFiles,
};
pub use merge::{merge, merge_values, ComparisonRecord, ComparisonTable};
pub use reconcile::{reconcile_store_tables, reconcile_summary_tables};
pub use rollup::{
    pre_post_rows, rollup, yoy_rows, NewCustomerRollup, PrePostRow, SummaryTable, YoyRow,
};
pub use schema::{
    AnalysisRequest, MetricFamily, NewCustomerTotals, Platform, PlatformConfig, SummaryMetric,
    WindowEpoch,
};
pub use table::{resolve_column, resolve_store_column, RawTable, TableOutcome};
pub use window::{normalize_excluded_dates, DateRange, ExcludedDate};

use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Everything computed for one platform: the four store-level comparison
/// tables plus the summary roll-up.
#[derive(Debug, Clone, Default)]
pub struct PlatformReport {
    pub sales: ComparisonTable,
    pub payouts: ComparisonTable,
    pub orders: ComparisonTable,
    /// Always empty for the platform that reports new customers only as a
    /// platform-wide total.
    pub new_customers: ComparisonTable,
    pub summary: SummaryTable,
}

/// Campaign-ownership pivots derived from the marketing file family.
#[derive(Debug, Clone, Default)]
pub struct CampaignReport {
    pub promotions: BTreeMap<String, CampaignStats>,
    pub sponsored: BTreeMap<String, CampaignStats>,
    pub combined: BTreeMap<String, CampaignStats>,
}

/// The full result of one analysis run. Every table is freshly recomputed
/// per run; nothing here survives an input change.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub doordash: PlatformReport,
    pub uber_eats: PlatformReport,
    pub combined_sales: ComparisonTable,
    pub combined_payouts: ComparisonTable,
    pub combined_orders: ComparisonTable,
    pub combined_new_customers: ComparisonTable,
    pub combined_summary: SummaryTable,
    pub campaigns: CampaignReport,
    /// Every recovered schema or range problem, for the caller to surface.
    pub diagnostics: Vec<String>,
}

pub struct AnalysisProcessor;

impl AnalysisProcessor {
    pub fn process(request: &AnalysisRequest) -> Result<AnalysisReport> {
        let (pre, post) = match (request.pre_range, request.post_range) {
            (Some(pre), Some(post)) => (pre, post),
            _ => {
                let reason = ReportError::MissingDateRange.to_string();
                warn!("{}", reason);
                return Ok(AnalysisReport {
                    diagnostics: vec![reason],
                    ..Default::default()
                });
            }
        };

        let plan = WindowPlan::from_ranges(pre, post);
        let excluded = normalize_excluded_dates(&request.excluded_dates);
        let mut cache = WindowCache::new();
        let mut diagnostics = Vec::new();

        info!(
            "Analysis run: pre {} - {}, post {} - {}, {} excluded dates",
            pre.start,
            pre.end,
            post.start,
            post.end,
            excluded.len()
        );

        let dd_windows = load_and_assemble(
            request.doordash_file.as_deref(),
            &PlatformConfig::doordash(),
            &plan,
            &excluded,
            &mut cache,
            &mut diagnostics,
        );
        let ue_windows = load_and_assemble(
            request.uber_eats_file.as_deref(),
            &PlatformConfig::uber_eats(),
            &plan,
            &excluded,
            &mut cache,
            &mut diagnostics,
        );

        let marketing = match request.marketing_dir.as_deref() {
            Some(path) => match load_marketing_dir(path) {
                Ok(files) => files,
                Err(error) => {
                    let reason = format!("marketing directory: {}", error);
                    warn!("{}", reason);
                    diagnostics.push(reason);
                    MarketingFiles::default()
                }
            },
            None => MarketingFiles::default(),
        };

        let dd_new_customers = new_customer_table(&marketing.promotions, &plan, &excluded);

        let mut doordash = platform_tables(&dd_windows);
        doordash.new_customers = dd_new_customers;
        doordash.summary = rollup(
            &doordash.sales,
            &doordash.payouts,
            &doordash.orders,
            NewCustomerRollup::PerStore(&doordash.new_customers),
            &effective_selection(&doordash.sales, request.doordash_selected_stores.as_ref()),
        );

        let mut uber_eats = platform_tables(&ue_windows);
        uber_eats.summary = rollup(
            &uber_eats.sales,
            &uber_eats.payouts,
            &uber_eats.orders,
            NewCustomerRollup::PlatformWide(&request.uber_eats_new_customers),
            &effective_selection(&uber_eats.sales, request.uber_eats_selected_stores.as_ref()),
        );

        let promotions = campaign_pivot(
            &marketing.promotions,
            marketing::PROMOTION_SPEND_COLUMN,
            plan.post_current,
            &excluded,
        );
        let sponsored = campaign_pivot(
            &marketing.sponsored,
            marketing::SPONSORED_SPEND_COLUMN,
            plan.post_current,
            &excluded,
        );
        let combined_campaigns = combine_pivots(&promotions, &sponsored);

        let report = AnalysisReport {
            combined_sales: reconcile_store_tables(&doordash.sales, &uber_eats.sales),
            combined_payouts: reconcile_store_tables(&doordash.payouts, &uber_eats.payouts),
            combined_orders: reconcile_store_tables(&doordash.orders, &uber_eats.orders),
            combined_new_customers: reconcile_store_tables(
                &doordash.new_customers,
                &uber_eats.new_customers,
            ),
            combined_summary: reconcile_summary_tables(&doordash.summary, &uber_eats.summary),
            campaigns: CampaignReport {
                promotions,
                sponsored,
                combined: combined_campaigns,
            },
            doordash,
            uber_eats,
            diagnostics,
        };

        Ok(report)
    }
}

/// Runs the full pipeline for one immutable request: load, four-window
/// assembly, merge, roll-up, cross-platform reconciliation.
pub fn run_analysis(request: &AnalysisRequest) -> Result<AnalysisReport> {
    AnalysisProcessor::process(request)
}

/// Reads and assembles one platform's export. A missing path, unreadable
/// file, or unusable schema becomes a diagnostic and empty windows so the
/// other platform's results still complete.
fn load_and_assemble(
    path: Option<&std::path::Path>,
    config: &PlatformConfig,
    plan: &WindowPlan,
    excluded: &BTreeSet<chrono::NaiveDate>,
    cache: &mut WindowCache,
    diagnostics: &mut Vec<String>,
) -> FourWindows {
    let path = match path {
        Some(path) => path,
        None => return FourWindows::default(),
    };

    let table = match read_table(path, config.header_row_offset) {
        Ok(table) => table,
        Err(error) => {
            let reason = format!("{}: {}", config.platform.label(), error);
            warn!("{}", reason);
            diagnostics.push(reason);
            return FourWindows::default();
        }
    };

    match assemble(&table, config, plan, excluded, cache, diagnostics) {
        TableOutcome::Ready(windows) => windows,
        TableOutcome::Missing { .. } => FourWindows::default(),
    }
}

fn platform_tables(windows: &FourWindows) -> PlatformReport {
    PlatformReport {
        sales: merge(windows, MetricFamily::Sales),
        payouts: merge(windows, MetricFamily::Payouts),
        orders: merge(windows, MetricFamily::Orders),
        new_customers: ComparisonTable::new(),
        summary: SummaryTable::default(),
    }
}

/// `None` means no selection was made: every store in the table is included.
fn effective_selection(
    sales: &ComparisonTable,
    selected: Option<&BTreeSet<String>>,
) -> BTreeSet<String> {
    match selected {
        Some(set) => set.clone(),
        None => sales.keys().cloned().collect(),
    }
}
