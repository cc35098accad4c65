use crate::merge::{ComparisonRecord, ComparisonTable};
use crate::rollup::{rederive_ratio_rows, SummaryTable};
use crate::schema::SummaryMetric;
use std::collections::BTreeSet;

fn summed_record(a: Option<&ComparisonRecord>, b: Option<&ComparisonRecord>) -> ComparisonRecord {
    let zero = ComparisonRecord::default();
    let a = a.unwrap_or(&zero);
    let b = b.unwrap_or(&zero);
    ComparisonRecord::from_windows(
        a.pre + b.pre,
        a.post + b.post,
        a.last_year_pre + b.last_year_pre,
        a.last_year_post + b.last_year_post,
    )
}

/// Merges two platforms' store-level tables into one: outer-join on store id,
/// absolute columns summed (missing as 0), percentage columns recomputed from
/// the summed bases. Stores with no activity in any window are dropped.
pub fn reconcile_store_tables(a: &ComparisonTable, b: &ComparisonTable) -> ComparisonTable {
    let mut store_ids: BTreeSet<&String> = BTreeSet::new();
    store_ids.extend(a.keys());
    store_ids.extend(b.keys());

    store_ids
        .into_iter()
        .filter_map(|store_id| {
            let record = summed_record(a.get(store_id), b.get(store_id));
            if record.is_all_zero() {
                None
            } else {
                Some((store_id.clone(), record))
            }
        })
        .collect()
}

/// Merges two platforms' summary tables: absolute rows are summed with
/// derived percentages recomputed, and the two ratio rows (Profitability,
/// AOV) are rebuilt from the combined Sales/Payouts/Orders bases rather than
/// combined from either side's ratios.
///
/// The New Customers row needs no special handling here: the platform with
/// no store breakdown already carries its platform-wide total in its own
/// summary row, so the sum adds that total verbatim.
pub fn reconcile_summary_tables(a: &SummaryTable, b: &SummaryTable) -> SummaryTable {
    let mut combined = SummaryTable::default();
    for metric in [
        SummaryMetric::Sales,
        SummaryMetric::Payouts,
        SummaryMetric::Orders,
        SummaryMetric::NewCustomers,
    ] {
        combined.rows.insert(
            metric,
            summed_record(a.rows.get(&metric), b.rows.get(&metric)),
        );
    }
    rederive_ratio_rows(&mut combined);
    combined
}
