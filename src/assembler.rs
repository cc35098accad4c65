use crate::aggregate::{aggregate, ValueColumns, WindowTotals};
use crate::cache::{WindowCache, WindowKey};
use crate::schema::{DateColumn, PlatformConfig, WindowEpoch};
use crate::table::{resolve_column, resolve_store_column, RawTable, TableOutcome};
use crate::window::{filter_window, DateRange};
use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::BTreeSet;

/// The four comparison windows of one analysis run: the operator-entered
/// pre/post pair and the calendar-shifted prior-year pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    pub pre_current: DateRange,
    pub post_current: DateRange,
    pub pre_prior: DateRange,
    pub post_prior: DateRange,
}

impl WindowPlan {
    /// Both current ranges are mandatory; the prior-year pair is always
    /// derivable and never independently required.
    pub fn from_ranges(pre: DateRange, post: DateRange) -> Self {
        Self {
            pre_current: pre,
            post_current: post,
            pre_prior: pre.shift_back_one_year(),
            post_prior: post.shift_back_one_year(),
        }
    }
}

/// Per-window aggregates for one platform table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FourWindows {
    pub pre_current: WindowTotals,
    pub post_current: WindowTotals,
    pub pre_prior: WindowTotals,
    pub post_prior: WindowTotals,
}

fn missing_column(table: &RawTable, tried: &[String]) -> String {
    format!(
        "{}: column not found, tried {:?}; available columns include {:?}",
        table.source,
        tried,
        table.column_sample()
    )
}

fn resolve_date_column(table: &RawTable, config: &PlatformConfig) -> Result<usize, String> {
    match &config.date_column {
        DateColumn::ByName(candidates) => resolve_column(&table.headers, candidates)
            .ok_or_else(|| missing_column(table, candidates)),
        DateColumn::ByIndex(index) => {
            if table.headers.len() > *index {
                Ok(*index)
            } else {
                Err(format!(
                    "{}: expected at least {} columns for the positional date column, found {}",
                    table.source,
                    index + 1,
                    table.headers.len()
                ))
            }
        }
    }
}

/// Slices one platform table into the four comparison windows and aggregates
/// each by store identifier.
///
/// Schema problems are recovered into `TableOutcome::Missing` with the
/// attempted names recorded, never a panic or a hard error; an epoch whose
/// payout column is absent yields empty totals for that epoch's two windows
/// while the other epoch still aggregates.
pub fn assemble(
    table: &RawTable,
    config: &PlatformConfig,
    plan: &WindowPlan,
    excluded: &BTreeSet<NaiveDate>,
    cache: &mut WindowCache,
    diagnostics: &mut Vec<String>,
) -> TableOutcome<FourWindows> {
    let date_column = match resolve_date_column(table, config) {
        Ok(index) => index,
        Err(reason) => {
            warn!("{}", reason);
            diagnostics.push(reason.clone());
            return TableOutcome::Missing { reason };
        }
    };

    let store_column = match resolve_store_column(&table.headers, &config.store_column_candidates) {
        Some(index) => index,
        None => {
            let reason = missing_column(table, &config.store_column_candidates);
            warn!("{}", reason);
            diagnostics.push(reason.clone());
            return TableOutcome::Missing { reason };
        }
    };

    let sales_column = match resolve_column(&table.headers, &[config.sales_column.clone()]) {
        Some(index) => index,
        None => {
            let reason = missing_column(table, &[config.sales_column.clone()]);
            warn!("{}", reason);
            diagnostics.push(reason.clone());
            return TableOutcome::Missing { reason };
        }
    };

    let order_column = match resolve_column(&table.headers, &[config.order_column.clone()]) {
        Some(index) => index,
        None => {
            let reason = missing_column(table, &[config.order_column.clone()]);
            warn!("{}", reason);
            diagnostics.push(reason.clone());
            return TableOutcome::Missing { reason };
        }
    };

    // Resolved once per epoch so a missing payout column is reported once,
    // not once per window.
    let mut resolve_payout = |epoch: WindowEpoch| -> Option<usize> {
        let candidates = config.payout_candidates(epoch);
        match resolve_column(&table.headers, &candidates) {
            Some(index) => Some(index),
            None => {
                let reason = missing_column(table, &candidates);
                warn!("{}", reason);
                diagnostics.push(reason);
                None
            }
        }
    };
    let current_payout = resolve_payout(WindowEpoch::Current);
    let prior_payout = resolve_payout(WindowEpoch::PriorYear);

    let mut run_window = |range: DateRange, payout_column: Option<usize>| -> WindowTotals {
        let payout_column = match payout_column {
            Some(index) => index,
            None => return WindowTotals::default(),
        };

        let columns = ValueColumns {
            store: store_column,
            sales: sales_column,
            payouts: payout_column,
            orders: order_column,
        };

        // The payout column is part of the key: when the pre/post ranges sit
        // in different calendar years, a prior-year window can cover the same
        // dates as a current-year window while reading a different column.
        let key = WindowKey::new(table.fingerprint(), range, excluded, payout_column);
        cache.get_or_compute(key, || {
            let rows = filter_window(table, date_column, range, excluded);
            debug!(
                "{}: window {} - {} kept {} of {} rows",
                table.source,
                range.start,
                range.end,
                rows.len(),
                table.rows.len()
            );
            aggregate(table, &rows, &columns)
        })
    };

    TableOutcome::Ready(FourWindows {
        pre_current: run_window(plan.pre_current, current_payout),
        post_current: run_window(plan.post_current, current_payout),
        pre_prior: run_window(plan.pre_prior, prior_payout),
        post_prior: run_window(plan.post_prior, prior_payout),
    })
}
