use crate::aggregate::WindowTotals;
use crate::assembler::FourWindows;
use crate::schema::MetricFamily;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One store's (or one summary row's) values across the four comparison
/// windows, plus the derived comparison fields.
///
/// All absolute fields are finite; the percentage fields are finite by
/// construction (guarded division). Values stay unrounded internally —
/// rounding to one decimal happens only at presentation via [`rounded`].
///
/// [`rounded`]: ComparisonRecord::rounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub pre: f64,
    pub post: f64,
    pub last_year_pre: f64,
    pub last_year_post: f64,
    /// post − pre
    pub pre_vs_post: f64,
    /// last_year_post − last_year_pre
    pub last_year_pre_vs_post: f64,
    /// post − last_year_post
    pub yoy: f64,
    /// PrevsPost / pre × 100, 0 when pre is 0
    pub growth_pct: f64,
    /// YoY / last_year_post × 100, 0 when last_year_post is 0
    pub yoy_pct: f64,
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Percent change of `delta` against `base`, 0 on a zero base.
pub fn guarded_pct(delta: f64, base: f64) -> f64 {
    if base == 0.0 {
        0.0
    } else {
        finite_or_zero(delta / base * 100.0)
    }
}

/// Ratio of `numerator` to `denominator`, 0 on a zero denominator.
pub fn guarded_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        finite_or_zero(numerator / denominator)
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl ComparisonRecord {
    /// Builds a record from the four window values, computing every derived
    /// field per the comparison formulas.
    pub fn from_windows(pre: f64, post: f64, last_year_pre: f64, last_year_post: f64) -> Self {
        let pre = finite_or_zero(pre);
        let post = finite_or_zero(post);
        let last_year_pre = finite_or_zero(last_year_pre);
        let last_year_post = finite_or_zero(last_year_post);

        let pre_vs_post = post - pre;
        let yoy = post - last_year_post;

        Self {
            pre,
            post,
            last_year_pre,
            last_year_post,
            pre_vs_post,
            last_year_pre_vs_post: last_year_post - last_year_pre,
            yoy,
            growth_pct: guarded_pct(pre_vs_post, pre),
            yoy_pct: guarded_pct(yoy, last_year_post),
        }
    }

    pub fn is_all_zero(&self) -> bool {
        self.pre == 0.0 && self.post == 0.0 && self.last_year_pre == 0.0 && self.last_year_post == 0.0
    }

    /// Presentation copy with every field rounded to one decimal place.
    pub fn rounded(&self) -> Self {
        Self {
            pre: round1(self.pre),
            post: round1(self.post),
            last_year_pre: round1(self.last_year_pre),
            last_year_post: round1(self.last_year_post),
            pre_vs_post: round1(self.pre_vs_post),
            last_year_pre_vs_post: round1(self.last_year_pre_vs_post),
            yoy: round1(self.yoy),
            growth_pct: round1(self.growth_pct),
            yoy_pct: round1(self.yoy_pct),
        }
    }
}

/// Store id → comparison record, for one metric family.
pub type ComparisonTable = BTreeMap<String, ComparisonRecord>;

/// Outer-joins four per-window value maps on store id, filling missing
/// entries with zero, and derives the comparison fields.
pub fn merge_values(
    pre: &BTreeMap<String, f64>,
    post: &BTreeMap<String, f64>,
    last_year_pre: &BTreeMap<String, f64>,
    last_year_post: &BTreeMap<String, f64>,
) -> ComparisonTable {
    let mut store_ids: BTreeSet<&String> = BTreeSet::new();
    store_ids.extend(pre.keys());
    store_ids.extend(post.keys());
    store_ids.extend(last_year_pre.keys());
    store_ids.extend(last_year_post.keys());

    store_ids
        .into_iter()
        .map(|store_id| {
            let record = ComparisonRecord::from_windows(
                pre.get(store_id).copied().unwrap_or(0.0),
                post.get(store_id).copied().unwrap_or(0.0),
                last_year_pre.get(store_id).copied().unwrap_or(0.0),
                last_year_post.get(store_id).copied().unwrap_or(0.0),
            );
            (store_id.clone(), record)
        })
        .collect()
}

fn family_values(totals: &WindowTotals, family: MetricFamily) -> BTreeMap<String, f64> {
    totals
        .per_store
        .iter()
        .map(|(store_id, t)| {
            let value = match family {
                MetricFamily::Sales => t.sales,
                MetricFamily::Payouts => t.payouts,
                MetricFamily::Orders => t.orders as f64,
                // New-customer figures never come from transaction tables.
                MetricFamily::NewCustomers => 0.0,
            };
            (store_id.clone(), value)
        })
        .collect()
}

/// Merges the four window aggregates into a per-store comparison table for
/// one metric family.
pub fn merge(four: &FourWindows, family: MetricFamily) -> ComparisonTable {
    merge_values(
        &family_values(&four.pre_current, family),
        &family_values(&four.post_current, family),
        &family_values(&four.pre_prior, family),
        &family_values(&four.post_prior, family),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::StoreTotals;

    fn values(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries
            .iter()
            .map(|(id, v)| (id.to_string(), *v))
            .collect()
    }

    #[test]
    fn test_derived_fields() {
        let table = merge_values(
            &values(&[("S1", 300.0)]),
            &values(&[("S1", 500.0)]),
            &values(&[("S1", 250.0)]),
            &values(&[("S1", 400.0)]),
        );
        let record = table["S1"];
        assert_eq!(record.pre_vs_post, 200.0);
        assert_eq!(record.last_year_pre_vs_post, 150.0);
        assert_eq!(record.yoy, 100.0);
        assert!((record.growth_pct - 200.0 / 300.0 * 100.0).abs() < 1e-9);
        assert!((record.yoy_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_outer_union_fills_missing_with_zero() {
        let table = merge_values(
            &values(&[("S1", 100.0)]),
            &values(&[("S2", 50.0)]),
            &BTreeMap::new(),
            &BTreeMap::new(),
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table["S1"].post, 0.0);
        assert_eq!(table["S2"].pre, 0.0);
    }

    #[test]
    fn test_zero_denominator_safety() {
        let table = merge_values(
            &values(&[("S1", 0.0)]),
            &values(&[("S1", 500.0)]),
            &BTreeMap::new(),
            &values(&[("S1", 0.0)]),
        );
        let record = table["S1"];
        assert_eq!(record.growth_pct, 0.0);
        assert_eq!(record.yoy_pct, 0.0);
        assert!(record.growth_pct.is_finite());
        assert!(record.yoy_pct.is_finite());
    }

    #[test]
    fn test_rounding_is_presentation_only() {
        let record = ComparisonRecord::from_windows(3.0, 5.0, 0.0, 0.0);
        // Unrounded internally.
        assert!((record.growth_pct - 66.666_666_666).abs() < 1e-6);
        // One decimal at presentation.
        assert_eq!(record.rounded().growth_pct, 66.7);
    }

    #[test]
    fn test_merge_extracts_family_values() {
        let mut pre = WindowTotals::default();
        pre.per_store.insert(
            "S1".to_string(),
            StoreTotals {
                sales: 300.0,
                payouts: 200.0,
                orders: 3,
            },
        );
        let four = FourWindows {
            pre_current: pre,
            ..Default::default()
        };

        assert_eq!(merge(&four, MetricFamily::Sales)["S1"].pre, 300.0);
        assert_eq!(merge(&four, MetricFamily::Payouts)["S1"].pre, 200.0);
        assert_eq!(merge(&four, MetricFamily::Orders)["S1"].pre, 3.0);
    }
}
