use crate::aggregate::WindowTotals;
use crate::window::DateRange;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Memoization key for one (table, window, exclusions, payout column)
/// aggregation. The payout column is part of the key because the same range
/// can be aggregated under different payout columns: a prior-year window can
/// cover the same dates as a current-year window when the pre/post ranges
/// span different calendar years.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub table_fingerprint: u64,
    pub range: DateRange,
    /// Sorted, so the same exclusion set always yields the same key.
    pub excluded: Vec<NaiveDate>,
    pub payout_column: usize,
}

impl WindowKey {
    pub fn new(
        table_fingerprint: u64,
        range: DateRange,
        excluded: &std::collections::BTreeSet<NaiveDate>,
        payout_column: usize,
    ) -> Self {
        Self {
            table_fingerprint,
            range,
            excluded: excluded.iter().copied().collect(),
            payout_column,
        }
    }
}

/// Explicit per-run cache of window aggregations.
///
/// Entries derive purely from immutable inputs, so there is no invalidation
/// beyond key mismatch; recompute-and-overwrite on collision is always safe.
#[derive(Debug, Default)]
pub struct WindowCache {
    entries: HashMap<WindowKey, WindowTotals>,
}

impl WindowCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_or_compute<F>(&mut self, key: WindowKey, compute: F) -> WindowTotals
    where
        F: FnOnce() -> WindowTotals,
    {
        self.entries.entry(key).or_insert_with(compute).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::StoreTotals;
    use std::collections::BTreeSet;

    fn sample_totals(sales: f64) -> WindowTotals {
        let mut totals = WindowTotals::default();
        totals.per_store.insert(
            "S1".to_string(),
            StoreTotals {
                sales,
                payouts: 0.0,
                orders: 0,
            },
        );
        totals
    }

    fn key(fingerprint: u64, payout_column: usize) -> WindowKey {
        let range = DateRange::new(
            chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        );
        WindowKey::new(fingerprint, range, &BTreeSet::new(), payout_column)
    }

    #[test]
    fn test_second_lookup_skips_compute() {
        let mut cache = WindowCache::new();
        let first = cache.get_or_compute(key(1, 3), || sample_totals(100.0));
        let second = cache.get_or_compute(key(1, 3), || panic!("must not recompute"));
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_keys_compute_independently() {
        let mut cache = WindowCache::new();
        cache.get_or_compute(key(1, 3), || sample_totals(100.0));
        let other = cache.get_or_compute(key(2, 3), || sample_totals(200.0));
        assert_eq!(other.sales_of("S1"), 200.0);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_payout_column_distinguishes_same_range() {
        // Same table and range aggregated under a different payout column
        // must not share an entry.
        let mut cache = WindowCache::new();
        cache.get_or_compute(key(1, 3), || sample_totals(100.0));
        let other = cache.get_or_compute(key(1, 4), || sample_totals(200.0));
        assert_eq!(other.sales_of("S1"), 200.0);
        assert_eq!(cache.len(), 2);
    }
}
