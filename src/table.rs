use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// An in-memory export table: trimmed header names plus string cells exactly
/// as read. Immutable once built; the pipeline only filters and groups it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    /// Where the table came from, for diagnostics only.
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Cheap identity key for memoization: source plus header shape plus row
    /// count. Collisions overwrite with a recomputed value, which is safe
    /// because entries derive purely from immutable inputs.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.source.hash(&mut hasher);
        self.headers.hash(&mut hasher);
        self.rows.len().hash(&mut hasher);
        hasher.finish()
    }

    /// A leading slice of column names for schema-mismatch diagnostics.
    pub fn column_sample(&self) -> Vec<String> {
        self.headers.iter().take(10).cloned().collect()
    }
}

/// Finds a column among naming variants: one exact case-sensitive pass over
/// `candidates` in listed order, then one case-insensitive pass in the same
/// order. Returns the column index, or `None` when nothing matches — callers
/// must treat `None` as "this table cannot be aggregated" and report the
/// names that were tried.
pub fn resolve_column<S: AsRef<str>>(headers: &[String], candidates: &[S]) -> Option<usize> {
    for candidate in candidates {
        if let Some(index) = headers.iter().position(|h| h == candidate.as_ref()) {
            return Some(index);
        }
    }

    for candidate in candidates {
        let wanted = candidate.as_ref().to_lowercase();
        if let Some(index) = headers.iter().position(|h| h.to_lowercase() == wanted) {
            return Some(index);
        }
    }

    None
}

/// Store-identifier resolution: the two canonical labels, same fallback
/// discipline as [`resolve_column`].
pub fn resolve_store_column(headers: &[String], candidates: &[String]) -> Option<usize> {
    resolve_column(headers, candidates)
}

/// Outcome of locating and aggregating one table: either a value, or a
/// recorded reason the table could not be used. Distinguishes "empty on
/// purpose" (a `Ready` value with no rows) from "could not compute".
#[derive(Debug, Clone, PartialEq)]
pub enum TableOutcome<T> {
    Ready(T),
    Missing { reason: String },
}

impl<T> TableOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            TableOutcome::Ready(value) => Some(value),
            TableOutcome::Missing { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            TableOutcome::Ready(_) => None,
            TableOutcome::Missing { reason } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_exact_match_beats_case_insensitive() {
        let cols = headers(&["date", "Date"]);
        // "Date" matches exactly at index 1 even though "date" would match
        // case-insensitively at index 0.
        assert_eq!(resolve_column(&cols, &["Date"]), Some(1));
    }

    #[test]
    fn test_candidate_order_wins_over_header_order() {
        let cols = headers(&["Store ID", "Merchant store ID"]);
        assert_eq!(
            resolve_column(&cols, &["Merchant store ID", "Store ID"]),
            Some(1)
        );
    }

    #[test]
    fn test_case_insensitive_fallback() {
        let cols = headers(&["TIMESTAMP LOCAL DATE", "Subtotal"]);
        assert_eq!(resolve_column(&cols, &["Timestamp local date"]), Some(0));
    }

    #[test]
    fn test_not_found_is_none_not_panic() {
        let cols = headers(&["Foo", "Bar"]);
        assert_eq!(resolve_column(&cols, &["Date"]), None);
    }

    #[test]
    fn test_store_column_two_name_special_case() {
        let candidates = vec!["Store ID".to_string(), "Shop ID".to_string()];
        let cols = headers(&["Shop ID", "Sales"]);
        assert_eq!(resolve_store_column(&cols, &candidates), Some(0));
        let cols = headers(&["Sales"]);
        assert_eq!(resolve_store_column(&cols, &candidates), None);
    }

    #[test]
    fn test_fingerprint_stable_for_identical_tables() {
        let table = RawTable {
            source: "a.csv".to_string(),
            headers: headers(&["Date", "Subtotal"]),
            rows: vec![vec!["01/01/2025".to_string(), "10".to_string()]],
        };
        assert_eq!(table.fingerprint(), table.clone().fingerprint());
    }
}
