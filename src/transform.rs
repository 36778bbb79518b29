//! Benchmark record transformer.
//!
//! Pure functions that turn raw benchmark rows into comparable values:
//! scenario selection, signature normalization, reconstruction of the
//! un-cached freshness proof and the large-scale percentage axis. Nothing here
//! mutates or caches rows; every call recomputes from its inputs.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ReportError, Result};
use crate::schema::{BenchmarkRow, Breakdown};

/// Row predicate used to pick one experiment condition out of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// Rows whose last update touched exactly this many ADSes.
    AdsModified(u32),
    /// Rows whose last update carried exactly this many signatures.
    Signatures(u64),
}

impl Selector {
    pub fn matches(&self, row: &BenchmarkRow) -> bool {
        match *self {
            Selector::AdsModified(n) => row.ads_modified_in_update == Some(n),
            Selector::Signatures(n) => row.signature_count == n,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::AdsModified(n) => write!(f, "ads_modified={n}"),
            Selector::Signatures(n) => write!(f, "signatures={n}"),
        }
    }
}

/// Signature bytes to count in an adjusted total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureOverhead {
    /// Keep the signatures each row actually carries.
    Measured,
    /// Replace each row's signatures with a fixed byte count.
    Fixed(u64),
}

impl SignatureOverhead {
    /// `count` signatures of `signature_size` bytes each.
    ///
    /// Fails with [`ReportError::Overflow`] rather than clamping.
    pub fn for_signatures(signature_size: u64, count: u64) -> Result<Self> {
        signature_bytes(signature_size, count).map(SignatureOverhead::Fixed)
    }
}

pub(crate) fn signature_bytes(signature_size: u64, count: u64) -> Result<u64> {
    signature_size
        .checked_mul(count)
        .ok_or_else(|| ReportError::overflow(format!("{count} signatures of {signature_size} bytes")))
}

impl From<u64> for SignatureOverhead {
    fn from(bytes: u64) -> Self {
        SignatureOverhead::Fixed(bytes)
    }
}

/// Rows matching `selector`, in their original order.
pub fn filter_by_scenario(rows: &[BenchmarkRow], selector: Selector) -> Result<Vec<&BenchmarkRow>> {
    let selected: Vec<&BenchmarkRow> = rows.iter().filter(|r| selector.matches(r)).collect();
    if selected.is_empty() {
        return Err(ReportError::EmptySelection(selector));
    }
    debug!(%selector, rows = selected.len(), "selected rows");
    Ok(selected)
}

fn strip_signatures(index: usize, row: &BenchmarkRow) -> Result<u64> {
    row.total_proof_byte_size
        .checked_sub(row.signatures_byte_size)
        .ok_or_else(|| {
            ReportError::integrity(
                index,
                format!(
                    "signature bytes {} exceed total proof bytes {}",
                    row.signatures_byte_size, row.total_proof_byte_size
                ),
            )
        })
}

fn adjusted_total(index: usize, row: &BenchmarkRow, overhead: SignatureOverhead) -> Result<u64> {
    let stripped = strip_signatures(index, row)?;
    let overhead = match overhead {
        SignatureOverhead::Measured => row.signatures_byte_size,
        SignatureOverhead::Fixed(bytes) => bytes,
    };
    stripped
        .checked_add(overhead)
        .ok_or_else(|| ReportError::integrity(index, "adjusted total overflows u64"))
}

/// `total - signatures + overhead` for every row.
///
/// A row whose signature bytes exceed its total is malformed and fails with
/// [`ReportError::DataIntegrity`].
pub fn adjusted_total_proof_size<R: Borrow<BenchmarkRow>>(
    rows: &[R],
    overhead: impl Into<SignatureOverhead>,
) -> Result<Vec<u64>> {
    let overhead = overhead.into();
    rows.iter()
        .enumerate()
        .map(|(i, r)| adjusted_total(i, r.borrow(), overhead))
        .collect()
}

/// Adjusted total each row would have had without freshness-proof caching.
///
/// Never smaller than the adjusted total; a row whose un-cached freshness
/// proof is smaller than the cached one fails with
/// [`ReportError::DataIntegrity`].
pub fn optimization_delta<R: Borrow<BenchmarkRow>>(
    rows: &[R],
    overhead: impl Into<SignatureOverhead>,
) -> Result<Vec<u64>> {
    let overhead = overhead.into();
    rows.iter()
        .enumerate()
        .map(|(i, r)| {
            let row = r.borrow();
            let adjusted = adjusted_total(i, row, overhead)?;
            let extra = row
                .freshness_proof_unoptimized_byte_size
                .checked_sub(row.freshness_proof_byte_size)
                .ok_or_else(|| {
                    ReportError::integrity(
                        i,
                        format!(
                            "un-cached freshness proof {} is smaller than cached {}",
                            row.freshness_proof_unoptimized_byte_size,
                            row.freshness_proof_byte_size
                        ),
                    )
                })?;
            adjusted
                .checked_add(extra)
                .ok_or_else(|| ReportError::integrity(i, "un-cached total overflows u64"))
        })
        .collect()
}

/// Size breakdown of a single representative row.
pub fn summarize_breakdown(row: Option<&BenchmarkRow>) -> Result<Breakdown> {
    let row = row.ok_or_else(|| ReportError::MissingRow("breakdown".to_string()))?;
    let size_update = strip_signatures(0, row)?;
    Ok(Breakdown {
        total: row.total_proof_byte_size,
        n_sigs: row.signature_count,
        size_sigs: row.signatures_byte_size,
        size_update,
        size_update_proof: row.update_proof_byte_size,
    })
}

/// Breakdown of the first row matching `selector`.
pub fn representative_breakdown(rows: &[BenchmarkRow], selector: Selector) -> Result<Breakdown> {
    let first = rows.iter().find(|r| selector.matches(r));
    summarize_breakdown(first).map_err(|e| match e {
        ReportError::MissingRow(_) => ReportError::MissingRow(selector.to_string()),
        other => other,
    })
}

/// Copy of `row` re-expressed as if it carried `count` signatures of
/// `signature_size` bytes each.
///
/// Total and update sizes swap the measured signature bytes for the fixed
/// ones; proof components are untouched.
pub fn normalize_signatures(row: &BenchmarkRow, signature_size: u64, count: u64) -> Result<BenchmarkRow> {
    let overhead = signature_bytes(signature_size, count)?;
    let total = adjusted_total(0, row, SignatureOverhead::Fixed(overhead))?;
    let update = row
        .update_byte_size
        .checked_sub(row.signatures_byte_size)
        .and_then(|u| u.checked_add(overhead))
        .ok_or_else(|| {
            ReportError::integrity(
                0,
                format!(
                    "signature bytes {} exceed update bytes {}",
                    row.signatures_byte_size, row.update_byte_size
                ),
            )
        })?;

    Ok(BenchmarkRow {
        signature_count: count,
        signatures_byte_size: overhead,
        update_byte_size: update,
        total_proof_byte_size: total,
        ..row.clone()
    })
}

/// `updates_since_last_refresh / ads_count * 100` for every row.
///
/// Fails with [`ReportError::DivisionByZero`] when a row has no ADS count or
/// a zero one.
pub fn percentage_ads_updated<R: Borrow<BenchmarkRow>>(rows: &[R]) -> Result<Vec<f64>> {
    rows.iter()
        .enumerate()
        .map(|(i, r)| {
            let row = r.borrow();
            match row.ads_count {
                Some(n) if n > 0 => {
                    // One division of exact integers keeps the result correctly rounded.
                    Ok((row.updates_since_last_refresh as f64 * 100.0) / n as f64)
                }
                _ => Err(ReportError::DivisionByZero { index: i }),
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn row(ads_modified: u32, total: u64, sigs_size: u64, n_sigs: u64) -> BenchmarkRow {
        BenchmarkRow {
            updates_since_last_refresh: 0,
            total_updates_processed: 0,
            ads_modified_in_update: Some(ads_modified),
            signature_count: n_sigs,
            signatures_byte_size: sigs_size,
            update_byte_size: sigs_size + 100,
            update_proof_byte_size: 100,
            freshness_proof_byte_size: 40,
            freshness_proof_unoptimized_byte_size: 90,
            total_proof_byte_size: total,
            ads_count: None,
        }
    }

    fn dataset() -> Vec<BenchmarkRow> {
        let mut rows = Vec::new();
        for step in 0..4u64 {
            for ads in 1..=3u32 {
                let mut r = row(ads, 500 + 20 * step + ads as u64 * 50, 71 * ads as u64, ads as u64);
                r.updates_since_last_refresh = step * 10;
                r.total_updates_processed = step * 10;
                rows.push(r);
            }
        }
        rows
    }

    #[test]
    fn test_filter_preserves_order() {
        let rows = dataset();
        let transfers = filter_by_scenario(&rows, Selector::AdsModified(2)).unwrap();
        assert_eq!(transfers.len(), 4);
        let xs: Vec<u64> = transfers.iter().map(|r| r.updates_since_last_refresh).collect();
        assert_eq!(xs, vec![0, 10, 20, 30]);
    }

    #[test]
    fn test_filter_by_signature_count() {
        let rows = dataset();
        let picked = filter_by_scenario(&rows, Selector::Signatures(3)).unwrap();
        assert!(picked.iter().all(|r| r.ads_modified_in_update == Some(3)));
    }

    #[test]
    fn test_filter_with_absent_selector_is_empty_selection() {
        let rows = dataset();
        let err = filter_by_scenario(&rows, Selector::AdsModified(7)).unwrap_err();
        assert!(matches!(err, ReportError::EmptySelection(Selector::AdsModified(7))));

        let err = filter_by_scenario(&rows, Selector::Signatures(4)).unwrap_err();
        assert!(matches!(err, ReportError::EmptySelection(_)));
    }

    #[test]
    fn test_rows_without_scenario_column_never_match() {
        let mut r = row(1, 500, 71, 1);
        r.ads_modified_in_update = None;
        let err = filter_by_scenario(&[r], Selector::AdsModified(1)).unwrap_err();
        assert!(matches!(err, ReportError::EmptySelection(_)));
    }

    #[test]
    fn test_adjusted_total_for_issued_row() {
        let r = row(1, 500, 71, 1);
        let overhead = SignatureOverhead::for_signatures(71, 3).unwrap();
        let adjusted = adjusted_total_proof_size(&[r], overhead).unwrap();
        assert_eq!(adjusted, vec![642]);
    }

    #[test]
    fn test_adjusted_total_accepts_raw_overhead_bytes() {
        let r = row(2, 800, 142, 2);
        assert_eq!(adjusted_total_proof_size(&[r], 213u64).unwrap(), vec![871]);
    }

    #[test]
    fn test_measured_overhead_keeps_totals() {
        let rows = dataset();
        let adjusted = adjusted_total_proof_size(&rows, SignatureOverhead::Measured).unwrap();
        let totals: Vec<u64> = rows.iter().map(|r| r.total_proof_byte_size).collect();
        assert_eq!(adjusted, totals);
    }

    #[test]
    fn test_adjusted_total_is_non_negative_on_valid_data() {
        let rows = dataset();
        for overhead in [0u64, 71, 213] {
            let selected = filter_by_scenario(&rows, Selector::AdsModified(3)).unwrap();
            let adjusted = adjusted_total_proof_size(&selected, overhead).unwrap();
            for (a, r) in adjusted.iter().zip(&selected) {
                assert_eq!(*a, r.total_proof_byte_size - r.signatures_byte_size + overhead);
            }
        }
    }

    #[test]
    fn test_signatures_larger_than_total_is_integrity_error() {
        let good = row(1, 500, 71, 1);
        let bad = row(1, 60, 71, 1);
        let err = adjusted_total_proof_size(&[good, bad], 213u64).unwrap_err();
        assert!(matches!(err, ReportError::DataIntegrity { index: 1, .. }));
    }

    #[test]
    fn test_optimization_delta_dominates_adjusted_total() {
        let rows = dataset();
        let overhead = SignatureOverhead::for_signatures(71, 3).unwrap();
        let with = adjusted_total_proof_size(&rows, overhead).unwrap();
        let without = optimization_delta(&rows, overhead).unwrap();
        for (w, wo) in with.iter().zip(&without) {
            assert!(wo >= w);
            assert_eq!(wo - w, 50);
        }
    }

    #[test]
    fn test_smaller_uncached_freshness_proof_is_integrity_error() {
        let mut r = row(2, 700, 142, 2);
        r.freshness_proof_byte_size = 300;
        r.freshness_proof_unoptimized_byte_size = 120;
        let err = optimization_delta(&[r], 213u64).unwrap_err();
        assert!(matches!(err, ReportError::DataIntegrity { index: 0, .. }));
    }

    #[test]
    fn test_breakdown_of_normalized_row() {
        let mut r = row(2, 642, 213, 3);
        r.update_proof_byte_size = 100;
        let b = summarize_breakdown(Some(&r)).unwrap();
        assert_eq!(
            b,
            Breakdown {
                total: 642,
                n_sigs: 3,
                size_sigs: 213,
                size_update: 429,
                size_update_proof: 100,
            }
        );
    }

    #[test]
    fn test_breakdown_without_row_is_missing_row() {
        assert!(matches!(summarize_breakdown(None), Err(ReportError::MissingRow(_))));

        let rows = dataset();
        let err = representative_breakdown(&rows, Selector::AdsModified(9)).unwrap_err();
        match err {
            ReportError::MissingRow(what) => assert_eq!(what, "ads_modified=9"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_representative_breakdown_uses_first_match() {
        let rows = dataset();
        let b = representative_breakdown(&rows, Selector::AdsModified(1)).unwrap();
        assert_eq!(b.total, rows[0].total_proof_byte_size);
        assert_eq!(b.n_sigs, 1);
    }

    #[test]
    fn test_normalize_swaps_signature_bytes() {
        let mut r = row(2, 700, 142, 2);
        r.update_byte_size = 400;
        let n = normalize_signatures(&r, 71, 3).unwrap();
        assert_eq!(n.signature_count, 3);
        assert_eq!(n.signatures_byte_size, 213);
        assert_eq!(n.total_proof_byte_size, 771);
        assert_eq!(n.update_byte_size, 471);
        assert_eq!(n.update_proof_byte_size, r.update_proof_byte_size);
        assert_eq!(n.ads_modified_in_update, Some(2));
    }

    #[test]
    fn test_percentage_of_ads_updated() {
        let mut r = row(1, 500, 71, 1);
        r.updates_since_last_refresh = 50;
        r.ads_count = Some(1_000_000);
        let pct = percentage_ads_updated(&[r]).unwrap();
        assert!((pct[0] - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_percentage_with_zero_or_missing_ads_count() {
        let mut zero = row(1, 500, 71, 1);
        zero.ads_count = Some(0);
        assert!(matches!(
            percentage_ads_updated(&[zero]),
            Err(ReportError::DivisionByZero { index: 0 })
        ));

        let missing = row(1, 500, 71, 1);
        assert!(matches!(
            percentage_ads_updated(&[missing]),
            Err(ReportError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_repeated_derivation_is_deterministic() {
        let rows = dataset();
        let first = {
            let sel = filter_by_scenario(&rows, Selector::AdsModified(2)).unwrap();
            adjusted_total_proof_size(&sel, 213u64).unwrap()
        };
        let second = {
            let sel = filter_by_scenario(&rows, Selector::AdsModified(2)).unwrap();
            adjusted_total_proof_size(&sel, 213u64).unwrap()
        };
        assert_eq!(first, second);
        assert_eq!(rows, dataset());
    }

    #[test]
    fn test_overflowing_signature_overhead_is_an_error() {
        assert!(matches!(
            SignatureOverhead::for_signatures(u64::MAX, 3),
            Err(ReportError::Overflow(_))
        ));
        let r = row(2, 820, 142, 2);
        assert!(matches!(
            normalize_signatures(&r, u64::MAX / 2, 3),
            Err(ReportError::Overflow(_))
        ));
    }
}
