use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One measured data point from a proof-size benchmark run.
///
/// Rows are immutable once loaded; every derived value is recomputed from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkRow {
    /// Modifications applied to other objects since this object's proof was refreshed.
    pub updates_since_last_refresh: u64,
    /// Cumulative modifications processed by the server.
    pub total_updates_processed: u64,
    /// Distinct ADSes touched by the last update (1 issue, 2 transfer, 3 loan).
    /// Absent in large-scale datasets.
    pub ads_modified_in_update: Option<u32>,
    pub signature_count: u64,
    pub signatures_byte_size: u64,
    /// Update payload size, signatures included.
    pub update_byte_size: u64,
    pub update_proof_byte_size: u64,
    /// Freshness proof size with partial-path caching applied.
    pub freshness_proof_byte_size: u64,
    /// Freshness proof size if full paths were resent every time.
    pub freshness_proof_unoptimized_byte_size: u64,
    /// End-to-end verification object size.
    pub total_proof_byte_size: u64,
    /// Number of ADSes tracked by the server (large-scale datasets only).
    pub ads_count: Option<u64>,
}

/// Canonical column identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    UpdatesSinceLastRefresh,
    TotalUpdatesProcessed,
    AdsModifiedInUpdate,
    SignatureCount,
    SignaturesByteSize,
    UpdateByteSize,
    UpdateProofByteSize,
    FreshnessProofByteSize,
    FreshnessProofUnoptimizedByteSize,
    TotalProofByteSize,
    AdsCount,
}

impl Field {
    pub const ALL: [Field; 11] = [
        Field::UpdatesSinceLastRefresh,
        Field::TotalUpdatesProcessed,
        Field::AdsModifiedInUpdate,
        Field::SignatureCount,
        Field::SignaturesByteSize,
        Field::UpdateByteSize,
        Field::UpdateProofByteSize,
        Field::FreshnessProofByteSize,
        Field::FreshnessProofUnoptimizedByteSize,
        Field::TotalProofByteSize,
        Field::AdsCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::UpdatesSinceLastRefresh => "updates_since_last_refresh",
            Field::TotalUpdatesProcessed => "total_updates_processed",
            Field::AdsModifiedInUpdate => "ads_modified_in_update",
            Field::SignatureCount => "signature_count",
            Field::SignaturesByteSize => "signatures_byte_size",
            Field::UpdateByteSize => "update_byte_size",
            Field::UpdateProofByteSize => "update_proof_byte_size",
            Field::FreshnessProofByteSize => "freshness_proof_byte_size",
            Field::FreshnessProofUnoptimizedByteSize => "freshness_proof_unoptimized_byte_size",
            Field::TotalProofByteSize => "total_proof_byte_size",
            Field::AdsCount => "ads_count",
        }
    }

    /// Whether loading fails when no header resolves to this field.
    ///
    /// The two update counters stand in for each other, so the loader checks
    /// them as a pair.
    pub fn is_required(&self) -> bool {
        !matches!(
            self,
            Field::UpdatesSinceLastRefresh
                | Field::TotalUpdatesProcessed
                | Field::AdsModifiedInUpdate
                | Field::AdsCount
        )
    }

    /// Whether an empty cell reads as "not recorded" rather than malformed.
    pub fn is_nullable(&self) -> bool {
        matches!(self, Field::AdsModifiedInUpdate | Field::AdsCount)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps on-disk header names to canonical fields.
///
/// Each field lists the headers it accepts, tried in order. The default
/// mapping covers both the per-scenario harness output and the large-scale
/// harness output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    aliases: BTreeMap<Field, Vec<String>>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        let table: [(Field, &[&str]); 11] = [
            (Field::UpdatesSinceLastRefresh, &["nUpdatesSince"]),
            (Field::TotalUpdatesProcessed, &["nUpdates"]),
            (Field::AdsModifiedInUpdate, &["nADSModifiedInLastUpdate"]),
            (Field::SignatureCount, &["nSignatures"]),
            (Field::SignaturesByteSize, &["signaturesSize"]),
            (Field::UpdateByteSize, &["lastUpdateSize", "updateSize"]),
            (Field::UpdateProofByteSize, &["updateProofSize"]),
            (Field::FreshnessProofByteSize, &["freshnessProofSize"]),
            (
                Field::FreshnessProofUnoptimizedByteSize,
                &["freshnessProofNoOptimizationSize"],
            ),
            (Field::TotalProofByteSize, &["proofSizeTotal"]),
            (Field::AdsCount, &["nADSes"]),
        ];

        let aliases = table
            .into_iter()
            .map(|(field, names)| (field, names.iter().map(|s| s.to_string()).collect()))
            .collect();
        Self { aliases }
    }
}

impl ColumnMapping {
    /// Replace the accepted headers for one field.
    pub fn with_override(mut self, field: Field, headers: Vec<String>) -> Self {
        self.aliases.insert(field, headers);
        self
    }

    pub fn aliases(&self, field: Field) -> &[String] {
        self.aliases.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Index of the first header accepted for `field`, if any.
    pub fn resolve(&self, field: Field, headers: &[&str]) -> Option<usize> {
        self.aliases(field).iter().find_map(|alias| {
            headers
                .iter()
                .position(|h| h.trim() == alias.as_str())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    Triangle,
    Circle,
    Square,
    Diamond,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    Solid,
    Dashed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Red,
    Blue,
    Green,
    Black,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesStyle {
    pub color: Color,
    pub marker: Marker,
    pub line: LineStyle,
}

/// Which row attribute a series uses as its x-axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XAxis {
    UpdatesSinceLastRefresh,
    TotalUpdatesProcessed,
    PercentAdsUpdated,
}

impl XAxis {
    pub fn label(&self) -> &'static str {
        match self {
            XAxis::UpdatesSinceLastRefresh => "updates since last refresh",
            XAxis::TotalUpdatesProcessed => "total updates processed",
            XAxis::PercentAdsUpdated => "% of ADSes updated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A named, ordered sequence of points backing one plotted line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedSeries {
    pub label: String,
    pub x_axis: XAxis,
    pub style: SeriesStyle,
    pub points: Vec<Point>,
}

impl DerivedSeries {
    /// Zip `xs` and `ys` into points; both come from the same row selection.
    pub fn new(
        label: impl Into<String>,
        x_axis: XAxis,
        style: SeriesStyle,
        xs: impl IntoIterator<Item = f64>,
        ys: impl IntoIterator<Item = f64>,
    ) -> Self {
        let points = xs
            .into_iter()
            .zip(ys)
            .map(|(x, y)| Point { x, y })
            .collect();
        Self {
            label: label.into(),
            x_axis,
            style,
            points,
        }
    }
}

/// Size breakdown of one verification object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub total: u64,
    pub n_sigs: u64,
    pub size_sigs: u64,
    /// `total` minus signature bytes.
    pub size_update: u64,
    pub size_update_proof: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioBreakdown {
    pub scenario: String,
    pub breakdown: Breakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub tool_version: String,
    pub view: String,
    pub sources: Vec<SourceMeta>,
    pub signature_size: u64,
    pub target_signatures: u64,
    pub timestamp_utc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub path: String,
    pub sha256: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofSizeReport {
    pub run: RunMeta,
    pub series: Vec<DerivedSeries>,
    pub breakdowns: Vec<ScenarioBreakdown>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping_resolves_both_header_variants() {
        let mapping = ColumnMapping::default();

        let scenario = ["nUpdatesSince", "lastUpdateSize", "proofSizeTotal"];
        assert_eq!(mapping.resolve(Field::UpdateByteSize, &scenario), Some(1));
        assert_eq!(mapping.resolve(Field::TotalProofByteSize, &scenario), Some(2));

        let large_scale = ["nADSes", "nUpdates", "updateSize"];
        assert_eq!(mapping.resolve(Field::UpdateByteSize, &large_scale), Some(2));
        assert_eq!(mapping.resolve(Field::AdsCount, &large_scale), Some(0));
        assert_eq!(mapping.resolve(Field::UpdatesSinceLastRefresh, &large_scale), None);
    }

    #[test]
    fn test_resolve_ignores_surrounding_whitespace() {
        let mapping = ColumnMapping::default();
        let headers = [" nSignatures ", "signaturesSize"];
        assert_eq!(mapping.resolve(Field::SignatureCount, &headers), Some(0));
    }

    #[test]
    fn test_override_replaces_aliases() {
        let mapping = ColumnMapping::default()
            .with_override(Field::TotalProofByteSize, vec!["rawProofSize".to_string()]);
        assert_eq!(
            mapping.resolve(Field::TotalProofByteSize, &["proofSizeTotal", "rawProofSize"]),
            Some(1)
        );
    }

    #[test]
    fn test_series_points_follow_input_order() {
        let style = SeriesStyle {
            color: Color::Red,
            marker: Marker::Triangle,
            line: LineStyle::Solid,
        };
        let s = DerivedSeries::new(
            "issued",
            XAxis::UpdatesSinceLastRefresh,
            style,
            [0.0, 10.0, 20.0],
            [500.0, 520.0, 540.0],
        );
        assert_eq!(s.points.len(), 3);
        assert_eq!(s.points[1], Point { x: 10.0, y: 520.0 });
    }
}
