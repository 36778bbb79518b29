//! Reporting views over the transformer, and the console/JSON sinks.
//!
//! Views only compute; each returns series and breakdowns ready for a
//! charting or console sink. Any transformer error aborts the view.

use std::collections::BTreeMap;
use std::io::{self, Write};

use tracing::info;

use crate::config::ReportConfig;
use crate::error::Result;
use crate::schema::{
    BenchmarkRow, Color, DerivedSeries, LineStyle, Marker, ProofSizeReport, ScenarioBreakdown,
    SeriesStyle, XAxis,
};
use crate::transform::{
    adjusted_total_proof_size, filter_by_scenario, normalize_signatures, optimization_delta,
    percentage_ads_updated, representative_breakdown, SignatureOverhead, Selector,
};
use crate::Scenario;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    ProofSizes,
    Optimization,
    Breakdown,
    Scale,
    Signatures,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::ProofSizes => "proof-sizes",
            View::Optimization => "optimization",
            View::Breakdown => "breakdown",
            View::Scale => "scale",
            View::Signatures => "signatures",
        }
    }
}

/// What one view produced.
#[derive(Debug, Clone, Default)]
pub struct ViewOutput {
    pub series: Vec<DerivedSeries>,
    pub breakdowns: Vec<ScenarioBreakdown>,
}

const PALETTE: [(Color, Marker); 4] = [
    (Color::Red, Marker::Triangle),
    (Color::Blue, Marker::Circle),
    (Color::Green, Marker::Square),
    (Color::Black, Marker::Diamond),
];

fn scenario_style(scenario: Scenario, line: LineStyle) -> SeriesStyle {
    SeriesStyle {
        color: scenario.color(),
        marker: scenario.marker(),
        line,
    }
}

fn palette_style(i: usize, line: LineStyle) -> SeriesStyle {
    let (color, marker) = PALETTE[i % PALETTE.len()];
    SeriesStyle { color, marker, line }
}

fn as_f64(values: Vec<u64>) -> impl Iterator<Item = f64> {
    values.into_iter().map(|v| v as f64)
}

fn x_values(rows: &[&BenchmarkRow], axis: XAxis) -> Result<Vec<f64>> {
    match axis {
        XAxis::UpdatesSinceLastRefresh => Ok(rows
            .iter()
            .map(|r| r.updates_since_last_refresh as f64)
            .collect()),
        XAxis::TotalUpdatesProcessed => Ok(rows
            .iter()
            .map(|r| r.total_updates_processed as f64)
            .collect()),
        XAxis::PercentAdsUpdated => percentage_ads_updated(rows),
    }
}

fn scenario_series(
    rows: &[BenchmarkRow],
    cfg: &ReportConfig,
    axis: XAxis,
    label_suffix: &str,
) -> Result<Vec<DerivedSeries>> {
    Scenario::ALL
        .iter()
        .map(|&scenario| {
            let selected = filter_by_scenario(rows, scenario.selector())?;
            let ys = adjusted_total_proof_size(&selected, cfg.overhead_for(scenario)?)?;
            Ok(DerivedSeries::new(
                format!("{}{label_suffix}", scenario.as_str()),
                axis,
                scenario_style(scenario, LineStyle::Solid),
                x_values(&selected, axis)?,
                as_f64(ys),
            ))
        })
        .collect()
}

/// Proof size against updates since refresh, one series per receipt event.
pub fn proof_sizes(rows: &[BenchmarkRow], cfg: &ReportConfig) -> Result<Vec<DerivedSeries>> {
    info!(rows = rows.len(), "computing proof sizes");
    scenario_series(rows, cfg, XAxis::UpdatesSinceLastRefresh, "")
}

/// Proof size with and without freshness-proof caching.
pub fn optimization_impact(rows: &[BenchmarkRow], cfg: &ReportConfig) -> Result<Vec<DerivedSeries>> {
    info!(rows = rows.len(), "computing caching optimization impact");
    let axis = XAxis::TotalUpdatesProcessed;
    let mut series = scenario_series(rows, cfg, axis, " with optimization")?;

    for scenario in Scenario::ALL {
        let selected = filter_by_scenario(rows, scenario.selector())?;
        let ys = optimization_delta(&selected, cfg.overhead_for(scenario)?)?;
        series.push(DerivedSeries::new(
            format!("{} without optimization", scenario.as_str()),
            axis,
            scenario_style(scenario, LineStyle::Dashed),
            x_values(&selected, axis)?,
            as_f64(ys),
        ));
    }
    Ok(series)
}

/// Size breakdown of the first row of each receipt event.
///
/// Transfers and loans are re-expressed on the target signature basis first.
pub fn breakdowns(rows: &[BenchmarkRow], cfg: &ReportConfig) -> Result<Vec<ScenarioBreakdown>> {
    info!(rows = rows.len(), "computing proof size breakdown");
    Scenario::ALL
        .iter()
        .map(|&scenario| {
            let selector = scenario.selector();
            let breakdown = if scenario.normalizes_signatures() {
                let normalized = rows
                    .iter()
                    .filter(|r| selector.matches(r))
                    .take(1)
                    .map(|r| normalize_signatures(r, cfg.signature_size, cfg.target_signatures))
                    .collect::<Result<Vec<_>>>()?;
                representative_breakdown(&normalized, selector)?
            } else {
                representative_breakdown(rows, selector)?
            };

            Ok(ScenarioBreakdown {
                scenario: scenario.as_str().to_string(),
                breakdown,
            })
        })
        .collect()
}

/// Proof size against the share of ADSes updated, one pair of series per
/// server size.
pub fn scale(rows: &[BenchmarkRow]) -> Result<Vec<DerivedSeries>> {
    info!(rows = rows.len(), "computing large-scale proof sizes");
    // Validates every row's ADS count before grouping.
    percentage_ads_updated(rows)?;

    let mut groups: BTreeMap<u64, Vec<&BenchmarkRow>> = BTreeMap::new();
    for r in rows {
        if let Some(n) = r.ads_count {
            groups.entry(n).or_default().push(r);
        }
    }

    let axis = XAxis::PercentAdsUpdated;
    let mut series = Vec::with_capacity(groups.len() * 2);
    for (i, (ads_count, group)) in groups.iter().enumerate() {
        let xs = x_values(group, axis)?;
        let with = adjusted_total_proof_size(group, SignatureOverhead::Measured)?;
        let without = optimization_delta(group, SignatureOverhead::Measured)?;

        series.push(DerivedSeries::new(
            format!("{ads_count} ADSes"),
            axis,
            palette_style(i, LineStyle::Solid),
            xs.clone(),
            as_f64(with),
        ));
        series.push(DerivedSeries::new(
            format!("{ads_count} ADSes without optimization"),
            axis,
            palette_style(i, LineStyle::Dashed),
            xs,
            as_f64(without),
        ));
    }
    Ok(series)
}

/// Proof size for each configured signature count.
pub fn signatures(rows: &[BenchmarkRow], cfg: &ReportConfig) -> Result<Vec<DerivedSeries>> {
    info!(rows = rows.len(), counts = ?cfg.signature_counts, "computing signature-count comparison");
    let axis = XAxis::UpdatesSinceLastRefresh;
    cfg.signature_counts
        .iter()
        .enumerate()
        .map(|(i, &count)| {
            let selected = filter_by_scenario(rows, Selector::Signatures(count))?;
            let ys = adjusted_total_proof_size(&selected, SignatureOverhead::Measured)?;
            Ok(DerivedSeries::new(
                format!("{count} signatures"),
                axis,
                palette_style(i, LineStyle::Solid),
                x_values(&selected, axis)?,
                as_f64(ys),
            ))
        })
        .collect()
}

pub fn run_view(view: View, rows: &[BenchmarkRow], cfg: &ReportConfig) -> Result<ViewOutput> {
    let mut out = ViewOutput::default();
    match view {
        View::ProofSizes => out.series = proof_sizes(rows, cfg)?,
        View::Optimization => out.series = optimization_impact(rows, cfg)?,
        View::Breakdown => out.breakdowns = breakdowns(rows, cfg)?,
        View::Scale => out.series = scale(rows)?,
        View::Signatures => out.series = signatures(rows, cfg)?,
    }
    Ok(out)
}

fn format_x(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{x:.4}")
    }
}

/// Console sink: series as two-column tables, breakdowns as key/value lines.
pub fn write_text<W: Write>(mut out: W, report: &ProofSizeReport) -> io::Result<()> {
    for source in &report.run.sources {
        writeln!(out, "# {} ({} rows, sha256 {})", source.path, source.rows, &source.sha256[..12.min(source.sha256.len())])?;
    }

    for s in &report.series {
        writeln!(out, "== {} [{} vs proof bytes]", s.label, s.x_axis.label())?;
        for p in &s.points {
            writeln!(out, "{:>12}  {:>10}", format_x(p.x), p.y as u64)?;
        }
    }

    for sb in &report.breakdowns {
        let b = &sb.breakdown;
        writeln!(out, "-------- verification object for {} receipt ----------", sb.scenario)?;
        writeln!(out, "total: {}", b.total)?;
        writeln!(out, "# sigs: {}", b.n_sigs)?;
        writeln!(out, "size sigs: {}", b.size_sigs)?;
        writeln!(out, "size update: {}", b.size_update)?;
        writeln!(out, "size update proof: {}", b.size_update_proof)?;
    }
    Ok(())
}

/// JSON sink.
pub fn write_json<W: Write>(out: W, report: &ProofSizeReport) -> Result<()> {
    serde_json::to_writer_pretty(out, report)?;
    Ok(())
}
