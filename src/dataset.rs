//! Loading benchmark CSVs and generating synthetic ones.
//!
//! Headers are resolved through a [`ColumnMapping`], so both harness variants
//! load into the same canonical [`BenchmarkRow`]:
//!
//! ```text
//! per-scenario:  nUpdatesSince,nUpdates,nADSModifiedInLastUpdate,proofSizeTotal,lastUpdateSize,...
//! large-scale:   nADSes,nUpdates,proofSizeTotal,updateSize,nSignatures,signaturesSize,...
//! ```
//!
//! The large-scale harness writes a single update counter; it fills both
//! `updates_since_last_refresh` and `total_updates_processed`.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ReportError, Result};
use crate::schema::{BenchmarkRow, ColumnMapping, Field};

/// Header written by [`write_rows`], in the per-scenario harness layout.
pub const SCENARIO_HEADER: [&str; 11] = [
    "nUpdatesSince",
    "nUpdates",
    "nADSModifiedInLastUpdate",
    "nADSes",
    "proofSizeTotal",
    "lastUpdateSize",
    "nSignatures",
    "signaturesSize",
    "updateProofSize",
    "freshnessProofSize",
    "freshnessProofNoOptimizationSize",
];

/// Rows of one CSV file plus what is needed to cite it in a report.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub path: PathBuf,
    pub sha256: String,
    pub rows: Vec<BenchmarkRow>,
}

/// Header positions of the canonical fields in one file.
#[derive(Debug, Clone)]
struct ResolvedColumns {
    positions: BTreeMap<Field, usize>,
}

impl ResolvedColumns {
    fn resolve(mapping: &ColumnMapping, headers: &[&str]) -> Result<Self> {
        let positions: BTreeMap<Field, usize> = Field::ALL
            .iter()
            .filter_map(|f| mapping.resolve(*f, headers).map(|i| (*f, i)))
            .collect();

        for field in Field::ALL.iter().filter(|f| f.is_required()) {
            if !positions.contains_key(field) {
                return Err(missing_column(mapping, &[*field]));
            }
        }

        let has_updates = positions.contains_key(&Field::UpdatesSinceLastRefresh)
            || positions.contains_key(&Field::TotalUpdatesProcessed);
        if !has_updates {
            return Err(missing_column(
                mapping,
                &[Field::UpdatesSinceLastRefresh, Field::TotalUpdatesProcessed],
            ));
        }

        Ok(Self { positions })
    }

    fn fields(&self) -> Vec<Field> {
        self.positions.keys().copied().collect()
    }
}

fn missing_column(mapping: &ColumnMapping, fields: &[Field]) -> ReportError {
    let accepted: Vec<&str> = fields
        .iter()
        .flat_map(|f| mapping.aliases(*f).iter().map(String::as_str))
        .collect();
    ReportError::MissingColumn {
        field: fields[0],
        accepted: accepted.join(", "),
    }
}

struct RecordCursor<'a> {
    record: &'a csv::StringRecord,
    number: usize,
    headers: &'a csv::StringRecord,
    columns: &'a ResolvedColumns,
}

impl RecordCursor<'_> {
    /// `None` when the file has no column for `field`, or when a nullable
    /// field's cell is empty. Any other empty cell is invalid.
    fn optional(&self, field: Field) -> Result<Option<u64>> {
        let Some(&pos) = self.columns.positions.get(&field) else {
            return Ok(None);
        };
        let raw = self.record.get(pos).unwrap_or("").trim();
        if raw.is_empty() && field.is_nullable() {
            return Ok(None);
        }
        raw.parse::<u64>().map(Some).map_err(|_| self.invalid(pos, raw))
    }

    fn required(&self, field: Field) -> Result<u64> {
        // Resolution guarantees every required field has a column.
        self.optional(field)?.ok_or_else(|| {
            let pos = self.columns.positions.get(&field).copied().unwrap_or(0);
            self.invalid(pos, "")
        })
    }

    fn invalid(&self, pos: usize, raw: &str) -> ReportError {
        ReportError::InvalidValue {
            record: self.number,
            column: self.headers.get(pos).unwrap_or("?").trim().to_string(),
            value: raw.to_string(),
        }
    }

    fn row(&self) -> Result<BenchmarkRow> {
        // A missing counter column falls back to the other one; an empty
        // cell in a present column has already failed in `optional`.
        let since = self.optional(Field::UpdatesSinceLastRefresh)?;
        let total_updates = self.optional(Field::TotalUpdatesProcessed)?;
        let (since, total_updates) = match (since, total_updates) {
            (Some(s), Some(t)) => (s, t),
            (Some(s), None) => (s, s),
            (None, Some(t)) => (t, t),
            // Resolution rejects files with neither counter column.
            (None, None) => return Err(self.invalid(0, "")),
        };

        let ads_modified = match self.optional(Field::AdsModifiedInUpdate)? {
            Some(n) => {
                let pos = self.columns.positions[&Field::AdsModifiedInUpdate];
                Some(u32::try_from(n).map_err(|_| self.invalid(pos, &n.to_string()))?)
            }
            None => None,
        };

        Ok(BenchmarkRow {
            updates_since_last_refresh: since,
            total_updates_processed: total_updates,
            ads_modified_in_update: ads_modified,
            signature_count: self.required(Field::SignatureCount)?,
            signatures_byte_size: self.required(Field::SignaturesByteSize)?,
            update_byte_size: self.required(Field::UpdateByteSize)?,
            update_proof_byte_size: self.required(Field::UpdateProofByteSize)?,
            freshness_proof_byte_size: self.required(Field::FreshnessProofByteSize)?,
            freshness_proof_unoptimized_byte_size: self
                .required(Field::FreshnessProofUnoptimizedByteSize)?,
            total_proof_byte_size: self.required(Field::TotalProofByteSize)?,
            ads_count: self.optional(Field::AdsCount)?,
        })
    }
}

fn read_with_columns<R: Read>(reader: R, mapping: &ColumnMapping) -> Result<(Vec<BenchmarkRow>, ResolvedColumns)> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let header_names: Vec<&str> = headers.iter().collect();
    let columns = ResolvedColumns::resolve(mapping, &header_names)?;

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let cursor = RecordCursor {
            record: &record,
            number: i + 1,
            headers: &headers,
            columns: &columns,
        };
        rows.push(cursor.row()?);
    }
    Ok((rows, columns))
}

/// Parse benchmark rows from any CSV source with a header row.
pub fn read_rows<R: Read>(reader: R, mapping: &ColumnMapping) -> Result<Vec<BenchmarkRow>> {
    read_with_columns(reader, mapping).map(|(rows, _)| rows)
}

/// Load one CSV file, fingerprinting its bytes.
pub fn load_dataset<P: AsRef<Path>>(path: P, mapping: &ColumnMapping) -> Result<LoadedDataset> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let rows = read_rows(bytes.as_slice(), mapping)?;
    debug!(path = %path.display(), rows = rows.len(), "loaded dataset");
    Ok(LoadedDataset {
        path: path.to_path_buf(),
        sha256: sha256_hex(&bytes),
        rows,
    })
}

/// Load several CSV files, e.g. the small and medium large-scale runs.
pub fn load_datasets<P: AsRef<Path>>(paths: &[P], mapping: &ColumnMapping) -> Result<Vec<LoadedDataset>> {
    paths.iter().map(|p| load_dataset(p, mapping)).collect()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Summary of one CSV found by [`inventory`].
#[derive(Debug, Clone, Serialize)]
pub struct InventoryEntry {
    pub path: PathBuf,
    pub sha256: String,
    pub rows: usize,
    /// Canonical fields resolved from the header.
    pub fields: Vec<Field>,
    /// Why the file could not be loaded, if it could not.
    pub error: Option<String>,
}

impl InventoryEntry {
    fn failed(path: &Path, sha256: String, error: String) -> Self {
        Self {
            path: path.to_path_buf(),
            sha256,
            rows: 0,
            fields: Vec::new(),
            error: Some(error),
        }
    }
}

/// Walk `dir` for `*.csv` files and describe each one.
///
/// Files that fail to read or parse are reported with their error instead of
/// aborting the walk. Symlinks are followed; a dangling `*.csv` link shows up
/// as a failed entry.
pub fn inventory<P: AsRef<Path>>(dir: P, mapping: &ColumnMapping) -> Result<Vec<InventoryEntry>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir.as_ref()).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                if let Some(path) = e.path().filter(|p| is_csv(p)) {
                    entries.push(InventoryEntry::failed(path, String::new(), e.to_string()));
                }
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !is_csv(path) {
            continue;
        }

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable dataset");
                entries.push(InventoryEntry::failed(path, String::new(), e.to_string()));
                continue;
            }
        };
        let sha256 = sha256_hex(&bytes);
        let item = match read_with_columns(bytes.as_slice(), mapping) {
            Ok((rows, columns)) => InventoryEntry {
                path: path.to_path_buf(),
                sha256,
                rows: rows.len(),
                fields: columns.fields(),
                error: None,
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable dataset");
                InventoryEntry::failed(path, sha256, e.to_string())
            }
        };
        entries.push(item);
    }
    Ok(entries)
}

fn is_csv(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("csv")
}

/// Write rows in the per-scenario layout ([`SCENARIO_HEADER`]).
pub fn write_rows<W: Write>(writer: W, rows: &[BenchmarkRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(SCENARIO_HEADER)?;
    for r in rows {
        let opt = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_default();
        wtr.write_record([
            r.updates_since_last_refresh.to_string(),
            r.total_updates_processed.to_string(),
            opt(r.ads_modified_in_update.map(u64::from)),
            opt(r.ads_count),
            r.total_proof_byte_size.to_string(),
            r.update_byte_size.to_string(),
            r.signature_count.to_string(),
            r.signatures_byte_size.to_string(),
            r.update_proof_byte_size.to_string(),
            r.freshness_proof_byte_size.to_string(),
            r.freshness_proof_unoptimized_byte_size.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Configuration for synthetic dataset generation.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Update batches committed after the tracked updates.
    pub batches: u64,
    /// Updates per batch.
    pub batch_size: u64,
    /// ADSes tracked by the simulated server.
    pub ads_count: u64,
    pub seed: u64,
    /// Nominal signature size; individual signatures vary by one byte.
    pub signature_size: u64,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            batches: 10,
            batch_size: 10_000,
            ads_count: 1_000_000,
            seed: 42,
            signature_size: crate::config::DEFAULT_SIGNATURE_SIZE,
        }
    }
}

const HASH_BYTES: u64 = 33;
const FRAMING_BYTES: u64 = 16;

fn per_row_seed(master_seed: u64, index: usize) -> u64 {
    master_seed
        .wrapping_add(index as u64)
        .wrapping_mul(0x517cc1b727220a95)
}

fn tree_depth(ads_count: u64) -> u64 {
    let n = ads_count.max(2);
    u64::from(64 - (n - 1).leading_zeros())
}

fn mul(a: u64, b: u64, what: &str) -> Result<u64> {
    a.checked_mul(b).ok_or_else(|| ReportError::overflow(what))
}

fn sum(parts: &[u64], what: &str) -> Result<u64> {
    parts
        .iter()
        .try_fold(0u64, |acc, &v| acc.checked_add(v))
        .ok_or_else(|| ReportError::overflow(what))
}

fn generate_row(rng: &mut ChaCha8Rng, config: &GenerateConfig, batch: u64, ads_modified: u32) -> Result<BenchmarkRow> {
    let ads = u64::from(ads_modified);
    let depth = tree_depth(config.ads_count);
    let updates = mul(batch, config.batch_size, "updates since last refresh")?;

    let signature_count = ads;
    let sig_lo = config.signature_size.saturating_sub(1);
    let sig_hi = config
        .signature_size
        .checked_add(1)
        .ok_or_else(|| ReportError::overflow("signature size"))?;
    let signatures: Vec<u64> = (0..signature_count)
        .map(|_| rng.gen_range(sig_lo..=sig_hi))
        .collect();
    let signatures_byte_size = sum(&signatures, "signatures size")?;
    let update_byte_size = sum(&[signatures_byte_size, 40, 34 * ads], "update size")?;
    let full_path = mul(depth, HASH_BYTES, "path size")?;
    let update_proof_byte_size = sum(
        &[mul(ads, full_path, "update proof size")?, rng.gen_range(0..16)],
        "update proof size",
    )?;

    // Cached proofs resend only the changed suffix of each path; un-cached
    // proofs resend the full path once per intervening commitment.
    let resent_path = full_path.max(HASH_BYTES * 2);
    let suffixes: Vec<u64> = (0..batch)
        .map(|_| rng.gen_range(HASH_BYTES..=resent_path / 2))
        .collect();
    let freshness_proof_byte_size = sum(&suffixes, "freshness proof size")?;
    let freshness_proof_unoptimized_byte_size = mul(batch, resent_path, "un-cached freshness proof size")?;

    let total_proof_byte_size = sum(
        &[
            update_byte_size,
            update_proof_byte_size,
            freshness_proof_byte_size,
            FRAMING_BYTES,
        ],
        "total proof size",
    )?;

    Ok(BenchmarkRow {
        updates_since_last_refresh: updates,
        total_updates_processed: updates,
        ads_modified_in_update: Some(ads_modified),
        signature_count,
        signatures_byte_size,
        update_byte_size,
        update_proof_byte_size,
        freshness_proof_byte_size,
        freshness_proof_unoptimized_byte_size,
        total_proof_byte_size,
        ads_count: Some(config.ads_count),
    })
}

/// Generate deterministic rows: one per scenario for the initial commitment
/// and after each further batch.
///
/// Rows are generated in parallel from index-derived seeds, so output depends
/// only on `config`. Sizes that overflow `u64` fail with
/// [`ReportError::Overflow`].
pub fn generate_rows(config: &GenerateConfig) -> Result<Vec<BenchmarkRow>> {
    let count = config
        .batches
        .checked_add(1)
        .and_then(|n| n.checked_mul(3))
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| ReportError::overflow("row count"))?;
    (0..count)
        .into_par_iter()
        .map(|i| {
            let mut rng = ChaCha8Rng::seed_from_u64(per_row_seed(config.seed, i));
            let batch = (i / 3) as u64;
            let ads_modified = (i % 3) as u32 + 1;
            generate_row(&mut rng, config, batch, ads_modified)
        })
        .collect()
}

/// Generate rows and write them to `path`.
pub fn write_dataset<P: AsRef<Path>>(path: P, config: &GenerateConfig) -> Result<usize> {
    let rows = generate_rows(config)?;
    let file = fs::File::create(path)?;
    write_rows(std::io::BufWriter::new(file), &rows)?;
    Ok(rows.len())
}
