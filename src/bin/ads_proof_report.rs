use ads_proof_report::config::ReportConfig;
use ads_proof_report::dataset::{self, GenerateConfig, LoadedDataset};
use ads_proof_report::report::{self, View};
use ads_proof_report::schema::{BenchmarkRow, ProofSizeReport, RunMeta, SourceMeta};
use ads_proof_report::Scenario;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Proof size per receipt event against updates since the last refresh.
    ProofSizes {
        #[arg(value_name = "CSV")]
        data: PathBuf,
    },

    /// Proof size with and without freshness-proof caching.
    Optimization {
        #[arg(value_name = "CSV")]
        data: PathBuf,
    },

    /// Size breakdown of the verification object for each receipt event.
    Breakdown {
        #[arg(value_name = "CSV")]
        data: PathBuf,

        /// Only print this receipt event.
        #[arg(long, value_enum)]
        scenario: Option<Scenario>,
    },

    /// Large-scale runs: proof size against the share of ADSes updated.
    ///
    /// Several files (e.g. small and medium runs) are combined, one pair of
    /// series per server size.
    Scale {
        #[arg(value_name = "CSV", required = true, num_args = 1..)]
        data: Vec<PathBuf>,
    },

    /// Proof size for updates carrying different signature counts.
    Signatures {
        #[arg(value_name = "CSV")]
        data: PathBuf,

        /// Signature counts to compare; defaults to the configured ones.
        #[arg(long, value_delimiter = ',')]
        counts: Option<Vec<u64>>,
    },

    /// List benchmark CSVs under a directory with their resolved columns.
    Inventory {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },

    /// Generate a deterministic synthetic dataset in the per-scenario layout.
    Generate {
        /// Output CSV file.
        #[arg(long, short = 'o', value_name = "FILE")]
        output: PathBuf,

        /// Update batches after the tracked updates.
        #[arg(long, default_value_t = 10)]
        batches: u64,

        /// Updates per batch.
        #[arg(long, default_value_t = 10_000)]
        batch_size: u64,

        /// ADSes tracked by the simulated server.
        #[arg(long, default_value_t = 1_000_000)]
        ads: u64,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[derive(Parser, Debug)]
#[command(name = "ads-proof-report")]
#[command(about = "Proof-size benchmark analysis for ADS update proofs")]
struct Args {
    /// JSON experiment file; flags below override its values.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Bytes per signature.
    #[arg(long, global = true)]
    signature_size: Option<u64>,

    /// Signatures transfers and loans are normalized to.
    #[arg(long, global = true)]
    target_signatures: Option<u64>,

    #[arg(long, value_enum, default_value_t = FormatArg::Text, global = true)]
    format: FormatArg,

    /// Where to write the report. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn now_utc() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn load_config(args: &Args) -> Result<ReportConfig> {
    let mut cfg = match &args.config {
        Some(path) => ReportConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ReportConfig::default(),
    };
    if let Some(size) = args.signature_size {
        cfg.signature_size = size;
    }
    if let Some(count) = args.target_signatures {
        cfg.target_signatures = count;
    }
    Ok(cfg)
}

fn load(paths: &[PathBuf], cfg: &ReportConfig) -> Result<(Vec<LoadedDataset>, Vec<BenchmarkRow>)> {
    let mapping = cfg.column_mapping();
    let datasets = paths
        .iter()
        .map(|p| dataset::load_dataset(p, &mapping).with_context(|| format!("loading {}", p.display())))
        .collect::<Result<Vec<_>>>()?;
    let rows = datasets.iter().flat_map(|d| d.rows.iter().cloned()).collect();
    Ok((datasets, rows))
}

fn emit(args: &Args, write: impl FnOnce(&mut dyn Write) -> Result<()>) -> Result<()> {
    match &args.out {
        Some(path) => {
            let mut file = io::BufWriter::new(
                fs::File::create(path).with_context(|| format!("creating {}", path.display()))?,
            );
            write(&mut file)?;
            file.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write(&mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    setup_tracing();
    let args = Args::parse();
    let mut cfg = load_config(&args)?;

    let mut only_scenario = None;
    let (view, paths) = match &args.cmd {
        Command::ProofSizes { data } => (View::ProofSizes, vec![data.clone()]),
        Command::Optimization { data } => (View::Optimization, vec![data.clone()]),
        Command::Breakdown { data, scenario } => {
            only_scenario = *scenario;
            (View::Breakdown, vec![data.clone()])
        }
        Command::Scale { data } => (View::Scale, data.clone()),
        Command::Signatures { data, counts } => {
            if let Some(counts) = counts {
                cfg.signature_counts = counts.clone();
            }
            (View::Signatures, vec![data.clone()])
        }
        Command::Inventory { dir } => {
            let entries = dataset::inventory(dir, &cfg.column_mapping())
                .with_context(|| format!("scanning {}", dir.display()))?;
            info!(files = entries.len(), "inventory complete");
            return emit(&args, |out| {
                match args.format {
                    FormatArg::Json => serde_json::to_writer_pretty(&mut *out, &entries)?,
                    FormatArg::Text => {
                        for e in &entries {
                            match &e.error {
                                None => {
                                    let fields: Vec<&str> = e.fields.iter().map(|f| f.as_str()).collect();
                                    writeln!(out, "{}: {} rows [{}]", e.path.display(), e.rows, fields.join(", "))?;
                                }
                                Some(err) => writeln!(out, "{}: unreadable ({err})", e.path.display())?,
                            }
                        }
                    }
                }
                Ok(())
            });
        }
        Command::Generate {
            output,
            batches,
            batch_size,
            ads,
            seed,
        } => {
            let gen_config = GenerateConfig {
                batches: *batches,
                batch_size: *batch_size,
                ads_count: *ads,
                seed: *seed,
                signature_size: cfg.signature_size,
            };
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let rows = dataset::write_dataset(output, &gen_config)
                .with_context(|| format!("writing {}", output.display()))?;
            info!(rows, path = %output.display(), seed, "generated dataset");
            return Ok(());
        }
    };

    let (datasets, rows) = load(&paths, &cfg)?;
    let mut out = report::run_view(view, &rows, &cfg).with_context(|| format!("computing {}", view.as_str()))?;
    if let Some(scenario) = only_scenario {
        out.breakdowns.retain(|b| b.scenario == scenario.as_str());
    }

    let proof_report = ProofSizeReport {
        run: RunMeta {
            schema_version: 1,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            view: view.as_str().to_string(),
            sources: datasets
                .iter()
                .map(|d| SourceMeta {
                    path: d.path.display().to_string(),
                    sha256: d.sha256.clone(),
                    rows: d.rows.len(),
                })
                .collect(),
            signature_size: cfg.signature_size,
            target_signatures: cfg.target_signatures,
            timestamp_utc: now_utc(),
        },
        series: out.series,
        breakdowns: out.breakdowns,
    };

    emit(&args, |out| {
        match args.format {
            FormatArg::Text => report::write_text(out, &proof_report)?,
            FormatArg::Json => report::write_json(out, &proof_report)?,
        }
        Ok(())
    })
}
