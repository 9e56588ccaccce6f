//! Sigsearch CLI
//!
//! Resolve points to stored signatures and search Hamming-similar samples.
//!
//! # Usage
//!
//! ```bash
//! # Signature of the sample nearest to a point (bucket over HTTP)
//! SIG_BUCKET=samples sigsearch locate --dataset mb20 --x 18416 --y 16369 --z 26467
//!
//! # Similar samples, bucket mirrored locally, partition tables in SQLite
//! sigsearch --store-root ./bucket --sqlite-root ./tables similar --dataset mb20 --x 18416 --y 16369 --z 26467
//!
//! # Show the warehouse SQL instead of running it
//! sigsearch --store-root ./bucket similar --dataset mb20 --x 18416 --y 16369 --z 26467 --explain
//! ```
//!
//! Results are JSON on stdout; logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use sigsearch::config::{LookupConfig, LookupOptions, ENV_BUCKET};
use sigsearch::model::{ErrorResponse, MatchesResponse, SignatureResponse};
use sigsearch::query::{MemoryEngine, SimilarityEngine, SqliteEngine};
use sigsearch::store::{BlockStore, FsBlockStore, HttpBlockStore};
use sigsearch::{LookupError, Point, SignatureService};
use sigsearch_core::Block;

#[derive(Parser)]
#[command(name = "sigsearch")]
#[command(about = "Signature lookup and Hamming-similar sample search")]
#[command(version)]
struct Cli {
    /// JSON configuration file (otherwise SIG_* environment variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Object-store bucket
    #[arg(long, global = true, env = ENV_BUCKET)]
    bucket: Option<String>,

    /// Read the bucket from this directory instead of over HTTP
    #[arg(long, global = true)]
    store_root: Option<PathBuf>,

    /// Directory of per-dataset SQLite partition tables
    #[arg(long, global = true)]
    sqlite_root: Option<PathBuf>,

    /// Print lookup counters (Prometheus text) to stderr on exit
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Copy)]
struct PointArgs {
    #[arg(long, allow_hyphen_values = true)]
    x: i32,
    #[arg(long, allow_hyphen_values = true)]
    y: i32,
    #[arg(long, allow_hyphen_values = true)]
    z: i32,
}

impl From<PointArgs> for Point {
    fn from(p: PointArgs) -> Self {
        Point::new(p.x, p.y, p.z)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Signature of the stored sample nearest to a point
    Locate {
        #[arg(short, long)]
        dataset: String,

        #[command(flatten)]
        point: PointArgs,

        /// Search radius (defaults to configuration)
        #[arg(long)]
        max_distance: Option<f64>,
    },

    /// Samples whose signatures are Hamming-close to the sample at a point
    Similar {
        #[arg(short, long)]
        dataset: String,

        #[command(flatten)]
        point: PointArgs,

        #[arg(long)]
        max_distance: Option<f64>,

        /// Exclusive Hamming bound
        #[arg(long)]
        max_hamming: Option<u32>,

        #[arg(long)]
        limit: Option<usize>,

        /// Print the equivalent warehouse SQL instead of querying
        #[arg(long)]
        explain: bool,
    },

    /// Partition ids of a signature under a dataset's masks
    Partitions {
        #[arg(short, long)]
        dataset: String,

        #[arg(short, long, allow_hyphen_values = true)]
        signature: i64,
    },

    /// Summarize a block file
    InspectBlock {
        #[arg(short, long)]
        file: PathBuf,

        /// Number of leading records to print
        #[arg(long, default_value = "5")]
        head: usize,
    },
}

#[derive(Serialize)]
struct PartitionsOutput<'a> {
    dataset: &'a str,
    signature: String,
    partitions: [u32; 4],
}

#[derive(Serialize)]
struct RecordOutput {
    point: [i32; 3],
    signature: String,
}

#[derive(Serialize)]
struct BlockSummary {
    bytes: usize,
    records: usize,
    trailing_bytes: usize,
    head: Vec<RecordOutput>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::InspectBlock { file, head } = &cli.command {
        return inspect_block(file, *head);
    }

    let config = load_config(&cli)?;
    let store = open_store(&cli, &config)?;
    let engine: Arc<dyn SimilarityEngine> = match &cli.sqlite_root {
        Some(root) => Arc::new(SqliteEngine::new(root)),
        None => Arc::new(MemoryEngine::new()),
    };
    let service = SignatureService::new(store, engine, config);

    let outcome = run(&cli, &service);
    if cli.metrics {
        eprint!("{}", service.metrics().render_prometheus());
    }
    outcome
}

fn run(cli: &Cli, service: &SignatureService) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Locate {
            dataset,
            point,
            max_distance,
        } => {
            let options = LookupOptions {
                max_distance: *max_distance,
                ..LookupOptions::default()
            };
            let sample = service
                .fetch_signature(dataset, (*point).into(), &options)
                .or_else(report)?;
            print_json(&SignatureResponse::from(&sample))
        }

        Commands::Similar {
            dataset,
            point,
            max_distance,
            max_hamming,
            limit,
            explain,
        } => {
            let options = LookupOptions {
                max_distance: *max_distance,
                max_hamming: *max_hamming,
                limit: *limit,
            };
            if *explain {
                let sql = service
                    .explain_similar(dataset, (*point).into(), &options)
                    .or_else(report)?;
                println!("{sql}");
                return Ok(());
            }
            if cli.sqlite_root.is_none() {
                bail!("similar needs a query backend: pass --sqlite-root, or --explain for the SQL");
            }
            let result = service
                .find_similar_signatures(dataset, (*point).into(), &options)
                .or_else(report)?;
            print_json(&MatchesResponse::from(&result))
        }

        Commands::Partitions { dataset, signature } => {
            let partitions = service.partitions_for(dataset, *signature).or_else(report)?;
            print_json(&PartitionsOutput {
                dataset,
                signature: signature.to_string(),
                partitions,
            })
        }

        Commands::InspectBlock { file, head } => inspect_block(file, *head),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<LookupConfig> {
    let mut config = match &cli.config {
        Some(path) => LookupConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            // a local mirror needs no bucket name
            let bucket = cli
                .bucket
                .clone()
                .or_else(|| cli.store_root.as_ref().map(|_| "local".to_string()));
            LookupConfig::from_lookup(|key| {
                if key == ENV_BUCKET {
                    bucket.clone()
                } else {
                    std::env::var(key).ok()
                }
            })
            .context("loading config from environment")?
        }
    };
    if let (Some(_), Some(bucket)) = (&cli.config, &cli.bucket) {
        config.bucket = bucket.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn open_store(cli: &Cli, config: &LookupConfig) -> anyhow::Result<Arc<dyn BlockStore>> {
    match &cli.store_root {
        Some(root) => {
            tracing::info!(root = %root.display(), "reading bucket from local directory");
            Ok(Arc::new(FsBlockStore::new(root)))
        }
        None => {
            tracing::info!(base_url = %config.store.base_url, bucket = %config.bucket, "reading bucket over HTTP");
            let store = HttpBlockStore::new(&config.store, config.bucket.clone())
                .context("building HTTP object store client")?;
            Ok(Arc::new(store))
        }
    }
}

fn inspect_block(file: &Path, head: usize) -> anyhow::Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let block = Block::new(&bytes);
    if block.trailing_bytes() != 0 {
        tracing::warn!(
            trailing = block.trailing_bytes(),
            "block length is not a whole number of records"
        );
    }
    print_json(&BlockSummary {
        bytes: bytes.len(),
        records: block.len(),
        trailing_bytes: block.trailing_bytes(),
        head: block
            .iter()
            .take(head)
            .map(|r| RecordOutput {
                point: r.point.to_array(),
                signature: r.signature.to_string(),
            })
            .collect(),
    })
}

/// Print the lookup error as JSON on stdout, then fail the command.
fn report<T>(err: LookupError) -> anyhow::Result<T> {
    print_json(&ErrorResponse::from(&err))?;
    Err(err.into())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
