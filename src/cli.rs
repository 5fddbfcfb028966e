use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::recommend::ScoringStrategy;

#[derive(Parser, Debug)]
#[command(
    name = "bugrec",
    version,
    about = "Assignee recommendation from similar historical defect reports"
)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Import(ImportArgs),
    Vectorize(VectorizeArgs),
    Sample(SampleArgs),
    Arcs(ArcsArgs),
    Recommend(RecommendArgs),
    Evaluate(EvaluateArgs),
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, global = true, default_value = ".cache/bugrec")]
    pub cache_root: PathBuf,

    /// Defaults to `<cache-root>/bugrec.sqlite`.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,
}

impl StoreArgs {
    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.cache_root.join("bugrec.sqlite"))
    }

    pub fn manifest_dir(&self) -> PathBuf {
        self.cache_root.join("manifests")
    }
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value_t = 1000)]
    pub batch_size: usize,
}

#[derive(Args, Debug, Clone)]
pub struct VectorizeArgs {
    #[arg(long, default_value = "miniLM-L6-v2-local-v1")]
    pub model_id: String,

    #[arg(long, default_value_t = 1000)]
    pub batch_size: usize,
}

#[derive(Args, Debug, Clone)]
pub struct SampleArgs {
    #[arg(long, default_value_t = 10000)]
    pub size: usize,

    #[arg(long, default_value = "2009-01-01T00:00:00Z")]
    pub created_after: DateTime<Utc>,

    #[arg(long, default_value = "2012-12-31T23:59:59Z")]
    pub created_before: DateTime<Utc>,

    /// Defaults to the current time in milliseconds; recorded in the manifest.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct ArcsArgs {
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ArcSourceKind {
    Precomputed,
    Live,
}

#[derive(Args, Debug, Clone)]
pub struct RecommendArgs {
    #[arg(long)]
    pub bug: i64,

    #[arg(long, default_value_t = 10)]
    pub k: usize,

    #[arg(long, value_enum, default_value_t = ScoringStrategy::CategoricTfidfWe)]
    pub strategy: ScoringStrategy,

    #[arg(long, value_enum, default_value_t = ArcSourceKind::Live)]
    pub source: ArcSourceKind,

    #[arg(long)]
    pub scoring_config: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long = "strategy", value_enum)]
    pub strategies: Vec<ScoringStrategy>,

    #[arg(long = "k")]
    pub ks: Vec<usize>,

    #[arg(long)]
    pub version_prefix: Option<String>,

    #[arg(long, value_enum, default_value_t = ArcSourceKind::Precomputed)]
    pub source: ArcSourceKind,

    #[arg(long)]
    pub scoring_config: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub save_results: bool,
}
