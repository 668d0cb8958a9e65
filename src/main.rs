use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use url::Url;

use contest_scorer::bench::Benchmarker;
use contest_scorer::config::{RankingPolicy, RatingConfig, ScorerConfig};
use contest_scorer::directory::MediaCatalog;
use contest_scorer::node::ScorerNode;
use contest_scorer::rating::{
    AvailabilityRater, HttpInventory, InventoryProvider, StaticInventory, Tier,
};
use contest_scorer::shutdown::install_shutdown_handler;
use contest_scorer::store::SUCCESS;

#[derive(Parser, Debug)]
#[command(name = "contest-scorer")]
#[command(version)]
#[command(about = "Scores contest storefront deployments by function and availability")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the intake portal and the worker pool
    Serve(ServeArgs),

    /// Benchmark one endpoint and print the functional score
    Bench(BenchArgs),

    /// Rate one cloud project and print its availability tier
    Rate(RateArgs),
}

// =============================================================================
// Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Address of the intake portal
    #[arg(long, env = "SCORER_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Participant directory (JSON)
    #[arg(long, env = "SCORER_USERS", default_value = "users.json")]
    users: PathBuf,

    /// Known-good media hashes (JSON)
    #[arg(long, env = "SCORER_MEDIA", default_value = "image_hashes.json")]
    media: PathBuf,

    /// SQLite database for results. Results stay in memory when omitted.
    #[arg(long, env = "SCORER_DATABASE")]
    database: Option<PathBuf>,

    #[command(flatten)]
    inventory: InventoryArgs,

    /// Ceiling on concurrently running jobs
    #[arg(long, env = "SCORER_WORKERS")]
    workers: Option<usize>,

    /// Pending job capacity (defaults to the number of participants)
    #[arg(long, env = "SCORER_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    /// Benchmark wall-clock budget in seconds
    #[arg(long, env = "SCORER_BENCH_DEADLINE", default_value = "60")]
    deadline_secs: u64,

    /// Which score the ranking keeps per participant
    #[arg(long, env = "SCORER_RANKING", default_value = "best")]
    ranking: RankingArg,

    /// Accept loopback endpoints (local testing only)
    #[arg(long)]
    allow_local_targets: bool,
}

#[derive(Parser, Debug)]
struct BenchArgs {
    /// Storefront base URL
    endpoint: Url,

    /// Known-good media hashes (JSON)
    #[arg(long, env = "SCORER_MEDIA", default_value = "image_hashes.json")]
    media: PathBuf,

    /// Benchmark wall-clock budget in seconds
    #[arg(long, default_value = "60")]
    deadline_secs: u64,

    /// Seed for item and quantity draws
    #[arg(long)]
    seed: Option<u64>,

    /// Skip the reset call before benchmarking
    #[arg(long)]
    no_reset: bool,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Parser, Debug)]
struct RateArgs {
    /// Cloud project identifier
    project_id: String,

    #[command(flatten)]
    inventory: InventoryArgs,

    /// Required role label as key=value (repeatable; replaces the defaults)
    #[arg(long = "role", value_parser = parse_role)]
    roles: Vec<(String, String)>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(clap::Args, Debug)]
struct InventoryArgs {
    /// Static inventory file (JSON)
    #[arg(long, env = "SCORER_INVENTORY_FILE", conflicts_with = "inventory_url")]
    inventory_file: Option<PathBuf>,

    /// Inventory service base URL
    #[arg(long, env = "SCORER_INVENTORY_URL")]
    inventory_url: Option<Url>,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, ValueEnum)]
enum RankingArg {
    Best,
    Latest,
}

impl From<RankingArg> for RankingPolicy {
    fn from(arg: RankingArg) -> Self {
        match arg {
            RankingArg::Best => RankingPolicy::Best,
            RankingArg::Latest => RankingPolicy::Latest,
        }
    }
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct BenchOutput {
    endpoint: String,
    rounds: u32,
    accumulated_score: u64,
    score: u64,
    status: String,
}

#[derive(Serialize)]
struct RateOutput {
    project_id: String,
    tier: String,
    multiplier: u64,
    status: String,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_role(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got {raw:?}")),
    }
}

fn build_inventory(
    args: &InventoryArgs,
    request_timeout: Duration,
) -> Result<Arc<dyn InventoryProvider>, Box<dyn std::error::Error>> {
    match (&args.inventory_url, &args.inventory_file) {
        (Some(url), _) => Ok(Arc::new(HttpInventory::new(url.clone(), request_timeout)?)),
        (None, Some(path)) => Ok(Arc::new(StaticInventory::load(path)?)),
        (None, None) => Err("one of --inventory-file or --inventory-url is required".into()),
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ScorerConfig::new(args.listen)
        .with_bench_deadline(Duration::from_secs(args.deadline_secs))
        .with_allow_local_targets(args.allow_local_targets)
        .with_ranking(args.ranking.into());
    config.users_path = args.users;
    config.media_path = args.media;
    config.database_path = args.database;
    if let Some(workers) = args.workers {
        config = config.with_worker_ceiling(workers);
    }
    if let Some(capacity) = args.queue_capacity {
        config = config.with_queue_capacity(capacity);
    }

    let inventory = build_inventory(&args.inventory, config.rating.request_timeout)?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        worker_limit = config.pool.worker_limit(),
        deadline_secs = args.deadline_secs,
        database = ?config.database_path,
        ranking = ?config.ranking,
        "Starting contest scorer"
    );

    let node = ScorerNode::build(config, inventory)?;
    let shutdown = install_shutdown_handler();
    node.run(shutdown).await?;
    Ok(())
}

async fn run_bench(args: BenchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Arc::new(MediaCatalog::load(&args.media)?);
    let mut config = ScorerConfig::default().bench;
    config.deadline = Duration::from_secs(args.deadline_secs);

    let mut benchmarker = Benchmarker::new(config, catalog)?;
    if let Some(seed) = args.seed {
        benchmarker = benchmarker.with_seed(seed);
    }

    if !args.no_reset {
        if let Err(e) = benchmarker.reset(&args.endpoint).await {
            tracing::warn!(error = %e, "Target reset failed, benchmarking anyway");
        }
    }

    let deadline = tokio::time::Instant::now() + benchmarker.config().deadline;
    let outcome = benchmarker.run(&args.endpoint, deadline).await;

    let output = BenchOutput {
        endpoint: args.endpoint.to_string(),
        rounds: outcome.rounds,
        accumulated_score: outcome.score,
        score: outcome.recorded_score(),
        status: outcome.status(),
    };

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Table => {
            println!("Endpoint:    {}", output.endpoint);
            println!("Rounds:      {}", output.rounds);
            println!("Accumulated: {}", output.accumulated_score);
            println!("Score:       {}", output.score);
            println!("Status:      {}", output.status);
        }
    }
    Ok(())
}

async fn run_rate(args: RateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = RatingConfig::default();
    if !args.roles.is_empty() {
        config.required_roles = args.roles.into_iter().collect();
    }

    let inventory = build_inventory(&args.inventory, config.request_timeout)?;
    let rater = AvailabilityRater::new(inventory, config);

    let (tier, status) = match rater.rate_project(&args.project_id).await {
        Ok(tier) => (tier, SUCCESS.to_string()),
        Err(e) => (Tier::None, e.to_string()),
    };

    let output = RateOutput {
        project_id: args.project_id,
        tier: tier.to_string(),
        multiplier: tier.value(),
        status,
    };

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Table => {
            println!("{:<24} {:<16} {:<10} STATUS", "PROJECT", "TIER", "MULTIPLIER");
            println!("{}", "-".repeat(64));
            println!(
                "{:<24} {:<16} {:<10} {}",
                output.project_id, output.tier, output.multiplier, output.status
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Bench(args) => run_bench(args).await,
        Commands::Rate(args) => run_rate(args).await,
    }
}
