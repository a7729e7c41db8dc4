//! `brandcheck` command line: run the worker pool, enqueue assets, inspect
//! results and manage brand vocabulary rules.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::{fmt, EnvFilter};

use brandcheck::config::{load_config, Config, LogFormat};
use brandcheck::db::{AssetFilter, AssetRepository, Database, SqliteAssetRepository};
use brandcheck::model::{AssetStatus, BrandConfig, CreativeAsset};
use brandcheck::pipeline::{Pipeline, RunOutcome};
use brandcheck::worker::{AssetJobResult, AssetQueue, EnqueueRequest, WorkerPool};

const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "brandcheck", version, about = "Creative-asset brand compliance pipeline")]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, env = "BRANDCHECK_CONFIG", default_value = "brandcheck.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker pool and the pending sweep until interrupted
    Serve,

    /// Register a new asset as pending
    Enqueue {
        #[arg(long)]
        storage_path: String,
        #[arg(long)]
        campaign_id: String,
        #[arg(long)]
        brand_id: String,
        /// Defaults to the last segment of the storage path
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        asset_id: Option<String>,
        #[arg(long)]
        organization_id: Option<String>,
        /// Guessed from the file name when omitted
        #[arg(long)]
        mime_type: Option<String>,
    },

    /// Move a failed asset back to pending
    Requeue { asset_id: String },

    /// Show one asset, or list assets
    Status {
        asset_id: Option<String>,
        /// pending, processing, completed or failed
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        campaign_id: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: u64,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create or replace a brand's vocabulary rules
    Brand {
        brand_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        pronunciation: Option<String>,
        /// Comma-separated banned terms
        #[arg(long = "banned", value_delimiter = ',')]
        banned_terms: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    init_logging(config.log_format)?;

    let db_path = config
        .database_path()
        .ok_or_else(|| anyhow!("could not determine a database path; set database_path"))?;
    let repo: Arc<dyn AssetRepository> =
        Arc::new(SqliteAssetRepository::new(Database::open(&db_path)?));

    match cli.command {
        Command::Serve => serve(&config, repo),
        Command::Enqueue {
            storage_path,
            campaign_id,
            brand_id,
            display_name,
            asset_id,
            organization_id,
            mime_type,
        } => {
            let display_name = display_name.unwrap_or_else(|| {
                storage_path
                    .rsplit('/')
                    .next()
                    .unwrap_or(storage_path.as_str())
                    .to_string()
            });
            let request = EnqueueRequest {
                asset_id,
                storage_path,
                campaign_id,
                brand_id,
                organization_id,
                mime_type,
                display_name,
            };
            let id = AssetQueue::detached(repo).enqueue(request)?;
            println!("{}", id);
            Ok(())
        }
        Command::Requeue { asset_id } => {
            AssetQueue::detached(repo).requeue(&asset_id)?;
            println!("{} requeued", asset_id);
            Ok(())
        }
        Command::Status {
            asset_id: Some(asset_id),
            json,
            ..
        } => {
            let asset = repo
                .find(&asset_id)?
                .ok_or_else(|| anyhow!("asset not found: {}", asset_id))?;
            print_asset(&asset, json)
        }
        Command::Status {
            asset_id: None,
            status,
            campaign_id,
            limit,
            ..
        } => {
            let status = status
                .map(|s| AssetStatus::parse(&s).ok_or_else(|| anyhow!("unknown status: {}", s)))
                .transpose()?;
            let filter = AssetFilter {
                status,
                campaign_id,
                limit: Some(limit),
            };
            for asset in repo.list(&filter)? {
                println!("{}", summary_line(&asset));
            }
            Ok(())
        }
        Command::Brand {
            brand_id,
            name,
            pronunciation,
            banned_terms,
        } => {
            let brand = BrandConfig {
                brand_id,
                brand_name: name,
                phonetic_pronunciation: pronunciation,
                banned_terms: banned_terms
                    .into_iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect(),
            };
            repo.upsert_brand(&brand)?;
            println!("{} saved", brand.brand_id);
            Ok(())
        }
    }
}

fn init_logging(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_target(false)),
        )?,
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))?
        }
    }

    // Route `log` records from the library into the subscriber.
    tracing_log::LogTracer::init()?;
    Ok(())
}

fn serve(config: &Config, repo: Arc<dyn AssetRepository>) -> Result<()> {
    let pipeline = Arc::new(Pipeline::from_config(config, Arc::clone(&repo))?);
    let pool = WorkerPool::new(pipeline, config.worker_count, config.queue_capacity)?;
    let queue = AssetQueue::new(repo, pool.job_sender());

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .context("installing the Ctrl-C handler")?;

    info!(
        workers = config.worker_count,
        queue_capacity = config.queue_capacity,
        "brandcheck serving"
    );

    let mut next_sweep = Instant::now();
    while running.load(Ordering::SeqCst) {
        if Instant::now() >= next_sweep {
            if let Err(e) = queue.resubmit_pending() {
                error!(error = %e, "Pending sweep failed");
            }
            next_sweep = Instant::now() + config.sweep_interval();
        }

        while let Some(result) = pool.try_recv_result() {
            log_result(&result);
        }
        thread::sleep(RESULT_POLL_INTERVAL);
    }

    pool.shutdown();
    while let Some(result) = pool.try_recv_result() {
        log_result(&result);
    }
    pool.wait();
    info!("brandcheck stopped");
    Ok(())
}

fn log_result(result: &AssetJobResult) {
    match &result.outcome {
        RunOutcome::Completed {
            overall_status,
            compliance_score,
        } => info!(
            asset_id = %result.asset_id,
            overall_status = %overall_status,
            compliance_score,
            "Run completed"
        ),
        RunOutcome::Failed { stage, message } => warn!(
            asset_id = %result.asset_id,
            stage = %stage,
            error = %message,
            "Run failed"
        ),
        RunOutcome::Skipped => {}
    }
}

fn summary_line(asset: &CreativeAsset) -> String {
    let verdict = asset
        .overall_status
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string());
    let score = asset
        .compliance_score
        .map(|s| format!("{}%", s))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}\t{}\t{}\t{}\t{}",
        asset.asset_id, asset.status, verdict, score, asset.display_name
    )
}

fn print_asset(asset: &CreativeAsset, json: bool) -> Result<()> {
    if json {
        let report = serde_json::json!({
            "asset_id": asset.asset_id,
            "status": asset.status,
            "overall_status": asset.overall_status,
            "compliance_score": asset.compliance_score,
            "frontend_report": asset.frontend_report,
            "error_detail": asset.error_detail,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", summary_line(asset));
    if let Some(entries) = &asset.frontend_report {
        for entry in entries {
            println!("  [{}] {}: {}", entry.result, entry.check_name, entry.details);
        }
    }
    if let Some(detail) = &asset.error_detail {
        println!("  failed during {}: {}", detail.stage, detail.message);
    }
    Ok(())
}
