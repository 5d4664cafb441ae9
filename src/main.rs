use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use web_vision::browser::CdpDriver;
use web_vision::config;
use web_vision::engine::RunController;
use web_vision::oracle::{check_health, HttpTransport};
use web_vision::session::Session;
use web_vision::store::FsStore;

/// Web Vision - autonomous end-to-end browser testing with vision model analysis
#[derive(Parser, Debug)]
#[command(
    name = "web-vision",
    about = "Autonomous end-to-end browser testing with vision model analysis",
    after_help = "ENVIRONMENT VARIABLES:\n\
        WEB_VISION_ORACLE_ENDPOINT    Oracle API endpoint URL\n\
        WEB_VISION_ORACLE_MODEL       Oracle model name\n\
        WEB_VISION_API_KEY            Oracle API key (fallback: CLAUDE_API_KEY)\n\
        WEB_VISION_STORE_DIR          Base directory for the run store\n\
        WEB_VISION_SCREENSHOT_DIR     Working directory for screenshots\n\
        JOB_NAME                      Default job name for `run`\n\
        TESTSUITE_ID                  Default test suite id for `run`"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a test suite run against a live browser
    Run {
        /// Job name identifying this run's record in the store
        #[arg(short, long, env = "JOB_NAME")]
        job_name: Option<String>,

        /// Id of the test suite to execute
        #[arg(short, long, env = "TESTSUITE_ID")]
        suite_id: Option<String>,
    },

    /// Create a test suite (one step per line) and a run record for it
    Seed {
        /// Suite name
        #[arg(short, long)]
        name: String,

        /// File with one plain-English test step per line
        #[arg(short, long)]
        steps: PathBuf,

        /// Job name to register (default: generated)
        #[arg(short, long)]
        job_name: Option<String>,
    },

    /// Check that the oracle endpoint is reachable
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match args.command {
        Some(Commands::Run { job_name, suite_id }) => {
            // Entry contract: both identifiers must be present, or the run
            // never starts.
            let (Some(job_name), Some(suite_id)) = (job_name, suite_id) else {
                error!("JOB_NAME and TESTSUITE_ID are required to start a run");
                std::process::exit(1);
            };

            let cfg = config::get();
            let store = Arc::new(FsStore::open(&cfg.store.base_dir)?);
            let transport = Arc::new(HttpTransport::new());
            let driver = Arc::new(CdpDriver::launch(&cfg.browser).await?);
            let session = Session::new(&job_name, &cfg.browser.screenshot_dir)?;

            let mut controller =
                RunController::new(driver, transport, store, &job_name, &suite_id, session);

            info!(job = %job_name, suite = %suite_id, "starting suite run");
            controller.start().await?;
            println!("Run {} completed successfully", job_name);
        }

        Some(Commands::Seed { name, steps, job_name }) => {
            let content = std::fs::read_to_string(&steps)?;
            let step_list: Vec<String> = content
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            if step_list.is_empty() {
                return Err(format!("{} contains no test steps", steps.display()).into());
            }

            let cfg = config::get();
            let store = FsStore::open(&cfg.store.base_dir)?;
            let suite = store.create_suite(&name, &step_list)?;
            let job_name = job_name
                .unwrap_or_else(|| format!("job_{}", chrono::Utc::now().timestamp_millis()));
            let pod = store.create_pod(&job_name, &suite.id)?;

            println!("Created suite {} with {} steps", suite.id, suite.steps.len());
            println!("Registered run record {} for job {}", pod.id, pod.jobname);
            println!();
            println!(
                "Start the run with: web-vision run --job-name {} --suite-id {}",
                pod.jobname, suite.id
            );
        }

        Some(Commands::Check) => {
            let endpoint = config::oracle_endpoint();
            match check_health(&endpoint, 5).await {
                Ok(true) => println!("Oracle endpoint responding at {}", endpoint),
                Ok(false) | Err(_) => {
                    eprintln!("Oracle endpoint not responding at {}", endpoint);
                    std::process::exit(1);
                }
            }
        }

        None => {
            println!("Web Vision - autonomous end-to-end browser testing");
            println!();
            println!("Usage: web-vision <COMMAND>");
            println!();
            println!("Commands:");
            println!("  run    Execute a test suite run against a live browser");
            println!("  seed   Create a test suite and a run record for it");
            println!("  check  Check that the oracle endpoint is reachable");
            println!();
            println!("Run with --help for more information.");
        }
    }

    Ok(())
}
