use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use taskclock::api::{create_router, AppState};
use taskclock::config::Config;
use taskclock::domain::format_duration;
use taskclock::manager::TaskManager;
use taskclock::persistence::{init_local_data_dir, resolve_data_dir, Store};
use taskclock::report::generate_report;
use taskclock::sync::{SyncScheduler, TodoistClient};

#[derive(Parser)]
#[command(name = "taskclock")]
#[command(version, about = "Track time on your Todoist tasks from the terminal or a browser", long_about = None)]
struct Cli {
    /// Data directory (defaults to the nearest .taskclock, then ~/.taskclock)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Todoist API token (overrides TODOIST_API_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API with background sync
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// Seconds between background syncs (minimum 60)
        #[arg(long)]
        sync_interval: Option<u64>,
    },
    /// Initialize a local .taskclock directory in the current directory
    Init,
    /// Pull tasks from Todoist into the local cache
    Sync,
    /// Start the timer on a task
    Start { task_id: String },
    /// Stop the timer on a task
    Stop {
        #[arg(required_unless_present = "all")]
        task_id: Option<String>,
        /// Close every open entry and clear the timer, whatever task it is on
        #[arg(long, conflicts_with = "task_id")]
        all: bool,
    },
    /// Complete a task on Todoist and locally
    Complete { task_id: String },
    /// Show the active task and open tasks (default)
    Status,
    /// Write a CSV time report
    Export {
        /// Only include entries for this task
        #[arg(short, long)]
        task: Option<String>,
        /// Output file path. Defaults to <data dir>/exports/time_report.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let mut config = Config::from_env().context("Invalid configuration")?;
    if cli.token.is_some() {
        config.api_token = cli.token;
    }

    if let Some(Commands::Init) = cli.command {
        let cwd = std::env::current_dir().context("Could not determine current directory")?;
        let data_dir = init_local_data_dir(cwd)?;
        println!("Initialized taskclock directory: {}", data_dir.display());
        println!();
        println!("taskclock will now use this local directory for its data.");
        println!("Run 'taskclock sync' to pull your tasks.");
        return Ok(());
    }

    let data_dir = resolve_data_dir(cli.data_dir.or_else(|| config.data_dir.clone()))?;
    info!(data_dir = %data_dir.display(), "Using data directory");

    let store = Arc::new(Store::new(data_dir));
    let client = TodoistClient::new(config.api_base.clone()).context("Failed to build HTTP client")?;
    let manager = Arc::new(TaskManager::new(Arc::clone(&store), client));

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Init => Ok(()),
        Commands::Serve {
            host,
            port,
            sync_interval,
        } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(secs) = sync_interval {
                config.sync_interval_secs = secs;
            }
            serve(manager, &config).await
        }
        Commands::Sync => {
            let token = config.require_token()?;
            let outcome = manager.task_sync().sync_outcome(token).await;
            if !outcome.saved {
                bail!("Could not write the task cache");
            }
            if outcome.degraded {
                println!("Todoist could not be reached; the task cache is now empty.");
            } else {
                println!("Synced {} tasks.", outcome.fetched);
            }
            Ok(())
        }
        Commands::Start { task_id } => {
            let token = config.require_token()?;
            if !manager.start_work(&task_id, token).await {
                bail!("Could not start task {} (unknown task or another timer is running)", task_id);
            }
            println!("Started {}", task_id);
            Ok(())
        }
        Commands::Stop { all: true, .. } => {
            let closed = manager.stop_all_work();
            println!("Stopped {} running entries; timer cleared", closed);
            Ok(())
        }
        Commands::Stop {
            task_id: Some(task_id),
            ..
        } => {
            if !manager.stop_work(&task_id) {
                bail!("Task {} is not running", task_id);
            }
            println!("Stopped {} ({} total)", task_id, format_duration(manager.total_time(&task_id)));
            Ok(())
        }
        Commands::Stop { task_id: None, .. } => bail!("Give a task id or --all"),
        Commands::Complete { task_id } => {
            let token = config.require_token()?;
            if !manager.complete_task(&task_id, token).await {
                bail!("Task {} was only partially completed; see the log for details", task_id);
            }
            println!("Completed {}", task_id);
            Ok(())
        }
        Commands::Status => {
            print_status(&manager);
            Ok(())
        }
        Commands::Export { task, output } => {
            let path = generate_report(&store, task.as_deref(), output)?;
            println!("Report written: {}", path.display());
            Ok(())
        }
    }
}

fn print_status(manager: &TaskManager) {
    match manager.active_task_summary() {
        Some(summary) => println!(
            "Active: {} [{}] {} this session, {} total",
            summary.task.content,
            summary.task.id,
            format_duration(summary.current_session_duration),
            format_duration(summary.total_time_seconds)
        ),
        None => println!("No active task"),
    }

    match manager.state().last_sync() {
        Some(at) => println!("Last sync: {}", at),
        None => println!("Last sync: never"),
    }

    let tasks = manager.incomplete_tasks();
    if tasks.is_empty() {
        return;
    }
    println!();
    for task in tasks {
        println!(
            "  {:<12} {:>10}  {}",
            task.id,
            format_duration(manager.total_time(&task.id)),
            task.content
        );
    }
}

async fn serve(manager: Arc<TaskManager>, config: &Config) -> Result<()> {
    let scheduler = SyncScheduler::new(manager.task_sync());
    match config.api_token.as_deref() {
        Some(token) => {
            scheduler.start(token, config.sync_interval_secs);
        }
        None => warn!("No Todoist token configured, background sync disabled"),
    }

    let app = create_router(AppState::new(manager));
    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!(address = %bind_addr, "Server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    scheduler.stop().await;
    info!("Server shutdown complete");
    served.context("Server error")
}

fn init_logging(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
