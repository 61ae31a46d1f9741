//! eve-control CLI
//!
//! Controls tickets at a checkpoint from the terminal. A barcode scanner in
//! keyboard mode types one ticket ID per line into `evectl run`.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::info;

use evectl_cli::audio::TerminalBell;
use evectl_cli::config::FileStore;
use evectl_cli::history_cmd;
use evectl_cli::http::{DEFAULT_TIMEOUT, ReqwestHttp};
use evectl_cli::presenter::TerminalPresenter;
use evectl_cli::scan::ScanLoop;
use evectl_cli::settings_cmd::{self, SettingsAction};
use evectl_core::host::KeyValueStore;
use evectl_core::tracing_init::init_tracing;
use evectl_core::{App, Host};

#[derive(Parser, Debug)]
#[command(name = "evectl")]
#[command(version, about = "Checkpoint ticket controller", long_about = None)]
struct Cli {
    /// Store file holding settings and history (default: ~/.evectl/store.json)
    #[arg(long, env = "EVECTL_STORE", global = true)]
    store: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs(), global = true)]
    timeout: u64,

    /// Emit JSON log lines on stderr
    #[arg(long, env = "EVECTL_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and control the tickets read from stdin (default).
    Run {
        /// Checkpoint ID to control against.
        #[arg(short, long, env = "EVECTL_CHECKPOINT")]
        checkpoint: Option<String>,
    },
    /// Show or change the settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Print the saved history.
    History {
        /// Delete it instead.
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing("evectl=warn,evectl_cli=warn,evectl_core=warn", cli.log_json);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting evectl");

    let store: Arc<dyn KeyValueStore> = Arc::new(match cli.store {
        Some(path) => FileStore::new(path),
        None => FileStore::open_default()?,
    });
    let mut out = io::stdout();

    let command = cli.command.unwrap_or_else(|| Command::Run {
        checkpoint: std::env::var("EVECTL_CHECKPOINT").ok(),
    });
    match command {
        Command::Settings { action } => settings_cmd::run(action, store, &mut out).await,
        Command::History { clear } => history_cmd::run(clear, store, &mut out).await,
        Command::Run { checkpoint } => run(store, cli.timeout, checkpoint).await,
    }
}

async fn run(
    store: Arc<dyn KeyValueStore>,
    timeout: u64,
    checkpoint: Option<String>,
) -> anyhow::Result<()> {
    let presenter = Arc::new(TerminalPresenter::stdout());
    let host = Host {
        http: Arc::new(ReqwestHttp::new(Duration::from_secs(timeout))?),
        store,
        audio: Arc::new(TerminalBell::stderr()),
        presenter: presenter.clone(),
    };
    let mut scan = ScanLoop::new(App::new(host), presenter, checkpoint);

    tokio::select! {
        result = scan.run(BufReader::new(tokio::io::stdin())) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(())
        }
    }
}
