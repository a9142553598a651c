//! Helmdeck - terminal administration console
//!
//! A single binary fronting the core library:
//! - interactive console (default): login, module menu, reports
//! - `helmdeck status`: module table without logging in
//! - `helmdeck check`: startup self-check for scripts and cron

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use helmdeck_core::auth::{AuthorizedKeys, SessionAuthenticator};
use helmdeck_core::config::Config;
use helmdeck_core::modules::builtin_catalog;
use helmdeck_core::paths;
use helmdeck_core::registry::{HostCapabilities, ModuleRegistry};

mod console;

/// Helmdeck - server stack administration from the terminal
#[derive(Parser)]
#[command(name = "helmdeck")]
#[command(about = "Terminal administration console", long_about = None)]
struct Cli {
    /// Path to the settings document (defaults to ~/.helmdeck/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the module status table and exit
    Status,

    /// Run the startup self-check: config, operator keys, capability probes,
    /// module discovery. Exits non-zero on a fatal startup error.
    Check,
}

/// Everything the console needs, built once at startup.
struct Runtime {
    auth: Arc<SessionAuthenticator>,
    registry: ModuleRegistry,
    host: HostCapabilities,
}

fn bootstrap(config_path: Option<PathBuf>) -> Result<Runtime> {
    let config_path = config_path.unwrap_or_else(paths::default_config_path);
    let config = Arc::new(Config::load(&config_path)?);
    let authorized = AuthorizedKeys::load(&config.auth.authorized_key_source)?;

    let auth = Arc::new(SessionAuthenticator::new(&config.auth, authorized));
    let host = HostCapabilities::detect();
    let registry = ModuleRegistry::discover(
        auth.clone(),
        host.clone(),
        config,
        builtin_catalog(),
    )?;
    registry.validate_all();
    registry.load_all();

    Ok(Runtime {
        auth,
        registry,
        host,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log to file, never stdout, so the console stays clean.
    let log_dir = paths::logs_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory: {}", e);
    }
    if let Ok(log_file) = std::fs::File::create(log_dir.join("helmdeck.log")) {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(tracing::Level::INFO.into()),
            )
            .with_writer(std::sync::Mutex::new(log_file))
            .with_ansi(false)
            .init();
    }

    let runtime = match bootstrap(cli.config) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("startup failed: {e:#}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Status) => {
            console::print_status_table(&runtime.registry);
            Ok(())
        }
        Some(Commands::Check) => {
            console::print_self_check(&runtime.host, &runtime.registry);
            Ok(())
        }
        None => console::run(runtime.auth, runtime.registry).await,
    }
}
