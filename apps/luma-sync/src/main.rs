use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use luma_sync::auth::TokenManager;
use luma_sync::clock::SystemClock;
use luma_sync::config::AppConfig;
use luma_sync::server::{self, AppState};
use luma_sync::session::SessionClient;
use luma_sync::workflow::Orchestrator;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "luma-sync",
    about = "Synchronize with Luma probes and answer their verification jobs",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "LUMA_API_BASE_URL",
        help = "Base URL of the Luma session API"
    )]
    api_base_url: Option<String>,

    #[arg(
        long,
        global = true,
        env = "LUMA_API_TIMEOUT_SECS",
        value_name = "SECS",
        help = "Per-request timeout for the session API"
    )]
    api_timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one synchronization workflow and print its report
    Run(RunArgs),
    /// Serve the HTTP sync trigger
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long, env = "LUMA_USERNAME")]
    username: String,

    #[arg(long, env = "LUMA_EMAIL")]
    email: String,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, env = "LUMA_BIND_ADDR", value_name = "ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // A missing .env is fine; the process environment still applies.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(base_url) = cli.api_base_url.as_deref() {
        config.set_base_url(base_url)?;
    }
    if let Some(secs) = cli.api_timeout_secs {
        config.set_timeout(Duration::from_secs(secs))?;
    }

    match cli.command {
        Command::Run(args) => run_once(config, args).await,
        Command::Serve(args) => {
            if let Some(bind) = args.bind.as_deref() {
                config.set_bind_addr(bind)?;
            }
            serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_once(config: AppConfig, args: RunArgs) -> anyhow::Result<ExitCode> {
    let username = args.username.trim();
    let email = args.email.trim();
    if username.is_empty() || email.is_empty() {
        anyhow::bail!("username and email are required");
    }

    let client = SessionClient::new(config.session, Arc::new(TokenManager::new()))
        .context("failed to build session client")?;
    let orchestrator = Orchestrator::new(client, Arc::new(SystemClock));
    let report = server::run_report(&orchestrator, username, email).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let state = AppState::new(config.session).context("failed to build session backend")?;
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    server::serve(listener, state).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
