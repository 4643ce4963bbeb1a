mod catalog;
mod checks;
mod config;
mod generators;
mod handlers;
mod infrahub;
mod models;
mod rack;
mod router;
mod scripts;
mod transforms;
mod utils;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use generators::GeneratorKind;
use infrahub::{InfrahubApi, InfrahubClient};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub client: InfrahubClient,
}

/// Data center topology generators, transforms and service catalog for Infrahub
#[derive(Parser, Debug)]
#[command(name = "bundle-dc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Infrahub address (overrides INFRAHUB_ADDRESS)
    #[arg(long, global = true, env = "INFRAHUB_ADDRESS")]
    address: Option<String>,

    /// Infrahub branch (overrides DEFAULT_BRANCH)
    #[arg(short, long, global = true)]
    branch: Option<String>,

    /// API token (overrides INFRAHUB_API_TOKEN)
    #[arg(long, global = true, env = "INFRAHUB_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the service catalog HTTP API
    Serve,

    /// Load schemas, menus, seed objects, users and the repository
    Bootstrap,

    /// Open a proposed change for a branch (default add-dc3)
    CreatePc,

    /// Create the RBAC demo permissions, roles, groups and accounts
    CreateUsers,

    /// Download generated artifacts to OUTPUT_DIR
    GetConfigs,

    /// Run a generator against a named object
    Generate {
        #[arg(value_enum)]
        generator: GeneratorArg,
        #[arg(long)]
        name: String,
    },

    /// Render a device or topology with one of the transforms
    Render {
        #[arg(value_enum)]
        transform: TransformArg,
        #[arg(long)]
        name: String,
    },

    /// Validate a device
    Check {
        #[arg(value_enum)]
        check: CheckArg,
        #[arg(long)]
        name: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum GeneratorArg {
    Dc,
    Pop,
    Segment,
}

impl From<GeneratorArg> for GeneratorKind {
    fn from(arg: GeneratorArg) -> Self {
        match arg {
            GeneratorArg::Dc => GeneratorKind::Dc,
            GeneratorArg::Pop => GeneratorKind::Pop,
            GeneratorArg::Segment => GeneratorKind::Segment,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TransformArg {
    Leaf,
    Openconfig,
    Cabling,
    Firewall,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CheckArg {
    Leaf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bundle_dc=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut cfg = Config::load();
    if let Some(address) = cli.address {
        if cfg.infrahub_ui_url == cfg.infrahub_address {
            cfg.infrahub_ui_url = address.clone();
        }
        cfg.infrahub_address = address;
    }
    if let Some(token) = cli.token {
        cfg.api_token = token;
    }
    let explicit_branch = cli.branch.clone();
    if let Some(branch) = cli.branch {
        cfg.default_branch = branch;
    }

    let problems = cfg.validate();
    if !problems.is_empty() {
        return Err(anyhow!("Invalid configuration: {}", problems.join("; ")));
    }

    let client = InfrahubClient::new(
        &cfg.infrahub_address,
        &cfg.api_token,
        &cfg.default_branch,
        cfg.api_timeout,
    )?
    .with_retries(cfg.api_retry_count);

    let code = match cli.command {
        Commands::Serve => {
            serve(cfg, client).await?;
            0
        }
        Commands::Bootstrap => {
            scripts::bootstrap::run(&client, &client, &cfg.default_branch, cfg.git_local).await
        }
        Commands::CreatePc => {
            // The proposed change itself lives on main; the flag names the source branch
            let branch = explicit_branch.unwrap_or_else(|| scripts::proposed_change::DEFAULT_BRANCH.to_string());
            let main = client.with_branch("main");
            scripts::proposed_change::run(&main, &cfg.infrahub_ui_url, &branch).await
        }
        Commands::CreateUsers => match scripts::users_roles::run(&client).await {
            Ok(()) => 0,
            Err(e) => {
                tracing::error!("{}", e);
                1
            }
        },
        Commands::GetConfigs => {
            scripts::get_configs::run(&client, &client, Path::new(&cfg.output_dir), &cfg.default_branch).await
        }
        Commands::Generate { generator, name } => {
            let outcome = generators::run(&client, &cfg.default_branch, generator.into(), &name).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            0
        }
        Commands::Render { transform, name } => {
            println!("{}", render(&client, &cfg, transform, &name).await?);
            0
        }
        Commands::Check { check: CheckArg::Leaf, name } => {
            let data = client
                .query(transforms::leaf::LEAF_QUERY, json!({ "device": name }))
                .await?;
            let report = checks::check_leaf(&data)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.passed() {
                0
            } else {
                1
            }
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn render(api: &dyn InfrahubApi, cfg: &Config, transform: TransformArg, name: &str) -> Result<String> {
    let templates_dir = Path::new(&cfg.templates_dir);
    match transform {
        TransformArg::Leaf => {
            let data = api.query(transforms::leaf::LEAF_QUERY, json!({ "device": name })).await?;
            transforms::render_leaf(&data, templates_dir)
        }
        TransformArg::Openconfig => {
            let data = api
                .query(transforms::openconfig::OPENCONFIG_QUERY, json!({ "device": name }))
                .await?;
            Ok(serde_json::to_string_pretty(&transforms::render_openconfig(&data)?)?)
        }
        TransformArg::Cabling => {
            let data = api.query(transforms::cabling::CABLING_QUERY, json!({ "name": name })).await?;
            transforms::render_cabling(&data)
        }
        TransformArg::Firewall => {
            let data = api
                .query(transforms::firewall::FIREWALL_QUERY, json!({ "device": name }))
                .await?;
            transforms::render_firewall(&data, templates_dir)
        }
    }
}

async fn serve(cfg: Config, client: InfrahubClient) -> Result<()> {
    tracing::info!("Starting bundle-dc service catalog");
    tracing::info!("Infrahub: {} (branch {})", cfg.infrahub_address, cfg.default_branch);
    tracing::info!("Listen: {}", cfg.listen_addr);

    let listen_addr = cfg.listen_addr.clone();
    let state = Arc::new(AppState { config: cfg, client });
    let app = router::build(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!("bundle-dc listening on {}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("bundle-dc shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
