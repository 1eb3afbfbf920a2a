//! The pixelforge server binary.

use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pixelforge_core::{
    config::{CreditPolicy, ProviderConfig, SandboxBackendKind, SandboxSettings},
    generation::GenerationClient,
    management::db,
    sandbox::SandboxEngine,
};
use pixelforge_server::{
    config::{self, Config},
    route, AppState, ServerResult,
};
use pixelforge_utils::{
    get_env_or, DATA_SUBDIR, DEFAULT_SERVER_PORT, PROJECT_DB_FILENAME,
    SERVICE_CREDENTIAL_ENV_VAR,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "pfserver", author, version, about = "Pixelforge platform server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the server
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = DEFAULT_SERVER_PORT)]
        port: u16,

        /// Pixelforge home directory
        #[arg(long)]
        home: Option<PathBuf>,

        /// Server key used to validate API keys
        #[arg(long, env = "PIXELFORGE_SERVER_KEY")]
        key: Option<String>,

        /// Run in development mode (no key required, unconfined sandbox)
        #[arg(long)]
        dev: bool,

        /// Use the jailed sandbox backend (requires the isolation tool)
        #[arg(long)]
        jailed: bool,
    },

    /// Issue an API key for a user
    Keygen {
        /// Server key to sign with
        #[arg(long, env = "PIXELFORGE_SERVER_KEY")]
        key: String,

        /// User the key authenticates
        #[arg(long)]
        user: String,

        /// Key lifetime in days
        #[arg(long, default_value_t = config::DEFAULT_API_KEY_DAYS)]
        days: i64,
    },
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            port,
            home,
            key,
            dev,
            jailed,
        } => serve(port, home, key, dev, jailed).await?,
        Command::Keygen { key, user, days } => {
            let token = config::generate_api_key(&key, &user, days)?;
            println!("{}", token);
        }
    }

    Ok(())
}

async fn serve(
    port: u16,
    home: Option<PathBuf>,
    key: Option<String>,
    dev: bool,
    jailed: bool,
) -> ServerResult<()> {
    let service_credential = match get_env_or(SERVICE_CREDENTIAL_ENV_VAR, "") {
        credential if credential.is_empty() => None,
        credential => Some(credential),
    };

    let config = Arc::new(Config::new(key, port, home, dev, service_credential)?);

    let backend = if jailed {
        SandboxBackendKind::Jailed
    } else {
        SandboxBackendKind::Unconfined
    };

    let engine = Arc::new(SandboxEngine::new(SandboxSettings::from_env(backend))?);
    let codegen = Arc::new(GenerationClient::new(ProviderConfig::from_env()));

    let db_path = config
        .get_home_dir()
        .join(DATA_SUBDIR)
        .join(PROJECT_DB_FILENAME);
    let pool = db::get_or_create_pool(&db_path).await?;

    let state = AppState::new(config.clone(), pool, engine, codegen, CreditPolicy::default());
    let router = route::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.get_addr())
        .await
        .map_err(|e| {
            pixelforge_server::ServerError::InternalError(format!(
                "failed to bind {}: {}",
                config.get_addr(),
                e
            ))
        })?;

    tracing::info!(addr = %config.get_addr(), backend = ?backend, "pixelforge server listening");

    axum::serve(listener, router).await.map_err(|e| {
        pixelforge_server::ServerError::InternalError(format!("server error: {}", e))
    })?;

    Ok(())
}
