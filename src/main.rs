use std::net::SocketAddr;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod app;
mod auth;
mod config;
mod db;
mod error;
mod recipes;
mod state;
mod storage;
mod users;
mod validate;

#[cfg(test)]
mod test_support;

use crate::{
    config::{AppConfig, DatabaseConfig},
    db::PgStore,
    state::AppState,
    users::manager::{ExtraFields, UserManager},
};

#[derive(Parser)]
#[command(name = "recipe-api")]
#[command(about = "Recipe management REST API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migrations and serve HTTP (default).
    Serve,
    /// Block until the database accepts connections.
    WaitForDb,
    /// Create an account with staff and superuser rights.
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SUPERUSER_PASSWORD")]
        password: String,
        #[arg(long, default_value = "")]
        name: String,
    },
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "recipe_api=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(AppConfig::from_env()?).await,
        Commands::WaitForDb => {
            let db = DatabaseConfig::from_env()?;
            PgStore::connect(&db.url, 1, db.connect_attempts).await?;
            Ok(())
        }
        Commands::CreateSuperuser { email, password, name } => {
            let state = AppState::init(AppConfig::from_env()?).await?;
            let user = UserManager::new(state.store.as_ref())
                .create_superuser(&email, &password, ExtraFields { name })
                .await
                .context("create superuser")?;
            tracing::info!(user_id = %user.id, email = %user.email, "superuser created");
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("parse listen address")?;
    let app = app::build_app(AppState::init(config).await?);

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
