//! Model Trainer CLI
//!
//! Serves the training API and manages the SQLite store behind it.

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use modeltrainer_api::{ApiConfig, ApiServer};
use modeltrainer_core::{ConfigManager, TrainerConfig, TrainingOrchestrator};
use modeltrainer_databases::{NewUser, SQLiteManager};

#[derive(Parser)]
#[command(name = "modeltrainer")]
#[command(about = "Train and catalog tabular ML models over HTTP")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Create the database schema
    InitDb,
    /// Write the effective configuration to the config file
    InitConfig,
    /// Register an account that can own models
    CreateUser {
        #[arg(long)]
        email: String,

        #[arg(long)]
        username: String,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        #[arg(long)]
        role: Option<String>,

        #[arg(long)]
        phone_number: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Env overrides are applied on load
    let mut manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path)?,
        None => ConfigManager::new()?,
    };

    if let Commands::Serve { host, port } = &cli.command {
        let config = manager.get_config_mut();
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }
    manager.validate_config()?;

    let _guard = logging::init(&manager.get_config().logging, cli.verbose);
    info!("{}", config_source(&manager));

    match cli.command {
        Commands::Serve { .. } => serve(manager.into_config()).await?,
        Commands::InitDb => {
            let store = open_store(manager.get_config())?;
            info!(
                "Database schema ready at {}",
                store.get_database_path().display()
            );
        }
        Commands::InitConfig => {
            manager.save_config()?;
            println!("{}", manager.get_config_path().display());
        }
        Commands::CreateUser {
            email,
            username,
            first_name,
            last_name,
            role,
            phone_number,
        } => {
            let store = open_store(manager.get_config())?;
            let user = NewUser {
                email,
                username,
                first_name,
                last_name,
                hashed_password: None,
                role,
                phone_number,
            };
            let id = store
                .create_user(&user)
                .with_context(|| format!("Failed to create user {}", user.username))?;
            info!("Created user {} with id {}", user.username, id);
            println!("{}", id);
        }
    }

    Ok(())
}

/// Where the effective configuration came from; logged once the subscriber is up
fn config_source(manager: &ConfigManager) -> String {
    let path = manager.get_config_path().display();
    if manager.config_exists() {
        format!("Loaded configuration from {}", path)
    } else {
        format!("No configuration at {}, using defaults", path)
    }
}

fn open_store(config: &TrainerConfig) -> Result<SQLiteManager> {
    let store = SQLiteManager::new(&config.database.path).with_context(|| {
        format!(
            "Failed to open database {}",
            config.database.path.display()
        )
    })?;
    store.initialize_schema()?;
    Ok(store)
}

async fn serve(config: TrainerConfig) -> Result<()> {
    let store = open_store(&config)?;
    let orchestrator = Arc::new(TrainingOrchestrator::from_settings(&config.training));
    let api_config = ApiConfig::from_trainer_config(&config);

    info!(
        "Accepting uploads up to {} bytes",
        api_config.max_upload_bytes
    );
    ApiServer::new(api_config, store, orchestrator).start().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_reports_missing_file() {
        let manager = ConfigManager::with_path("/nonexistent/modeltrainer/config.toml").unwrap();
        let message = config_source(&manager);
        assert!(message.starts_with("No configuration at"));
        assert!(message.contains("using defaults"));
    }
}
