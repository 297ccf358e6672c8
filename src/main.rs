use anyhow::Context;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gator::commands::{Command, State};
use gator::config::ConfigStore;
use gator::db::Database;
use gator::handlers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout is for command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let command = Command::from_args(std::env::args().skip(1))?;

    // Load configuration
    let config_store = ConfigStore::default_location()?;
    let config = config_store
        .read()
        .with_context(|| format!("failed to load {}", config_store.path().display()))?;
    debug!("Loaded config from {}", config_store.path().display());

    // Initialize database
    let db = Database::new(&config.db_url)
        .await
        .with_context(|| format!("failed to open database {}", config.db_url))?;
    db.initialize().await?;

    let mut state = State::new(db, config, config_store);
    let commands = handlers::registry();
    commands.run(&mut state, &command).await?;

    Ok(())
}
