use anyhow::Context;
use clap::{Parser, Subcommand};
use readlog_app::{modules::books::BookStore, App};
use readlog_kernel::settings::Settings;

/// Maintenance commands for a readlog database
#[derive(Debug, Parser)]
#[command(name = "readlog-cli", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the database file if needed and apply pending migrations
    Migrate,
    /// Print every recorded book as a JSON array
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load readlog settings")?;
    readlog_telemetry::init_with_writer(&settings.telemetry, std::io::stderr)
        .context("failed to initialize telemetry")?;

    tracing::debug!(env = ?settings.environment, command = ?cli.command, "readlog-cli starting");

    // Opening the app applies pending migrations
    let app = App::open(&settings).await?;

    match cli.command {
        Command::Migrate => {
            tracing::info!(path = %settings.database.path.display(), "database is up to date");
        }
        Command::List => {
            let books = BookStore::new(app.db.pool().clone())
                .list_all()
                .await
                .context("failed to list books")?;
            println!("{}", serde_json::to_string_pretty(&books)?);
        }
    }

    app.db.close().await;
    Ok(())
}
