use anyhow::Context;
use clap::{Parser, Subcommand};

/// Bookshelf: authors and their books over a REST API
#[derive(Debug, Parser)]
#[command(name = "bookshelf", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Apply migrations and insert the sample author and book
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = bookshelf_kernel::settings::Settings::load()
        .with_context(|| "failed to load bookshelf settings")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => bookshelf_app::app::serve(&settings).await,
        Command::Migrate => bookshelf_app::app::migrate(&settings).await,
        Command::Seed => bookshelf_app::app::seed(&settings).await,
    }
}
