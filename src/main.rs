//! linkwalk CLI
//!
//! Follow hypermedia link relations across HTTP resources.

use anyhow::Result;
use clap::{Parser, Subcommand};

use linkwalk::follow::{run_follow, FollowArgs};
use linkwalk::links::{run_links, LinksArgs};
use linkwalk::select::{run_select, SelectArgs};

#[derive(Parser)]
#[command(name = "linkwalk")]
#[command(author = "RoyalBit Inc.")]
#[command(version)]
#[command(about = "Follow hypermedia link relations across HTTP resources")]
#[command(long_about = "Resolves relations from RFC 5988 Link headers, falling back to <link> elements in XML bodies.\n\nCommands:\n  follow   Walk a chain of relations from a root URL\n  links    Report the relations each URL offers\n  select   Evaluate a path query against an XML resource")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk a chain of relations from a root URL
    Follow(FollowArgs),
    /// Report the Link header and body relations of URLs
    Links(LinksArgs),
    /// Evaluate a path query against an XML resource
    Select(SelectArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Follow(args) => run_follow(args).await,
        Commands::Links(args) => run_links(args).await,
        Commands::Select(args) => run_select(args).await,
    }
}
