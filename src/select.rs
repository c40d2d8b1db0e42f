//! select command: Evaluate a path query against an XML resource

use crate::options::ClientArgs;
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

#[derive(Args)]
pub struct SelectArgs {
    /// URL of an XML resource
    pub url: String,

    /// Path query, e.g. "//atom:entry/atom:title"
    pub query: String,

    /// Follow these relations before querying (repeatable)
    #[arg(long = "via", value_name = "REL")]
    pub via: Vec<String>,

    #[command(flatten)]
    pub client: ClientArgs,
}

#[derive(Debug, Serialize)]
pub struct Selection {
    pub url: String,
    pub query: String,
    pub count: usize,
    pub values: Vec<String>,
}

pub async fn run_select(args: SelectArgs) -> Result<()> {
    let root = args.client.service(&args.url)?;
    let service = root
        .follow_path(&args.via)
        .await
        .with_context(|| format!("Failed to follow {:?} from {}", args.via, args.url))?;

    let rep = service
        .fetch()
        .await
        .with_context(|| format!("Failed to fetch {}", service.url()))?;
    let values = rep
        .query(&args.query)
        .with_context(|| format!("Query failed on {}", service.url()))?;

    eprintln!("{} match{}", values.len(), if values.len() == 1 { "" } else { "es" });

    let selection = Selection {
        url: service.url().to_string(),
        query: args.query.clone(),
        count: values.len(),
        values,
    };
    println!("{}", args.client.render(&selection)?);

    Ok(())
}
