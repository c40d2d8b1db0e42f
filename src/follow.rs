//! follow command: Walk a chain of link relations from a root URL
//!
//! Prints every hop so the path through the hypermedia graph is visible.

use crate::options::ClientArgs;
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

#[derive(Args)]
pub struct FollowArgs {
    /// Root URL to start from
    pub url: String,

    /// Relations to follow, in order (e.g. next next prev)
    pub relations: Vec<String>,

    /// Scope body link search on the first hop to elements matching this query
    #[arg(long)]
    pub filter: Option<String>,

    #[command(flatten)]
    pub client: ClientArgs,
}

/// One step of the walk
#[derive(Debug, Serialize)]
pub struct Hop {
    pub rel: String,
    pub url: String,
}

/// Full walk report
#[derive(Debug, Serialize)]
pub struct FollowReport {
    pub start: String,
    pub hops: Vec<Hop>,
    pub url: String,
}

pub async fn run_follow(args: FollowArgs) -> Result<()> {
    let mut current = args.client.service(&args.url)?;
    if let Some(filter) = &args.filter {
        current = current.find(filter.as_str());
    }

    eprintln!(
        "Following {} relation{} from {}...",
        args.relations.len(),
        if args.relations.len() == 1 { "" } else { "s" },
        args.url
    );

    let mut hops = Vec::with_capacity(args.relations.len());
    for rel in &args.relations {
        current = current
            .follow_link(rel)
            .await
            .with_context(|| format!("Failed to follow '{}' from {}", rel, current.url()))?;
        eprintln!("  {} -> {}", rel, current.url());
        hops.push(Hop {
            rel: rel.clone(),
            url: current.url().to_string(),
        });
    }

    let report = FollowReport {
        start: args.url.clone(),
        url: current.url().to_string(),
        hops,
    };
    println!("{}", args.client.render(&report)?);

    Ok(())
}
