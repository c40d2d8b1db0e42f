//! links command: Fetch URLs and report their link relations
//!
//! Shows what each resource offers to navigate to: the Link header table,
//! and for XML bodies the `<link>` elements too. Fetches in parallel.

use crate::options::ClientArgs;
use crate::representation::Representation;
use crate::service::Service;
use anyhow::Result;
use clap::Args;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Args)]
pub struct LinksArgs {
    /// URLs to fetch (multiple allowed)
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Parallel fetches
    #[arg(long, short, default_value = "4")]
    pub parallel: usize,

    /// Max body bytes to decode per page (0 = skip body)
    #[arg(long, default_value = "2000")]
    pub max_bytes: usize,

    #[command(flatten)]
    pub client: ClientArgs,
}

/// Relations offered by one resource
#[derive(Debug, Serialize, Clone)]
pub struct Page {
    pub url: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub header_links: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub body_links: Vec<BodyLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// `<link>` element found in an XML body
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct BodyLink {
    pub rel: String,
    pub href: String,
}

/// Results wrapper for multiple pages
#[derive(Debug, Serialize)]
pub struct LinksResults {
    pub pages: Vec<Page>,
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
}

pub async fn run_links(args: LinksArgs) -> Result<()> {
    let url_count = args.urls.len();
    let parallel = args.parallel.min(url_count).max(1);

    eprintln!(
        "Fetching {} URL{} ({} parallel)...",
        url_count,
        if url_count == 1 { "" } else { "s" },
        parallel
    );

    let limit = Arc::new(Semaphore::new(parallel));
    let max_bytes = args.max_bytes;

    let mut tasks = Vec::with_capacity(url_count);
    for url in &args.urls {
        let service = args.client.service(url)?;
        let limit = Arc::clone(&limit);
        tasks.push(tokio::spawn(async move {
            let _permit = limit.acquire_owned().await;
            inspect(&service, max_bytes).await
        }));
    }

    let results: Vec<Page> = join_all(tasks)
        .await
        .into_iter()
        .zip(&args.urls)
        .map(|(joined, url)| {
            joined.unwrap_or_else(|e| failed(url, format!("fetch task failed: {e}")))
        })
        .collect();

    let ok_count = results.iter().filter(|p| p.ok).count();
    let failed_count = results.len() - ok_count;

    let output = if results.len() == 1 {
        args.client.render(&results[0])?
    } else {
        args.client.render(&LinksResults {
            pages: results,
            total: url_count,
            ok: ok_count,
            failed: failed_count,
        })?
    };

    println!("{}", output);
    eprintln!("Done: {}/{} OK", ok_count, url_count);

    Ok(())
}

async fn inspect(service: &Service, max_bytes: usize) -> Page {
    eprintln!("  -> {}", truncate(service.url(), 60));

    match service.fetch().await {
        Ok(rep) => describe(service.url(), rep, max_bytes).await,
        Err(e) => failed(service.url(), e.to_string()),
    }
}

fn failed(url: &str, err: String) -> Page {
    Page {
        url: url.to_string(),
        ok: false,
        err: Some(err),
        status: None,
        content_type: None,
        variant: None,
        charset: None,
        header_links: BTreeMap::new(),
        body_links: vec![],
        text: None,
    }
}

async fn describe(url: &str, mut rep: Representation, max_bytes: usize) -> Page {
    let body_links = rep.document().map(body_links).unwrap_or_default();
    let text = if max_bytes > 0 {
        rep.decode(Some(max_bytes))
            .await
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    } else {
        None
    };

    Page {
        url: url.to_string(),
        ok: (200..400).contains(&rep.status()),
        err: None,
        status: Some(rep.status()),
        content_type: rep.header("Content-Type"),
        variant: Some(if rep.is_structured() {
            "structured"
        } else {
            "generic"
        }),
        charset: rep.charset().map(str::to_string),
        header_links: rep
            .links()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        body_links,
        text,
    }
}

/// Every `<link rel href>` element in document order.
fn body_links(doc: &crate::xml::Document) -> Vec<BodyLink> {
    let Ok(matches) = doc.query("//*[local-name()='link' and @rel and @href]", &Default::default())
    else {
        return vec![];
    };
    matches
        .iter()
        .map(|m| doc.node(m.node()))
        .filter_map(|e| {
            Some(BodyLink {
                rel: e.attr("rel")?.to_string(),
                href: e.attr("href")?.to_string(),
            })
        })
        .collect()
}

/// Shorten to at most `max` characters, ending in "...".
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
