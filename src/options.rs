//! Options shared by every command: request headers, namespace bindings,
//! transport settings and output format

use crate::service::Service;
use crate::transport::{HttpConfig, HttpTransport};
use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Header sent with every request, "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER", env = "LINKWALK_HEADER", value_delimiter = '\n')]
    pub headers: Vec<String>,

    /// Namespace binding for queries, "prefix=uri" (repeatable)
    #[arg(long = "ns", value_name = "PREFIX=URI")]
    pub namespaces: Vec<String>,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "30000", env = "LINKWALK_TIMEOUT")]
    pub timeout: u64,

    /// User-Agent header
    #[arg(long, env = "LINKWALK_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Output format: json (default) or yaml
    #[arg(long, short, default_value = "json")]
    pub format: String,
}

impl ClientArgs {
    /// Build the root service for `url` from these options.
    pub fn service(&self, url: &str) -> Result<Service> {
        let mut config = HttpConfig {
            timeout_ms: self.timeout,
            ..HttpConfig::default()
        };
        if let Some(ua) = &self.user_agent {
            config.user_agent = ua.clone();
        }
        let transport = HttpTransport::new(&config).context("Failed to build HTTP client")?;

        let mut service = Service::with_transport(url, Arc::new(transport));
        for raw in &self.headers {
            let (name, value) = parse_header(raw)?;
            service = service.header(name, value);
        }
        for raw in &self.namespaces {
            let (prefix, uri) = parse_binding(raw)?;
            service = service.namespace(prefix, uri);
        }
        Ok(service)
    }

    /// Serialize `value` in the selected format.
    pub fn render<T: Serialize>(&self, value: &T) -> Result<String> {
        Ok(match self.format.as_str() {
            "yaml" | "yml" => serde_yaml::to_string(value)?,
            _ => serde_json::to_string_pretty(value)?,
        })
    }
}

/// Split "Name: value".
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("Invalid header '{}': expected \"Name: value\"", raw);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid header '{}': empty name", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Split "prefix=uri".
pub fn parse_binding(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((prefix, uri)) if !prefix.trim().is_empty() && !uri.trim().is_empty() => {
            Ok((prefix.trim().to_string(), uri.trim().to_string()))
        }
        _ => bail!("Invalid namespace binding '{}': expected prefix=uri", raw),
    }
}
