//! CLI entry point for the batchfetch tool.

use std::io::{self, IsTerminal, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use batchfetch_core::{BatchRunner, Executor, RequestConfig, RequestSpec};
use clap::Parser;
use tracing::{debug, error, info};

mod cli;

use cli::Args;

/// Everything but the URL, shared by every request in the run.
#[derive(Debug)]
struct RequestTemplate {
    method: String,
    headers: Vec<(String, String)>,
    form: Vec<(String, String)>,
    json: Option<serde_json::Value>,
    config: RequestConfig,
}

impl RequestTemplate {
    fn from_args(args: &Args) -> Self {
        Self {
            method: args.method.clone(),
            headers: args.headers.clone(),
            form: args.form.clone(),
            json: args.json.clone(),
            config: args.request_config(),
        }
    }

    fn build(&self, url: &str) -> RequestSpec {
        let mut spec = RequestSpec::new(url, self.method.as_str())
            .with_config(self.config)
            .with_headers(self.headers.iter().cloned());
        if !self.form.is_empty() {
            spec = spec.with_form(self.form.iter().cloned());
        }
        if let Some(json) = &self.json {
            spec = spec.with_json(json);
        }
        spec
    }
}

/// Non-empty lines that are not `#` comments.
fn parse_targets(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    // Read input: from positional args or stdin
    let targets = if !args.urls.is_empty() {
        args.urls.clone()
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        parse_targets(&buffer)
    } else {
        info!("No input provided. Pipe URLs via stdin or pass as arguments.");
        info!("Example: echo 'https://example.com/data.json' | batchfetch");
        return Ok(());
    };

    if targets.is_empty() {
        info!("No URLs found in input");
        return Ok(());
    }

    let total = targets.len();
    info!(urls = total, concurrency = args.concurrency, "Batchfetch starting");

    let template = Arc::new(RequestTemplate::from_args(&args));
    let executor = Executor::new();
    let failures = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&failures);
    BatchRunner::new(usize::from(args.concurrency))?
        .run(targets, move |url| {
            let spec = template.build(&url);
            let executor = executor.clone();
            let failures = Arc::clone(&sink);
            async move {
                let response = match executor.execute(spec).await {
                    Ok(response) => response,
                    Err(e) => {
                        error!(url = %url, error = %e, "request failed");
                        failures.fetch_add(1, Ordering::SeqCst);
                        return;
                    }
                };
                let status = response.status();
                match response.bytes().await {
                    Ok(body) => info!(url = %url, status = status.as_u16(), bytes = body.len(), "fetched"),
                    Err(e) => {
                        error!(url = %url, status = status.as_u16(), error = %e, "reading body failed");
                        failures.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        })
        .await?;

    let failed = failures.load(Ordering::SeqCst);
    info!(total, succeeded = total - failed, failed, "Batch complete");

    if failed > 0 {
        bail!("{failed} of {total} requests failed");
    }
    Ok(())
}
