//! Intrudr command line front end
//!
//! Reads a raw HTTP request, resolves values for its tokens, runs the attack
//! and prints results in job order while writing them to an output directory.

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use intrudr_engine::{
    AttackEngine, AttackMode, AttackPlan, AttackReport, DirectorySink, RequestParser,
    RequestTemplate, TokenKind, ValueResolver, ValueSource,
};
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod console;
pub mod logging;

#[cfg(test)]
mod config_test;

use config::CliConfig;
use console::{render_summary, ConsoleSink};

#[derive(Parser, Debug, Clone)]
#[command(name = "intrudr", author, version, about, long_about = None)]
pub struct Args {
    /// Raw HTTP request file, `-` reads stdin
    #[arg(short, long, default_value = "-")]
    pub request: String,

    /// Token values as TOKEN=VALUE (repeatable) or TOKEN=@wordlist
    #[arg(short = 'v', long = "value", value_name = "TOKEN=VALUE")]
    pub values: Vec<String>,

    /// Attack mode: sniper, pitchfork, battering-ram or clusterbomb
    #[arg(short, long)]
    pub mode: Option<AttackMode>,

    /// Number of concurrent workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Retries after a connection failure or timeout
    #[arg(long)]
    pub retries: Option<u32>,

    /// Proxy URL, e.g. http://127.0.0.1:8080
    #[arg(long)]
    pub proxy: Option<String>,

    /// Verify TLS certificates
    #[arg(long)]
    pub verify_tls: bool,

    /// Do not store the raw bytes of each request
    #[arg(long)]
    pub no_raw: bool,

    /// Output directory for responses and summary.csv
    #[arg(short, long, default_value = "responses")]
    pub output: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Do not echo each request on the console
    #[arg(long)]
    pub hide_requests: bool,

    /// Print the detected tokens and exit
    #[arg(long)]
    pub list_tokens: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Read the raw request named by `--request`
pub fn read_request(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read request from stdin")?;
        Ok(raw)
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read request file {}", source))
    }
}

/// Group `--value` arguments by token
pub fn parse_value_args(values: &[String]) -> anyhow::Result<HashMap<String, ValueSource>> {
    let mut sources: HashMap<String, ValueSource> = HashMap::new();

    for arg in values {
        let (token, value) = arg
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid value '{}': expected TOKEN=VALUE or TOKEN=@file", arg))?;
        let token = token.trim();
        if token.is_empty() {
            bail!("Invalid value '{}': token name is empty", arg);
        }

        let wordlist = value.strip_prefix('@');
        match sources.get_mut(token) {
            Some(ValueSource::Manual { values }) if wordlist.is_none() => {
                values.push(value.to_string())
            }
            Some(_) => bail!("Token {} mixes a wordlist with other values", token),
            None => {
                let source = match wordlist {
                    Some(path) => ValueSource::Wordlist {
                        path: PathBuf::from(path),
                    },
                    None => ValueSource::Manual {
                        values: vec![value.to_string()],
                    },
                };
                sources.insert(token.to_string(), source);
            }
        }
    }

    Ok(sources)
}

/// One line per token: id, kind and detected value
pub fn render_tokens(template: &RequestTemplate) -> String {
    if template.tokens.is_empty() {
        return "No tokens detected; the request will be replayed as is\n".to_string();
    }

    let mut out = String::new();
    for token in &template.tokens {
        let kind = match token.kind {
            TokenKind::Parameter => "parameter",
            TokenKind::Placeholder { .. } => "placeholder",
        };
        out.push_str(&format!("{}\t{}\t{}\n", token.id, kind, token.default));
    }
    out
}

/// Run the tool. Returns `None` when only tokens were listed.
pub async fn run(
    args: Args,
    config: CliConfig,
    cancel: CancellationToken,
) -> anyhow::Result<Option<AttackReport>> {
    let raw = read_request(&args.request)?;
    let template = RequestParser::parse(&raw).context("Failed to parse request")?;

    if args.list_tokens {
        print!("{}", render_tokens(&template));
        return Ok(None);
    }

    let sources = parse_value_args(&args.values)?;
    let lists = ValueResolver::resolve(&template, &sources).await?;
    let mode = args.mode.unwrap_or_default();
    let total = AttackPlan::count(&template.token_ids(), &lists, mode)?;

    let output = Arc::new(
        DirectorySink::create(&args.output)
            .await
            .with_context(|| format!("Failed to prepare output directory {}", args.output.display()))?,
    );

    tracing::info!(
        "Sending {} requests with {} workers",
        total,
        config.dispatch.max_workers.min(total)
    );
    println!(
        "[*] {} requests queued, results in {}",
        total,
        output.dir().display()
    );

    let engine = AttackEngine::new(config.dispatch)
        .with_sink(Arc::new(
            ConsoleSink::new(total).with_request_echo(!args.hide_requests),
        ))
        .with_sink(output.clone())
        .with_raw_sink(output);

    let report = engine.run(&template, &lists, mode, cancel).await?;
    print!("{}", render_summary(&report));

    Ok(Some(report))
}
