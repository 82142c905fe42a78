//! llm-cache: inspect and maintain the gateway response cache
//!
//! Usage:
//!   llm-cache stats                                       Show backend and key statistics
//!   llm-cache key <model> <role:content>... [--param k=v] Print the fingerprint of a request
//!   llm-cache get <key>                                   Print a cached payload
//!   llm-cache flush [<key>]                               Remove one entry, or all of them

use anyhow::{bail, Context};
use llm_gateway_cache::cache::compute_fingerprint;
use llm_gateway_cache::{CacheConfig, CacheKey, Message, MessageRole, ResponseCache};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "stats" => cmd_stats().await,
        "key" => cmd_key(&args[2..]),
        "get" => cmd_get(&args[2..]).await,
        "flush" => cmd_flush(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("llm-cache {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"llm-cache: gateway response cache tool

USAGE:
    llm-cache <COMMAND> [OPTIONS]

COMMANDS:
    stats                                   Show backend kind, TTL and key count
    key <model> <role:content>... [--param k=v]
                                            Print the fingerprint of a request
    get <key>                               Print the cached payload for a key
    flush [<key>]                           Remove one entry; without a key, flush the
                                            whole backend database
    version                                 Show version information
    help                                    Show this help message

ENVIRONMENT:
    ENABLE_CACHE        true/false (default true)
    CACHE_TTL           TTL in seconds (default 3600)
    REDIS_URL           networked backend connection string
    CACHE_USE_REDIS     prefer the networked backend (default true)
    CACHE_KEY_PREFIX    key namespace
    CACHE_OP_TIMEOUT_MS per-operation timeout (default 2000)
    RUST_LOG            log filter (default info)"#
    );
}

async fn open_cache() -> anyhow::Result<ResponseCache> {
    let config = CacheConfig::from_env().context("invalid cache configuration")?;
    Ok(ResponseCache::connect(config).await?)
}

async fn cmd_stats() -> anyhow::Result<()> {
    let cache = open_cache().await?;
    let stats = cache.stats().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn cmd_key(args: &[String]) -> anyhow::Result<()> {
    let Some((model, rest)) = args.split_first() else {
        bail!("usage: llm-cache key <model> <role:content>... [--param k=v]");
    };

    let mut messages = Vec::new();
    let mut params: BTreeMap<String, Value> = BTreeMap::new();
    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        if arg == "--param" {
            let pair = iter.next().context("--param needs a k=v argument")?;
            let (k, v) = pair
                .split_once('=')
                .with_context(|| format!("expected k=v, got '{pair}'"))?;
            // numbers and booleans keep their JSON type
            let value = serde_json::from_str(v).unwrap_or_else(|_| Value::String(v.to_string()));
            params.insert(k.to_string(), value);
        } else {
            let (role, content) = arg
                .split_once(':')
                .with_context(|| format!("expected role:content, got '{arg}'"))?;
            messages.push(Message::new(role.parse::<MessageRole>()?, content));
        }
    }

    let key = compute_fingerprint(model, &messages, &params)?;
    println!("{key}");
    Ok(())
}

async fn cmd_get(args: &[String]) -> anyhow::Result<()> {
    let Some(raw) = args.first() else {
        bail!("usage: llm-cache get <key>");
    };
    let cache = open_cache().await?;
    match cache.get::<Value>(&CacheKey::from(raw.as_str())).await {
        Some(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
        None => {
            eprintln!("miss");
            std::process::exit(2);
        }
    }
    Ok(())
}

async fn cmd_flush(args: &[String]) -> anyhow::Result<()> {
    let cache = open_cache().await?;
    let key = args.first().map(|k| CacheKey::from(k.as_str()));
    if !cache.invalidate(key.as_ref()).await {
        bail!("invalidation failed or cache disabled");
    }
    match key {
        Some(k) => println!("invalidated {k}"),
        None => println!("flushed {} backend", cache.backend_kind()),
    }
    Ok(())
}
