//! mapshare - print an inReach MapShare feed as GeoJSON.
//!
//! Fetches the KML feed for a MapShare identifier (optionally filtered by
//! date and protected by a password), caches it for 15 minutes and writes
//! the converted `FeatureCollection` to stdout.

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mapshare_core::credentials::CredentialStore;
use mapshare_core::feed::HttpFeedSource;
use mapshare_core::{
    CacheStore, Config, FeatureCollection, FeedService, FetchRequest, FileCache, MemoryCache,
};

#[derive(Debug, Parser)]
#[command(name = "mapshare", version, about = "Print an inReach MapShare feed as GeoJSON")]
struct Args {
    /// MapShare identifier (the last part of share.garmin.com/<identifier>)
    #[arg(env = "MAPSHARE_IDENTIFIER")]
    identifier: Option<String>,

    /// Only include points from this date/time on (e.g. 2020-10-02T16:20)
    #[arg(long)]
    start: Option<String>,

    /// Only include points up to this date/time
    #[arg(long)]
    end: Option<String>,

    /// MapShare password
    #[arg(long, env = "MAPSHARE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Prompt for the MapShare password
    #[arg(long, conflicts_with = "password")]
    ask_password: bool,

    /// Remember the password in the OS keychain
    #[arg(long)]
    save_password: bool,

    /// Remove the remembered password from the OS keychain and exit
    #[arg(long, conflicts_with = "save_password")]
    forget_password: bool,

    /// Store the identifier and date range in the config file
    #[arg(long)]
    save_defaults: bool,

    /// Ignore any cached feed and fetch again
    #[arg(long)]
    refresh: bool,

    /// Delete cached feeds and exit
    #[arg(long)]
    clear_cache: bool,

    /// Keep the cache in memory only
    #[arg(long)]
    memory_cache: bool,

    /// Pretty-print the GeoJSON
    #[arg(long)]
    pretty: bool,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Resolve the password: flag/env, then prompt, then keychain.
fn resolve_password(args: &Args, identifier: &str) -> Result<Option<String>> {
    if let Some(password) = &args.password {
        return Ok(Some(password.clone()));
    }
    if args.ask_password {
        let password = rpassword::prompt_password("MapShare password: ")?;
        return Ok(Some(password));
    }
    if CredentialStore::has_credentials(identifier) {
        debug!(identifier = identifier, "Using password from keychain");
        return CredentialStore::get_password(identifier).map(Some);
    }
    Ok(None)
}

async fn run<C: CacheStore>(
    service: &FeedService<HttpFeedSource, C>,
    request: &FetchRequest,
    refresh: bool,
) -> FeatureCollection {
    let collection = if refresh {
        service.refresh(request).await
    } else {
        service.feature_collection(request).await
    };
    info!(features = collection.len(), "Feed converted");
    collection
}

fn render(collection: &FeatureCollection, pretty: bool) -> Result<String> {
    let json = if pretty {
        collection.to_json_pretty()?
    } else {
        collection.to_json()?
    };
    Ok(json)
}

fn print_collection(collection: &FeatureCollection, pretty: bool) -> Result<()> {
    println!("{}", render(collection, pretty)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing();

    let mut config = Config::load().context("Failed to load configuration")?;

    let identifier = args
        .identifier
        .clone()
        .or_else(|| config.mapshare_identifier.clone());
    let cache_dir = config.cache_dir()?.join("feeds");

    if args.clear_cache {
        let removed = FileCache::new(cache_dir)?.clear()?;
        eprintln!("Removed {} cached feed(s)", removed);
        return Ok(());
    }

    let Some(identifier) = identifier.filter(|id| !id.trim().is_empty()) else {
        if args.forget_password {
            anyhow::bail!("--forget-password needs a MapShare identifier");
        }
        warn!("No MapShare identifier given (argument, MAPSHARE_IDENTIFIER or config file)");
        return print_collection(&FeatureCollection::empty(), args.pretty);
    };

    if args.forget_password {
        CredentialStore::delete(&identifier)?;
        eprintln!("Removed saved password for {}", identifier);
        return Ok(());
    }

    let start = args.start.clone().or_else(|| config.mapshare_date_start.clone());
    let end = args.end.clone().or_else(|| config.mapshare_date_end.clone());

    if args.save_defaults {
        config.mapshare_identifier = Some(identifier.clone());
        config.mapshare_date_start = start.clone();
        config.mapshare_date_end = end.clone();
        config.save().context("Failed to save configuration")?;
        debug!("Saved MapShare defaults to config file");
    }

    let password = resolve_password(&args, &identifier)?;
    if args.save_password {
        match &password {
            Some(password) => CredentialStore::store(&identifier, password)?,
            None => warn!("--save-password given without a password"),
        }
    }

    let request = FetchRequest::new(identifier)
        .with_dates(start, end)
        .with_password(password);

    let collection = if args.memory_cache {
        let service = FeedService::http(config.feed.clone(), MemoryCache::new())?;
        run(&service, &request, args.refresh).await
    } else {
        let service = FeedService::http(config.feed.clone(), FileCache::new(cache_dir)?)?;
        run(&service, &request, args.refresh).await
    };

    print_collection(&collection, args.pretty)
}
