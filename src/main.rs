mod error;

use crate::error::{ErrorKind, Result};
use clap::{Parser, Subcommand};
use exn::ResultExt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use swcache_config::Config;
use swcache_fetch::{FetchRequest, HttpTransport, TransportHandle};
use swcache_store::store::{LocalStore, ReadOnlyStore};
use swcache_store::{CacheStore, StoreHandle};
use swcache_worker::{ClientEvent, HostMirror, Interception, Interceptor, Worker};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::io::{AsyncWriteExt, stdout};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Client-side response cache with manifest-driven invalidation.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (toml, yaml or json)
    #[arg(short, long, env = "SWCACHE_CONFIG_FILE")]
    config: Option<PathBuf>,
    /// Never modify the cache, only report what would happen
    #[arg(long)]
    dry_run: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the escape check, then check the manifest for updates
    Update,
    /// Request a URL through the cache and write the body to stdout
    Fetch { url: Url },
    /// List cached entries
    Keys,
    /// Remove every cached entry
    Purge,
}

/// `EX_TEMPFAIL` from `sysexits.h`.
const EXIT_TEMPFAIL: u8 = 75;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = match *err {
                ErrorKind::Unavailable => ExitCode::from(EXIT_TEMPFAIL),
                _ => ExitCode::FAILURE,
            };
            eprintln!("{:?}", miette::miette!("{err:?}"));
            code
        },
    }
}

/// Worker failures worth retrying are reported as [`ErrorKind::Unavailable`].
fn worker_error_kind(result: &swcache_worker::error::Result<impl Sized>, otherwise: ErrorKind) -> ErrorKind {
    match result {
        Err(err) if err.is_retryable() => ErrorKind::Unavailable,
        _ => otherwise,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let mut store: StoreHandle =
        Arc::new(LocalStore::new("local", &config.cache_dir).or_raise(|| ErrorKind::Store)?);
    if cli.dry_run {
        store = Arc::new(ReadOnlyStore::new(store));
    }
    let transport: TransportHandle = Arc::new(HttpTransport::new().or_raise(|| ErrorKind::Transport)?);

    match cli.command {
        Command::Update => update(&config, store, transport, cli.dry_run).await,
        Command::Fetch { url } => fetch(&config, store, transport, &url).await,
        Command::Keys => keys(store.as_ref()).await,
        Command::Purge => {
            store.clear().await.or_raise(|| ErrorKind::Store)?;
            info!(dir = %config.cache_dir.display(), "Cache purged");
            Ok(())
        },
    }
}

async fn update(config: &Config, store: StoreHandle, transport: TransportHandle, dry_run: bool) -> Result<()> {
    let rules = config.rule_table().or_raise(|| ErrorKind::Config)?;
    let manifest_url = config.manifest_url().or_raise(|| ErrorKind::Config)?;
    let worker = Worker::new(store, transport, Arc::new(rules), manifest_url)
        .with_escape(config.escape)
        .with_sweep_concurrency(config.sweep_concurrency);
    for event in update_events(&worker, dry_run).await? {
        print_json(&event).await?;
    }
    Ok(())
}

/// Escape check followed by an update check, collecting every event a page
/// would receive.
///
/// A dry run stops after an escape: a real run would have wiped the version
/// record, and checking against the record that is still there would report
/// evictions that never happen.
async fn update_events(worker: &Worker, dry_run: bool) -> Result<Vec<ClientEvent>> {
    let mut received = worker.subscribe();
    let started = worker.start().await;
    let kind = worker_error_kind(&started, ErrorKind::Update);
    let wiped = started.or_raise(|| kind)?;

    let mut events = Vec::new();
    while let Ok(event) = received.try_recv() {
        events.push(event);
    }
    if wiped && dry_run {
        info!("Dry run: cache would be wiped by the escape check, skipping update check");
        return Ok(events);
    }
    let checked = worker.check_update().await;
    let kind = worker_error_kind(&checked, ErrorKind::Update);
    events.push(checked.or_raise(|| kind)?);
    Ok(events)
}

async fn fetch(config: &Config, store: StoreHandle, transport: TransportHandle, url: &Url) -> Result<()> {
    let rules = config.rule_table().or_raise(|| ErrorKind::Config)?;
    let mirrors: Vec<HostMirror> = config
        .spare
        .iter()
        .map(|spare| HostMirror::new(&spare.host, spare.mirror.clone()))
        .collect();
    let interceptor = Interceptor::new(store, Arc::clone(&transport), Arc::new(rules)).with_spare(mirrors);

    let intercepted = interceptor.intercept("GET", url).await;
    let kind = worker_error_kind(&intercepted, ErrorKind::Transport);
    let (source, status, body) = match intercepted.or_raise(|| kind)? {
        Interception::Cached(response) => ("cache", response.status, response.body),
        Interception::Network(response) => ("network", response.status, response.body),
        Interception::Spare(response) => ("spare", response.status, response.body),
        Interception::Passthrough => {
            let response = transport
                .fetch(&FetchRequest::new(url.clone()))
                .await
                .or_raise(|| ErrorKind::Transport)?;
            ("passthrough", response.status, response.body)
        },
    };
    if (200..300).contains(&status) {
        info!(source, status, bytes = body.len(), "Fetched");
    } else {
        warn!(source, status, "Unsuccessful response");
    }
    let mut out = stdout();
    out.write_all(&body).await.or_raise(|| ErrorKind::Output)?;
    out.flush().await.or_raise(|| ErrorKind::Output)?;
    interceptor.settle().await;
    Ok(())
}

async fn keys(store: &dyn CacheStore) -> Result<()> {
    let mut out = stdout();
    for entry in store.keys().await.or_raise(|| ErrorKind::Store)? {
        let stored_at = OffsetDateTime::from(entry.stored_at)
            .format(&Rfc3339)
            .or_raise(|| ErrorKind::Output)?;
        let line = format!("{}\t{}\t{}\n", entry.key, entry.size, stored_at);
        out.write_all(line.as_bytes()).await.or_raise(|| ErrorKind::Output)?;
    }
    out.flush().await.or_raise(|| ErrorKind::Output)
}

async fn print_json(event: &ClientEvent) -> Result<()> {
    let mut line = serde_json::to_vec(event).or_raise(|| ErrorKind::Output)?;
    line.push(b'\n');
    let mut out = stdout();
    out.write_all(&line).await.or_raise(|| ErrorKind::Output)?;
    out.flush().await.or_raise(|| ErrorKind::Output)
}
