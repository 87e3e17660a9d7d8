//! Command-line front end for the reader engine.
//!
//! - `pageturn <catalogue.json | http(s)://...>` prints the document catalogue.
//! - `pageturn <document-dir>` opens a folder of page images headlessly,
//!   turns through every page and prints the final session snapshot.
//!
//! Configuration is read from `conf/config.toml`.

use anyhow::{Context, Result, anyhow};
use pageturn::animator::HeadlessAnimatorFactory;
use pageturn::config::load_config;
use pageturn::document::Document;
use pageturn::folder_source::FolderDocumentSource;
use pageturn::layout::Viewport;
use pageturn::manifest::{Catalogue, FileManifestSource, HttpManifestSource, ManifestSource};
use pageturn::render::PageStatus;
use pageturn::ReaderRuntime;
use std::env;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

enum Target {
    Catalogue(String),
    Folder(PathBuf),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle).await {
        error!("{err:?}");
        std::process::exit(1);
    }
}

async fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let target = parse_args()?;
    let config = load_config(Path::new("conf/config.toml"));
    set_log_level(reload_handle, config.logging.log_level.as_filter_str());
    info!(
        level = %config.logging.log_level,
        preload_pages = config.render.preload_pages,
        breakpoint = config.layout.breakpoint,
        "Starting pageturn"
    );

    match target {
        Target::Catalogue(location) => print_catalogue(&location).await,
        Target::Folder(dir) => walk_document(&dir, config).await,
    }
}

fn parse_args() -> Result<Target> {
    let mut args = env::args().skip(1);
    let arg = args
        .next()
        .ok_or_else(|| anyhow!("Usage: pageturn <catalogue.json | url | document-dir>"))?;

    if arg.starts_with("http://") || arg.starts_with("https://") {
        return Ok(Target::Catalogue(arg));
    }
    let path = PathBuf::from(&arg);
    if !path.exists() {
        return Err(anyhow!("Not found: {}", path.display()));
    }
    if path.is_dir() {
        Ok(Target::Folder(path))
    } else {
        Ok(Target::Catalogue(arg))
    }
}

async fn print_catalogue(location: &str) -> Result<()> {
    let listed = if location.starts_with("http://") || location.starts_with("https://") {
        HttpManifestSource::new(location).list().await
    } else {
        FileManifestSource::new(location).list().await
    };
    let catalogue: Catalogue =
        listed.with_context(|| format!("Failed to list catalogue at {location}"))?;

    for category in &catalogue.categories {
        println!("{}", category.category);
        for entry in &category.documents {
            if entry.author.is_empty() {
                println!("  {}  [{}]", entry.title, entry.handle);
            } else {
                println!("  {} by {}  [{}]", entry.title, entry.author, entry.handle);
            }
        }
    }
    info!(documents = catalogue.len(), "Listed catalogue");
    Ok(())
}

async fn walk_document(dir: &Path, config: pageturn::config::ReaderConfig) -> Result<()> {
    let handle = dir.to_string_lossy().into_owned();
    let mut runtime = ReaderRuntime::new(
        config,
        Viewport::new(1280, 800),
        Rc::new(FolderDocumentSource::new()),
        Box::new(HeadlessAnimatorFactory::new()),
        None,
    );
    runtime
        .open(Document::new(handle.as_str(), "", ""))
        .await
        .with_context(|| format!("Failed to open {handle}"))?;
    runtime.run_until_idle().await;

    let page_count = runtime.session().page_count();
    for _ in 1..page_count {
        runtime.next();
        runtime.run_until_idle().await;
    }

    for notice in runtime.take_notices() {
        warn!(?notice, "Notice raised while reading");
    }
    let snapshot = runtime.session().snapshot();
    let ready = snapshot
        .pages
        .iter()
        .filter(|status| matches!(status, PageStatus::Ready { .. }))
        .count();
    info!(
        page_count,
        ready,
        current_page = snapshot.current_page,
        "Walked document"
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?
    );
    Ok(())
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .with_filter(filter_layer),
        )
        .init();
    info!("Logging initialized; override level with logging.log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
