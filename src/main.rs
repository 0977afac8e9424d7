//! segcast CLI entry point.
//!
//! Thin admin shell over the library: manage groups and run a campaign
//! against the WhatsApp bridge sidecar.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use segcast::campaign::{CampaignDispatcher, DelayPolicy};
use segcast::config::{self, Config, RuntimePaths};
use segcast::contacts::{ContactRegistry, Group, Normalizer};
use segcast::engine::Engine;
use segcast::media::{ContentKind, MediaSlotStore};
use segcast::store::{DiskStore, FileStore};
use segcast::transport::bridge::BridgeClient;
use segcast::transport::events::spawn_event_listener;
use segcast::transport::ConnectionTracker;

/// Segmented bulk broadcast over WhatsApp.
#[derive(Parser)]
#[command(name = "segcast", version, about)]
struct Cli {
    /// Data directory (default: `~/.segcast`).
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Create the data directory, a default config and empty group files.
    Init,
    /// Add numbers to a group (and to ALL).
    Add {
        /// Target group.
        #[arg(long, default_value = "ALL")]
        group: Group,
        /// Raw numbers; any formatting is accepted.
        numbers: Vec<String>,
        /// Read additional numbers from a file, one per line.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Clear one group, or every group when none is given.
    Clear {
        /// Group to clear.
        #[arg(long)]
        group: Option<Group>,
    },
    /// List a group's members, masked.
    List {
        /// Group to list.
        #[arg(long, default_value = "ALL")]
        group: Group,
    },
    /// Show member counts per group.
    Stats,
    /// Show bridge readiness, counts and slot state.
    Status,
    /// Send a campaign to a group.
    Send {
        /// Target group.
        #[arg(long, default_value = "ALL")]
        group: Group,
        /// `text`, `image`, `audio` or `video`.
        #[arg(long, default_value = "text")]
        kind: ContentKind,
        /// Message body, or caption for image and video.
        #[arg(long)]
        message: String,
        /// Attachment for a non-text campaign, copied into the media directory.
        #[arg(long)]
        media: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let root = match cli.home {
        Some(home) => home,
        None => config::config_dir()?,
    };

    match cli.command {
        Command::Init => handle_init(&root),
        Command::Add {
            group,
            numbers,
            file,
        } => handle_add(&root, group, numbers, file.as_deref()),
        Command::Clear { group } => handle_clear(&root, group),
        Command::List { group } => handle_list(&root, group),
        Command::Stats => handle_stats(&root),
        Command::Status => handle_status(&root).await,
        Command::Send {
            group,
            kind,
            message,
            media,
        } => handle_send(&root, group, kind, &message, media).await,
    }
}

/// Load config and resolve paths under `root`.
fn open(root: &Path) -> anyhow::Result<(Config, RuntimePaths)> {
    let paths = RuntimePaths::under(root);
    let config = config::load_or_default(&paths.config_toml)?;
    let paths = paths.with_overrides(&config);
    Ok((config, paths))
}

/// Build a registry and load it from disk.
fn open_registry(
    config: &Config,
    paths: &RuntimePaths,
    store: Arc<dyn FileStore>,
) -> anyhow::Result<Arc<ContactRegistry>> {
    let normalizer = Normalizer::new(
        &config.contacts.country_prefix,
        &config.contacts.domain_suffix,
    )
    .context("invalid [contacts] settings")?;
    let registry = Arc::new(ContactRegistry::new(
        paths.contacts_dir.clone(),
        normalizer,
        store,
    ));
    registry.load();
    Ok(registry)
}

/// Wire the bridge, dispatcher and engine together.
fn build_engine(
    config: &Config,
    paths: &RuntimePaths,
) -> anyhow::Result<(Engine, Arc<BridgeClient>)> {
    let store: Arc<dyn FileStore> = Arc::new(DiskStore);
    let registry = open_registry(config, paths, Arc::clone(&store))?;
    let media = Arc::new(MediaSlotStore::new(store));
    let connection = Arc::new(ConnectionTracker::new());
    let bridge = Arc::new(
        BridgeClient::new(&config.bridge.url, Arc::clone(&connection))
            .context("invalid [bridge] url")?,
    );
    let dispatcher = CampaignDispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&media),
        Arc::clone(&bridge) as Arc<dyn segcast::transport::Transport>,
    )
    .with_delays(DelayPolicy::from_config(&config.dispatch));
    let engine = Engine::new(
        registry,
        media,
        connection,
        dispatcher,
        config.bridge.sender_name.clone(),
    );
    Ok((engine, bridge))
}

fn handle_init(root: &Path) -> anyhow::Result<()> {
    segcast::logging::init_cli();
    let paths = RuntimePaths::under(root);
    for dir in [&paths.root, &paths.contacts_dir, &paths.media_dir, &paths.logs_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    if !paths.config_toml.exists() {
        let rendered =
            toml::to_string_pretty(&Config::default()).context("failed to render config")?;
        std::fs::write(&paths.config_toml, rendered)
            .with_context(|| format!("failed to write {}", paths.config_toml.display()))?;
    }
    let (config, paths) = open(root)?;
    open_registry(&config, &paths, Arc::new(DiskStore))?;
    println!("initialised {}", paths.root.display());
    Ok(())
}

fn handle_add(
    root: &Path,
    group: Group,
    mut numbers: Vec<String>,
    file: Option<&Path>,
) -> anyhow::Result<()> {
    segcast::logging::init_cli();
    if let Some(file) = file {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        numbers.extend(
            segcast::contacts::file_format::parse(&content)
                .into_iter()
                .map(str::to_owned),
        );
    }
    if numbers.is_empty() {
        anyhow::bail!("no numbers given");
    }

    let (config, paths) = open(root)?;
    let registry = open_registry(&config, &paths, Arc::new(DiskStore))?;
    let outcome = registry.add_many(numbers.as_slice(), group);
    let counts = registry.counts_by_group();

    println!(
        "added {} to {group} ({} new, {} invalid); ALL now {}",
        outcome.accepted.len(),
        outcome.newly_added,
        outcome.invalid,
        counts.get(&Group::All).copied().unwrap_or(0)
    );
    if let Some(e) = outcome.persist_error {
        return Err(e).context("contacts updated in memory but not saved");
    }
    Ok(())
}

fn handle_clear(root: &Path, group: Option<Group>) -> anyhow::Result<()> {
    segcast::logging::init_cli();
    let (config, paths) = open(root)?;
    let registry = open_registry(&config, &paths, Arc::new(DiskStore))?;
    registry.clear(group).context("failed to save cleared groups")?;
    match group {
        Some(g) => println!("{g} party numbers cleared"),
        None => println!("All numbers cleared"),
    }
    Ok(())
}

fn handle_list(root: &Path, group: Group) -> anyhow::Result<()> {
    segcast::logging::init_cli();
    let (config, paths) = open(root)?;
    let registry = open_registry(&config, &paths, Arc::new(DiskStore))?;
    let masked = registry.masked_members(group);
    for number in &masked {
        println!("{number}");
    }
    println!("{group}: {} total", masked.len());
    Ok(())
}

fn handle_stats(root: &Path) -> anyhow::Result<()> {
    segcast::logging::init_cli();
    let (config, paths) = open(root)?;
    let registry = open_registry(&config, &paths, Arc::new(DiskStore))?;
    for (group, count) in registry.counts_by_group() {
        println!("{group}: {count}");
    }
    Ok(())
}

async fn handle_status(root: &Path) -> anyhow::Result<()> {
    segcast::logging::init_cli();
    let (config, paths) = open(root)?;
    let (engine, bridge) = build_engine(&config, &paths)?;
    bridge.refresh().await;
    let report = serde_json::to_string_pretty(&engine.status())?;
    println!("{report}");
    Ok(())
}

async fn handle_send(
    root: &Path,
    group: Group,
    kind: ContentKind,
    message: &str,
    media: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (config, paths) = open(root)?;
    let _logging_guard = segcast::logging::init_production(&paths.logs_dir)?;
    let (engine, bridge) = build_engine(&config, &paths)?;

    if let Some(media_kind) = kind.media_kind() {
        match media {
            Some(path) => {
                engine
                    .media()
                    .import(media_kind, &path, &paths.media_dir)
                    .with_context(|| format!("failed to import {}", path.display()))?;
            }
            None => warn!(%kind, "no --media given for a media campaign"),
        }
    }
    engine.set_message(message)?;

    let listener = spawn_event_listener(bridge.base_url().to_string(), Arc::clone(bridge.connection()));
    if !bridge.refresh().await {
        info!(
            timeout_secs = config.bridge.ready_timeout_secs,
            "waiting for WhatsApp bridge"
        );
        bridge
            .connection()
            .wait_ready(Duration::from_secs(config.bridge.ready_timeout_secs))
            .await;
    }

    let result = engine.send_campaign(group, kind).await;
    listener.abort();
    let result = result?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
