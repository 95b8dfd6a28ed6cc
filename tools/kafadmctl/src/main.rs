// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! kafadmctl - operator CLI for Kafka-style broker clusters.
//!
//! Declarative topic reconciliation, cross-context message relay and
//! round-trip liveness probing, all scoped to named broker contexts.

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use kafadm::codec::{RecordConsumer, RecordProducer};
use kafadm::relay::ClusterConnector;
use kafadm::{
    probe, reconcile, relay, AutoApprove, CodecKind, Confirm, ContextStore, RelayError,
    RelayRequest, TopicAdmin, TopicFilter, TopicSpec, TopicsDocument,
};
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

#[cfg(feature = "kafka")]
mod kafka;
mod render;

#[derive(Parser)]
#[command(name = "kafadmctl", version, about = "Broker cluster administration")]
struct Cli {
    /// Context config file (default: $KAFADM_CONFIG or ~/.config/kafadm/kafadm.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip confirmation prompts.
    #[arg(long, global = true)]
    no_verify: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn")]
    log_level: Level,

    /// Overwrite the context config file with a fresh sample.
    #[arg(long, global = true)]
    recreate_config: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show contexts, or switch the current context.
    Ctx {
        /// Context to switch to. Omit to list all contexts.
        context: Option<String>,
    },
    /// Reconcile the cluster with a declarative topic file.
    Apply {
        /// YAML file with the desired topic set.
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List topics on the current context.
    Topics {
        /// Only show topics whose name contains this substring.
        filter: Option<String>,
    },
    /// Show partitions, replication and config of one topic.
    Describe {
        /// Topic name.
        name: String,
    },
    /// Create a single topic.
    Create {
        /// Topic name.
        name: String,
        /// Partition count.
        #[arg(short, long, default_value_t = 1)]
        partitions: i32,
        /// Replication factor.
        #[arg(short, long, default_value_t = 1)]
        replication: i32,
    },
    /// Replace the config of an existing topic.
    Edit {
        /// Topic name.
        name: String,
        /// YAML file with a `config:` map of key/value entries.
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete a topic.
    Delete {
        /// Topic name.
        name: String,
    },
    /// Copy messages between contexts, staged through local storage.
    Transfer {
        /// Topic name, identical on both contexts.
        topic: String,
        /// Source context.
        #[arg(long)]
        from: String,
        /// Destination context.
        #[arg(long)]
        to: String,
        /// Number of messages to transfer.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u64,
        /// Read from the end of the topic instead of the beginning.
        #[arg(long)]
        last: bool,
        /// Use the schema-aware codec (stages schema sidecar files).
        #[arg(long)]
        schema: bool,
        /// Keep the staging directory after a successful transfer.
        #[arg(long)]
        keep: bool,
        /// Root directory for staging (default: system temp dir).
        #[arg(long)]
        staging_dir: Option<PathBuf>,
    },
    /// Measure produce/consume round-trip latency.
    Ping {
        /// Number of round trips.
        #[arg(short = 't', long, default_value_t = 10)]
        times: u32,
        /// Seconds to wait between round trips.
        #[arg(short = 'w', long, default_value_t = 1.0)]
        wait: f64,
    },
}

/// Prompts on stdout and reads a y/yes answer from stdin.
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn ask(&self, question: &str) -> bool {
        print!("{question} [y/N] ");
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// Where per-session staging directories are created when the operator
/// does not pass `--staging-dir`.
fn staging_root(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(std::env::temp_dir)
}

fn default_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("KAFADM_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".config/kafadm/kafadm.toml"))
}

fn load_store(cli: &Cli) -> Result<ContextStore> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    tracing::debug!(path = %path.display(), "loading context config");
    if cli.recreate_config || !path.exists() {
        let store = ContextStore::recreate(&path)?;
        eprintln!("wrote sample config to {}", path.display());
        return Ok(store);
    }
    Ok(ContextStore::load(&path)?)
}

#[cfg(feature = "kafka")]
fn connect_admin(store: &ContextStore) -> Result<Box<dyn TopicAdmin>> {
    let settings = store.settings(store.current_context()?)?;
    Ok(Box::new(kafka::KafkaAdmin::connect(settings)?))
}

#[cfg(feature = "kafka")]
fn connect_consumer(store: &ContextStore) -> Result<Box<dyn RecordConsumer>> {
    let settings = store.settings(store.current_context()?)?;
    Ok(Box::new(kafka::KafkaRecordConsumer::new(settings)))
}

#[cfg(feature = "kafka")]
fn connect_producer(store: &ContextStore) -> Result<Box<dyn RecordProducer>> {
    let settings = store.settings(store.current_context()?)?;
    Ok(Box::new(kafka::KafkaRecordProducer::new(settings)?))
}

#[cfg(feature = "kafka")]
fn connector(store: &ContextStore) -> Result<Box<dyn ClusterConnector>> {
    Ok(Box::new(kafka::KafkaConnector::from_store(store)))
}

#[cfg(not(feature = "kafka"))]
fn connect_admin(_store: &ContextStore) -> Result<Box<dyn TopicAdmin>> {
    bail!("built without kafka support, rebuild with `--features kafka`")
}

#[cfg(not(feature = "kafka"))]
fn connect_consumer(_store: &ContextStore) -> Result<Box<dyn RecordConsumer>> {
    bail!("built without kafka support, rebuild with `--features kafka`")
}

#[cfg(not(feature = "kafka"))]
fn connect_producer(_store: &ContextStore) -> Result<Box<dyn RecordProducer>> {
    bail!("built without kafka support, rebuild with `--features kafka`")
}

#[cfg(not(feature = "kafka"))]
fn connector(_store: &ContextStore) -> Result<Box<dyn ClusterConnector>> {
    bail!("built without kafka support, rebuild with `--features kafka`")
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {e:#}", "Error:".red().bold());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
            eprintln!("\ninterrupt received, finishing up...");
        })
        .context("failed to install interrupt handler")?;
    }

    let confirm: Box<dyn Confirm> = if cli.no_verify {
        Box::new(AutoApprove)
    } else {
        Box::new(StdinConfirm)
    };

    let mut store = load_store(&cli)?;

    match cli.command {
        Command::Ctx { context } => cmd_ctx(&mut store, context),
        Command::Apply { file } => cmd_apply(&store, &file, confirm.as_ref()),
        Command::Topics { filter } => cmd_topics(&store, filter),
        Command::Describe { name } => cmd_describe(&store, &name),
        Command::Create {
            name,
            partitions,
            replication,
        } => cmd_create(&store, &name, partitions, replication),
        Command::Edit { name, file } => cmd_edit(&store, &name, &file, confirm.as_ref()),
        Command::Delete { name } => cmd_delete(&store, &name, confirm.as_ref()),
        Command::Transfer {
            topic,
            from,
            to,
            count,
            last,
            schema,
            keep,
            staging_dir,
        } => {
            let mut request = RelayRequest::new(topic, from, to, count);
            request.from_earliest = !last;
            request.codec = if schema {
                CodecKind::Schema
            } else {
                CodecKind::Plain
            };
            request.retain_staging = keep;
            request.staging_root = staging_root(staging_dir);
            cmd_transfer(&store, &request, confirm.as_ref(), &running)
        }
        Command::Ping { times, wait } => cmd_ping(&store, times, wait, &running),
    }
}

fn cmd_ctx(store: &mut ContextStore, context: Option<String>) -> Result<()> {
    match context {
        None => {
            let current = store.current_context().ok().map(str::to_string);
            for name in store.available_contexts() {
                if current.as_deref() == Some(name) {
                    println!("{}", format!("* {name}").green().bold());
                } else {
                    println!("  {name}");
                }
            }
            Ok(())
        }
        Some(name) => {
            store.switch(&name)?;
            println!("current context: {}", name.green());
            Ok(())
        }
    }
}

fn cmd_apply(store: &ContextStore, file: &PathBuf, confirm: &dyn Confirm) -> Result<()> {
    let document = TopicsDocument::from_file(file)
        .with_context(|| format!("failed to load {}", file.display()))?;
    let mut admin = connect_admin(store)?;

    let plan = reconcile::plan(&document.topics, admin.as_ref())?;
    if plan.is_empty() {
        println!("cluster already matches {}, nothing to do", file.display());
        return Ok(());
    }
    println!("{}", render::plan_table(&plan));
    for diff in plan.diffs.values() {
        for line in render::diff_lines(diff) {
            println!("  {line}");
        }
    }

    let report = reconcile::apply(&plan, admin.as_mut(), confirm)?;
    println!(
        "{} {} created, {} changed, {} unchanged",
        "Applied:".green().bold(),
        report.created,
        report.changed,
        report.unchanged
    );
    Ok(())
}

fn cmd_topics(store: &ContextStore, filter: Option<String>) -> Result<()> {
    let admin = connect_admin(store)?;
    let filter = match filter {
        Some(substring) => TopicFilter::Contains(substring),
        None => TopicFilter::All,
    };
    for topic in admin.list_topics(&filter)? {
        println!("{}", topic.name);
    }
    Ok(())
}

fn cmd_describe(store: &ContextStore, name: &str) -> Result<()> {
    let admin = connect_admin(store)?;
    let topic = admin.get(name)?;
    println!("{}", render::topic_details(&topic));
    Ok(())
}

fn cmd_create(store: &ContextStore, name: &str, partitions: i32, replication: i32) -> Result<()> {
    let mut admin = connect_admin(store)?;
    let spec = TopicSpec::new(name)
        .partitions(partitions)
        .replication(replication);
    admin.create(std::slice::from_ref(&spec))?;
    println!("{} topic {name}", "Created:".green().bold());
    Ok(())
}

/// Config-only edit document, `config:` map under the topic name is
/// implied by the command argument.
#[derive(serde::Deserialize)]
struct EditDocument {
    #[serde(default)]
    config: BTreeMap<String, String>,
}

fn cmd_edit(store: &ContextStore, name: &str, file: &PathBuf, confirm: &dyn Confirm) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let edit: EditDocument = serde_yaml::from_str(&content)?;

    let mut admin = connect_admin(store)?;
    let live = admin.get(name)?;
    let candidate = TopicSpec::new(name)
        .partitions(live.partitions)
        .replication(live.replication)
        .with_config(edit.config);

    let diff = admin.diff(&candidate)?;
    if !diff.has_changes() {
        println!("no config changes for {name}");
        return Ok(());
    }
    for line in render::diff_lines(&diff) {
        println!("  {line}");
    }
    if !confirm.ask(&format!("Apply these changes to {name}?")) {
        bail!("edit rejected by operator");
    }
    admin.alter(std::slice::from_ref(&candidate))?;
    println!("{} topic {name}", "Updated:".green().bold());
    Ok(())
}

fn cmd_delete(store: &ContextStore, name: &str, confirm: &dyn Confirm) -> Result<()> {
    if !confirm.ask(&format!("Delete topic {name}?")) {
        bail!("delete rejected by operator");
    }
    let mut admin = connect_admin(store)?;
    admin.delete(name)?;
    println!("{} topic {name}", "Deleted:".green().bold());
    Ok(())
}

fn cmd_transfer(
    store: &ContextStore,
    request: &RelayRequest,
    confirm: &dyn Confirm,
    running: &AtomicBool,
) -> Result<()> {
    let connector = connector(store)?;
    match relay::run(request, connector.as_ref(), confirm, running) {
        Ok(report) => {
            println!(
                "{} {} staged, {} produced to {} on {}",
                "Transferred:".green().bold(),
                report.staged.to_string().blue(),
                report.produced.to_string().green(),
                request.topic,
                request.to_context
            );
            Ok(())
        }
        Err(RelayError::EmptyTransfer) => {
            println!("{}", RelayError::EmptyTransfer.to_string().yellow());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_ping(store: &ContextStore, times: u32, wait: f64, running: &AtomicBool) -> Result<()> {
    let mut admin = connect_admin(store)?;
    let mut consumer = connect_consumer(store)?;
    let mut producer = connect_producer(store)?;

    let request = probe::ProbeRequest {
        iterations: times,
        interval: Duration::from_secs_f64(wait),
        ..Default::default()
    };

    println!("probing {} ...", store.current_context()?.green());
    let report = probe::run(
        &request,
        admin.as_mut(),
        consumer.as_mut(),
        producer.as_mut(),
        running,
        &mut |seq, ms| println!("m_seq={seq} time={}", render::format_ms(ms)),
    )?;

    match report.stats() {
        Some(stats) => println!(
            "{} {} round trips, min/avg/max = {}/{}/{}",
            "Done:".green().bold(),
            stats.count,
            render::format_ms(stats.min_ms),
            render::format_ms(stats.avg_ms),
            render::format_ms(stats.max_ms)
        ),
        None => println!("{}", "no round trips completed".yellow()),
    }
    Ok(())
}
