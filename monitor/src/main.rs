use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use domain_store::Db;
use monitor_core::{DomainRecord, DomainStore, HostProbe};
use probe::Probe;
use scanner::Scanner;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

const DEFAULT_DB: &str = "domains.db";
const DEFAULT_WATCH_INTERVAL_SECS: u64 = 3600;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json, Jsonl }

#[derive(Debug, Parser)]
#[command(name = "domain-monitor", version, about = "Track liveness and TLS certificate health of registered domains")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./monitor.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database file (default: domains.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Register one or more domains for a user
    Add {
        #[arg(long)]
        user: String,
        #[arg(required = true)]
        domains: Vec<String>,
    },
    /// Register every line of a text file (one domain per line)
    Import {
        #[arg(long)]
        user: String,
        file: PathBuf,
    },
    /// Remove domains from a user's list
    Remove {
        #[arg(long)]
        user: String,
        #[arg(required = true)]
        domains: Vec<String>,
    },
    /// Show a user's domains with their last observed health
    List {
        #[arg(long)]
        user: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Probe all of a user's domains and store the results
    Scan {
        #[arg(long)]
        user: String,
        /// Maximum probes in flight
        #[arg(long)]
        pool_size: Option<usize>,
        /// Flush results after this many completions
        #[arg(long)]
        batch_size: Option<usize>,
        /// Flush results after this many milliseconds
        #[arg(long)]
        flush_interval_ms: Option<u64>,
        /// Output format: text, json, or jsonl
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Re-scan periodically in the background until interrupted
    Watch {
        /// Users to scan (repeatable). Default: every user with a domain.
        #[arg(long = "user")]
        users: Vec<String>,
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn print_records(records: &[DomainRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{:<40} {:<8} {:<12} ISSUER", "DOMAIN", "STATUS", "EXPIRES");
            for r in records {
                println!("{:<40} {:<8} {:<12} {}", r.domain, r.status, r.ssl_expiration, r.ssl_issuer);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
        OutputFormat::Jsonl => {
            for r in records { println!("{}", serde_json::to_string(r)?); }
        }
    }
    Ok(())
}

fn build_scanner(db: Arc<Db>, cfg: &config::Config, overrides: scanner::ScanConfig) -> Result<Arc<Scanner>> {
    let probe: Arc<dyn HostProbe> = Arc::new(Probe::new(cfg.probe_config())?);
    let store: Arc<dyn DomainStore> = db;
    Ok(Arc::new(Scanner::new(probe, store, overrides)))
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let loaded_cfg = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    let db_path = cli.db.clone()
        .or_else(|| loaded_cfg.database.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB));

    match cli.command {
        Commands::Version => {
            println!("domain-monitor {} (core {})", env!("CARGO_PKG_VERSION"), monitor_core::version());
        }
        Commands::Add { user, domains } => {
            let db = Db::open_or_create(&db_path)?;
            for raw in domains {
                let outcome = db.add_domain(&user, &raw)?;
                let obj = serde_json::json!({ "input": raw, "outcome": outcome });
                println!("{}", serde_json::to_string(&obj)?);
            }
        }
        Commands::Import { user, file } => {
            let text = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let db = Db::open_or_create(&db_path)?;
            let report = db.bulk_add(&user, &text)?;
            println!("{}", serde_json::to_string(&report)?);
        }
        Commands::Remove { user, domains } => {
            let db = Db::open_or_create(&db_path)?;
            let report = db.remove_domains(&user, &domains)?;
            println!("{}", serde_json::to_string(&report)?);
        }
        Commands::List { user, format } => {
            let db = Db::open_or_create(&db_path)?;
            print_records(&db.list_domains(&user)?, format)?;
        }
        Commands::Scan { user, pool_size, batch_size, flush_interval_ms, format } => {
            let mut scan_cfg = loaded_cfg.scan_config();
            if let Some(v) = pool_size { scan_cfg.pool_size = v; }
            if let Some(v) = batch_size { scan_cfg.batch_size = v; }
            if let Some(v) = flush_interval_ms { scan_cfg.flush_interval = Duration::from_millis(v); }
            let format = format
                .or_else(|| {
                    let f = loaded_cfg.scan.as_ref()?.format.as_deref()?;
                    <OutputFormat as ValueEnum>::from_str(f, true).ok()
                })
                .unwrap_or(OutputFormat::Text);

            let db = Arc::new(Db::open_or_create(&db_path)?);
            let rt = tokio::runtime::Runtime::new()?;
            let started = Instant::now();
            let summary = rt.block_on(async {
                let scanner = build_scanner(db, &loaded_cfg, scan_cfg)?;
                scanner.run(&user).await
            })?;
            let elapsed_ms = started.elapsed().as_millis();
            match format {
                OutputFormat::Text => println!(
                    "{}: scanned {} domains, {} errors in {} ms",
                    user, summary.domains_scanned, summary.errors, elapsed_ms
                ),
                OutputFormat::Json | OutputFormat::Jsonl => {
                    let obj = serde_json::json!({
                        "user": user,
                        "domains_scanned": summary.domains_scanned,
                        "errors": summary.errors,
                        "elapsed_ms": elapsed_ms,
                    });
                    println!("{}", serde_json::to_string(&obj)?);
                }
            }
        }
        Commands::Watch { users, interval_secs } => {
            let watch = loaded_cfg.watch.clone().unwrap_or_default();
            let users = if users.is_empty() { watch.users.unwrap_or_default() } else { users };
            let interval = Duration::from_secs(
                interval_secs.or(watch.interval_secs).unwrap_or(DEFAULT_WATCH_INTERVAL_SECS).max(1),
            );

            let db = Arc::new(Db::open_or_create(&db_path)?);
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let scanner = build_scanner(db.clone(), &loaded_cfg, loaded_cfg.scan_config())?;
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                let mut running: HashMap<String, JoinHandle<()>> = HashMap::new();
                info!(interval_secs = interval.as_secs(), "watch started");
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = tokio::signal::ctrl_c() => {
                            info!("interrupted, stopping watch");
                            break;
                        }
                    }
                    let targets = if users.is_empty() { db.users()? } else { users.clone() };
                    for user in targets {
                        if running.get(&user).is_some_and(|h| !h.is_finished()) {
                            warn!(user = %user, "previous scan still running, skipping this round");
                            continue;
                        }
                        let handle = scanner.spawn_background(user.clone());
                        running.insert(user, handle);
                    }
                }
                Ok::<_, anyhow::Error>(())
            })?;
        }
    }
    Ok(())
}
