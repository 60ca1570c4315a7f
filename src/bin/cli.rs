// Command-line front end; unrecoverable errors exit the process.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use editor_bridge::discovery::{derive_key, normalize_project_path, DiscoveryRecord, DiscoveryStore};
use editor_bridge::paths;
use editor_bridge::registry::handlers::diagnostics;
use editor_bridge::registry::{catalog, execute, CompilationMonitor, HandlerRegistry};
use editor_bridge::settings::{self, BridgeSettings};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "editor-bridge", about = "Editor automation bridge: discovery and command tools", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Discovery directory override
    #[arg(long, global = true)]
    discovery_dir: Option<PathBuf>,

    /// Output raw JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the discovery key for a project path
    Key {
        path: String,
        /// Also print the normalized path that was hashed
        #[arg(long)]
        normalized: bool,
    },
    /// Print the port of the live server for a project
    Discover {
        #[arg(long)]
        project: String,
    },
    /// Write a discovery record on behalf of a running server
    Register {
        #[arg(long)]
        project: String,
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        port: u16,
        /// Pid of the server process that owns the port
        #[arg(long)]
        pid: u32,
    },
    /// Remove the discovery record for a project
    Unregister {
        #[arg(long)]
        project: String,
    },
    /// List every discovery record and whether its owner is alive
    List,
    /// Delete records whose owner is gone
    Prune,
    /// Run a command payload through the built-in handlers
    Exec {
        /// JSON payload, e.g. '{"operation":"ping"}'
        #[arg(long, default_value = "null")]
        payload: String,
        #[arg(long, default_value = diagnostics::CATEGORY)]
        category: String,
    },
    /// Print the JSON Schema of the discovery record
    Schema,
}

// ── Setup ────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => std::env::var("EDITOR_BRIDGE_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok()
            .and_then(|spec| EnvFilter::try_new(spec).ok())
            .unwrap_or_else(|| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_settings() -> (Option<PathBuf>, BridgeSettings) {
    match paths::bridge_home() {
        Ok(home) => {
            let loaded = settings::load_settings(&home).unwrap_or_default();
            (Some(home), loaded)
        }
        Err(e) => {
            tracing::warn!("{e}");
            (None, BridgeSettings::default())
        }
    }
}

fn open_store(override_dir: Option<PathBuf>, home: Option<&PathBuf>, settings: &BridgeSettings) -> DiscoveryStore {
    let dir = override_dir
        .or_else(|| home.map(|h| settings.discovery_dir(h)))
        .or_else(|| settings.discovery_dir.clone())
        .unwrap_or_else(|| {
            eprintln!("Error: no home directory; pass --discovery-dir or set {}", paths::HOME_ENV);
            process::exit(2);
        });
    DiscoveryStore::new(dir)
}

fn print_json(value: &Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// ── Main ─────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (home, loaded) = load_settings();
    let raw = cli.json;

    match cli.command {
        Commands::Key { path, normalized } => {
            let key = derive_key(&path);
            if raw {
                print_json(&serde_json::json!({
                    "path": path,
                    "normalized": normalize_project_path(&path),
                    "key": key,
                }));
            } else if normalized {
                println!("{key}  {}", normalize_project_path(&path));
            } else {
                println!("{key}");
            }
        }
        Commands::Discover { project } => {
            let store = open_store(cli.discovery_dir, home.as_ref(), &loaded);
            match store.discover(&project) {
                Some(port) if raw => print_json(&serde_json::json!({ "port": port })),
                Some(port) => println!("{port}"),
                None => {
                    eprintln!("No live server found for {project}");
                    process::exit(1);
                }
            }
        }
        Commands::Register { project, port, pid } => {
            let store = open_store(cli.discovery_dir, home.as_ref(), &loaded);
            let record = DiscoveryRecord::new(project.clone(), port, pid);
            match store.write(&project, &record) {
                Ok(path) => println!("{}", path.display()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            }
        }
        Commands::Unregister { project } => {
            let store = open_store(cli.discovery_dir, home.as_ref(), &loaded);
            if !store.remove(&project) {
                eprintln!("No discovery record for {project}");
                process::exit(1);
            }
        }
        Commands::List => {
            let store = open_store(cli.discovery_dir, home.as_ref(), &loaded);
            let entries = store.list();
            if raw {
                print_json(&serde_json::to_value(&entries).unwrap_or_default());
            } else if entries.is_empty() {
                println!("No discovery records in {}", store.dir().display());
            } else {
                for e in &entries {
                    let port = e.port.map_or_else(|| "-".to_string(), |p| p.to_string());
                    let pid = e.pid.map_or_else(|| "-".to_string(), |p| p.to_string());
                    let status = if e.alive { "alive" } else { "stale" };
                    println!(
                        "{status:<6} port={port:<6} pid={pid:<8} {}",
                        e.project_path.as_deref().unwrap_or("?")
                    );
                }
            }
        }
        Commands::Prune => {
            let store = open_store(cli.discovery_dir, home.as_ref(), &loaded);
            let removed = store.prune();
            if raw {
                print_json(&serde_json::json!({ "removed": removed }));
            } else {
                println!("Removed {removed} stale record(s)");
            }
        }
        Commands::Exec { payload, category } => {
            let payload: Value = serde_json::from_str(&payload).unwrap_or_else(|e| {
                eprintln!("Error: payload is not valid JSON: {e}");
                process::exit(2);
            });
            let mut registry = HandlerRegistry::new();
            let registered = diagnostics::handler(Arc::new(CompilationMonitor::from_settings(&loaded)), &loaded)
                .and_then(|handler| registry.register(Arc::new(handler)));
            if let Err(e) = registered {
                eprintln!("Error: {e}");
                process::exit(1);
            }

            let payload = (!payload.is_null()).then_some(payload);
            let result = execute::execute(&registry, &category, payload.as_ref());
            print_json(&result.to_json());
            if !result.success {
                process::exit(1);
            }
        }
        Commands::Schema => {
            print_json(&catalog::discovery_record_schema());
        }
    }
}
