//! `semcat` – Semantic Catalog Command Line Interface
//!
//! Thin adapter around `semcat-store`:
//!
//! 1. `build` reads the JSON catalog and the embedding corpus named in
//!    `semcat.toml` and writes a fresh SQLite catalog, printing the
//!    affordance reconstruction-error curve. With `--interactive` it prompts
//!    for the PCA component count after showing the curve.
//! 2. `load`, `list` and `repl` query a finished catalog read-only.
//! 3. `schema` prints the JSON schema of one catalog input record.
//! 4. `config` shows (or writes) the effective configuration.

mod commands;
mod config;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use semcat_pca::ComponentCount;
use semcat_types::ObjectRecord;
use std::path::PathBuf;

use crate::commands::ListKind;

#[derive(Parser)]
#[command(name = "semcat", version)]
#[command(about = "Build and query a semantic object catalog")]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a fresh catalog from the configured catalog and corpus files.
    Build {
        /// PCA component count, `mle` or an integer (overrides the config).
        #[arg(long)]
        components: Option<ComponentCount>,
        /// Show the reconstruction-error curve and prompt for the count.
        #[arg(long)]
        interactive: bool,
    },
    /// Show everything stored about one object.
    Load {
        key: String,
        #[arg(long)]
        json: bool,
    },
    /// Enumerate one value set of the catalog.
    List {
        #[arg(value_enum)]
        kind: ListKind,
    },
    /// Print the JSON schema of a catalog input record.
    Schema,
    /// Interactive query shell.
    Repl,
    /// Show the effective configuration.
    Config {
        /// Write it to the config file.
        #[arg(long)]
        write: bool,
    },
}

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"); SEMCAT_LOG_FORMAT=json
    // switches to newline-delimited JSON. Command output stays on stdout.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("SEMCAT_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Build {
            components,
            interactive,
        } => commands::build(&cfg, components, interactive),
        Commands::Load { key, json } => {
            let store = commands::open_store(&cfg)?;
            commands::load(&store, &key, json)
        }
        Commands::List { kind } => {
            let store = commands::open_store(&cfg)?;
            commands::list(&store, kind)
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(ObjectRecord);
            let out = serde_json::to_string_pretty(&schema)
                .map_err(|e| format!("Failed to serialize schema: {}", e))?;
            println!("{out}");
            Ok(())
        }
        Commands::Repl => {
            let store = commands::open_store(&cfg)?;
            println!(
                "  Catalog {} ({} objects). Type {} for a list of commands.\n",
                cfg.db_path.display().to_string().bold(),
                store.object_count().map_err(|e| e.to_string())?,
                "/help".bold().cyan()
            );
            repl::run(&store);
            store.close().map_err(|e| e.to_string())
        }
        Commands::Config { write } => {
            let raw = toml::to_string_pretty(&cfg)
                .map_err(|e| format!("Failed to serialize config: {}", e))?;
            print!("{raw}");
            if write {
                config::save_to(&cfg, &cli.config)?;
                println!(
                    "\n  {} Config saved to {}",
                    "✓".green().bold(),
                    cli.config.display().to_string().bold()
                );
            }
            Ok(())
        }
    }
}
