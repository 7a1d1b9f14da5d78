use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use muster::config::ConsoleConfig;
use muster::model::EntityKind;

mod cli_exec;

#[derive(Parser)]
#[command(name = "muster")]
#[command(about = "Live console for units, chapters, and coordinates", long_about = None)]
struct Cli {
    /// Config file (defaults to ./muster.json when present)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Server base URL, e.g. http://localhost:8080
    #[arg(long, global = true)]
    url: Option<String>,

    /// Rows per page
    #[arg(long, global = true)]
    page_size: Option<usize>,

    /// Write logs here (the TUI defaults to ./muster.log)
    #[arg(long, value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,

    /// Run the TUI without the push channel
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one page of a collection
    List {
        /// units, chapters, or coordinates
        kind: EntityKind,
        /// Zero-based page index
        #[arg(long, default_value_t = 0)]
        page: usize,
        /// Sort column
        #[arg(long)]
        sort: Option<String>,
        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,
        /// Name filter (units only)
        #[arg(long)]
        filter: Option<String>,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Print push notifications and the views each one reloads
    Watch {
        /// Exit after this many notifications
        #[arg(long)]
        count: Option<usize>,
    },

    /// Print the average heart count over all units
    AverageHeartCount,

    /// Count units whose health is below a bound
    CountByHealth {
        /// Exclusive upper bound, at least 1
        health: i64,
    },

    /// List units whose name contains a fragment
    SearchByName {
        /// Name fragment
        name: String,
    },

    /// Take a unit out of its chapter
    RemoveFromChapter {
        /// Unit id
        id: i64,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = ConsoleConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.url {
        cfg.base_url = url;
    }
    if let Some(size) = cli.page_size {
        cfg.page_size = size;
    }
    if let Some(path) = cli.log_file {
        cfg.log_file = Some(path);
    }
    let cfg = cfg.validated()?;

    match cli.command {
        None => {
            let log_file = cfg
                .log_file
                .clone()
                .unwrap_or_else(|| PathBuf::from("muster.log"));
            muster::logging::init(Some(&log_file))?;
            muster::tui::run(muster::tui::TuiRunOptions {
                config: cfg,
                offline: cli.offline,
            })?;
        }
        Some(command) => {
            if cli.offline {
                anyhow::bail!("`--offline` is only supported when running the TUI (no subcommand)");
            }
            muster::logging::init(cfg.log_file.as_deref())?;
            cli_exec::handle_command(&cfg, command)?;
        }
    }

    Ok(())
}
