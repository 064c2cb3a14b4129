mod progress;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use musicmirror_core::{
    load_config, scan_library, validate_config, Config, Converter, ExportProgressEvent, Exporter,
    FfmpegConverter, FolderCatalog,
};

#[derive(Parser, Debug)]
#[clap(name = "musicmirror")]
#[clap(about = "Mirror selected music library folders onto a player, converting as needed")]
#[clap(version)]
struct Args {
    /// Configuration file
    #[clap(long, env = "MUSICMIRROR_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Library root, overrides library.root
    #[clap(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Export destination, overrides export.destination
    #[clap(long, value_name = "DIR")]
    destination: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the library, refresh the folder catalog and list it
    Scan,

    /// Change which catalog folders get exported
    Select {
        /// Destination names (`Artist-Record[-Volume]`) to change
        names: Vec<String>,

        /// Apply to every folder
        #[clap(long)]
        all: bool,

        /// Deselect instead of select
        #[clap(long)]
        remove: bool,
    },

    /// Export the selected folders
    Export {
        /// Maximum parallel conversions (unbounded when omitted)
        #[clap(long, value_name = "N")]
        max_parallel: Option<usize>,

        /// Per-attempt conversion timeout in seconds
        #[clap(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Conversion attempts per file
        #[clap(long, value_name = "N")]
        max_attempts: Option<u32>,

        /// Leave destination folders that are not selected anymore
        #[clap(long)]
        keep_stale: bool,

        /// Print the final summary as JSON
        #[clap(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = resolve_config(&args)?;

    validate_config(&config).context("Configuration validation failed")?;

    match args.command {
        Command::Scan => scan(&config).await,
        Command::Select { names, all, remove } => select(&config, names, all, !remove).await,
        Command::Export {
            max_parallel,
            timeout,
            max_attempts,
            keep_stale,
            json,
        } => {
            let mut config = config;
            if let Some(max) = max_parallel {
                config.export.max_parallel_conversions = Some(max);
            }
            if let Some(secs) = timeout {
                config.export.conversion_timeout_ms = secs.saturating_mul(1000);
            }
            if let Some(attempts) = max_attempts {
                config.export.max_attempts = attempts;
            }
            if keep_stale {
                config.export.delete_stale = false;
            }
            validate_config(&config).context("Invalid export options")?;
            export(&config, json).await
        }
    }
}

/// Loads the config file, or builds one from flags when there is none.
fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = if args.config.exists() {
        info!("Loading configuration from {:?}", args.config);
        load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?
    } else {
        match (&args.root, &args.destination) {
            (Some(root), Some(destination)) => {
                info!("No configuration file, using defaults");
                Config::new(root, destination)
            }
            _ => bail!(
                "Configuration file {:?} not found; pass --root and --destination to run without one",
                args.config
            ),
        }
    };

    if let Some(root) = &args.root {
        config.library.root = root.clone();
    }
    if let Some(destination) = &args.destination {
        config.export.destination = destination.clone();
    }
    Ok(config)
}

async fn scan(config: &Config) -> Result<()> {
    let scanned = scan_library(&config.library.root, &config.export.extensions)
        .await
        .context("Library scan failed")?;

    let path = &config.library.catalog_path;
    let mut catalog = FolderCatalog::load(path)
        .await
        .context("Failed to load folder catalog")?;
    let report = catalog.refresh(scanned);
    catalog.save(path).await.context("Failed to save folder catalog")?;

    for entry in catalog.folders() {
        let mark = if entry.selected { "x" } else { " " };
        println!(
            "[{}] {:<40} {}",
            mark,
            entry.folder.destination_name(),
            entry.folder.path().display()
        );
    }
    println!(
        "{} folders ({} new, {} removed), {} selected",
        catalog.len(),
        report.added,
        report.removed,
        catalog.selected().len()
    );
    Ok(())
}

async fn select(config: &Config, names: Vec<String>, all: bool, selected: bool) -> Result<()> {
    if !all && names.is_empty() {
        bail!("Name at least one folder or pass --all");
    }

    let path = &config.library.catalog_path;
    let mut catalog = FolderCatalog::load(path)
        .await
        .context("Failed to load folder catalog")?;
    if catalog.is_empty() {
        bail!("The folder catalog is empty, run `musicmirror scan` first");
    }

    if all {
        if selected {
            catalog.select_all();
        } else {
            catalog.clear_selection();
        }
    }
    for name in &names {
        if catalog.set_selected(name, selected) == 0 {
            warn!(folder = %name, "No catalog folder exports to this name");
        }
    }

    catalog.save(path).await.context("Failed to save folder catalog")?;
    println!("{} of {} folders selected", catalog.selected().len(), catalog.len());
    Ok(())
}

async fn export(config: &Config, json: bool) -> Result<()> {
    let catalog = FolderCatalog::load(&config.library.catalog_path)
        .await
        .context("Failed to load folder catalog")?;
    let folders = catalog.selected();
    if folders.is_empty() {
        warn!("No folders selected, stale destination folders will still be removed");
    }

    let converter = FfmpegConverter::new(config.converter.clone());
    converter
        .validate()
        .await
        .context("FFmpeg is not usable, check converter.ffmpeg_path")?;

    let exporter = Exporter::new(config.export.clone(), converter);
    exporter.subscribe(|event: &ExportProgressEvent| {
        if let Some(line) = progress::render(event) {
            println!("{}", line);
        }
    });

    let handle = exporter.export(folders).context("Failed to start export")?;
    let cancel = handle.cancel_flag();
    let wait = handle.wait();
    tokio::pin!(wait);

    let summary = tokio::select! {
        summary = &mut wait => summary?,
        _ = signal::ctrl_c() => {
            warn!("Interrupted, stopping after running conversions");
            cancel.cancel();
            wait.await?
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    if summary.errors > 0 {
        bail!("Export finished with {} errors", summary.errors);
    }
    Ok(())
}
