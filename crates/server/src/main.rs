//! LanShare
//!
//! Share one directory with every device on the local network.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use server::config::Config;
use server::files::{ArchiveStreamer, DirectoryBrowser, EntryOutcome, SharedRoot};
use server::ShareServer;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// LanShare - browse and download a shared directory over the LAN.
#[derive(Parser, Debug)]
#[command(name = "lanshare")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the shared directory over HTTP
    Serve {
        /// Address to listen on
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (0 picks a free port)
        #[arg(long, short)]
        port: Option<u16>,

        /// Directory to share
        #[arg(long, short, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Serve a browser front-end from this directory
        #[arg(long, value_name = "DIR")]
        frontend: Option<PathBuf>,
    },

    /// List a directory of the share
    Ls {
        /// Path relative to the shared directory
        #[arg(default_value = "")]
        path: String,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a ZIP archive of shared paths to a file
    Archive {
        /// Paths relative to the shared directory
        #[arg(required = true)]
        paths: Vec<String>,

        /// Output file
        #[arg(long, short, value_name = "FILE")]
        output: PathBuf,
    },

    /// Show the effective configuration
    Config {
        /// Write the configuration to this file instead of printing it
        #[arg(long, value_name = "FILE")]
        write: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    // Apply environment variable overrides
    config.apply_env_overrides();

    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Serve {
            host,
            port,
            dir,
            frontend,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(dir) = dir {
                config.share.directory = dir;
            }
            if let Some(frontend) = frontend {
                config.frontend.directory = Some(frontend);
            }

            let server = ShareServer::new(config)?;
            let shutdown = CancellationToken::new();

            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received Ctrl-C, shutting down");
                    signal_token.cancel();
                }
            });

            server.run(shutdown).await?;
        }
        Commands::Ls { path, json } => {
            config.validate()?;
            let root = open_root(&config)?;
            let browser = DirectoryBrowser::new(root);
            let entries = browser.list_directory(&path)?;

            if json {
                let wire: Vec<_> = entries.iter().map(|e| e.to_protocol()).collect();
                println!("{}", serde_json::to_string_pretty(&wire)?);
            } else if entries.is_empty() {
                println!("(empty)");
            } else {
                for entry in &entries {
                    if entry.is_directory {
                        println!("{:>12}  {}/", "-", entry.name);
                    } else {
                        println!("{:>12}  {}", entry.size, entry.name);
                    }
                }
            }
        }
        Commands::Archive { paths, output } => {
            config.validate()?;
            let root = open_root(&config)?;
            let archiver = ArchiveStreamer::new(root);

            let file = File::create(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            let mut writer = BufWriter::new(file);

            let summary = archiver.write_archive_observed(&paths, &mut writer, |outcome| {
                match outcome {
                    EntryOutcome::Added { name, .. } => println!("  added   {name}"),
                    EntryOutcome::Skipped { path, reason } => {
                        eprintln!("  skipped {path}: {reason}")
                    }
                }
            })?;
            writer.flush()?;

            println!(
                "Wrote {} ({} entries, {} skipped, {} bytes)",
                output.display(),
                summary.added,
                summary.skipped,
                summary.bytes
            );
        }
        Commands::Config { write } => match write {
            Some(path) => {
                config.save(&path)?;
                println!("Configuration written to {}", path.display());
            }
            None => print!("{}", config.to_toml()?),
        },
    }

    Ok(())
}

fn init_logging(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log.level.to_lowercase()))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn open_root(config: &Config) -> anyhow::Result<Arc<SharedRoot>> {
    let root = SharedRoot::open(&config.share.directory).with_context(|| {
        format!(
            "Failed to open shared directory: {}",
            config.share.directory.display()
        )
    })?;
    Ok(Arc::new(root))
}
