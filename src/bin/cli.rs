//! CLI for cluster file operations

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use minidfs::client::{parse_chunk_sequences, ClusterSnapshot, DfsClient};
use minidfs::common::{format_bytes, parse_duration, sanitize_file_id, Config};
use std::ops::ControlFlow;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minidfs")]
#[command(about = "minidfs chunked file store client")]
#[command(version)]
struct Cli {
    /// Node URLs (comma-separated); overrides config
    #[arg(long, value_delimiter = ',')]
    nodes: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the role of every node
    Status {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Poll cluster status until interrupted
    Watch {
        /// Poll interval (e.g. 500ms, 3s)
        #[arg(long, default_value = "3s")]
        interval: String,
    },

    /// Print the current leader
    Leader,

    /// Upload a file
    Upload {
        /// File path
        path: PathBuf,

        /// File ID (defaults to the sanitized file name)
        #[arg(long)]
        file_id: Option<String>,
    },

    /// Download a file
    Download {
        /// File ID
        file_id: String,

        /// Chunk numbers, comma-separated (defaults to 1)
        #[arg(long, default_value = "")]
        chunks: String,

        /// Output file
        #[arg(long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // validated by DfsClient::new, after the --nodes override
    let mut config = Config::layered().context("failed to load configuration")?;
    if !cli.nodes.is_empty() {
        config.nodes = cli.nodes.clone();
    }
    let log_level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = DfsClient::new(&config)?;

    match cli.command {
        Commands::Status { json } => {
            let snapshot = client.cluster_snapshot().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print_snapshot(&snapshot);
            }
        }

        Commands::Watch { interval } => {
            let period = parse_duration(&interval)?;
            let watch = client.watch_cluster(period, |snapshot| {
                print_snapshot(&snapshot);
                println!();
                ControlFlow::Continue(())
            });
            tokio::select! {
                _ = watch => {}
                res = tokio::signal::ctrl_c() => res?,
            }
        }

        Commands::Leader => match client.resolve_leader().await {
            Some(leader) => println!("{}", leader),
            None => anyhow::bail!("no leader available"),
        },

        Commands::Upload { path, file_id } => {
            let file_id = match file_id {
                Some(id) => id,
                None => {
                    let name = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .context("cannot derive a file id from this path, pass --file-id")?;
                    sanitize_file_id(name)
                }
            };
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;

            println!("Uploading {} as {} ({})", path.display(), file_id, format_bytes(data.len() as u64));
            let report = client
                .upload_file_with_progress(&file_id, Bytes::from(data), |p| {
                    println!("  chunk {}/{} ({}%)", p.completed, p.total, p.percent());
                })
                .await?;
            println!("Upload complete:");
            println!("  File ID: {}", report.file_id);
            println!("  Chunks: {}", report.total_chunks);
            println!("  Size: {}", format_bytes(report.total_bytes));
        }

        Commands::Download {
            file_id,
            chunks,
            output,
        } => {
            let sequences = parse_chunk_sequences(&chunks);
            let report = client
                .download_file_with_progress(&file_id, &sequences, |p| {
                    println!("  chunk {}/{} ({}%)", p.completed, p.total, p.percent());
                })
                .await?;
            tokio::fs::write(&output, &report.data)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Download complete:");
            println!("  File ID: {}", report.file_id);
            println!("  Chunks: {:?}", report.sequences);
            println!("  Size: {}", format_bytes(report.data.len() as u64));
            println!("  Output: {}", output.display());
        }
    }

    Ok(())
}

fn print_snapshot(snapshot: &ClusterSnapshot) {
    println!("Cluster status ({}):", snapshot.taken_at.format("%Y-%m-%d %H:%M:%S UTC"));
    for node in snapshot.iter() {
        let marker = if node.reachable() { '●' } else { '○' };
        println!(
            "  {} {:<32} {:<10} {}",
            marker,
            node.endpoint,
            node.role.to_string(),
            node.status
        );
    }
    println!("  {}/{} nodes up", snapshot.up_count(), snapshot.len());
}
