//! FDFS CLI - Upload, download and delete files on a tracker/storage cluster
//!
//! Usage:
//!   fdfs upload <path>                         Upload a local file
//!   fdfs download <file-id> <dest>             Download a file
//!   fdfs delete <file-id>                      Delete a file
//!   fdfs sample-config                         Print a sample config

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fdfs_client::{Config, FdfsClient};

#[derive(Parser)]
#[command(name = "fdfs")]
#[command(about = "FastDFS file client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML or client.conf style)
    #[arg(short, long, global = true, env = "FDFS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file and print its file id
    Upload {
        /// File to upload
        path: PathBuf,
    },

    /// Download a file to a local path
    Download {
        /// File id (group/remote_filename)
        file_id: String,

        /// Destination path
        dest: PathBuf,

        /// Byte offset to start from
        #[arg(long, default_value = "0")]
        offset: u64,

        /// Bytes to download (0 = to the end)
        #[arg(long, default_value = "0")]
        length: u64,
    },

    /// Delete a file
    Delete {
        /// File id (group/remote_filename)
        file_id: String,
    },

    /// Print a sample configuration
    SampleConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::SampleConfig = cli.command {
        print!("{}", Config::sample());
        return Ok(());
    }

    let client = open_client(cli.config)?;

    match cli.command {
        Commands::Upload { path } => {
            let file_id = client
                .upload_by_filename(&path)
                .with_context(|| format!("failed to upload {}", path.display()))?;
            println!("{}", file_id);
        }
        Commands::Download {
            file_id,
            dest,
            offset,
            length,
        } => {
            let received = client
                .download_range_to_file(&file_id, &dest, offset, length)
                .with_context(|| format!("failed to download {}", file_id))?;
            info!("Wrote {} bytes to {}", received, dest.display());
        }
        Commands::Delete { file_id } => {
            client
                .delete_file(&file_id)
                .with_context(|| format!("failed to delete {}", file_id))?;
        }
        Commands::SampleConfig => {}
    }

    client.shutdown();
    Ok(())
}

fn open_client(config_path: Option<PathBuf>) -> Result<FdfsClient> {
    let path = config_path
        .or_else(Config::default_path)
        .ok_or_else(|| anyhow!("no config file given and no default config directory"))?;

    FdfsClient::from_config_file(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}
