use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gait_session_server::config::{RecordStoreKind, ServerConfig};
use gait_session_server::serve::run_server;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Store and review gait capture sessions over HTTP"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the upload/review API server
    Serve {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Data directory (overrides config file)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Session record backend (overrides config file)
        #[arg(long, value_enum)]
        record_store: Option<RecordStoreKind>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    match args.command {
        Command::Serve {
            config,
            port,
            data_dir,
            record_store,
        } => {
            let mut cfg = match config {
                Some(path) => ServerConfig::load(&path)?,
                None => ServerConfig::default(),
            };
            if let Some(port) = port {
                cfg.port = port;
            }
            if let Some(data_dir) = data_dir {
                cfg.data_dir = data_dir;
            }
            if let Some(record_store) = record_store {
                cfg.record_store = record_store;
            }

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_server(cfg))?;
            Ok(())
        }
    }
}
