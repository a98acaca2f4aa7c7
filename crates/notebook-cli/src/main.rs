//! CLI entry point for the reactive notebook engine.

use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use notebook_server::ServerConfig;

#[derive(Parser)]
#[command(name = "notebook")]
#[command(about = "Reactive computation engine for the two-language notebook")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase logging verbosity (repeat for more: -v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/SSE server.
    Serve {
        /// Address to bind the HTTP listener to.
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        /// Data source name for the query engine pool, e.g. postgres://... or sqlite::memory:
        #[arg(long)]
        dsn: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Serve { bind, dsn } => {
            notebook_server::serve(ServerConfig { bind, dsn }).await?;
        }
    }

    Ok(())
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
