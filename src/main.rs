use anyhow::Result;
use clap::{Args, Parser};
use funding_engine::{cli, server, EngineConfig};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Args)]
struct Tuning {
    /// Approval percentage threshold
    #[arg(long)]
    approval_threshold: Option<Decimal>,
    /// Minimum vote count before a project leaves pending
    #[arg(long)]
    quorum: Option<u64>,
    /// Contributor percentage of each funding split
    #[arg(long)]
    contributor_split: Option<Decimal>,
}

impl Tuning {
    fn into_config(self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(threshold) = self.approval_threshold {
            config.approval_threshold = threshold;
        }
        if let Some(quorum) = self.quorum {
            config.quorum = quorum;
        }
        if let Some(split) = self.contributor_split {
            config.contributor_split = split;
        }
        config
    }
}

#[derive(Parser)]
#[command(name = "funding-engine")]
#[command(about = "Process funding ops: wallet ledger, votes, settlement")]
enum Cli {
    #[command(name = "cli")]
    CliMode {
        input: PathBuf,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Run TCP server
    #[command(name = "server")]
    Server {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        #[arg(long, default_value = "1000")]
        max_connections: usize,
        #[command(flatten)]
        tuning: Tuning,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() == 2 && !args[1].starts_with('-') {
        // Direct file argument, no logging for clean stdout
        cli::run(PathBuf::from(&args[1]), EngineConfig::default()).await?;
    } else {
        match Cli::parse() {
            Cli::CliMode { input, tuning } => {
                // CLI mode, no logging for clean stdout
                cli::run(input, tuning.into_config()).await?;
            }
            Cli::Server {
                bind,
                max_connections,
                tuning,
            } => {
                // Initialize logging only for server mode
                tracing_subscriber::fmt()
                    .with_writer(std::io::stderr)
                    .with_env_filter(
                        EnvFilter::from_default_env()
                            .add_directive(tracing::Level::INFO.into()),
                    )
                    .init();

                server::run(bind, max_connections, tuning.into_config()).await?;
            }
        }
    }

    Ok(())
}
