use clap::{Parser, Subcommand};
use doc_query::Result;
use doc_query::commands::{ask, serve, show_config, upload_files};
use doc_query::config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "doc-query")]
#[command(about = "Upload documents and ask questions about them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve,
    /// Upload files (pdf, md, txt) to a running service
    Upload {
        /// Files to send in one upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Ask a question about the uploaded documents
    Ask {
        question: String,
    },
    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Serve => {
            serve(&config).await?;
        }
        Commands::Upload { files } => {
            upload_files(&config, files).await?;
        }
        Commands::Ask { question } => {
            ask(&config, question).await?;
        }
        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}
