use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "cellrag")]
#[command(about = "Index wireless and cellular documents and retrieve relevant passages")]
#[command(version)]
struct Cli {
    /// Vector store directory (overrides `store.path` from configuration)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and add files or directories (txt, pdf) to the store
    Ingest {
        /// Files or directories to ingest
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print the passages most relevant to a question
    Query {
        question: String,
        /// Number of passages (defaults to `retrieval.k`)
        #[arg(short, long)]
        k: Option<usize>,
        /// Show similarity scores
        #[arg(long)]
        scores: bool,
    },
    /// Show what the store on disk holds
    Status,
    /// Delete the store
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = commands::load_settings(cli.store)?;

    match cli.command {
        Commands::Ingest { paths } => commands::ingest(&settings, &paths).await?,
        Commands::Query { question, k, scores } => {
            commands::query(&settings, &question, k.unwrap_or(settings.retrieval.k), scores).await?;
        }
        Commands::Status => commands::status(&settings)?,
        Commands::Clear => commands::clear(&settings).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_with_options() {
        let cli = Cli::try_parse_from(["cellrag", "query", "What is 5G?", "-k", "2", "--scores"]).unwrap();
        match cli.command {
            Commands::Query { question, k, scores } => {
                assert_eq!(question, "What is 5G?");
                assert_eq!(k, Some(2));
                assert!(scores);
            }
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn store_override_is_global() {
        let cli = Cli::try_parse_from(["cellrag", "status", "--store", "/tmp/vs"]).unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/vs")));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn ingest_requires_a_path() {
        assert!(Cli::try_parse_from(["cellrag", "ingest"]).is_err());
        let cli = Cli::try_parse_from(["cellrag", "ingest", "docs", "ts38300.pdf"]).unwrap();
        assert!(matches!(cli.command, Commands::Ingest { paths } if paths.len() == 2));
    }
}
