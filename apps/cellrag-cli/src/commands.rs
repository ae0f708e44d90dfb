use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use cellrag_core::config::{Config, Settings};
use cellrag_core::error::Error;
use cellrag_core::types::ScoredSegment;
use cellrag_retriever::Retriever;
use cellrag_vector::read_manifest;

pub fn load_settings(store: Option<PathBuf>) -> Result<Settings> {
    let mut settings = Config::load().context("Failed to load configuration")?.settings()?;
    if let Some(store) = store {
        settings.store.path = store.to_string_lossy().to_string();
    }
    Ok(settings)
}

pub async fn ingest(settings: &Settings, paths: &[PathBuf]) -> Result<()> {
    let retriever = Retriever::from_settings(settings)?;
    if retriever.load_if_present().await? {
        info!("Appending to existing store ({} segments)", retriever.len().await);
    }

    let mut files = Vec::new();
    for path in paths {
        if !path.exists() {
            anyhow::bail!("{} does not exist", path.display());
        }
        files.extend(retriever.processor().collect_files(path));
    }
    if files.is_empty() {
        println!("No supported files found (supported: txt, pdf)");
        return Ok(());
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );
    let mut added = 0usize;
    for file in &files {
        pb.set_message(file_label(file));
        added += retriever
            .ingest_files(std::slice::from_ref(file))
            .await
            .with_context(|| format!("Failed to ingest {}", file.display()))?;
        pb.inc(1);
    }
    pb.finish_with_message("done");

    let manifest = retriever.save().await?;
    println!("Ingested {} files into {} new segments", files.len(), added);
    println!("Store {} now holds {} segments", retriever.store_path().display(), manifest.count);
    Ok(())
}

pub async fn query(settings: &Settings, question: &str, k: usize, show_scores: bool) -> Result<()> {
    let retriever = Retriever::from_settings(settings)?;
    match retriever.load().await {
        Err(Error::StoreNotFound(path)) => {
            anyhow::bail!("No vector store at {}; run `cellrag ingest <PATH>` first", path.display())
        }
        other => other?,
    };

    let hits = retriever.get_relevant_documents_with_scores(question, k).await?;
    for (rank, hit) in hits.iter().enumerate() {
        print_hit(rank + 1, hit, show_scores);
    }
    Ok(())
}

pub fn status(settings: &Settings) -> Result<()> {
    let path = settings.store_path();
    match read_manifest(&path) {
        Ok(manifest) => {
            println!("Store:     {}", path.display());
            println!("Model:     {}", manifest.model_id);
            println!("Dimension: {}", manifest.dim);
            println!("Segments:  {}", manifest.count);
            println!("Saved at:  {}", manifest.saved_at.to_rfc3339());
            println!("Checksum:  {}", manifest.checksum);
        }
        Err(Error::StoreNotFound(_)) => println!("No vector store at {}", path.display()),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

pub async fn clear(settings: &Settings) -> Result<()> {
    let retriever = Retriever::from_settings(settings)?;
    if retriever.clear().await? {
        println!("Removed vector store at {}", retriever.store_path().display());
    } else {
        println!("No vector store at {}", retriever.store_path().display());
    }
    Ok(())
}

fn print_hit(rank: usize, hit: &ScoredSegment, show_score: bool) {
    let segment = &hit.segment;
    let mut header = format!("[{rank}] {}", segment.source().unwrap_or("Unknown"));
    if let Some(page) = segment.page() {
        header.push_str(&format!(" (page {})", page + 1));
    }
    if show_score {
        header.push_str(&format!(" score={:.4}", hit.score));
    }
    println!("{header}");
    println!("{}\n", segment.text.trim());
}

fn file_label(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}
