//! Subcommand handlers.
//!
//! Each handler writes user-facing output to `out` and leaves logging to
//! `tracing`, so the handlers can be exercised against an in-memory buffer.

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use docqa_rag::{RagPipeline, VectorIndex};

/// Ingest `file` and persist the index to `index_path`.
pub async fn load(
    pipeline: &RagPipeline,
    file: &Path,
    index_path: &Path,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let chunk_count = pipeline
        .ingest_file(file)
        .await
        .with_context(|| format!("failed to load {}", file.display()))?;
    save(pipeline.index(), index_path).await?;

    writeln!(out, "Loaded {chunk_count} chunks from {}", file.display())?;
    writeln!(out, "Index now holds {} chunks", pipeline.index().count().await)?;
    Ok(())
}

/// Answer `question` and print the answer, optionally followed by its sources.
pub async fn query(
    pipeline: &RagPipeline,
    question: &str,
    k: usize,
    lambda_mult: f32,
    show_sources: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let answer = pipeline
        .query(question, k, lambda_mult)
        .await
        .context("failed to answer the question")?;

    writeln!(out, "{}", answer.answer)?;
    if show_sources {
        writeln!(out)?;
        writeln!(out, "Sources ({} chunks):", answer.chunk_count)?;
        for (n, chunk) in answer.chunks_used.iter().enumerate() {
            writeln!(out, "[{}] {}", n + 1, chunk.trim_end())?;
        }
    }
    Ok(())
}

/// Print a summary of the index.
pub async fn status(index: &VectorIndex, out: &mut impl Write) -> anyhow::Result<()> {
    let status = index.status().await;
    if !status.has_documents {
        writeln!(out, "No documents loaded")?;
        return Ok(());
    }

    writeln!(out, "Chunks:      {}", status.chunk_count)?;
    if let Some(dimensions) = status.dimensions {
        writeln!(out, "Dimensions:  {dimensions}")?;
    }
    if let Some(at) = status.last_ingested_at {
        writeln!(out, "Last loaded: {}", at.to_rfc3339())?;
    }
    Ok(())
}

/// Empty the index and persist the empty snapshot.
pub async fn clear(
    index: &VectorIndex,
    index_path: &Path,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let removed = index.count().await;
    index.clear().await;
    save(index, index_path).await?;
    writeln!(out, "Removed {removed} chunks")?;
    Ok(())
}

async fn save(index: &VectorIndex, index_path: &Path) -> anyhow::Result<()> {
    index
        .save(index_path)
        .await
        .with_context(|| format!("failed to save index to {}", index_path.display()))
}
