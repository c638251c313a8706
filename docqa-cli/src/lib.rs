//! Command-line front end for docqa.
//!
//! Loads the index snapshot named by `--index`, wires OpenAI-backed
//! embedding and generation into a [`RagPipeline`] and dispatches the
//! subcommand. `status` and `clear` work on the snapshot alone and need no
//! API key.

pub mod cli;
pub mod commands;
pub mod logging;

use std::sync::Arc;

use anyhow::Context;
use docqa_rag::{OpenAIEmbedder, OpenAIGenerator, RagConfig, RagPipeline, VectorIndex};
use tracing::debug;

use cli::{Cli, Command, unescape_separator};

/// Run a parsed command line to completion.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => RagConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => RagConfig::default(),
    };
    let index = Arc::new(
        VectorIndex::load_or_default(&cli.index)
            .await
            .with_context(|| format!("failed to open index {}", cli.index.display()))?,
    );
    let chunks = index.count().await;
    debug!(index = %cli.index.display(), chunks, "opened index");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Command::Load { file, chunk_size, chunk_overlap, separator } => {
            if let Some(size) = chunk_size {
                config.chunk_size = *size;
            }
            if let Some(overlap) = chunk_overlap {
                config.chunk_overlap = *overlap;
            }
            if let Some(separator) = separator {
                config.separator = unescape_separator(separator);
            }
            let pipeline = openai_pipeline(&cli, config, index)?;
            commands::load(&pipeline, file, &cli.index, &mut out).await
        }
        Command::Query { question, k, lambda_mult, show_sources } => {
            let k = k.unwrap_or(config.top_k);
            let lambda_mult = lambda_mult.unwrap_or(config.lambda_mult);
            let pipeline = openai_pipeline(&cli, config, index)?;
            commands::query(&pipeline, question, k, lambda_mult, *show_sources, &mut out).await
        }
        Command::Status => commands::status(&index, &mut out).await,
        Command::Clear => commands::clear(&index, &cli.index, &mut out).await,
    }
}

fn openai_pipeline(
    cli: &Cli,
    config: RagConfig,
    index: Arc<VectorIndex>,
) -> anyhow::Result<RagPipeline> {
    let mut embedder = OpenAIEmbedder::from_env()?.with_model(&cli.embedding_model);
    let mut generator = OpenAIGenerator::from_env()?.with_model(&cli.chat_model);
    if let Some(base_url) = &cli.base_url {
        embedder = embedder.with_base_url(base_url);
        generator = generator.with_base_url(base_url);
    }

    let pipeline = RagPipeline::builder()
        .config(config)
        .embedder(Arc::new(embedder))
        .generator(Arc::new(generator))
        .index(index)
        .build()?;
    Ok(pipeline)
}
