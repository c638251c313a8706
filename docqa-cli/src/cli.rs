use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docqa_rag::openai::{DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL};

#[derive(Parser, Debug)]
#[command(name = "docqa", version, about = "Ask questions about your documents")]
pub struct Cli {
    /// JSON file with pipeline settings (chunking, retrieval, context budget).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Index snapshot to read and update.
    #[arg(long, global = true, default_value = "docqa-index.json")]
    pub index: PathBuf,

    /// Embedding model used for documents and questions.
    #[arg(long, global = true, default_value = DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    /// Chat model used to answer questions.
    #[arg(long, global = true, default_value = DEFAULT_CHAT_MODEL)]
    pub chat_model: String,

    /// Base URL of an OpenAI-compatible API.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chunk, embed and index a UTF-8 text document.
    Load {
        /// Path to the document.
        file: PathBuf,
        /// Maximum chunk size in characters.
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Characters shared by consecutive chunks.
        #[arg(long)]
        chunk_overlap: Option<usize>,
        /// Separator to split on; `\n`, `\t` and `\\` escapes are understood.
        #[arg(long)]
        separator: Option<String>,
    },

    /// Answer a question from the loaded documents.
    Query {
        /// The question to answer.
        question: String,
        /// Number of chunks to retrieve.
        #[arg(short, long)]
        k: Option<usize>,
        /// MMR trade-off between relevance (1.0) and diversity (0.0).
        #[arg(long = "lambda")]
        lambda_mult: Option<f32>,
        /// Print the chunks the answer was grounded on.
        #[arg(long)]
        show_sources: bool,
    },

    /// Show what the index holds.
    Status,

    /// Remove every chunk from the index.
    Clear,
}

/// Expand `\n`, `\t`, `\r` and `\\` in a separator given on the command line.
pub fn unescape_separator(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
