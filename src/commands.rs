//! Command handlers for the mnemo CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use mnemo::{Config, Error, MemoryEngine};
use serde_json::Value;

use crate::import;
use crate::output::*;

/// Commands supported by the mnemo CLI.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Save a message to the conversation
    Save {
        /// Speaker role (user, assistant, system)
        role: String,

        /// Message text
        content: String,

        /// Optional JSON metadata
        #[arg(short = 'm', long)]
        metadata: Option<String>,

        /// Store the message without an embedding
        #[arg(long)]
        no_embed: bool,
    },
    /// Retrieve messages semantically similar to a query
    Retrieve {
        /// Query text
        query: String,

        /// Maximum number of results (default: from config)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum similarity, 0.0 to 1.0 (default: from config)
        #[arg(short = 't', long)]
        threshold: Option<f64>,
    },
    /// Show the oldest messages of a conversation
    History {
        /// Maximum number of messages (default: from config)
        #[arg(short = 'l', long)]
        limit: Option<usize>,
    },
    /// Find messages containing a keyword (case-insensitive)
    Search {
        /// Keyword to look for
        keyword: String,

        /// Maximum number of results (default: 10)
        #[arg(short = 'l', long, default_value = "10")]
        limit: usize,
    },
    /// Delete every message of the conversation
    Forget,
    /// Show store statistics
    Stats,
    /// Import messages from a JSON export
    Import {
        /// Path to a JSON array of {role, content, metadata?, conversation_id?}
        file: PathBuf,

        /// Import without embeddings
        #[arg(long)]
        no_embed: bool,

        /// Report what would be imported without writing
        #[arg(long)]
        dry_run: bool,
    },
    Version,
}

/// Execute a CLI command.
///
/// `conversation` is the `--conversation` flag. Retrieval uses it as an
/// optional scope; every other command falls back to the default conversation.
pub fn execute(
    command: &Commands,
    engine: &MemoryEngine,
    conversation: Option<&str>,
    config: &Config,
    json: bool,
) -> Result<ExitCode, Error> {
    let conversation_or_default = conversation.unwrap_or(mnemo::DEFAULT_CONVERSATION_ID);
    match command {
        Commands::Save {
            role,
            content,
            metadata,
            no_embed,
        } => handle_save(
            engine,
            conversation_or_default,
            role,
            content,
            metadata.as_deref(),
            !no_embed,
            json,
        ),
        Commands::Retrieve {
            query,
            top_k,
            threshold,
        } => handle_retrieve(
            engine,
            query,
            top_k.unwrap_or(config.retrieval_top_k),
            conversation,
            threshold.unwrap_or(config.retrieval_threshold),
            json,
        ),
        Commands::History { limit } => handle_history(
            engine,
            conversation_or_default,
            limit.unwrap_or(config.history_limit),
            json,
        ),
        Commands::Search { keyword, limit } => {
            handle_search(engine, keyword, conversation, *limit, json)
        }
        Commands::Forget => handle_forget(engine, conversation_or_default, json),
        Commands::Stats => handle_stats(engine, json),
        Commands::Import {
            file,
            no_embed,
            dry_run,
        } => handle_import(engine, file, conversation_or_default, !no_embed, *dry_run, json),
        Commands::Version => handle_version(json),
    }
}

/// Parse `--metadata`, rejecting anything that is not valid JSON.
fn parse_metadata(raw: Option<&str>) -> Result<Option<Value>, Error> {
    raw.map(serde_json::from_str::<Value>).transpose().map_err(Error::from)
}

fn handle_save(
    engine: &MemoryEngine,
    conversation: &str,
    role: &str,
    content: &str,
    metadata: Option<&str>,
    want_embedding: bool,
    json: bool,
) -> Result<ExitCode, Error> {
    let metadata = parse_metadata(metadata)?;
    let id = engine.save(role, content, conversation, metadata.as_ref(), want_embedding)?;
    let conversation_id = mnemo::sanitize_conversation_id(conversation);

    if json {
        print_json(&SaveResponse {
            status: "saved".to_string(),
            id,
            conversation_id,
        });
    } else {
        println!("Saved message {} to {}", id, conversation_id);
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_retrieve(
    engine: &MemoryEngine,
    query: &str,
    top_k: usize,
    conversation: Option<&str>,
    threshold: f64,
    json: bool,
) -> Result<ExitCode, Error> {
    let results = engine.retrieve(query, top_k, conversation, threshold)?;
    if json {
        print_json(&RetrieveResponse { results });
    } else if results.is_empty() {
        println!("No matching memories");
    } else {
        for memory in results {
            println!(
                "{} [score: {:.3}] ({})\n  {}: {}\n",
                memory.id,
                memory.similarity,
                memory.conversation_id,
                memory.role,
                preview(&memory.content, PREVIEW_CHARS)
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_history(
    engine: &MemoryEngine,
    conversation: &str,
    limit: usize,
    json: bool,
) -> Result<ExitCode, Error> {
    let messages = engine.history(conversation, limit)?;
    if json {
        print_json(&HistoryResponse {
            conversation_id: mnemo::sanitize_conversation_id(conversation),
            messages,
        });
    } else {
        for message in &messages {
            println!("{}", format_message(message));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_search(
    engine: &MemoryEngine,
    keyword: &str,
    conversation: Option<&str>,
    limit: usize,
    json: bool,
) -> Result<ExitCode, Error> {
    let results = engine.keyword_search(keyword, conversation, limit)?;
    if json {
        print_json(&SearchResponse {
            keyword: keyword.to_string(),
            results,
        });
    } else {
        for message in &results {
            println!("{}", format_message(message));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_forget(engine: &MemoryEngine, conversation: &str, json: bool) -> Result<ExitCode, Error> {
    let deleted = engine.forget(conversation)?;
    let conversation_id = mnemo::sanitize_conversation_id(conversation);
    if json {
        print_json(&ForgetResponse {
            status: "forgotten".to_string(),
            conversation_id,
            deleted,
        });
    } else {
        println!("Deleted {} message(s) from {}", deleted, conversation_id);
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_stats(engine: &MemoryEngine, json: bool) -> Result<ExitCode, Error> {
    let stats = engine.stats()?;
    if json {
        print_json(&stats);
    } else {
        println!("Database: {}", stats.database_path.display());
        println!("Messages: {}", stats.total_messages);
        println!("Conversations: {}", stats.total_conversations);
        println!("Embeddings: {}", stats.total_embeddings);
        match stats.embedding_dimension {
            Some(dims) => println!("Model: {} ({} dims)", stats.embedding_model, dims),
            None => println!("Model: {}", stats.embedding_model),
        }
        if let (Some(first), Some(last)) = (&stats.first_message_time, &stats.last_message_time) {
            println!("First message: {}", first);
            println!("Last message: {}", last);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_import(
    engine: &MemoryEngine,
    file: &std::path::Path,
    conversation: &str,
    want_embedding: bool,
    dry_run: bool,
    json: bool,
) -> Result<ExitCode, Error> {
    let records = import::read_records(file)?;
    let stats = import::import_records(engine, records, conversation, want_embedding, dry_run)?;

    if json {
        print_json(&ImportResponse {
            status: if dry_run { "dry_run" } else { "imported" }.to_string(),
            total_messages: stats.total_messages,
            imported: stats.imported,
            skipped_invalid: stats.skipped_invalid,
            conversations: stats.conversations.len(),
        });
    } else {
        let verb = if dry_run { "Would import" } else { "Imported" };
        println!(
            "{} {} of {} message(s) into {} conversation(s); skipped {} invalid",
            verb,
            stats.imported,
            stats.total_messages,
            stats.conversations.len(),
            stats.skipped_invalid
        );
    }
    Ok(ExitCode::SUCCESS)
}

pub fn handle_version(json: bool) -> Result<ExitCode, Error> {
    if json {
        print_json(&serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "name": env!("CARGO_PKG_NAME")
        }));
    } else {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    }
    Ok(ExitCode::SUCCESS)
}
