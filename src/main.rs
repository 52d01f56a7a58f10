mod commands;
mod import;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use mnemo::{Config, Error, LazyOnnxEmbedder, MemoryEngine};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use commands::Commands;
use output::{print_json, ErrorResponse};

/// mnemo - Local persistent memory for chat agents
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Conversation id (default: "default"; retrieve searches all when unset)
    #[arg(short = 'c', long, global = true)]
    conversation: Option<String>,

    /// Config file (default: <config dir>/mnemo/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            if cli.json {
                print_json(&ErrorResponse {
                    error: e.to_string(),
                });
            } else {
                eprintln!("Error: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, Error> {
    if let Commands::Version = cli.command {
        return commands::handle_version(cli.json);
    }

    let mut config = Config::load_from(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }
    init_tracing(&config.log_level, cli.verbose);
    config.ensure_directories()?;

    // The model only loads if the command actually embeds.
    let embedder = LazyOnnxEmbedder::new(&config.embedding_model, Some(&config.model_cache));
    let engine = MemoryEngine::new(config.clone(), Arc::new(embedder))?;

    let result = commands::execute(
        &cli.command,
        &engine,
        cli.conversation.as_deref(),
        &config,
        cli.json,
    );
    finish(result, engine.close())
}

/// Combine the command result with the engine's close result. The command's
/// own error wins; a close failure after a failed command is only logged.
fn finish(result: Result<ExitCode, Error>, closed: Result<(), Error>) -> Result<ExitCode, Error> {
    match (result, closed) {
        (Ok(code), Ok(())) => Ok(code),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!(error = %close_err, "failed to close memory engine");
            Err(err)
        }
    }
}

/// Install the fmt subscriber. `RUST_LOG` wins over `--verbose`, which wins
/// over the configured level.
fn init_tracing(log_level: &str, verbose: bool) {
    let fallback = if verbose { "debug" } else { log_level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(format!("{fallback},ort=warn,hf_hub=warn"))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    });

    // Logs go to stderr so --json output on stdout stays parseable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_prefers_command_error() {
        let result = finish(
            Err(Error::invalid(vec!["role"])),
            Err(Error::Config("close failed".to_string())),
        );
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_finish_reports_close_error_after_success() {
        let result = finish(
            Ok(ExitCode::SUCCESS),
            Err(Error::Config("close failed".to_string())),
        );
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(finish(Ok(ExitCode::SUCCESS), Ok(())).is_ok());
    }

    #[test]
    fn test_cli_parsing_save() {
        let cli = Cli::parse_from([
            "mnemo", "save", "user", "hello", "-c", "chat-1", "--metadata", "{}", "--json",
        ]);
        assert!(cli.json);
        assert_eq!(cli.conversation.as_deref(), Some("chat-1"));
        match cli.command {
            Commands::Save {
                role,
                content,
                metadata,
                no_embed,
            } => {
                assert_eq!(role, "user");
                assert_eq!(content, "hello");
                assert_eq!(metadata.as_deref(), Some("{}"));
                assert!(!no_embed);
            }
            _ => panic!("expected save command"),
        }
    }

    #[test]
    fn test_cli_parsing_retrieve_defaults() {
        let cli = Cli::parse_from(["mnemo", "retrieve", "python"]);
        assert!(!cli.json);
        assert!(cli.conversation.is_none());
        assert!(matches!(
            cli.command,
            Commands::Retrieve {
                top_k: None,
                threshold: None,
                ..
            }
        ));
    }

    #[test]
    fn test_cli_parsing_verbose_and_db() {
        let cli = Cli::parse_from(["mnemo", "--verbose", "--db", "/tmp/m.db", "stats"]);
        assert!(cli.verbose);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/m.db")));
        assert!(matches!(cli.command, Commands::Stats));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["mnemo"]).is_err());
    }
}
