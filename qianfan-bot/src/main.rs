//! qianfan-bot - Main entry point.

use anyhow::{Context, Result};
use base64::Engine;
use clap::Parser;
use qianfan_bot::dispatch::{parse_line, Invocation};
use qianfan_bot::{ChatHandler, ImagineHandler, Reply};
use qianfan_client::{QianfanApi, QianfanClient};
use qianfan_common::logging::init_logging;
use qianfan_common::{Config, Error};
use qianfan_history::{SessionWindow, TurnStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;

#[derive(Parser)]
#[command(name = "qianfan-bot", version, about = "Command-driven Qianfan chat bot")]
struct Args {
    /// Path to the configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// User identity for this session
    #[arg(long, default_value = "local")]
    user: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );
    tracing::info!("qianfan-bot v{}", env!("CARGO_PKG_VERSION"));

    let api_key = config
        .credentials
        .api_key
        .clone()
        .context("missing API key: set credentials.api_key or QIANFAN_API_KEY")?;
    let secret_key = config
        .credentials
        .secret_key
        .clone()
        .context("missing secret key: set credentials.secret_key or QIANFAN_SECRET_KEY")?;

    let api: Arc<dyn QianfanApi> = Arc::new(QianfanClient::new(api_key, secret_key));
    let store = Arc::new(TurnStore::new(&config.turns_db_path())?);
    let window = SessionWindow::new(store, config.history.clone());

    let chat = ChatHandler::new(api.clone(), window, config.clone());
    let imagine = config
        .image
        .imagine_command
        .then(|| ImagineHandler::new(api));

    run(&config, &args.user, &chat, imagine.as_ref()).await
}

/// Read command lines from stdin and route them to the handlers.
async fn run(
    config: &Config,
    user: &str,
    chat: &ChatHandler,
    imagine: Option<&ImagineHandler>,
) -> Result<()> {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let outcome = match parse_line(&line, &config.command, imagine.is_some()) {
            Invocation::Chat { prompt } => chat.handle(user, prompt).await,
            Invocation::Imagine { prompt } => {
                let Some(handler) = imagine else { continue };
                match prompt {
                    Some(prompt) => handler.handle(user, prompt).await,
                    None => Err(Error::EmptyPrompt),
                }
            }
            Invocation::Unknown => {
                tracing::debug!(line = %line, "unrecognized command");
                continue;
            }
        };

        match outcome {
            Ok(reply) => print_reply(config, reply)?,
            Err(e) => {
                tracing::error!(error = %e, "command failed");
                println!("{}", e.user_message());
            }
        }
    }

    Ok(())
}

/// Print reply text; decode and save any illustration under the data dir.
fn print_reply(config: &Config, reply: Reply) -> Result<()> {
    if let Some(b64) = reply.image_b64 {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64.as_bytes())
            .context("image payload is not valid base64")?;

        let dir = config.data_dir().join("images");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.png", uuid::Uuid::new_v4()));
        std::fs::write(&path, bytes)?;
        println!("[image saved to {}]", path.display());
    }
    if !reply.text.is_empty() {
        println!("{}", reply.text);
    }
    Ok(())
}
