//! MedChat - Terminal Client for the Medical Assistant
//!
//! Line-based chat surface over `medchat-core`. Replies stream into the
//! terminal as they arrive.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a local server
//! medchat
//!
//! # Custom server
//! medchat --base-url https://assistant.example.org
//!
//! # Verbose logging (written to stderr)
//! RUST_LOG=medchat_core=debug medchat
//! ```
//!
//! # Commands
//!
//! - any other line: send it as a message
//! - `/end`: end the conversation and start over
//! - `/quit`: exit

mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

use medchat_core::config::{load_config, load_config_from_path};
use medchat_core::{ChatClient, ConfigOverrides, ConversationSnapshot, HttpEndpoint};

use render::Transcript;

/// MedChat - streaming terminal client for the medical assistant
#[derive(Parser, Debug)]
#[command(name = "medchat")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Assistant server base URL
    #[arg(short = 'u', long, value_name = "URL")]
    base_url: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "MEDCHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "MEDCHAT_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

/// A line of user input
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Say(String),
    End,
    Quit,
    Nothing,
}

fn parse_command(line: &str) -> Command {
    match line.trim() {
        "" => Command::Nothing,
        "/end" => Command::End,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Say(line.to_string()),
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("medchat={level},medchat_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Print every change to the conversation as it happens
async fn render_loop(mut updates: watch::Receiver<ConversationSnapshot>) -> Result<()> {
    let mut transcript = Transcript::default();
    let mut stdout = tokio::io::stdout();

    loop {
        let text = {
            let snapshot = updates.borrow_and_update();
            transcript.render(&snapshot)
        };
        if !text.is_empty() {
            stdout.write_all(text.as_bytes()).await?;
            stdout.flush().await?;
        }
        if updates.changed().await.is_err() {
            return Ok(());
        }
    }
}

async fn run(client: Arc<ChatClient<HttpEndpoint>>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        match parse_command(&line) {
            Command::Nothing => {}
            Command::Quit => break,
            Command::End => match client.end_conversation().await {
                Ok(true) => {}
                Ok(false) => eprintln!("(nothing to end yet)"),
                Err(e) => eprintln!("(could not end the conversation: {e})"),
            },
            Command::Say(text) => {
                let Some(turn) = client.session().submit(&text) else {
                    eprintln!("(still answering, please wait)");
                    continue;
                };
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    client.transport().send_message(&turn).await;
                });
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    let mut config = match args.config {
        Some(path) => load_config_from_path(Some(path)),
        None => load_config(),
    }
    .context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(url) = args.base_url {
        overrides = overrides.with_base_url(url);
    }
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        base_url = %config.endpoint.base_url,
        source = %config.source(),
        "Configuration loaded"
    );

    let client = Arc::new(
        ChatClient::from_config(&config).context("Failed to create HTTP client")?,
    );

    let renderer = tokio::spawn(render_loop(client.session().subscribe()));
    eprintln!("Type a message and press Enter. /end starts over, /quit exits.");

    let result = run(Arc::clone(&client)).await;

    renderer.abort();
    if let Err(ref e) = result {
        warn!(error = %e, "Input loop ended with error");
    }
    info!("Goodbye");
    result
}
