//! Durian consultant terminal client.
//!
//! Interactive chat by default; one-shot subcommands for auth and speech-to-text.

#![allow(clippy::match_same_arms)]

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::io::Write as _;
use std::path::Path;
use std::pin::pin;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use durian_chat::api::{
    ALL_POSTS_TAG, Client, IrrigationStats, LoginRequest, NewPost, RegisterRequest,
};
use durian_chat::config::{AppConfig, Cli, Command};
use durian_chat::conversation::{PendingImage, Sender};
use durian_chat::{ChatSession, SendOutcome, Snapshot};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present) before clap reads env fallbacks
    let _ = dotenv();

    // Logs go to stderr so they never interleave with the reply text (M-LOG-STRUCTURED)
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_cli(&cli).context("failed to load configuration")?;

    let mut client = Client::new(&config.backend.base_url)?;
    if let Some(token) = &config.backend.token {
        client = client.with_bearer_token(token);
    }

    info!(
        name: "app.start",
        base_url = %client.base_url(),
        user_id = %config.backend.user_id,
        "Client configured"
    );

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(client, &config).await,
        Command::Login { email, password } => {
            let auth = client
                .auth()
                .login(&LoginRequest { email, password })
                .await?;
            println!("{}", auth.access_token);
            Ok(())
        }
        Command::Register {
            email,
            full_name,
            password,
        } => {
            let auth = client
                .auth()
                .register(&RegisterRequest {
                    email,
                    full_name,
                    password,
                })
                .await?;
            println!("{}", auth.access_token);
            Ok(())
        }
        Command::Me => {
            let user = client.auth().me().await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
            Ok(())
        }
        Command::Transcribe { path } => {
            println!("{}", client.asr().transcribe(&path).await?);
            Ok(())
        }
        Command::IrrigationOn { limit } => {
            let ack = client.irrigation().on(limit).await?;
            println!(
                "{}",
                ack.message
                    .unwrap_or_else(|| format!("Watering until {limit}% moisture"))
            );
            Ok(())
        }
        Command::IrrigationOff => {
            let ack = client.irrigation().off().await?;
            println!("{}", ack.message.unwrap_or_else(|| "Pump off".to_string()));
            Ok(())
        }
        Command::IrrigationHistory => {
            let sessions = client.irrigation().history().await?;
            let stats = IrrigationStats::from_sessions(&sessions);
            let report = serde_json::json!({ "stats": stats, "sessions": sessions });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Posts { tag } => {
            let posts = client
                .blog()
                .posts(Some(tag.as_deref().unwrap_or(ALL_POSTS_TAG)))
                .await?;
            println!("{}", serde_json::to_string_pretty(&posts)?);
            Ok(())
        }
        Command::Post {
            content,
            tag,
            image,
        } => {
            let image = image
                .map(PendingImage::from_path)
                .transpose()?
                .map(|pending| pending.file);
            client
                .blog()
                .create(&NewPost {
                    content,
                    tag,
                    image,
                })
                .await?;
            Ok(())
        }
        Command::Like { id } => {
            client.blog().like(&id).await?;
            Ok(())
        }
    }
}

/// Line-oriented chat loop.
///
/// Plain lines are sent as messages. `/image <path>` attaches a picture to the
/// next message, `/asr <path>` sends the transcript of a recording, `/clear`
/// resets the conversation and `/quit` exits. Ctrl-C cancels a reply, or
/// exits when pressed at the prompt.
async fn run_chat(client: Client, config: &AppConfig) -> anyhow::Result<()> {
    let asr = client.clone();
    let session = ChatSession::new(Arc::new(client), config.chat_settings());
    println!("{}", session.settings().greeting);

    let mut interrupts = forward_interrupts();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            Some(()) = interrupts.recv() => {
                println!();
                break;
            }
        };
        let Some(line) = line else { break };
        let line = line.trim();
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
        let arg = arg.trim();

        match command {
            "" => {}
            "/quit" | "/exit" => break,
            "/clear" => {
                if session.clear() {
                    println!("{}", session.settings().greeting);
                }
            }
            "/image" => match PendingImage::from_path(arg) {
                Ok(image) => {
                    let name = image.file.name.clone();
                    if session.attach_image(image) {
                        println!("[image] {name}");
                    }
                }
                Err(e) => eprintln!("{e}"),
            },
            "/asr" => match asr.asr().transcribe(Path::new(arg)).await {
                Ok(text) if !text.trim().is_empty() => {
                    println!("> {text}");
                    converse(&session, Some(text), &mut interrupts).await?;
                }
                Ok(_) => warn!(name: "asr.empty", file = arg, "Transcript was empty"),
                Err(e) => eprintln!("{}{e}", session.settings().error_prefix),
            },
            _ => {
                session.set_draft(line);
                converse(&session, None, &mut interrupts).await?;
            }
        }
    }

    Ok(())
}

/// Listen for Ctrl-C for the whole session and forward each press.
///
/// Once tokio owns SIGINT the default handler no longer terminates the
/// process, so every press has to reach either the prompt or a reply.
fn forward_interrupts() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Run one send cycle, printing the reply as it streams in.
async fn converse(
    session: &ChatSession,
    text: Option<String>,
    interrupts: &mut mpsc::UnboundedReceiver<()>,
) -> anyhow::Result<SendOutcome> {
    let mut updates = session.subscribe();
    let mut renderer = Renderer::new(session.settings().placeholder_text.clone());

    let mut send = pin!(async {
        match text {
            Some(text) => session.send_text(text).await,
            None => session.send().await,
        }
    });

    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome,
            changed = updates.changed() => {
                if changed.is_ok() {
                    renderer.update(&updates.borrow_and_update())?;
                }
            }
            Some(()) = interrupts.recv() => {
                session.cancel();
            }
        }
    };

    renderer.finish(&session.subscribe().borrow(), &outcome)?;
    Ok(outcome)
}

fn prompt() -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    write!(out, "» ")?;
    out.flush()
}

/// Prints the growing placeholder text as a suffix of what is already on screen.
#[derive(Debug)]
struct Renderer {
    placeholder_text: String,
    printed: String,
}

impl Renderer {
    fn new(placeholder_text: String) -> Self {
        Self {
            placeholder_text,
            printed: String::new(),
        }
    }

    fn update(&mut self, snapshot: &Snapshot) -> std::io::Result<()> {
        let Some(pending) = snapshot
            .messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::Bot && m.is_pending)
        else {
            return Ok(());
        };
        if pending.text == self.placeholder_text {
            return Ok(());
        }
        self.print_from(&pending.text)
    }

    fn finish(&mut self, snapshot: &Snapshot, outcome: &SendOutcome) -> std::io::Result<()> {
        match outcome {
            SendOutcome::Completed(id) => {
                if let Some(reply) = snapshot.messages.iter().find(|m| &m.id == id) {
                    self.print_from(&reply.text)?;
                }
                println!();
            }
            SendOutcome::Failed(_) | SendOutcome::TimedOut => {
                if !self.printed.is_empty() {
                    println!();
                }
                if let Some(error) = snapshot
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.sender == Sender::Error)
                {
                    println!("{}", error.text);
                }
            }
            SendOutcome::Busy | SendOutcome::Empty | SendOutcome::Superseded => {}
        }
        Ok(())
    }

    fn print_from(&mut self, text: &str) -> std::io::Result<()> {
        let mut out = std::io::stdout().lock();
        match text.strip_prefix(self.printed.as_str()) {
            Some(rest) => write!(out, "{rest}")?,
            // Text was rewritten rather than extended; start a fresh line.
            None => write!(out, "\n{text}")?,
        }
        out.flush()?;
        self.printed = text.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use durian_chat::ChatSettings;
    use durian_chat::api::{ChatBackend, ChatRequest};
    use durian_chat::stream::ResponseBody;

    #[derive(Debug)]
    struct SilentBackend;

    #[async_trait::async_trait]
    impl ChatBackend for SilentBackend {
        async fn open(&self, _req: ChatRequest) -> durian_chat::Result<ResponseBody> {
            futures::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_interrupt_cancels_reply() {
        let session = ChatSession::new(Arc::new(SilentBackend), ChatSettings::default());
        let mut updates = session.subscribe();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let press = async move {
            updates.wait_for(|s| s.is_loading()).await.unwrap();
            tx.send(()).unwrap();
        };

        session.set_draft("Có ai không?");
        let (outcome, ()) = tokio::join!(converse(&session, None, &mut rx), press);

        assert_eq!(
            outcome.unwrap(),
            SendOutcome::Failed("Request aborted".to_string())
        );
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_interrupts_keep_arriving_after_a_reply() {
        let session = ChatSession::new(Arc::new(SilentBackend), ChatSettings::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        for _ in 0..2 {
            let mut updates = session.subscribe();
            let tx = tx.clone();
            let press = async move {
                updates.wait_for(|s| s.is_loading()).await.unwrap();
                tx.send(()).unwrap();
            };
            session.set_draft("lại nữa");
            let (outcome, ()) = tokio::join!(converse(&session, None, &mut rx), press);
            assert!(matches!(outcome.unwrap(), SendOutcome::Failed(_)));
        }

        // A press with no reply in flight stays queued for the prompt.
        tx.send(()).unwrap();
        assert_eq!(rx.recv().await, Some(()));
    }
}
