use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::api::DEFAULT_POST_TAG;
use crate::reconciler::{
    ChatSettings, DEFAULT_ERROR_PREFIX, DEFAULT_FALLBACK_CAPTION, DEFAULT_GREETING,
    DEFAULT_PLACEHOLDER_TEXT, DEFAULT_TIMEOUT, DEFAULT_USER_ID,
};
use crate::stream::{DEFAULT_BATCH_DELAY, DEFAULT_BATCH_WORDS, RevealSettings};

/// Config file looked up in the working directory when none is given.
const DEFAULT_CONFIG_BASENAME: &str = "durian-chat";

/// Prefix of environment overrides, e.g. `DURIAN_CHAT__TIMEOUT_SECS=60`.
const ENV_PREFIX: &str = "DURIAN";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Backend base URL
    #[arg(long, env = "DURIAN_BASE_URL")]
    pub base_url: Option<String>,

    /// User id sent with chat requests
    #[arg(long)]
    pub user_id: Option<String>,

    /// Bearer token for authenticated backends
    #[arg(long, env = "DURIAN_TOKEN")]
    pub token: Option<String>,

    /// Seconds without data before a reply is abandoned
    #[arg(long)]
    pub timeout_secs: Option<u32>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Interactive chat (default)
    Chat,
    /// Log in and print the access token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and print the access token
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        password: String,
    },
    /// Show the user the token belongs to
    Me,
    /// Transcribe an audio file
    Transcribe {
        /// Recording to upload
        path: PathBuf,
    },
    /// Start the pump until soil moisture reaches LIMIT percent (0-100)
    IrrigationOn { limit: u32 },
    /// Stop the pump
    IrrigationOff,
    /// Print past watering runs and their totals
    IrrigationHistory,
    /// List community posts
    Posts {
        /// Only posts with this tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// Publish a post
    Post {
        #[arg(default_value = "")]
        content: String,
        #[arg(long, default_value = DEFAULT_POST_TAG)]
        tag: String,
        /// Picture to attach
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Like or unlike a post
    Like { id: String },
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub chat: ChatConfig,
    pub stream: StreamConfig,
    pub reveal: RevealConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub user_id: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub greeting: String,
    pub placeholder_text: String,
    pub fallback_caption: String,
    pub error_prefix: String,
    pub timeout_secs: u64,
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    pub update_every: usize,
    pub chunk_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RevealConfig {
    pub batch_words: usize,
    pub delay_ms: u64,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    /// Priority: CLI flag > env var > config file > defaults.
    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("backend.base_url", "http://127.0.0.1:8000")?
            .set_default("backend.user_id", DEFAULT_USER_ID)?
            .set_default("chat.greeting", DEFAULT_GREETING)?
            .set_default("chat.placeholder_text", DEFAULT_PLACEHOLDER_TEXT)?
            .set_default("chat.fallback_caption", DEFAULT_FALLBACK_CAPTION)?
            .set_default("chat.error_prefix", DEFAULT_ERROR_PREFIX)?
            .set_default("chat.timeout_secs", DEFAULT_TIMEOUT.as_secs() as i64)?
            .set_default("chat.debounce_ms", 0)?
            .set_default("stream.update_every", 1)?
            .set_default("stream.chunk_delay_ms", 0)?
            .set_default("reveal.batch_words", DEFAULT_BATCH_WORDS as i64)?
            .set_default("reveal.delay_ms", DEFAULT_BATCH_DELAY.as_millis() as i64)?;

        // 2. Config file: explicit path must exist, the cwd fallback may not.
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false)),
        };

        // 3. Environment variables, e.g. DURIAN_BACKEND__BASE_URL
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI overrides (clap has already folded in its own env fallbacks)
        if let Some(url) = &cli.base_url {
            builder = builder.set_override("backend.base_url", url.as_str())?;
        }
        if let Some(user_id) = &cli.user_id {
            builder = builder.set_override("backend.user_id", user_id.as_str())?;
        }
        if let Some(token) = &cli.token {
            builder = builder.set_override("backend.token", token.as_str())?;
        }
        if let Some(secs) = cli.timeout_secs {
            builder = builder.set_override("chat.timeout_secs", i64::from(secs))?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        if cfg.chat.timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "chat.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(cfg)
    }

    /// Runtime settings for a chat session.
    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            user_id: self.backend.user_id.clone(),
            greeting: self.chat.greeting.clone(),
            placeholder_text: self.chat.placeholder_text.clone(),
            fallback_caption: self.chat.fallback_caption.clone(),
            error_prefix: self.chat.error_prefix.clone(),
            timeout: Duration::from_secs(self.chat.timeout_secs),
            debounce: Duration::from_millis(self.chat.debounce_ms),
            update_every: self.stream.update_every.max(1),
            chunk_delay: Duration::from_millis(self.stream.chunk_delay_ms),
            reveal: RevealSettings {
                batch_words: self.reveal.batch_words.max(1),
                delay: Duration::from_millis(self.reveal.delay_ms),
            },
        }
    }
}
