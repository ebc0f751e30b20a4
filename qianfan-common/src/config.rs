//! Configuration for the qianfan-bot service.
//!
//! Configuration lives in a single JSON file at `~/.qianfan-bot/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Explicit config file values
//! 2. Environment variables (`QIANFAN_API_KEY`, `QIANFAN_SECRET_KEY`)
//! 3. Default values

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default temperature; when left at this value the parameter is not sent.
pub const DEFAULT_TEMPERATURE: f64 = 0.95;

/// Default top_p; when left at this value the parameter is not sent.
pub const DEFAULT_TOP_P: f64 = 0.8;

/// Default repetition penalty.
pub const DEFAULT_PENALTY_SCORE: f64 = 1.0;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".qianfan-bot"),
        |dirs| dirs.home_dir().join(".qianfan-bot"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Chat Models
// ============================================================================

/// Chat models served by the Qianfan platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatModel {
    #[serde(rename = "ERNIE-Bot-4")]
    ErnieBot4,
    #[serde(rename = "ERNIE-Bot-8K")]
    ErnieBot8k,
    #[serde(rename = "ERNIE-Bot")]
    ErnieBot,
    #[serde(rename = "ERNIE-Bot-turbo")]
    ErnieBotTurbo,
    #[serde(rename = "EB-turbo-AppBuilder")]
    EbTurboAppBuilder,
    #[serde(rename = "Yi-34B-Chat")]
    Yi34bChat,
    #[serde(rename = "BLOOMZ-7B")]
    Bloomz7b,
    #[serde(rename = "Qianfan-BLOOMZ-7B-compressed")]
    QianfanBloomz7bCompressed,
    #[serde(rename = "Llama-2-7b-chat")]
    Llama27bChat,
    #[serde(rename = "Llama-2-13b-chat")]
    Llama213bChat,
    #[serde(rename = "Llama-2-70b-chat")]
    Llama270bChat,
    #[serde(rename = "Qianfan-Chinese-Llama-2-7B")]
    QianfanChineseLlama27b,
    #[serde(rename = "Qianfan-Chinese-Llama-2-13B")]
    QianfanChineseLlama213b,
    #[serde(rename = "ChatGLM2-6B-32K")]
    Chatglm26b32k,
    #[serde(rename = "XuanYuan-70B-Chat-4bit")]
    Xuanyuan70bChat4bit,
    #[serde(rename = "ChatLaw")]
    ChatLaw,
    #[serde(rename = "AquilaChat-7B")]
    AquilaChat7b,
}

impl ChatModel {
    /// Platform name of the model.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ErnieBot4 => "ERNIE-Bot-4",
            Self::ErnieBot8k => "ERNIE-Bot-8K",
            Self::ErnieBot => "ERNIE-Bot",
            Self::ErnieBotTurbo => "ERNIE-Bot-turbo",
            Self::EbTurboAppBuilder => "EB-turbo-AppBuilder",
            Self::Yi34bChat => "Yi-34B-Chat",
            Self::Bloomz7b => "BLOOMZ-7B",
            Self::QianfanBloomz7bCompressed => "Qianfan-BLOOMZ-7B-compressed",
            Self::Llama27bChat => "Llama-2-7b-chat",
            Self::Llama213bChat => "Llama-2-13b-chat",
            Self::Llama270bChat => "Llama-2-70b-chat",
            Self::QianfanChineseLlama27b => "Qianfan-Chinese-Llama-2-7B",
            Self::QianfanChineseLlama213b => "Qianfan-Chinese-Llama-2-13B",
            Self::Chatglm26b32k => "ChatGLM2-6B-32K",
            Self::Xuanyuan70bChat4bit => "XuanYuan-70B-Chat-4bit",
            Self::ChatLaw => "ChatLaw",
            Self::AquilaChat7b => "AquilaChat-7B",
        }
    }

    /// Whether the model belongs to the ERNIE-Bot family.
    ///
    /// ERNIE-Bot models accept a dedicated `system` request field; other
    /// models get the persona prepended to the first user message instead.
    pub const fn is_ernie(self) -> bool {
        matches!(
            self,
            Self::ErnieBot4 | Self::ErnieBot8k | Self::ErnieBot | Self::ErnieBotTurbo
        )
    }
}

impl Default for ChatModel {
    fn default() -> Self {
        Self::ErnieBot
    }
}

// ============================================================================
// Image Styles
// ============================================================================

/// Rendering styles accepted by the Qianfan text2image endpoint.
///
/// Names are passed through verbatim, including the upstream API's
/// "lsometric" spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageStyle {
    Base,
    #[serde(rename = "3D Model")]
    ThreeDModel,
    #[serde(rename = "Analog Film")]
    AnalogFilm,
    Anime,
    Cinematic,
    #[serde(rename = "Comic Book")]
    ComicBook,
    #[serde(rename = "Craft Clay")]
    CraftClay,
    #[serde(rename = "Digital Art")]
    DigitalArt,
    Enhance,
    #[serde(rename = "Fantasy Art")]
    FantasyArt,
    #[serde(rename = "lsometric")]
    Lsometric,
    #[serde(rename = "Line Art")]
    LineArt,
    Lowpoly,
    Neonpunk,
    Origami,
    Photographic,
    #[serde(rename = "Pixel Art")]
    PixelArt,
    Texture,
}

impl ImageStyle {
    /// Platform name of the style.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base => "Base",
            Self::ThreeDModel => "3D Model",
            Self::AnalogFilm => "Analog Film",
            Self::Anime => "Anime",
            Self::Cinematic => "Cinematic",
            Self::ComicBook => "Comic Book",
            Self::CraftClay => "Craft Clay",
            Self::DigitalArt => "Digital Art",
            Self::Enhance => "Enhance",
            Self::FantasyArt => "Fantasy Art",
            Self::Lsometric => "lsometric",
            Self::LineArt => "Line Art",
            Self::Lowpoly => "Lowpoly",
            Self::Neonpunk => "Neonpunk",
            Self::Origami => "Origami",
            Self::Photographic => "Photographic",
            Self::PixelArt => "Pixel Art",
            Self::Texture => "Texture",
        }
    }
}

impl Default for ImageStyle {
    fn default() -> Self {
        Self::Base
    }
}

// ============================================================================
// Config Sections
// ============================================================================

/// Multi-turn history configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Whether multi-turn history is enabled (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Hard cap on messages per request, history plus the new prompt
    /// (default: 10)
    #[serde(default = "default_max_round")]
    pub max_round: u32,

    /// Seconds of inactivity after which a session expires (default: 60)
    #[serde(default = "default_round_duration")]
    pub round_duration: i64,
}

fn default_max_round() -> u32 {
    10
}

fn default_round_duration() -> i64 {
    60
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_round: default_max_round(),
            round_duration: default_round_duration(),
        }
    }
}

/// Image generation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Generate an illustration for each chat reply (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Rendering style for generated images
    #[serde(default)]
    pub style: ImageStyle,

    /// Expose the standalone imagine command (default: false)
    #[serde(default)]
    pub imagine_command: bool,
}

/// Qianfan platform credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============================================================================
// Top-level Config
// ============================================================================

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name of the chat command (default: "chat")
    #[serde(default = "default_command")]
    pub command: String,

    /// Chat model (default: ERNIE-Bot)
    #[serde(default)]
    pub model: ChatModel,

    /// Custom API route published for the account; takes priority over
    /// the model's standard route when set
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Persona text for the assistant (max 1024 chars)
    #[serde(default)]
    pub system: String,

    /// Sampling temperature (0.01–1)
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Nucleus sampling cutoff (0–1)
    #[serde(default = "default_top_p")]
    pub top_p: f64,

    /// Repetition penalty (1–2)
    #[serde(default = "default_penalty_score")]
    pub penalty_score: f64,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub image: ImageConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Directory for the turn log database and generated images
    /// (default: the config directory)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_command() -> String {
    "chat".into()
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_top_p() -> f64 {
    DEFAULT_TOP_P
}

fn default_penalty_score() -> f64 {
    DEFAULT_PENALTY_SCORE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command: default_command(),
            model: ChatModel::default(),
            endpoint: None,
            system: String::new(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            penalty_score: default_penalty_score(),
            history: HistoryConfig::default(),
            image: ImageConfig::default(),
            credentials: CredentialsConfig::default(),
            observability: ObservabilityConfig::default(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from the default path with env overrides applied.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load configuration from an explicit path with env overrides applied.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)?;
            serde_json::from_str(&raw)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment-variable overrides for credentials.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("QIANFAN_API_KEY") {
            if !key.is_empty() {
                self.credentials.api_key = Some(key);
            }
        }
        if let Ok(secret) = std::env::var("QIANFAN_SECRET_KEY") {
            if !secret.is_empty() {
                self.credentials.secret_key = Some(secret);
            }
        }
    }

    /// Validate configuration value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(Error::Config("command name must not be empty".into()));
        }
        if self.system.chars().count() > 1024 {
            return Err(Error::Config("system persona exceeds 1024 chars".into()));
        }
        if !(0.01..=1.0).contains(&self.temperature) {
            return Err(Error::Config(format!(
                "temperature {} out of range 0.01..=1",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(Error::Config(format!(
                "top_p {} out of range 0..=1",
                self.top_p
            )));
        }
        if !(1.0..=2.0).contains(&self.penalty_score) {
            return Err(Error::Config(format!(
                "penalty_score {} out of range 1..=2",
                self.penalty_score
            )));
        }
        if self.history.max_round == 0 {
            return Err(Error::Config("history.max_round must be at least 1".into()));
        }
        if self.history.round_duration <= 0 {
            return Err(Error::Config(
                "history.round_duration must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Custom endpoint, normalized: empty strings count as unset.
    pub fn custom_endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref().filter(|e| !e.is_empty())
    }

    /// Directory for runtime data (turn log, generated images).
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(config_dir)
    }

    /// Path of the turn log database.
    pub fn turns_db_path(&self) -> PathBuf {
        self.data_dir().join("turns.db")
    }
}
