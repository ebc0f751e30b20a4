//! Error types for the qianfan-bot workspace.

use thiserror::Error;

/// Result type alias using the workspace error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for qianfan-bot services.
///
/// Every failure is terminal for the current command invocation; nothing is
/// retried internally.
#[derive(Error, Debug)]
pub enum Error {
    /// No prompt was given while multi-turn history is disabled
    #[error("empty prompt")]
    EmptyPrompt,

    /// The session expired or was never started
    #[error("no active session for command `{command}`")]
    NoActiveSession { command: String },

    /// Upstream flagged the conversation; the turn was discarded
    #[error("conversation flagged as sensitive")]
    SensitiveContent,

    /// Network or model failure from the remote API
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Turn store failure
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The reply text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyPrompt => "你想聊什么呢？".into(),
            Self::NoActiveSession { command } => {
                format!("请先使用`{command}`指令开始对话")
            }
            Self::SensitiveContent => "对话包含敏感内容".into(),
            _ => "请求错误".into(),
        }
    }

    /// Whether the user can recover by re-issuing the command themselves.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(self, Self::EmptyPrompt | Self::NoActiveSession { .. })
    }
}
