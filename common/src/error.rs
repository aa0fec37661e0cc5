//! エラー型定義
//!
//! 統一エラー型（thiserror使用）

use thiserror::Error;

/// Common layer error type
#[derive(Debug, Error)]
pub enum CommonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Agent error type
#[derive(Debug, Error)]
pub enum AgentError {
    /// Common layer error
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Configuration source missing or unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// Measurement tool could not be started
    #[error("Failed to launch measurement tool: {0}")]
    Launch(String),

    /// I/O failure while the measurement tool was running
    #[error("Measurement process error: {0}")]
    Process(String),

    /// A single submission attempt failed
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Submission failed on both the primary endpoint and the HTTPS fallback
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Logging initialization error
    #[error("Logging error: {0}")]
    Logging(String),
}

impl AgentError {
    /// 起動を中断すべき設定エラーか
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            AgentError::Config(_) | AgentError::Common(CommonError::Config(_))
        )
    }
}

/// Result type alias (Common)
pub type CommonResult<T> = Result<T, CommonError>;

/// Result type alias (Agent)
pub type AgentResult<T> = Result<T, AgentError>;
