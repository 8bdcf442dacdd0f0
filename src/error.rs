use thiserror::Error;

/// The engine's error taxonomy.
///
/// Every store/provider trait method and every orchestrator/executor
/// operation returns `Result<T, EngineError>`. `ProviderError` is folded in
/// as a variant rather than kept as a separate top-level type, since the
/// executor needs to match on provider error codes (`cannot_resend_yet`,
/// `disconnected_account`, `not_configured`) the same way it matches on the
/// other kinds.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited, retry after {wait_until_ms}ms")]
    RateLimited { wait_until_ms: i64 },

    #[error("provider error [{code}]: {detail}")]
    ProviderError { code: ProviderErrorCode, detail: String },

    #[error("transient error: {0}")]
    Transient(String),
}

/// Provider error codes the engine reacts to specifically.
/// `Other` preserves the raw code string for logging without forcing every
/// unrecognized provider response into an opaque bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorCode {
    CannotResendYet,
    DisconnectedAccount,
    NotConfigured,
    Other(String),
}

impl std::fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CannotResendYet => write!(f, "cannot_resend_yet"),
            Self::DisconnectedAccount => write!(f, "disconnected_account"),
            Self::NotConfigured => write!(f, "not_configured"),
            Self::Other(code) => write!(f, "{code}"),
        }
    }
}

impl From<&str> for ProviderErrorCode {
    fn from(code: &str) -> Self {
        match code {
            "cannot_resend_yet" => Self::CannotResendYet,
            "disconnected_account" => Self::DisconnectedAccount,
            "not_configured" => Self::NotConfigured,
            other => Self::Other(other.to_string()),
        }
    }
}

impl EngineError {
    pub fn provider(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ProviderError {
            code: ProviderErrorCode::from(code.into().as_str()),
            detail: detail.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::ProviderError { .. } => "PROVIDER_ERROR",
            Self::Transient(_) => "TRANSIENT",
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("row not found".to_string()),
            other => Self::Transient(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transient(format!("provider HTTP error: {err}"))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("json error: {err}"))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
