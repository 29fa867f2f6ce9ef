/// Shared error type used across all pairflow crates.
///
/// Variants correspond 1:1 to the wire-level error codes returned in the
/// HTTP envelope; [`Error::code`] yields the canonical code string.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("session {session_id} is {status}, not active")]
    SessionNotActive { session_id: String, status: String },

    #[error("intervention cooldown active, {remaining_seconds}s remaining")]
    CooldownActive { remaining_seconds: u64 },

    #[error("exercise not found: {0}")]
    ExerciseNotFound(String),

    #[error("spec invalid: {0}")]
    SpecInvalid(String),

    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("provider timed out: {0}")]
    ProviderTimeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Canonical wire code for the HTTP error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not-found",
            Error::BadRequest(_) => "bad-request",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::Conflict(_) => "conflict",
            Error::SessionNotActive { .. } => "session-not-active",
            Error::CooldownActive { .. } => "cooldown-active",
            Error::ExerciseNotFound(_) => "exercise-not-found",
            Error::SpecInvalid(_) => "spec-invalid",
            Error::ProviderNotFound(_) => "provider-not-found",
            Error::ProviderTimeout(_) => "provider-timeout",
            Error::Provider { .. } => "provider-error",
            Error::Cancelled => "cancelled",
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => "internal",
        }
    }

    /// Whether this error is worth retrying against the same provider.
    ///
    /// Used by the resilience wrapper: timeouts and provider-side failures
    /// are transient; everything else is a caller problem.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ProviderTimeout(_) | Error::Provider { .. } | Error::Io(_)
        )
    }
}
