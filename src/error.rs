use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ConfirmError {
    #[error("payment session {0} not found")]
    SessionNotFound(Uuid),
    /// Another confirmation holds the session, or it is no longer confirmable.
    #[error("payment session {0} is already being processed")]
    AlreadyProcessing(Uuid),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ConfirmError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfirmError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            ConfirmError::AlreadyProcessing(_) => "PAYMENT_ALREADY_PROCESSING",
            ConfirmError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Error, Debug)]
pub enum PostAuthError {
    #[error("payment session {0} not found")]
    SessionNotFound(Uuid),
    #[error("no eligible attempt found for session {0}")]
    NoAuthorizedAttempt(Uuid),
    #[error("operation not allowed in state {0}")]
    InvalidState(String),
    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),
    #[error("amount {requested} exceeds remaining {remaining}")]
    AmountExceedsRemaining { requested: i64, remaining: i64 },
    #[error("credentials unavailable for {0}")]
    CredentialsUnavailable(String),
    #[error("no adapter registered for {0}")]
    AdapterUnavailable(String),
    /// Another capture, refund or void settled the attempt first.
    #[error("payment session {0} was updated concurrently")]
    ConcurrentUpdate(Uuid),
    #[error("provider declined: {code}")]
    Declined { code: String, message: Option<String> },
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PostAuthError {
    pub fn code(&self) -> &'static str {
        match self {
            PostAuthError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            PostAuthError::NoAuthorizedAttempt(_) => "NO_AUTHORIZED_ATTEMPT",
            PostAuthError::InvalidState(_) => "INVALID_STATE",
            PostAuthError::InvalidAmount(_) => "INVALID_AMOUNT",
            PostAuthError::AmountExceedsRemaining { .. } => "AMOUNT_EXCEEDS_REMAINING",
            PostAuthError::CredentialsUnavailable(_) => "CREDENTIALS_UNAVAILABLE",
            PostAuthError::AdapterUnavailable(_) => "ADAPTER_UNAVAILABLE",
            PostAuthError::ConcurrentUpdate(_) => "CONCURRENT_UPDATE",
            PostAuthError::Declined { .. } => "PROVIDER_DECLINED",
            PostAuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
