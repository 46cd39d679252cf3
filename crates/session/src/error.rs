use devtrust_database::DatabaseError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Device identity could not be computed from the supplied signals.
    /// Nothing is stored.
    #[error("Invalid device signals: {0}")]
    InvalidSignals(String),

    /// Transient store failure. Callers retry with backoff; never silently
    /// converted into success, because a lost registration means a user
    /// believes they are tracked when they are not.
    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),

    /// No session row for the referenced (user, device). Distinct from
    /// `StoreUnavailable` so callers can tell "already gone" from
    /// "can't tell".
    #[error("Not found: {0}")]
    NotFound(String),

    /// Actor lacks rights over the target session. Checked before any
    /// mutation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<devtrust_device::DeviceError> for SessionError {
    fn from(err: devtrust_device::DeviceError) -> Self {
        match err {
            devtrust_device::DeviceError::InvalidSignals(msg) => SessionError::InvalidSignals(msg),
        }
    }
}

impl From<DatabaseError> for SessionError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => SessionError::NotFound(msg),
            DatabaseError::Unavailable(msg) => SessionError::StoreUnavailable(msg),
            other => SessionError::Internal(other.to_string()),
        }
    }
}
