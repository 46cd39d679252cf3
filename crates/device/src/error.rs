use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeviceError>;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Invalid device signals: {0}")]
    InvalidSignals(String),
}
