pub mod catalog;
pub mod identity;
pub mod payment;
pub mod repository;
pub mod reservation;
pub mod theatre;

use concert_shared::dto::PriceBand;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Expired: {0}")]
    Expired(String),
    #[error("Insufficient seats: {requested} requested in {band}")]
    InsufficientSeats { requested: u32, band: PriceBand },
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
