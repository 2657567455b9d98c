pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod memory;
pub mod reservation_repo;
pub mod user_repo;

pub use catalog_repo::StoreCatalogRepository;
pub use database::DbClient;
pub use memory::MemoryStore;
pub use reservation_repo::StoreReservationRepository;
pub use user_repo::StoreUserRepository;

use concert_core::CoreError;

/// Maps a sqlx failure onto the domain error, keeping unique violations as conflicts.
pub(crate) fn storage_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return CoreError::Conflict(db_err.message().to_string());
        }
    }
    CoreError::StorageError(err.to_string())
}
