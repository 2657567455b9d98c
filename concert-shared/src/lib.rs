pub mod dto;
pub mod models;
pub mod pii;

pub use models::events::{Notification, Topic};
pub use pii::Masked;
