//! Client SDK for the concert booking service.

pub mod client;
pub mod error;
mod sse;

pub use client::{ClientConfig, ConcertClient};
pub use concert_shared::dto;
pub use concert_shared::{Notification, Topic};
pub use error::{ServiceError, ServiceResult};
