use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::catalog::{Concert, NewConcert, NewPerformer, Performer};
use crate::identity::{AuthToken, User};
use crate::payment::CreditCard;
use crate::reservation::{Booking, Reservation, ReservationRequest};
use crate::CoreResult;

/// Repository trait for concert and performer data access
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn list_concerts(&self) -> CoreResult<Vec<Concert>>;

    async fn get_concert(&self, id: i64) -> CoreResult<Option<Concert>>;

    async fn list_performers(&self) -> CoreResult<Vec<Performer>>;

    async fn get_performer(&self, id: i64) -> CoreResult<Option<Performer>>;

    async fn create_performer(&self, performer: NewPerformer) -> CoreResult<Performer>;

    /// Fails with `NotFound` when a referenced performer does not exist.
    async fn create_concert(&self, concert: NewConcert) -> CoreResult<Concert>;

    async fn set_performer_image(&self, id: i64, image_name: &str) -> CoreResult<Performer>;
}

/// Repository trait for users, their auth token and payment card
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the username is taken.
    async fn create_user(&self, user: &User) -> CoreResult<()>;

    async fn find_user(&self, username: &str) -> CoreResult<Option<User>>;

    /// Stores `token` as the user's only token, replacing any previous one.
    async fn save_token(&self, token: &AuthToken) -> CoreResult<()>;

    async fn find_token(&self, token: &str) -> CoreResult<Option<AuthToken>>;

    async fn find_token_for_user(&self, username: &str) -> CoreResult<Option<AuthToken>>;

    async fn save_credit_card(&self, username: &str, card: &CreditCard) -> CoreResult<()>;

    async fn find_credit_card(&self, username: &str) -> CoreResult<Option<CreditCard>>;
}

/// Repository trait for seat reservations and bookings
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Atomically allocates seats for `request` and stores the hold.
    ///
    /// Seats already booked or held by an unexpired reservation for the same
    /// concert and date are never handed out. Fails with `NotFound` when the
    /// concert is not scheduled on the requested date and `InsufficientSeats`
    /// when no block fits.
    async fn reserve(
        &self,
        username: &str,
        request: &ReservationRequest,
        now: DateTime<Utc>,
        hold: Duration,
    ) -> CoreResult<Reservation>;

    async fn find_reservation(&self, id: Uuid) -> CoreResult<Option<Reservation>>;

    /// Atomically turns a live reservation owned by `username` into a booking.
    ///
    /// Expiry is judged against the clock read after the performance is locked,
    /// so a hold that a competing `reserve` already treated as lapsed can not be
    /// confirmed.
    async fn confirm(&self, id: Uuid, username: &str) -> CoreResult<Booking>;

    async fn list_bookings(&self, username: &str) -> CoreResult<Vec<Booking>>;

    /// Deletes unconfirmed reservations that expired before `now`. Returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> CoreResult<u64>;
}
