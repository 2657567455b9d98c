use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use concert_core::reservation::ReservationRequest;
use concert_shared::dto::{BookingDto, ReservationDto, ReservationRequestDto};

use crate::{
    error::AppError,
    middleware::{user_auth_middleware, AuthenticatedUser},
    state::AppState,
};

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/reservations", post(reserve_seats))
        .route("/v1/reservations/{id}/confirm", post(confirm_reservation))
        .route("/v1/bookings", get(list_bookings))
        .route_layer(middleware::from_fn_with_state(state.clone(), user_auth_middleware))
}

async fn reserve_seats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(dto): Json<ReservationRequestDto>,
) -> Result<Json<ReservationDto>, AppError> {
    let request = ReservationRequest::try_from(&dto)?;

    let reservation = state
        .reservations
        .reserve(&user.username, &request, Utc::now(), state.reservation_hold())
        .await?;

    info!(
        "Reservation {} holds {} {} seats for concert {} on {} (user {})",
        reservation.id,
        reservation.seats.len(),
        request.price_band,
        request.concert_id,
        request.date,
        user.username
    );

    Ok(Json(reservation.to_dto()))
}

async fn confirm_reservation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    // Someone else's reservation is reported the same as a missing one
    state
        .reservations
        .find_reservation(id)
        .await?
        .filter(|reservation| reservation.username == user.username)
        .ok_or_else(|| AppError::NotFoundError(format!("Reservation {} not found", id)))?;

    if state.users.find_credit_card(&user.username).await?.is_none() {
        return Err(AppError::PaymentRequired("Credit card not registered".to_string()));
    }

    let booking = state.reservations.confirm(id, &user.username).await?;

    info!(
        "Booking {} created from reservation {} ({} cents)",
        booking.id, id, booking.total_cents
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<BookingDto>>, AppError> {
    let bookings = state.reservations.list_bookings(&user.username).await?;
    Ok(Json(bookings.iter().map(|b| b.to_dto()).collect()))
}
