use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use tracing::info;

use concert_core::catalog::{NewConcert, NewPerformer};
use concert_shared::dto::{ConcertDto, PerformerDto, PerformerImageDto};
use concert_shared::Notification;

use crate::{error::AppError, middleware::admin_auth_middleware, state::AppState};

pub fn routes(state: &AppState) -> Router<AppState> {
    let admin = middleware::from_fn_with_state(state.clone(), admin_auth_middleware);

    Router::new()
        .route(
            "/v1/concerts",
            get(list_concerts).merge(post(create_concert).route_layer(admin.clone())),
        )
        .route("/v1/concerts/{id}", get(get_concert))
        .route(
            "/v1/performers",
            get(list_performers).merge(post(create_performer).route_layer(admin.clone())),
        )
        .route("/v1/performers/{id}", get(get_performer))
        .route("/v1/performers/{id}/image", put(set_performer_image).route_layer(admin))
}

async fn list_concerts(State(state): State<AppState>) -> Result<Json<Vec<ConcertDto>>, AppError> {
    let concerts = state.catalog.list_concerts().await?;
    Ok(Json(concerts.iter().map(ConcertDto::from).collect()))
}

async fn get_concert(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<ConcertDto>, AppError> {
    let concert = state
        .catalog
        .get_concert(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Concert {} not found", id)))?;
    Ok(Json(ConcertDto::from(&concert)))
}

async fn list_performers(State(state): State<AppState>) -> Result<Json<Vec<PerformerDto>>, AppError> {
    let performers = state.catalog.list_performers().await?;
    Ok(Json(performers.iter().map(PerformerDto::from).collect()))
}

async fn get_performer(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<PerformerDto>, AppError> {
    let performer = state
        .catalog
        .get_performer(id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Performer {} not found", id)))?;
    Ok(Json(PerformerDto::from(&performer)))
}

// ============================================================================
// Admin
// ============================================================================

async fn create_concert(
    State(state): State<AppState>,
    Json(dto): Json<ConcertDto>,
) -> Result<(StatusCode, Json<ConcertDto>), AppError> {
    let concert = state.catalog.create_concert(NewConcert::try_from(dto)?).await?;
    let dto = ConcertDto::from(&concert);

    info!("Created concert {} '{}' with {} dates", concert.id, concert.title, concert.dates.len());
    state.publish(Notification::ConcertCreated { concert: dto.clone() });

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn create_performer(
    State(state): State<AppState>,
    Json(dto): Json<PerformerDto>,
) -> Result<(StatusCode, Json<PerformerDto>), AppError> {
    let performer = state.catalog.create_performer(NewPerformer::try_from(dto)?).await?;
    let dto = PerformerDto::from(&performer);

    info!("Created performer {} '{}'", performer.id, performer.name);
    state.publish(Notification::PerformerCreated { performer: dto.clone() });

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn set_performer_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(dto): Json<PerformerImageDto>,
) -> Result<Json<PerformerDto>, AppError> {
    let image_name = dto.image_name.trim();
    if image_name.is_empty() {
        return Err(AppError::ValidationError("image_name is required".to_string()));
    }

    let performer = state.catalog.set_performer_image(id, image_name).await?;

    info!("Performer {} image set to {}", id, image_name);
    state.publish(Notification::PerformerImageUpdated {
        performer_id: id,
        image_name: image_name.to_string(),
    });

    Ok(Json(PerformerDto::from(&performer)))
}
