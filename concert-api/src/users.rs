use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    routing::post,
    Extension, Json, Router,
};
use chrono::Utc;
use tracing::info;

use concert_core::identity::{AuthToken, Credentials, User};
use concert_core::payment::CreditCard;
use concert_shared::dto::{CreditCardDto, UserDto};

use crate::{
    error::AppError,
    middleware::{user_auth_middleware, AuthenticatedUser},
    state::AppState,
};

type WithToken = ([(header::HeaderName, String); 1], Json<UserDto>);

pub fn routes(state: &AppState) -> Router<AppState> {
    let authenticated = middleware::from_fn_with_state(state.clone(), user_auth_middleware);

    Router::new()
        .route("/v1/users", post(register))
        .route("/v1/users/login", post(login))
        .route("/v1/users/payment", post(register_credit_card).route_layer(authenticated))
}

fn with_token(token: &AuthToken, user: &User) -> WithToken {
    ([(header::AUTHORIZATION, token.header_value())], Json(user.to_dto()))
}

async fn register(
    State(state): State<AppState>,
    Json(dto): Json<UserDto>,
) -> Result<(StatusCode, WithToken), AppError> {
    let user = User::register(&dto, &state.auth.password_pepper)?;
    state.users.create_user(&user).await?;

    let token = AuthToken::issue(&user.username, Utc::now());
    state.users.save_token(&token).await?;

    info!("Registered user {}", user.username);
    Ok((StatusCode::CREATED, with_token(&token, &user)))
}

async fn login(State(state): State<AppState>, Json(dto): Json<UserDto>) -> Result<WithToken, AppError> {
    let credentials = Credentials::try_from(&dto)?;

    let user = state
        .users
        .find_user(&credentials.username)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("User {} does not exist", credentials.username)))?;

    if !user.verify_password(&state.auth.password_pepper, &credentials.password) {
        return Err(AppError::AuthenticationError("Illegal password".to_string()));
    }

    // Hand back the live token if there is one, otherwise rotate
    let now = Utc::now();
    let token = match state.users.find_token_for_user(&user.username).await? {
        Some(token) if !token.is_expired(now, state.token_ttl()) => token,
        _ => {
            let token = AuthToken::issue(&user.username, now);
            state.users.save_token(&token).await?;
            token
        }
    };

    info!("User {} authenticated", user.username);
    Ok(with_token(&token, &user))
}

async fn register_credit_card(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(dto): Json<CreditCardDto>,
) -> Result<StatusCode, AppError> {
    let card = CreditCard::validate(dto, Utc::now().date_naive())?;
    state.users.save_credit_card(&user.username, &card).await?;

    info!("Registered {} card ending {} for {}", card.card_type.as_str(), card.last_four(), user.username);
    Ok(StatusCode::NO_CONTENT)
}
