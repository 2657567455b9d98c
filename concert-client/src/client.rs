use std::sync::Mutex;
use std::time::Duration;

use futures_util::stream::BoxStream;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use concert_shared::dto::{
    BookingDto, ConcertDto, CreditCardDto, PerformerDto, PerformerImageDto, ReservationDto, ReservationRequestDto,
    UserDto,
};
use concert_shared::{Notification, Topic};

use crate::error::{ServiceError, ServiceResult};
use crate::sse;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Where performer images are served from. Images are unavailable when unset.
    pub images_base_url: Option<String>,
    /// Per-request timeout. Notification streams are exempt.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            images_base_url: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_images_base_url(mut self, url: impl Into<String>) -> Self {
        self.images_base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }
}

/// Thin wrapper around reqwest for the concert service.
///
/// The token handed back by `create_user` or `authenticate_user` is kept and
/// sent with every later request.
pub struct ConcertClient {
    http: Client,
    config: ClientConfig,
    authorization: Mutex<Option<String>>,
}

impl ConcertClient {
    pub fn new(config: ClientConfig) -> ServiceResult<Self> {
        let http = Client::builder().connect_timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            authorization: Mutex::new(None),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    fn token(&self) -> Option<String> {
        self.authorization.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn remember_token(&self, res: &Response) {
        if let Some(value) = res.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            *self.authorization.lock().unwrap_or_else(|e| e.into_inner()) = Some(value.to_string());
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match self.token() {
            Some(token) => req.header(header::AUTHORIZATION, token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> ServiceResult<Response> {
        Ok(self.authorized(req).timeout(self.config.timeout).send().await?)
    }

    async fn decode<T: DeserializeOwned>(res: Response) -> ServiceResult<T> {
        res.json::<T>().await.map_err(|e| ServiceError::Decode(e.to_string()))
    }

    /// Shared mapping for endpoints behind the bearer token.
    fn auth_error(status: StatusCode) -> Option<ServiceError> {
        match status {
            StatusCode::UNAUTHORIZED => Some(ServiceError::BadAuthenticationToken),
            StatusCode::FORBIDDEN => Some(ServiceError::UnauthenticatedRequest),
            _ => None,
        }
    }

    /// Passes successful responses through and turns anything else into a typed error.
    fn check(res: Response, map: impl FnOnce(StatusCode) -> Option<ServiceError>) -> ServiceResult<Response> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        debug!("Concert service answered {} for {}", status, res.url());
        Err(map(status).unwrap_or(ServiceError::UnexpectedStatus(status.as_u16())))
    }

    // ------------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------------

    pub async fn concerts(&self) -> ServiceResult<Vec<ConcertDto>> {
        let res = self.send(self.http.get(self.url("/v1/concerts"))).await?;
        Self::decode(Self::check(res, |_| None)?).await
    }

    pub async fn performers(&self) -> ServiceResult<Vec<PerformerDto>> {
        let res = self.send(self.http.get(self.url("/v1/performers"))).await?;
        Self::decode(Self::check(res, |_| None)?).await
    }

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    pub async fn create_user(&self, user: &UserDto) -> ServiceResult<UserDto> {
        let res = self.send(self.http.post(self.url("/v1/users")).json(user)).await?;
        let res = Self::check(res, |status| match status {
            StatusCode::CONFLICT => Some(ServiceError::CreateUserWithNonUniqueName),
            StatusCode::UNPROCESSABLE_ENTITY => Some(ServiceError::CreateUserWithMissingFields),
            _ => None,
        })?;
        self.remember_token(&res);
        Self::decode(res).await
    }

    pub async fn authenticate_user(&self, user: &UserDto) -> ServiceResult<UserDto> {
        let res = self.send(self.http.post(self.url("/v1/users/login")).json(user)).await?;
        let res = Self::check(res, |status| match status {
            StatusCode::UNAUTHORIZED => Some(ServiceError::AuthenticateUserWithIllegalPassword),
            StatusCode::NOT_FOUND => Some(ServiceError::AuthenticateNonExistentUser),
            StatusCode::UNPROCESSABLE_ENTITY => Some(ServiceError::AuthenticateUserWithMissingFields),
            _ => None,
        })?;
        self.remember_token(&res);
        Self::decode(res).await
    }

    pub async fn register_credit_card(&self, card: &CreditCardDto) -> ServiceResult<()> {
        let res = self.send(self.http.post(self.url("/v1/users/payment")).json(card)).await?;
        Self::check(res, |status| match status {
            StatusCode::UNPROCESSABLE_ENTITY => Some(ServiceError::InvalidCreditCard),
            other => Self::auth_error(other),
        })?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Reservations & bookings
    // ------------------------------------------------------------------------

    pub async fn reserve_seats(&self, request: &ReservationRequestDto) -> ServiceResult<ReservationDto> {
        let res = self.send(self.http.post(self.url("/v1/reservations")).json(request)).await?;
        let res = Self::check(res, |status| match status {
            StatusCode::NOT_FOUND => Some(ServiceError::ConcertNotScheduledOnReservationDate),
            StatusCode::CONFLICT => Some(ServiceError::InsufficientSeatsAvailableForReservation),
            StatusCode::UNPROCESSABLE_ENTITY => Some(ServiceError::ReservationRequestWithMissingFields),
            other => Self::auth_error(other),
        })?;
        Self::decode(res).await
    }

    pub async fn confirm_reservation(&self, reservation: &ReservationDto) -> ServiceResult<()> {
        let path = format!("/v1/reservations/{}/confirm", reservation.id);
        let res = self.send(self.http.post(self.url(&path))).await?;
        Self::check(res, |status| match status {
            StatusCode::NOT_FOUND => Some(ServiceError::ReservationNotFound),
            StatusCode::PAYMENT_REQUIRED => Some(ServiceError::CreditCardNotRegistered),
            StatusCode::GONE => Some(ServiceError::ExpiredReservation),
            StatusCode::CONFLICT => Some(ServiceError::ReservationAlreadyConfirmed),
            other => Self::auth_error(other),
        })?;
        Ok(())
    }

    pub async fn bookings(&self) -> ServiceResult<Vec<BookingDto>> {
        let res = self.send(self.http.get(self.url("/v1/bookings"))).await?;
        Self::decode(Self::check(res, Self::auth_error)?).await
    }

    // ------------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------------

    /// Mapping for admin endpoints. A 403 means "not an admin" only when a token was sent.
    fn admin_error(&self) -> impl FnOnce(StatusCode) -> Option<ServiceError> {
        let authenticated = self.is_authenticated();
        move |status| match status {
            StatusCode::FORBIDDEN if authenticated => Some(ServiceError::NotPermitted),
            StatusCode::NOT_FOUND => Some(ServiceError::NotFound),
            StatusCode::UNPROCESSABLE_ENTITY => Some(ServiceError::InvalidRequest(status.to_string())),
            other => Self::auth_error(other),
        }
    }

    pub async fn create_performer(&self, performer: &PerformerDto) -> ServiceResult<PerformerDto> {
        let res = self.send(self.http.post(self.url("/v1/performers")).json(performer)).await?;
        Self::decode(Self::check(res, self.admin_error())?).await
    }

    pub async fn create_concert(&self, concert: &ConcertDto) -> ServiceResult<ConcertDto> {
        let res = self.send(self.http.post(self.url("/v1/concerts")).json(concert)).await?;
        Self::decode(Self::check(res, self.admin_error())?).await
    }

    pub async fn set_performer_image(&self, performer_id: i64, image_name: &str) -> ServiceResult<PerformerDto> {
        let path = format!("/v1/performers/{}/image", performer_id);
        let body = PerformerImageDto {
            image_name: image_name.to_string(),
        };
        let res = self.send(self.http.put(self.url(&path)).json(&body)).await?;
        Self::decode(Self::check(res, self.admin_error())?).await
    }

    // ------------------------------------------------------------------------
    // Notifications & images
    // ------------------------------------------------------------------------

    /// Opens a notification stream. `performer_id` narrows the images topic to one performer.
    pub async fn subscribe(
        &self,
        topic: Topic,
        performer_id: Option<i64>,
    ) -> ServiceResult<BoxStream<'static, ServiceResult<Notification>>> {
        let path = match performer_id {
            Some(id) => format!("/v1/notifications/{}?performer_id={}", topic, id),
            None => format!("/v1/notifications/{}", topic),
        };
        let req = self.http.get(self.url(&path)).header(header::ACCEPT, "text/event-stream");

        // No timeout: the stream stays open until dropped
        let res = self.authorized(req).send().await?;
        let res = Self::check(res, Self::auth_error)?;

        debug!("Subscribed to {} notifications", topic);
        Ok(sse::notifications(res.bytes_stream()))
    }

    /// Downloads the performer's image from the image host.
    pub async fn image_for_performer(&self, performer: &PerformerDto) -> ServiceResult<Vec<u8>> {
        let (Some(base), Some(image)) = (&self.config.images_base_url, &performer.image_name) else {
            return Err(ServiceError::NoImageForPerformer);
        };

        let res = self
            .http
            .get(format!("{}/{}", base, image))
            .timeout(self.config.timeout)
            .send()
            .await?;
        let res = Self::check(res, |status| match status {
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Some(ServiceError::NoImageForPerformer),
            _ => None,
        })?;

        Ok(res.bytes().await?.to_vec())
    }
}
