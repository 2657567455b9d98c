/// Failures surfaced to client applications.
///
/// Status codes are interpreted per operation, so the same 404 becomes
/// `AuthenticateNonExistentUser` on login and `ReservationNotFound` on confirm.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Unable to communicate with the concert service: {0}")]
    Communication(#[from] reqwest::Error),

    #[error("Unable to read the concert service response: {0}")]
    Decode(String),

    #[error("Username is already taken")]
    CreateUserWithNonUniqueName,
    #[error("Username, password, first name and last name are all required")]
    CreateUserWithMissingFields,

    #[error("Incorrect password")]
    AuthenticateUserWithIllegalPassword,
    #[error("No user exists with that username")]
    AuthenticateNonExistentUser,
    #[error("Username and password are required to log in")]
    AuthenticateUserWithMissingFields,

    #[error("No image is available for this performer")]
    NoImageForPerformer,

    #[error("Authentication token is invalid or has expired")]
    BadAuthenticationToken,
    #[error("This request requires an authenticated user")]
    UnauthenticatedRequest,
    #[error("You are not permitted to perform this operation")]
    NotPermitted,

    #[error("The concert is not scheduled on the requested date")]
    ConcertNotScheduledOnReservationDate,
    #[error("Not enough seats are available to satisfy the reservation")]
    InsufficientSeatsAvailableForReservation,
    #[error("Number of seats, seat type, concert and date are all required")]
    ReservationRequestWithMissingFields,

    #[error("Reservation not found")]
    ReservationNotFound,
    #[error("The reservation has expired")]
    ExpiredReservation,
    #[error("No credit card is registered for this user")]
    CreditCardNotRegistered,
    #[error("The reservation has already been confirmed")]
    ReservationAlreadyConfirmed,

    #[error("Credit card details are invalid")]
    InvalidCreditCard,

    #[error("Requested resource does not exist")]
    NotFound,
    #[error("Request was rejected: {0}")]
    InvalidRequest(String),

    #[error("Unexpected response status {0}")]
    UnexpectedStatus(u16),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
