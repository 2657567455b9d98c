use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use concert_shared::dto::{BookingDto, PriceBand, ReservationDto, ReservationRequestDto, Seat};

use crate::theatre;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ReservationRequest {
    pub number_of_seats: u32,
    pub price_band: PriceBand,
    pub concert_id: i64,
    pub date: NaiveDateTime,
}

impl TryFrom<&ReservationRequestDto> for ReservationRequest {
    type Error = CoreError;

    fn try_from(dto: &ReservationRequestDto) -> CoreResult<Self> {
        let missing = |field: &str| CoreError::ValidationError(format!("{} is required", field));

        if dto.number_of_seats == 0 {
            return Err(missing("number_of_seats"));
        }
        Ok(Self {
            number_of_seats: dto.number_of_seats,
            price_band: dto.seat_type.ok_or_else(|| missing("seat_type"))?,
            concert_id: dto.concert_id.ok_or_else(|| missing("concert_id"))?,
            date: dto.date.ok_or_else(|| missing("date"))?,
        })
    }
}

impl From<&ReservationRequest> for ReservationRequestDto {
    fn from(req: &ReservationRequest) -> Self {
        ReservationRequestDto::new(req.number_of_seats, req.price_band, req.concert_id, req.date)
    }
}

/// A time-limited hold on seats for one concert performance.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub id: Uuid,
    pub username: String,
    pub request: ReservationRequest,
    pub seats: Vec<Seat>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub confirmed: bool,
}

impl Reservation {
    pub fn new(
        username: &str,
        request: ReservationRequest,
        seats: Vec<Seat>,
        now: DateTime<Utc>,
        hold: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            request,
            seats,
            created_at: now,
            expires_at: now + hold,
            confirmed: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether this reservation still keeps its seats away from other buyers.
    pub fn holds_seats(&self, now: DateTime<Utc>) -> bool {
        self.confirmed || !self.is_expired(now)
    }

    pub fn is_for(&self, concert_id: i64, date: &NaiveDateTime) -> bool {
        self.request.concert_id == concert_id && self.request.date == *date
    }

    /// Checks that `username` may turn this reservation into a booking at `now`.
    ///
    /// Reservations owned by someone else are reported as missing.
    pub fn ensure_confirmable(&self, username: &str, now: DateTime<Utc>) -> CoreResult<()> {
        if self.username != username {
            return Err(CoreError::NotFound(format!("reservation {}", self.id)));
        }
        if self.confirmed {
            return Err(CoreError::Conflict(format!("reservation {} is already confirmed", self.id)));
        }
        if self.is_expired(now) {
            return Err(CoreError::Expired(format!("reservation {} expired at {}", self.id, self.expires_at)));
        }
        Ok(())
    }

    pub fn to_dto(&self) -> ReservationDto {
        ReservationDto {
            id: self.id,
            request: ReservationRequestDto::from(&self.request),
            seats: self.seats.clone(),
            expires_at: self.expires_at,
        }
    }
}

/// Seats of `concert_id` on `date` that are booked or held by a live reservation.
pub fn unavailable_seats<'a>(
    reservations: impl IntoIterator<Item = &'a Reservation>,
    concert_id: i64,
    date: &NaiveDateTime,
    now: DateTime<Utc>,
) -> HashSet<Seat> {
    reservations
        .into_iter()
        .filter(|r| r.is_for(concert_id, date) && r.holds_seats(now))
        .flat_map(|r| r.seats.iter().copied())
        .collect()
}

/// Picks seats for `request` that do not collide with `unavailable`.
pub fn allocate_seats(request: &ReservationRequest, unavailable: &HashSet<Seat>) -> CoreResult<Vec<Seat>> {
    let seats = theatre::find_available_seats(request.number_of_seats, request.price_band, unavailable);
    if seats.is_empty() {
        tracing::debug!(
            concert_id = request.concert_id,
            band = %request.price_band,
            requested = request.number_of_seats,
            unavailable = unavailable.len(),
            "no contiguous block available"
        );
        return Err(CoreError::InsufficientSeats {
            requested: request.number_of_seats,
            band: request.price_band,
        });
    }
    Ok(seats)
}

/// A confirmed reservation. Bookings never expire.
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub username: String,
    pub concert_id: i64,
    pub concert_title: String,
    pub date: NaiveDateTime,
    pub price_band: PriceBand,
    pub seats: Vec<Seat>,
    pub total_cents: i64,
    pub booked_at: DateTime<Utc>,
}

impl Booking {
    pub fn from_reservation(
        reservation: &Reservation,
        concert_title: &str,
        price_cents: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reservation_id: reservation.id,
            username: reservation.username.clone(),
            concert_id: reservation.request.concert_id,
            concert_title: concert_title.to_string(),
            date: reservation.request.date,
            price_band: reservation.request.price_band,
            seats: reservation.seats.clone(),
            total_cents: i64::from(price_cents) * reservation.seats.len() as i64,
            booked_at: now,
        }
    }

    pub fn to_dto(&self) -> BookingDto {
        BookingDto {
            id: self.id,
            concert_id: self.concert_id,
            concert_title: self.concert_title.clone(),
            date: self.date,
            price_band: self.price_band,
            seats: self.seats.clone(),
            total_cents: self.total_cents,
            booked_at: self.booked_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use concert_shared::dto::SeatRow;

    fn show_date() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2027, 3, 1).unwrap().and_hms_opt(20, 0, 0).unwrap()
    }

    fn request(seats: u32) -> ReservationRequest {
        ReservationRequest {
            number_of_seats: seats,
            price_band: PriceBand::PriceBandC,
            concert_id: 1,
            date: show_date(),
        }
    }

    fn hold(seats: u32, now: DateTime<Utc>, hold_secs: i64) -> Reservation {
        let allocated = allocate_seats(&request(seats), &HashSet::new()).unwrap();
        Reservation::new("alice", request(seats), allocated, now, Duration::seconds(hold_secs))
    }

    #[test]
    fn test_request_validation_reports_missing_field() {
        let dto = ReservationRequestDto {
            number_of_seats: 2,
            seat_type: Some(PriceBand::PriceBandA),
            concert_id: None,
            date: Some(show_date()),
        };
        let err = ReservationRequest::try_from(&dto).unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(msg) if msg == "concert_id is required"));

        let zero = ReservationRequestDto::new(0, PriceBand::PriceBandA, 1, show_date());
        assert!(ReservationRequest::try_from(&zero).is_err());
    }

    #[test]
    fn test_live_and_confirmed_reservations_block_seats() {
        let now = Utc::now();
        let live = hold(2, now, 300);
        let expired = hold(3, now - Duration::seconds(600), 300);
        let mut booked = hold(1, now - Duration::seconds(600), 300);
        booked.seats = vec![Seat::new(SeatRow::B, 5)];
        booked.confirmed = true;

        let taken = unavailable_seats([&live, &expired, &booked], 1, &show_date(), now);
        assert_eq!(taken.len(), 3);
        assert!(taken.contains(&Seat::new(SeatRow::A, 1)));
        assert!(taken.contains(&Seat::new(SeatRow::B, 5)));

        // Expired hold released A3 for the next request.
        let next = allocate_seats(&request(2), &taken).unwrap();
        assert_eq!(next, vec![Seat::new(SeatRow::A, 3), Seat::new(SeatRow::A, 4)]);
    }

    #[test]
    fn test_other_performances_do_not_interfere() {
        let now = Utc::now();
        let live = hold(2, now, 300);
        let other_night = show_date() + Duration::days(1);
        assert!(unavailable_seats([&live], 1, &other_night, now).is_empty());
        assert!(unavailable_seats([&live], 2, &show_date(), now).is_empty());
    }

    #[test]
    fn test_allocation_failure_is_insufficient_seats() {
        let err = allocate_seats(&request(25), &HashSet::new()).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientSeats { requested: 25, .. }));
    }

    #[test]
    fn test_confirmation_rules() {
        let now = Utc::now();
        let reservation = hold(2, now, 300);

        assert!(reservation.ensure_confirmable("alice", now).is_ok());
        assert!(matches!(reservation.ensure_confirmable("bob", now), Err(CoreError::NotFound(_))));
        assert!(matches!(
            reservation.ensure_confirmable("alice", now + Duration::seconds(300)),
            Err(CoreError::Expired(_))
        ));

        let mut confirmed = reservation.clone();
        confirmed.confirmed = true;
        assert!(matches!(confirmed.ensure_confirmable("alice", now), Err(CoreError::Conflict(_))));
    }

    #[test]
    fn test_booked_reservation_reports_conflict_after_hold_window() {
        let now = Utc::now();
        let mut reservation = hold(2, now, 300);
        reservation.confirmed = true;

        let later = now + Duration::seconds(301);
        assert!(reservation.is_expired(later));
        assert!(reservation.holds_seats(later));
        assert!(matches!(
            reservation.ensure_confirmable("alice", later),
            Err(CoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_booking_totals_price_per_seat() {
        let now = Utc::now();
        let reservation = hold(3, now, 300);
        let booking = Booking::from_reservation(&reservation, "Night Shift", 8000, now);
        assert_eq!(booking.total_cents, 24000);
        assert_eq!(booking.to_dto().seats.len(), 3);
    }
}
