use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::{HashMap, HashSet};
use tracing::info;
use uuid::Uuid;

use concert_core::repository::ReservationRepository;
use concert_core::reservation::{allocate_seats, Booking, Reservation, ReservationRequest};
use concert_core::theatre::is_valid_seat;
use concert_core::{CoreError, CoreResult};
use concert_shared::dto::{PriceBand, Seat, SeatRow};

use crate::storage_error;

pub struct StoreReservationRepository {
    pool: PgPool,
}

impl StoreReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SeatRecord {
    reservation_id: Uuid,
    seat_row: String,
    seat_number: i16,
}

impl TryFrom<&SeatRecord> for Seat {
    type Error = CoreError;

    fn try_from(record: &SeatRecord) -> CoreResult<Self> {
        let row = SeatRow::parse(&record.seat_row)
            .ok_or_else(|| CoreError::StorageError(format!("unknown seat row '{}'", record.seat_row)))?;
        let seat = u8::try_from(record.seat_number)
            .map(|number| Seat::new(row, number))
            .ok()
            .filter(is_valid_seat)
            .ok_or_else(|| {
                CoreError::StorageError(format!("no seat {}{} in the theatre", row.as_str(), record.seat_number))
            })?;
        Ok(seat)
    }
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    username: String,
    concert_id: i64,
    date: NaiveDateTime,
    price_band: String,
    number_of_seats: i32,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    confirmed: bool,
}

impl ReservationRow {
    fn into_reservation(self, seats: Vec<Seat>) -> CoreResult<Reservation> {
        let price_band = parse_band(&self.price_band)?;
        let number_of_seats = u32::try_from(self.number_of_seats)
            .map_err(|_| CoreError::StorageError(format!("invalid seat count {}", self.number_of_seats)))?;
        Ok(Reservation {
            id: self.id,
            username: self.username,
            request: ReservationRequest {
                number_of_seats,
                price_band,
                concert_id: self.concert_id,
                date: self.date,
            },
            seats,
            created_at: self.created_at,
            expires_at: self.expires_at,
            confirmed: self.confirmed,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    reservation_id: Uuid,
    username: String,
    concert_id: i64,
    concert_title: String,
    date: NaiveDateTime,
    price_band: String,
    total_cents: i64,
    booked_at: DateTime<Utc>,
}

fn parse_band(value: &str) -> CoreResult<PriceBand> {
    PriceBand::parse(value).ok_or_else(|| CoreError::StorageError(format!("unknown price band '{}'", value)))
}

const RESERVATION_COLUMNS: &str = r#"
    r.id, r.username, r.concert_id, r.date, r.price_band, r.number_of_seats, r.created_at, r.expires_at,
    EXISTS (SELECT 1 FROM bookings b WHERE b.reservation_id = r.id) AS confirmed
"#;

async fn seats_for(tx: &mut Transaction<'_, Postgres>, ids: &[Uuid]) -> CoreResult<HashMap<Uuid, Vec<Seat>>> {
    let records = sqlx::query_as::<_, SeatRecord>(
        r#"
        SELECT reservation_id, seat_row, seat_number FROM reservation_seats
        WHERE reservation_id = ANY($1)
        ORDER BY seat_row, seat_number
        "#,
    )
    .bind(ids)
    .fetch_all(&mut **tx)
    .await
    .map_err(storage_error)?;

    let mut seats: HashMap<Uuid, Vec<Seat>> = HashMap::new();
    for record in &records {
        seats.entry(record.reservation_id).or_default().push(Seat::try_from(record)?);
    }
    Ok(seats)
}

#[async_trait]
impl ReservationRepository for StoreReservationRepository {
    async fn reserve(
        &self,
        username: &str,
        request: &ReservationRequest,
        now: DateTime<Utc>,
        hold: Duration,
    ) -> CoreResult<Reservation> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        // Row lock on the performance serializes allocation for this concert/date.
        let scheduled = sqlx::query_scalar::<_, i64>(
            "SELECT concert_id FROM concert_dates WHERE concert_id = $1 AND date = $2 FOR UPDATE",
        )
        .bind(request.concert_id)
        .bind(request.date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?;

        if scheduled.is_none() {
            return Err(CoreError::NotFound(format!(
                "concert {} is not scheduled on {}",
                request.concert_id, request.date
            )));
        }

        let taken = sqlx::query_as::<_, SeatRecord>(
            r#"
            SELECT s.reservation_id, s.seat_row, s.seat_number
            FROM reservation_seats s
            JOIN reservations r ON r.id = s.reservation_id
            WHERE r.concert_id = $1 AND r.date = $2
              AND (r.expires_at > $3 OR EXISTS (SELECT 1 FROM bookings b WHERE b.reservation_id = r.id))
            "#,
        )
        .bind(request.concert_id)
        .bind(request.date)
        .bind(now)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage_error)?;

        let unavailable = taken.iter().map(Seat::try_from).collect::<CoreResult<HashSet<Seat>>>()?;
        let seats = allocate_seats(request, &unavailable)?;
        let reservation = Reservation::new(username, request.clone(), seats, now, hold);

        sqlx::query(
            r#"
            INSERT INTO reservations (id, username, concert_id, date, price_band, number_of_seats, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(reservation.id)
        .bind(&reservation.username)
        .bind(request.concert_id)
        .bind(request.date)
        .bind(request.price_band.as_str())
        .bind(request.number_of_seats as i32)
        .bind(reservation.created_at)
        .bind(reservation.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        for seat in &reservation.seats {
            sqlx::query("INSERT INTO reservation_seats (reservation_id, seat_row, seat_number) VALUES ($1, $2, $3)")
                .bind(reservation.id)
                .bind(seat.row.as_str())
                .bind(i16::from(seat.number))
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)?;

        Ok(reservation)
    }

    async fn find_reservation(&self, id: Uuid) -> CoreResult<Option<Reservation>> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations r WHERE r.id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let seats = seats_for(&mut tx, &[id]).await?.remove(&id).unwrap_or_default();
        tx.commit().await.map_err(storage_error)?;

        row.into_reservation(seats).map(Some)
    }

    async fn confirm(&self, id: Uuid, username: &str) -> CoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let performance = sqlx::query_as::<_, (i64, NaiveDateTime)>(
            "SELECT concert_id, date FROM reservations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| CoreError::NotFound(format!("reservation {}", id)))?;

        // Same performance lock as `reserve`; expiry is read only once it is held.
        sqlx::query("SELECT concert_id FROM concert_dates WHERE concert_id = $1 AND date = $2 FOR UPDATE")
            .bind(performance.0)
            .bind(performance.1)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations r WHERE r.id = $1 FOR UPDATE",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| CoreError::NotFound(format!("reservation {}", id)))?;

        let seats = seats_for(&mut tx, &[id]).await?.remove(&id).unwrap_or_default();
        let reservation = row.into_reservation(seats)?;
        let now = Utc::now();
        reservation.ensure_confirmable(username, now)?;

        let (title, price_cents): (String, i32) = sqlx::query_as(
            r#"
            SELECT c.title, t.price_cents
            FROM concerts c
            JOIN concert_tariffs t ON t.concert_id = c.id
            WHERE c.id = $1 AND t.price_band = $2
            "#,
        )
        .bind(reservation.request.concert_id)
        .bind(reservation.request.price_band.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| {
            CoreError::InternalError(format!(
                "no {} tariff for concert {}",
                reservation.request.price_band, reservation.request.concert_id
            ))
        })?;

        let booking = Booking::from_reservation(&reservation, &title, price_cents, now);

        sqlx::query(
            r#"
            INSERT INTO bookings (id, reservation_id, username, total_cents, booked_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(booking.id)
        .bind(booking.reservation_id)
        .bind(&booking.username)
        .bind(booking.total_cents)
        .bind(booking.booked_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;

        info!("Booking {} confirmed for reservation {}", booking.id, id);
        Ok(booking)
    }

    async fn list_bookings(&self, username: &str) -> CoreResult<Vec<Booking>> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT b.id, b.reservation_id, b.username, r.concert_id, c.title AS concert_title,
                   r.date, r.price_band, b.total_cents, b.booked_at
            FROM bookings b
            JOIN reservations r ON r.id = b.reservation_id
            JOIN concerts c ON c.id = r.concert_id
            WHERE b.username = $1
            ORDER BY b.booked_at
            "#,
        )
        .bind(username)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage_error)?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.reservation_id).collect();
        let mut seats = seats_for(&mut tx, &ids).await?;
        tx.commit().await.map_err(storage_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(Booking {
                    id: row.id,
                    reservation_id: row.reservation_id,
                    username: row.username,
                    concert_id: row.concert_id,
                    concert_title: row.concert_title,
                    date: row.date,
                    price_band: parse_band(&row.price_band)?,
                    seats: seats.remove(&row.reservation_id).unwrap_or_default(),
                    total_cents: row.total_cents,
                    booked_at: row.booked_at,
                })
            })
            .collect()
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM reservations r
            WHERE r.expires_at <= $1
              AND NOT EXISTS (SELECT 1 FROM bookings b WHERE b.reservation_id = r.id)
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(result.rows_affected())
    }
}
