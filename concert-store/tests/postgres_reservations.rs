// Runs against a real Postgres: `DATABASE_URL=postgres://... cargo test -p concert-store -- --ignored`
use std::collections::HashSet;

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use sqlx::PgPool;

use concert_core::repository::ReservationRepository;
use concert_core::reservation::ReservationRequest;
use concert_core::CoreError;
use concert_shared::dto::PriceBand;
use concert_store::StoreReservationRepository;

fn show() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2027, 3, 1).unwrap().and_hms_opt(20, 0, 0).unwrap()
}

fn request(seats: u32) -> ReservationRequest {
    ReservationRequest {
        number_of_seats: seats,
        price_band: PriceBand::PriceBandC,
        concert_id: 1,
        date: show(),
    }
}

fn hold() -> Duration {
    Duration::seconds(300)
}

#[sqlx::test(migrations = "../migrations")]
#[ignore]
async fn concurrent_reservations_never_share_seats(pool: PgPool) {
    let mut handles = Vec::new();
    for i in 0..24 {
        let repo = StoreReservationRepository::new(pool.clone());
        handles.push(tokio::spawn(async move {
            repo.reserve(&format!("user{}", i), &request(4), Utc::now(), hold()).await
        }));
    }

    let mut seen = HashSet::new();
    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(reservation) => {
                granted += 1;
                for seat in reservation.seats {
                    assert!(seen.insert(seat), "seat {} handed out twice", seat);
                }
            }
            Err(err) => assert!(matches!(err, CoreError::InsufficientSeats { .. })),
        }
    }
    assert_eq!(granted, 20);
}

#[sqlx::test(migrations = "../migrations")]
#[ignore]
async fn confirm_loses_to_reservation_that_reused_lapsed_seats(pool: PgPool) {
    let repo = StoreReservationRepository::new(pool);
    let alice = repo.reserve("alice", &request(2), Utc::now() - hold(), hold()).await.unwrap();
    let bob = repo.reserve("bob", &request(2), alice.expires_at, hold()).await.unwrap();
    assert_eq!(bob.seats, alice.seats);

    let err = repo.confirm(alice.id, "alice").await.unwrap_err();
    assert!(matches!(err, CoreError::Expired(_)));
    assert!(repo.list_bookings("alice").await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../migrations")]
#[ignore]
async fn confirmed_reservation_books_once(pool: PgPool) {
    let repo = StoreReservationRepository::new(pool);
    let reservation = repo.reserve("alice", &request(3), Utc::now(), hold()).await.unwrap();

    assert!(matches!(repo.confirm(reservation.id, "bob").await, Err(CoreError::NotFound(_))));

    let booking = repo.confirm(reservation.id, "alice").await.unwrap();
    assert_eq!(booking.total_cents, 3 * 8000);
    assert_eq!(booking.seats, reservation.seats);

    assert!(matches!(repo.confirm(reservation.id, "alice").await, Err(CoreError::Conflict(_))));
    assert_eq!(repo.purge_expired(Utc::now() + Duration::days(1)).await.unwrap(), 0);

    let bookings = repo.list_bookings("alice").await.unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].concert_title, "Aurora Lights Live");
}
