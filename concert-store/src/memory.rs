use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use uuid::Uuid;

use concert_core::catalog::{Concert, NewConcert, NewPerformer, Performer};
use concert_core::identity::{AuthToken, User};
use concert_core::payment::CreditCard;
use concert_core::repository::{CatalogRepository, ReservationRepository, UserRepository};
use concert_core::reservation::{allocate_seats, unavailable_seats, Booking, Reservation, ReservationRequest};
use concert_core::{CoreError, CoreResult};
use concert_shared::dto::{Genre, PriceBand};

#[derive(Default)]
struct State {
    performers: BTreeMap<i64, Performer>,
    concerts: BTreeMap<i64, Concert>,
    next_performer_id: i64,
    next_concert_id: i64,
    users: HashMap<String, User>,
    tokens: HashMap<String, AuthToken>,
    credit_cards: HashMap<String, CreditCard>,
    reservations: HashMap<Uuid, Reservation>,
    bookings: Vec<Booking>,
}

/// Store that keeps everything in process memory.
///
/// One lock guards the whole state, so every operation is atomic with respect to
/// the others. Used when no database is configured and by the test suites.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Same catalog the sample migration seeds into Postgres.
    pub fn with_sample_catalog() -> Self {
        let mut state = State::default();

        let performers = [
            (1, "Aurora Lights", Some("aurora_lights.jpg"), Genre::Pop),
            (2, "Gravel Road", Some("gravel_road.jpg"), Genre::Rock),
            (3, "Mina Kato", None, Genre::Acappella),
        ];
        for (id, name, image, genre) in performers {
            state.performers.insert(
                id,
                Performer {
                    id,
                    name: name.to_string(),
                    image_name: image.map(str::to_string),
                    genre,
                },
            );
        }

        state.concerts.insert(
            1,
            Concert {
                id: 1,
                title: "Aurora Lights Live".to_string(),
                dates: vec![sample_date(2027, 3, 1, 20, 0), sample_date(2027, 3, 2, 20, 0)],
                tariff: tariff(15000, 11000, 8000),
                performer_ids: vec![1],
            },
        );
        state.concerts.insert(
            2,
            Concert {
                id: 2,
                title: "Rock the Harbour".to_string(),
                dates: vec![sample_date(2027, 4, 10, 19, 30)],
                tariff: tariff(9500, 7000, 5000),
                performer_ids: vec![2, 3],
            },
        );

        state.next_performer_id = 3;
        state.next_concert_id = 2;

        Self {
            state: Mutex::new(state),
        }
    }
}

fn sample_date(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .unwrap_or_default()
}

fn tariff(a: i32, b: i32, c: i32) -> BTreeMap<PriceBand, i32> {
    BTreeMap::from([
        (PriceBand::PriceBandA, a),
        (PriceBand::PriceBandB, b),
        (PriceBand::PriceBandC, c),
    ])
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn list_concerts(&self) -> CoreResult<Vec<Concert>> {
        Ok(self.state.lock().await.concerts.values().cloned().collect())
    }

    async fn get_concert(&self, id: i64) -> CoreResult<Option<Concert>> {
        Ok(self.state.lock().await.concerts.get(&id).cloned())
    }

    async fn list_performers(&self) -> CoreResult<Vec<Performer>> {
        Ok(self.state.lock().await.performers.values().cloned().collect())
    }

    async fn get_performer(&self, id: i64) -> CoreResult<Option<Performer>> {
        Ok(self.state.lock().await.performers.get(&id).cloned())
    }

    async fn create_performer(&self, performer: NewPerformer) -> CoreResult<Performer> {
        let mut state = self.state.lock().await;
        state.next_performer_id += 1;
        let created = Performer {
            id: state.next_performer_id,
            name: performer.name,
            image_name: performer.image_name,
            genre: performer.genre,
        };
        state.performers.insert(created.id, created.clone());
        Ok(created)
    }

    async fn create_concert(&self, concert: NewConcert) -> CoreResult<Concert> {
        let mut state = self.state.lock().await;
        if let Some(missing) = concert
            .performer_ids
            .iter()
            .find(|id| !state.performers.contains_key(*id))
        {
            return Err(CoreError::NotFound(format!("performer {}", missing)));
        }

        state.next_concert_id += 1;
        let created = Concert {
            id: state.next_concert_id,
            title: concert.title,
            dates: concert.dates,
            tariff: concert.tariff,
            performer_ids: concert.performer_ids,
        };
        state.concerts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn set_performer_image(&self, id: i64, image_name: &str) -> CoreResult<Performer> {
        let mut state = self.state.lock().await;
        let performer = state
            .performers
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("performer {}", id)))?;
        performer.image_name = Some(image_name.to_string());
        Ok(performer.clone())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(&user.username) {
            return Err(CoreError::Conflict(format!("username {} is taken", user.username)));
        }
        state.users.insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn find_user(&self, username: &str) -> CoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(username).cloned())
    }

    async fn save_token(&self, token: &AuthToken) -> CoreResult<()> {
        // Tokens are keyed by username: one live token per user.
        self.state
            .lock()
            .await
            .tokens
            .insert(token.username.clone(), token.clone());
        Ok(())
    }

    async fn find_token(&self, token: &str) -> CoreResult<Option<AuthToken>> {
        Ok(self
            .state
            .lock()
            .await
            .tokens
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn find_token_for_user(&self, username: &str) -> CoreResult<Option<AuthToken>> {
        Ok(self.state.lock().await.tokens.get(username).cloned())
    }

    async fn save_credit_card(&self, username: &str, card: &CreditCard) -> CoreResult<()> {
        self.state
            .lock()
            .await
            .credit_cards
            .insert(username.to_string(), card.clone());
        Ok(())
    }

    async fn find_credit_card(&self, username: &str) -> CoreResult<Option<CreditCard>> {
        Ok(self.state.lock().await.credit_cards.get(username).cloned())
    }
}

#[async_trait]
impl ReservationRepository for MemoryStore {
    async fn reserve(
        &self,
        username: &str,
        request: &ReservationRequest,
        now: DateTime<Utc>,
        hold: Duration,
    ) -> CoreResult<Reservation> {
        let mut state = self.state.lock().await;

        let scheduled = state
            .concerts
            .get(&request.concert_id)
            .is_some_and(|c| c.is_scheduled_on(&request.date));
        if !scheduled {
            return Err(CoreError::NotFound(format!(
                "concert {} is not scheduled on {}",
                request.concert_id, request.date
            )));
        }

        let unavailable = unavailable_seats(state.reservations.values(), request.concert_id, &request.date, now);
        let seats = allocate_seats(request, &unavailable)?;
        let reservation = Reservation::new(username, request.clone(), seats, now, hold);
        state.reservations.insert(reservation.id, reservation.clone());

        Ok(reservation)
    }

    async fn find_reservation(&self, id: Uuid) -> CoreResult<Option<Reservation>> {
        Ok(self.state.lock().await.reservations.get(&id).cloned())
    }

    async fn confirm(&self, id: Uuid, username: &str) -> CoreResult<Booking> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let reservation = state
            .reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("reservation {}", id)))?;
        reservation.ensure_confirmable(username, now)?;

        let concert = state
            .concerts
            .get(&reservation.request.concert_id)
            .ok_or_else(|| CoreError::InternalError(format!("concert {} vanished", reservation.request.concert_id)))?;
        let price = concert.price_for(reservation.request.price_band).ok_or_else(|| {
            CoreError::InternalError(format!(
                "no {} tariff for concert {}",
                reservation.request.price_band, concert.id
            ))
        })?;

        let booking = Booking::from_reservation(&reservation, &concert.title, price, now);
        if let Some(held) = state.reservations.get_mut(&id) {
            held.confirmed = true;
        }
        state.bookings.push(booking.clone());

        Ok(booking)
    }

    async fn list_bookings(&self, username: &str) -> CoreResult<Vec<Booking>> {
        Ok(self
            .state
            .lock()
            .await
            .bookings
            .iter()
            .filter(|b| b.username == username)
            .cloned()
            .collect())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.reservations.len();
        let expired: Vec<Uuid> = state
            .reservations
            .values()
            .filter(|r| !r.holds_seats(now))
            .map(|r| r.id)
            .collect();
        for id in expired {
            state.reservations.remove(&id);
        }
        Ok((before - state.reservations.len()) as u64)
    }
}
