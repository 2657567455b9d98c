use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::pii::Masked;

// ============================================================================
// Theatre
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriceBand {
    PriceBandA,
    PriceBandB,
    PriceBandC,
}

impl PriceBand {
    pub const ALL: [PriceBand; 3] = [PriceBand::PriceBandA, PriceBand::PriceBandB, PriceBand::PriceBandC];

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceBand::PriceBandA => "PriceBandA",
            PriceBand::PriceBandB => "PriceBandB",
            PriceBand::PriceBandC => "PriceBandC",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|band| band.as_str() == value)
    }
}

impl fmt::Display for PriceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeatRow {
    A, B, C, D, E, F, G, H, I, J, K, L, M, N, O, P, Q, R,
}

impl SeatRow {
    pub const ALL: [SeatRow; 18] = [
        SeatRow::A, SeatRow::B, SeatRow::C, SeatRow::D, SeatRow::E, SeatRow::F,
        SeatRow::G, SeatRow::H, SeatRow::I, SeatRow::J, SeatRow::K, SeatRow::L,
        SeatRow::M, SeatRow::N, SeatRow::O, SeatRow::P, SeatRow::Q, SeatRow::R,
    ];

    pub fn as_str(&self) -> &'static str {
        const NAMES: [&str; 18] = [
            "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R",
        ];
        NAMES[*self as usize]
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|row| row.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Seat {
    pub row: SeatRow,
    pub number: u8,
}

impl Seat {
    pub fn new(row: SeatRow, number: u8) -> Self {
        Self { row, number }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row.as_str(), self.number)
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Genre {
    Pop,
    HipHop,
    RhythmAndBlues,
    Acappella,
    Metal,
    Rock,
}

impl Genre {
    pub const ALL: [Genre; 6] = [
        Genre::Pop,
        Genre::HipHop,
        Genre::RhythmAndBlues,
        Genre::Acappella,
        Genre::Metal,
        Genre::Rock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Pop => "Pop",
            Genre::HipHop => "HipHop",
            Genre::RhythmAndBlues => "RhythmAndBlues",
            Genre::Acappella => "Acappella",
            Genre::Metal => "Metal",
            Genre::Rock => "Rock",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|genre| genre.as_str() == value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformerDto {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    pub genre: Genre,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConcertDto {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub dates: Vec<NaiveDateTime>,
    /// Ticket price per band, in cents.
    #[serde(default)]
    pub tariff: BTreeMap<PriceBand, i32>,
    #[serde(default)]
    pub performer_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformerImageDto {
    pub image_name: String,
}

// ============================================================================
// Users & Payment
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserDto {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Masked<String>>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl UserDto {
    pub fn new(username: &str, password: &str, first_name: &str, last_name: &str) -> Self {
        Self {
            username: username.to_string(),
            password: Some(Masked::from(password)),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        }
    }

    /// Credentials-only form used for login.
    pub fn credentials(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: Some(Masked::from(password)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CardType {
    Visa,
    Master,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Visa => "Visa",
            CardType::Master => "Master",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Visa" => Some(CardType::Visa),
            "Master" => Some(CardType::Master),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditCardDto {
    pub card_type: CardType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub number: Masked<String>,
    pub expiry_date: NaiveDate,
}

// ============================================================================
// Reservations & Bookings
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReservationRequestDto {
    #[serde(default)]
    pub number_of_seats: u32,
    #[serde(default)]
    pub seat_type: Option<PriceBand>,
    #[serde(default)]
    pub concert_id: Option<i64>,
    #[serde(default)]
    pub date: Option<NaiveDateTime>,
}

impl ReservationRequestDto {
    pub fn new(number_of_seats: u32, seat_type: PriceBand, concert_id: i64, date: NaiveDateTime) -> Self {
        Self {
            number_of_seats,
            seat_type: Some(seat_type),
            concert_id: Some(concert_id),
            date: Some(date),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservationDto {
    pub id: Uuid,
    pub request: ReservationRequestDto,
    pub seats: Vec<Seat>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingDto {
    pub id: Uuid,
    pub concert_id: i64,
    pub concert_title: String,
    pub date: NaiveDateTime,
    pub price_band: PriceBand,
    pub seats: Vec<Seat>,
    pub total_cents: i64,
    pub booked_at: DateTime<Utc>,
}
