use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use concert_shared::dto::{ConcertDto, Genre, PerformerDto, PriceBand};

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Performer {
    pub id: i64,
    pub name: String,
    pub image_name: Option<String>,
    pub genre: Genre,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Concert {
    pub id: i64,
    pub title: String,
    pub dates: Vec<NaiveDateTime>,
    pub tariff: BTreeMap<PriceBand, i32>,
    pub performer_ids: Vec<i64>,
}

impl Concert {
    pub fn is_scheduled_on(&self, date: &NaiveDateTime) -> bool {
        self.dates.contains(date)
    }

    pub fn price_for(&self, band: PriceBand) -> Option<i32> {
        self.tariff.get(&band).copied()
    }
}

impl From<&Concert> for ConcertDto {
    fn from(concert: &Concert) -> Self {
        ConcertDto {
            id: concert.id,
            title: concert.title.clone(),
            dates: concert.dates.clone(),
            tariff: concert.tariff.clone(),
            performer_ids: concert.performer_ids.clone(),
        }
    }
}

impl From<&Performer> for PerformerDto {
    fn from(performer: &Performer) -> Self {
        PerformerDto {
            id: performer.id,
            name: performer.name.clone(),
            image_name: performer.image_name.clone(),
            genre: performer.genre,
        }
    }
}

/// Validated input for creating a concert. Performer existence is checked by the store.
#[derive(Debug, Clone)]
pub struct NewConcert {
    pub title: String,
    pub dates: Vec<NaiveDateTime>,
    pub tariff: BTreeMap<PriceBand, i32>,
    pub performer_ids: Vec<i64>,
}

impl TryFrom<ConcertDto> for NewConcert {
    type Error = CoreError;

    fn try_from(dto: ConcertDto) -> CoreResult<Self> {
        let title = dto.title.trim().to_string();
        if title.is_empty() {
            return Err(CoreError::ValidationError("concert title is required".to_string()));
        }
        if dto.dates.is_empty() {
            return Err(CoreError::ValidationError("at least one concert date is required".to_string()));
        }
        if let Some(band) = PriceBand::ALL.iter().find(|band| !dto.tariff.contains_key(band)) {
            return Err(CoreError::ValidationError(format!("tariff for {} is required", band)));
        }
        if dto.tariff.values().any(|price| *price < 0) {
            return Err(CoreError::ValidationError("tariff prices cannot be negative".to_string()));
        }

        let mut dates = dto.dates;
        dates.sort();
        dates.dedup();
        let mut performer_ids = dto.performer_ids;
        performer_ids.sort_unstable();
        performer_ids.dedup();

        Ok(Self {
            title,
            dates,
            tariff: dto.tariff,
            performer_ids,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewPerformer {
    pub name: String,
    pub image_name: Option<String>,
    pub genre: Genre,
}

impl TryFrom<PerformerDto> for NewPerformer {
    type Error = CoreError;

    fn try_from(dto: PerformerDto) -> CoreResult<Self> {
        let name = dto.name.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::ValidationError("performer name is required".to_string()));
        }

        Ok(Self {
            name,
            image_name: dto.image_name.filter(|image| !image.trim().is_empty()),
            genre: dto.genre,
        })
    }
}
