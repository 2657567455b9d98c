use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::PgPool;
use std::collections::{BTreeMap, HashMap};

use concert_core::catalog::{Concert, NewConcert, NewPerformer, Performer};
use concert_core::repository::CatalogRepository;
use concert_core::{CoreError, CoreResult};
use concert_shared::dto::{Genre, PriceBand};

use crate::storage_error;

pub struct StoreCatalogRepository {
    pool: PgPool,
}

impl StoreCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct PerformerRow {
    id: i64,
    name: String,
    image_name: Option<String>,
    genre: String,
}

impl TryFrom<PerformerRow> for Performer {
    type Error = CoreError;

    fn try_from(row: PerformerRow) -> CoreResult<Self> {
        let genre = Genre::parse(&row.genre)
            .ok_or_else(|| CoreError::StorageError(format!("unknown genre '{}' for performer {}", row.genre, row.id)))?;
        Ok(Performer {
            id: row.id,
            name: row.name,
            image_name: row.image_name,
            genre,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ConcertRow {
    id: i64,
    title: String,
}

#[derive(sqlx::FromRow)]
struct ConcertDateRow {
    concert_id: i64,
    date: NaiveDateTime,
}

#[derive(sqlx::FromRow)]
struct TariffRow {
    concert_id: i64,
    price_band: String,
    price_cents: i32,
}

#[derive(sqlx::FromRow)]
struct ConcertPerformerRow {
    concert_id: i64,
    performer_id: i64,
}

impl StoreCatalogRepository {
    /// Loads concerts with their dates, tariff and performers. `only` narrows to one id.
    async fn load_concerts(&self, only: Option<i64>) -> CoreResult<Vec<Concert>> {
        let concerts = sqlx::query_as::<_, ConcertRow>(
            "SELECT id, title FROM concerts WHERE ($1::BIGINT IS NULL OR id = $1) ORDER BY id",
        )
        .bind(only)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        if concerts.is_empty() {
            return Ok(Vec::new());
        }

        let dates = sqlx::query_as::<_, ConcertDateRow>(
            "SELECT concert_id, date FROM concert_dates WHERE ($1::BIGINT IS NULL OR concert_id = $1) ORDER BY date",
        )
        .bind(only)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let tariffs = sqlx::query_as::<_, TariffRow>(
            "SELECT concert_id, price_band, price_cents FROM concert_tariffs WHERE ($1::BIGINT IS NULL OR concert_id = $1)",
        )
        .bind(only)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let performers = sqlx::query_as::<_, ConcertPerformerRow>(
            "SELECT concert_id, performer_id FROM concert_performers WHERE ($1::BIGINT IS NULL OR concert_id = $1) ORDER BY performer_id",
        )
        .bind(only)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        assemble_concerts(concerts, dates, tariffs, performers)
    }
}

fn assemble_concerts(
    concerts: Vec<ConcertRow>,
    dates: Vec<ConcertDateRow>,
    tariffs: Vec<TariffRow>,
    performers: Vec<ConcertPerformerRow>,
) -> CoreResult<Vec<Concert>> {
    let mut by_id: HashMap<i64, Concert> = concerts
        .iter()
        .map(|row| {
            (
                row.id,
                Concert {
                    id: row.id,
                    title: row.title.clone(),
                    dates: Vec::new(),
                    tariff: BTreeMap::new(),
                    performer_ids: Vec::new(),
                },
            )
        })
        .collect();

    for row in dates {
        if let Some(concert) = by_id.get_mut(&row.concert_id) {
            concert.dates.push(row.date);
        }
    }
    for row in tariffs {
        let band = PriceBand::parse(&row.price_band)
            .ok_or_else(|| CoreError::StorageError(format!("unknown price band '{}'", row.price_band)))?;
        if let Some(concert) = by_id.get_mut(&row.concert_id) {
            concert.tariff.insert(band, row.price_cents);
        }
    }
    for row in performers {
        if let Some(concert) = by_id.get_mut(&row.concert_id) {
            concert.performer_ids.push(row.performer_id);
        }
    }

    // Keep the ORDER BY id of the concert query
    Ok(concerts
        .iter()
        .filter_map(|row| by_id.remove(&row.id))
        .collect())
}

#[async_trait]
impl CatalogRepository for StoreCatalogRepository {
    async fn list_concerts(&self) -> CoreResult<Vec<Concert>> {
        self.load_concerts(None).await
    }

    async fn get_concert(&self, id: i64) -> CoreResult<Option<Concert>> {
        Ok(self.load_concerts(Some(id)).await?.into_iter().next())
    }

    async fn list_performers(&self) -> CoreResult<Vec<Performer>> {
        sqlx::query_as::<_, PerformerRow>("SELECT id, name, image_name, genre FROM performers ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?
            .into_iter()
            .map(Performer::try_from)
            .collect()
    }

    async fn get_performer(&self, id: i64) -> CoreResult<Option<Performer>> {
        sqlx::query_as::<_, PerformerRow>("SELECT id, name, image_name, genre FROM performers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?
            .map(Performer::try_from)
            .transpose()
    }

    async fn create_performer(&self, performer: NewPerformer) -> CoreResult<Performer> {
        let row = sqlx::query_as::<_, PerformerRow>(
            r#"
            INSERT INTO performers (name, image_name, genre)
            VALUES ($1, $2, $3)
            RETURNING id, name, image_name, genre
            "#,
        )
        .bind(&performer.name)
        .bind(&performer.image_name)
        .bind(performer.genre.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        Performer::try_from(row)
    }

    async fn create_concert(&self, concert: NewConcert) -> CoreResult<Concert> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let known: Vec<i64> = sqlx::query_scalar("SELECT id FROM performers WHERE id = ANY($1)")
            .bind(&concert.performer_ids)
            .fetch_all(&mut *tx)
            .await
            .map_err(storage_error)?;
        if let Some(missing) = concert.performer_ids.iter().find(|id| !known.contains(*id)) {
            return Err(CoreError::NotFound(format!("performer {}", missing)));
        }

        let concert_id: i64 = sqlx::query_scalar("INSERT INTO concerts (title) VALUES ($1) RETURNING id")
            .bind(&concert.title)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_error)?;

        for date in &concert.dates {
            sqlx::query("INSERT INTO concert_dates (concert_id, date) VALUES ($1, $2)")
                .bind(concert_id)
                .bind(date)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
        }

        for (band, price_cents) in &concert.tariff {
            sqlx::query("INSERT INTO concert_tariffs (concert_id, price_band, price_cents) VALUES ($1, $2, $3)")
                .bind(concert_id)
                .bind(band.as_str())
                .bind(price_cents)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
        }

        for performer_id in &concert.performer_ids {
            sqlx::query("INSERT INTO concert_performers (concert_id, performer_id) VALUES ($1, $2)")
                .bind(concert_id)
                .bind(performer_id)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
        }

        tx.commit().await.map_err(storage_error)?;

        Ok(Concert {
            id: concert_id,
            title: concert.title,
            dates: concert.dates,
            tariff: concert.tariff,
            performer_ids: concert.performer_ids,
        })
    }

    async fn set_performer_image(&self, id: i64, image_name: &str) -> CoreResult<Performer> {
        let row = sqlx::query_as::<_, PerformerRow>(
            "UPDATE performers SET image_name = $1 WHERE id = $2 RETURNING id, name, image_name, genre",
        )
        .bind(image_name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| CoreError::NotFound(format!("performer {}", id)))?;

        Performer::try_from(row)
    }
}
