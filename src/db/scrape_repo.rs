// src/db/scrape_repo.rs

use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::scrape::{ScrapeSourceHotel, ScrapeSourcePayload, ScrapedRate, ScrapedRoomRate},
};

fn map_duplicate_source(e: sqlx::Error) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return AppError::conflict("This hotel already has a mapping for that source.");
        }
    }
    AppError::DatabaseError(e)
}

#[derive(Clone)]
pub struct ScrapeRepository {
    pool: PgPool,
}

impl ScrapeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_sources(&self, hotel_id: Uuid) -> Result<Vec<ScrapeSourceHotel>, AppError> {
        let sources = sqlx::query_as::<_, ScrapeSourceHotel>(
            "SELECT * FROM scrape_source_hotels WHERE hotel_id = $1 ORDER BY source_type",
        )
        .bind(hotel_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    /// Every saved mapping across all tenants; drives the scrape run.
    pub async fn list_all_sources(&self) -> Result<Vec<ScrapeSourceHotel>, AppError> {
        let sources = sqlx::query_as::<_, ScrapeSourceHotel>(
            "SELECT * FROM scrape_source_hotels ORDER BY hotel_id, source_type",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    pub async fn create_source(
        &self,
        hotel_id: Uuid,
        payload: &ScrapeSourcePayload,
    ) -> Result<ScrapeSourceHotel, AppError> {
        sqlx::query_as::<_, ScrapeSourceHotel>(
            r#"
            INSERT INTO scrape_source_hotels (hotel_id, source_type, external_id, url)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(hotel_id)
        .bind(payload.source_type)
        .bind(payload.external_id.trim())
        .bind(payload.url.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(map_duplicate_source)
    }

    pub async fn update_source(
        &self,
        hotel_id: Uuid,
        source_id: Uuid,
        payload: &ScrapeSourcePayload,
    ) -> Result<Option<ScrapeSourceHotel>, AppError> {
        sqlx::query_as::<_, ScrapeSourceHotel>(
            r#"
            UPDATE scrape_source_hotels
            SET source_type = $3, external_id = $4, url = $5, updated_at = NOW()
            WHERE id = $1 AND hotel_id = $2
            RETURNING *
            "#,
        )
        .bind(source_id)
        .bind(hotel_id)
        .bind(payload.source_type)
        .bind(payload.external_id.trim())
        .bind(payload.url.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_duplicate_source)
    }

    pub async fn delete_source(&self, hotel_id: Uuid, source_id: Uuid) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM scraped_rates WHERE source_hotel_id = $1")
            .bind(source_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM scrape_source_hotels WHERE id = $1 AND hotel_id = $2")
            .bind(source_id)
            .bind(hotel_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    pub async fn insert_rates(
        &self,
        source: &ScrapeSourceHotel,
        checkin: NaiveDate,
        rates: &[ScrapedRoomRate],
    ) -> Result<usize, AppError> {
        if rates.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO scraped_rates \
             (hotel_id, source_hotel_id, source_type, checkin_date, room_name, rate_name, price, currency) ",
        );
        builder.push_values(rates, |mut b, rate| {
            b.push_bind(source.hotel_id)
                .push_bind(source.id)
                .push_bind(source.source_type)
                .push_bind(checkin)
                .push_bind(rate.room_name.clone())
                .push_bind(rate.rate_name.clone())
                .push_bind(rate.price)
                .push_bind(rate.currency.clone());
        });
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }

    pub async fn list_rates(
        &self,
        hotel_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ScrapedRate>, AppError> {
        let rates = sqlx::query_as::<_, ScrapedRate>(
            r#"
            SELECT * FROM scraped_rates
            WHERE hotel_id = $1
              AND ($2::date IS NULL OR checkin_date >= $2)
              AND ($3::date IS NULL OR checkin_date <= $3)
            ORDER BY checkin_date, scraped_at DESC
            "#,
        )
        .bind(hotel_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rates)
    }
}
