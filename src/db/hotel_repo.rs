// src/db/hotel_repo.rs

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::hotel::{Hotel, HotelPayload, RateCategory, RateCategoryPayload, RoomType, RoomTypePayload},
};

/// Runs before the hotel row itself goes. Uploaded data outlives the hotel,
/// it is only detached.
const HOTEL_CASCADE: [&str; 6] = [
    "DELETE FROM rate_categories WHERE hotel_id = $1",
    "DELETE FROM room_types WHERE hotel_id = $1",
    "DELETE FROM scraped_rates WHERE hotel_id = $1",
    "DELETE FROM scrape_source_hotels WHERE hotel_id = $1",
    "UPDATE meta_upload_data SET hotel_id = NULL WHERE hotel_id = $1",
    "UPDATE uploaded_extract_data_files SET hotel_id = NULL WHERE hotel_id = $1",
];

#[derive(Clone)]
pub struct HotelRepository {
    pool: PgPool,
}

impl HotelRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  HOTELS
    // =========================================================================

    pub async fn list(&self, company_id: Uuid) -> Result<Vec<Hotel>, AppError> {
        let hotels = sqlx::query_as::<_, Hotel>("SELECT * FROM hotels WHERE company_id = $1 ORDER BY name")
            .bind(company_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(hotels)
    }

    pub async fn find(&self, company_id: Uuid, hotel_id: Uuid) -> Result<Option<Hotel>, AppError> {
        let hotel = sqlx::query_as::<_, Hotel>("SELECT * FROM hotels WHERE id = $1 AND company_id = $2")
            .bind(hotel_id)
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(hotel)
    }

    pub async fn create(&self, company_id: Uuid, payload: &HotelPayload) -> Result<Hotel, AppError> {
        let hotel = sqlx::query_as::<_, Hotel>(
            r#"
            INSERT INTO hotels (company_id, name, code, city, country, total_rooms, currency)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 'USD'))
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(&payload.name)
        .bind(payload.code.as_deref())
        .bind(payload.city.as_deref())
        .bind(payload.country.as_deref())
        .bind(payload.total_rooms)
        .bind(payload.currency.as_deref().map(str::to_uppercase))
        .fetch_one(&self.pool)
        .await?;
        Ok(hotel)
    }

    pub async fn update(
        &self,
        company_id: Uuid,
        hotel_id: Uuid,
        payload: &HotelPayload,
    ) -> Result<Option<Hotel>, AppError> {
        let hotel = sqlx::query_as::<_, Hotel>(
            r#"
            UPDATE hotels
            SET name = $3, code = $4, city = $5, country = $6, total_rooms = $7,
                currency = COALESCE($8, currency), updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING *
            "#,
        )
        .bind(hotel_id)
        .bind(company_id)
        .bind(&payload.name)
        .bind(payload.code.as_deref())
        .bind(payload.city.as_deref())
        .bind(payload.country.as_deref())
        .bind(payload.total_rooms)
        .bind(payload.currency.as_deref().map(str::to_uppercase))
        .fetch_optional(&self.pool)
        .await?;
        Ok(hotel)
    }

    /// Deletes the hotel and its dependent rows. Upload data is detached, not
    /// deleted, so the batches stay visible to the company.
    pub async fn delete_cascade(&self, conn: &mut PgConnection, hotel_id: Uuid) -> Result<u64, AppError> {
        for statement in HOTEL_CASCADE {
            sqlx::query(statement).bind(hotel_id).execute(&mut *conn).await?;
        }

        let result = sqlx::query("DELETE FROM hotels WHERE id = $1")
            .bind(hotel_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    //  ROOM TYPES
    // =========================================================================

    pub async fn list_room_types(&self, hotel_id: Uuid) -> Result<Vec<RoomType>, AppError> {
        let rows = sqlx::query_as::<_, RoomType>("SELECT * FROM room_types WHERE hotel_id = $1 ORDER BY name")
            .bind(hotel_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn create_room_type(&self, hotel_id: Uuid, payload: &RoomTypePayload) -> Result<RoomType, AppError> {
        let row = sqlx::query_as::<_, RoomType>(
            r#"
            INSERT INTO room_types (hotel_id, name, capacity, room_count)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(hotel_id)
        .bind(&payload.name)
        .bind(payload.capacity)
        .bind(payload.room_count)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn update_room_type(
        &self,
        hotel_id: Uuid,
        room_type_id: Uuid,
        payload: &RoomTypePayload,
    ) -> Result<Option<RoomType>, AppError> {
        let row = sqlx::query_as::<_, RoomType>(
            r#"
            UPDATE room_types
            SET name = $3, capacity = $4, room_count = $5, updated_at = NOW()
            WHERE id = $1 AND hotel_id = $2
            RETURNING *
            "#,
        )
        .bind(room_type_id)
        .bind(hotel_id)
        .bind(&payload.name)
        .bind(payload.capacity)
        .bind(payload.room_count)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete_room_type(&self, hotel_id: Uuid, room_type_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM room_types WHERE id = $1 AND hotel_id = $2")
            .bind(room_type_id)
            .bind(hotel_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    //  RATE CATEGORIES
    // =========================================================================

    pub async fn list_rate_categories(&self, hotel_id: Uuid) -> Result<Vec<RateCategory>, AppError> {
        let rows = sqlx::query_as::<_, RateCategory>(
            "SELECT * FROM rate_categories WHERE hotel_id = $1 ORDER BY name",
        )
        .bind(hotel_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create_rate_category(
        &self,
        hotel_id: Uuid,
        payload: &RateCategoryPayload,
    ) -> Result<RateCategory, AppError> {
        let row = sqlx::query_as::<_, RateCategory>(
            r#"
            INSERT INTO rate_categories (hotel_id, name, description, base_rate)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(hotel_id)
        .bind(&payload.name)
        .bind(payload.description.as_deref())
        .bind(payload.base_rate)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn update_rate_category(
        &self,
        hotel_id: Uuid,
        category_id: Uuid,
        payload: &RateCategoryPayload,
    ) -> Result<Option<RateCategory>, AppError> {
        let row = sqlx::query_as::<_, RateCategory>(
            r#"
            UPDATE rate_categories
            SET name = $3, description = $4, base_rate = $5, updated_at = NOW()
            WHERE id = $1 AND hotel_id = $2
            RETURNING *
            "#,
        )
        .bind(category_id)
        .bind(hotel_id)
        .bind(&payload.name)
        .bind(payload.description.as_deref())
        .bind(payload.base_rate)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete_rate_category(&self, hotel_id: Uuid, category_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM rate_categories WHERE id = $1 AND hotel_id = $2")
            .bind(category_id)
            .bind(hotel_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(table: &str) -> usize {
        HOTEL_CASCADE
            .iter()
            .position(|sql| sql.contains(&format!(" {} ", table)))
            .unwrap()
    }

    #[test]
    fn scraped_rates_go_before_their_source_mapping() {
        assert!(position("scraped_rates") < position("scrape_source_hotels"));
    }

    #[test]
    fn uploaded_data_is_detached_not_deleted() {
        for table in ["meta_upload_data", "uploaded_extract_data_files"] {
            let sql = HOTEL_CASCADE[position(table)];
            assert!(sql.starts_with("UPDATE"), "{}", sql);
            assert!(sql.contains("SET hotel_id = NULL"), "{}", sql);
        }
    }

    #[test]
    fn every_step_is_scoped_to_the_hotel() {
        assert!(HOTEL_CASCADE.iter().all(|sql| sql.ends_with("WHERE hotel_id = $1")));
        assert!(HOTEL_CASCADE.iter().all(|sql| !sql.contains("FROM hotels")));
    }
}
