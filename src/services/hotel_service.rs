// src/services/hotel_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::HotelRepository,
    models::hotel::{
        Hotel, HotelDetail, HotelPayload, RateCategory, RateCategoryPayload, RoomType, RoomTypePayload,
    },
};

#[derive(Clone)]
pub struct HotelService {
    repo: HotelRepository,
    pool: PgPool,
}

impl HotelService {
    pub fn new(repo: HotelRepository, pool: PgPool) -> Self {
        Self { repo, pool }
    }

    // =========================================================================
    //  HOTELS
    // =========================================================================

    pub async fn list(&self, company_id: Uuid) -> Result<Vec<Hotel>, AppError> {
        self.repo.list(company_id).await
    }

    /// Tenant check used by every nested resource.
    pub async fn get(&self, company_id: Uuid, hotel_id: Uuid) -> Result<Hotel, AppError> {
        self.repo
            .find(company_id, hotel_id)
            .await?
            .ok_or(AppError::NotFound("Hotel"))
    }

    pub async fn detail(&self, company_id: Uuid, hotel_id: Uuid) -> Result<HotelDetail, AppError> {
        let hotel = self.get(company_id, hotel_id).await?;
        let room_types = self.repo.list_room_types(hotel.id).await?;
        let rate_categories = self.repo.list_rate_categories(hotel.id).await?;
        Ok(HotelDetail { hotel, room_types, rate_categories })
    }

    pub async fn create(&self, company_id: Uuid, payload: &HotelPayload) -> Result<Hotel, AppError> {
        let hotel = self.repo.create(company_id, payload).await?;
        tracing::info!(hotel_id = %hotel.id, company_id = %company_id, "Hotel created");
        Ok(hotel)
    }

    pub async fn update(&self, company_id: Uuid, hotel_id: Uuid, payload: &HotelPayload) -> Result<Hotel, AppError> {
        self.repo
            .update(company_id, hotel_id, payload)
            .await?
            .ok_or(AppError::NotFound("Hotel"))
    }

    /// Removes the hotel and everything hanging off it in one transaction.
    /// Upload history is kept but detached from the hotel.
    pub async fn delete(&self, company_id: Uuid, hotel_id: Uuid) -> Result<(), AppError> {
        let hotel = self.get(company_id, hotel_id).await?;

        let mut tx = self.pool.begin().await?;
        self.repo.delete_cascade(&mut tx, hotel.id).await?;
        tx.commit().await?;

        tracing::info!(hotel_id = %hotel.id, "Hotel deleted");
        Ok(())
    }

    // =========================================================================
    //  ROOM TYPES
    // =========================================================================

    pub async fn list_room_types(&self, company_id: Uuid, hotel_id: Uuid) -> Result<Vec<RoomType>, AppError> {
        let hotel = self.get(company_id, hotel_id).await?;
        self.repo.list_room_types(hotel.id).await
    }

    pub async fn create_room_type(
        &self,
        company_id: Uuid,
        hotel_id: Uuid,
        payload: &RoomTypePayload,
    ) -> Result<RoomType, AppError> {
        let hotel = self.get(company_id, hotel_id).await?;
        self.repo.create_room_type(hotel.id, payload).await
    }

    pub async fn update_room_type(
        &self,
        company_id: Uuid,
        hotel_id: Uuid,
        room_type_id: Uuid,
        payload: &RoomTypePayload,
    ) -> Result<RoomType, AppError> {
        let hotel = self.get(company_id, hotel_id).await?;
        self.repo
            .update_room_type(hotel.id, room_type_id, payload)
            .await?
            .ok_or(AppError::NotFound("Room type"))
    }

    pub async fn delete_room_type(&self, company_id: Uuid, hotel_id: Uuid, room_type_id: Uuid) -> Result<(), AppError> {
        let hotel = self.get(company_id, hotel_id).await?;
        match self.repo.delete_room_type(hotel.id, room_type_id).await? {
            0 => Err(AppError::NotFound("Room type")),
            _ => Ok(()),
        }
    }

    // =========================================================================
    //  RATE CATEGORIES
    // =========================================================================

    pub async fn list_rate_categories(&self, company_id: Uuid, hotel_id: Uuid) -> Result<Vec<RateCategory>, AppError> {
        let hotel = self.get(company_id, hotel_id).await?;
        self.repo.list_rate_categories(hotel.id).await
    }

    pub async fn create_rate_category(
        &self,
        company_id: Uuid,
        hotel_id: Uuid,
        payload: &RateCategoryPayload,
    ) -> Result<RateCategory, AppError> {
        let hotel = self.get(company_id, hotel_id).await?;
        self.repo.create_rate_category(hotel.id, payload).await
    }

    pub async fn update_rate_category(
        &self,
        company_id: Uuid,
        hotel_id: Uuid,
        category_id: Uuid,
        payload: &RateCategoryPayload,
    ) -> Result<RateCategory, AppError> {
        let hotel = self.get(company_id, hotel_id).await?;
        self.repo
            .update_rate_category(hotel.id, category_id, payload)
            .await?
            .ok_or(AppError::NotFound("Rate category"))
    }

    pub async fn delete_rate_category(&self, company_id: Uuid, hotel_id: Uuid, category_id: Uuid) -> Result<(), AppError> {
        let hotel = self.get(company_id, hotel_id).await?;
        match self.repo.delete_rate_category(hotel.id, category_id).await? {
            0 => Err(AppError::NotFound("Rate category")),
            _ => Ok(()),
        }
    }
}
