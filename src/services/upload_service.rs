// src/services/upload_service.rs

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{HotelRepository, UploadRepository},
    models::{
        auth::User,
        upload::{
            ConfirmUploadPayload, FileType, HotelDataQuery, RowsQuery, UploadAccepted, UploadData,
            UploadDetail, UploadListQuery, UploadStatus, UploadedExtractDataFile,
        },
    },
    services::{
        ingest::{ingest_file, normalize::date_range},
        notification_service::NotificationService,
    },
};

const PREVIEW_ROWS: usize = 10;

/// `str` files carry a report flavour (`str` or `ocr`); other types take any
/// free-text label.
pub fn normalize_report_type(file_type: FileType, report_type: Option<&str>) -> Result<Option<String>, AppError> {
    let report_type = report_type.map(str::trim).filter(|r| !r.is_empty());
    match (file_type, report_type) {
        (FileType::Str, None) => Ok(Some("str".to_string())),
        (FileType::Str, Some(r)) => match r.to_lowercase().as_str() {
            flavour @ ("str" | "ocr") => Ok(Some(flavour.to_string())),
            other => Err(AppError::bad_request(format!(
                "Unknown report type '{}' for an STR file; use 'str' or 'ocr'.",
                other
            ))),
        },
        (_, r) => Ok(r.map(str::to_string)),
    }
}

/// Requested bounds fall back to the rows' own range; start must not be
/// after end.
pub fn resolve_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    rows: Option<(NaiveDate, NaiveDate)>,
) -> Result<(NaiveDate, NaiveDate), AppError> {
    let start = start
        .or(rows.map(|(first, _)| first))
        .ok_or_else(|| AppError::bad_request("startDate is required: the upload has no dated rows."))?;
    let end = end
        .or(rows.map(|(_, last)| last))
        .ok_or_else(|| AppError::bad_request("endDate is required: the upload has no dated rows."))?;

    if start > end {
        return Err(AppError::bad_request("startDate must be on or before endDate."));
    }
    Ok((start, end))
}

/// Only a pending batch can be confirmed.
pub fn ensure_pending(status: UploadStatus) -> Result<(), AppError> {
    match status {
        UploadStatus::Pending => Ok(()),
        UploadStatus::Saved => Err(AppError::conflict("This upload has already been confirmed.")),
    }
}

/// One metadata record per (upload, hotel, start, end).
pub fn ensure_not_registered(already_registered: bool) -> Result<(), AppError> {
    if already_registered {
        return Err(AppError::conflict(
            "This upload is already registered for the same hotel and dates.",
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct UploadService {
    repo: UploadRepository,
    hotel_repo: HotelRepository,
    notifications: NotificationService,
    pool: PgPool,
}

impl UploadService {
    pub fn new(
        repo: UploadRepository,
        hotel_repo: HotelRepository,
        notifications: NotificationService,
        pool: PgPool,
    ) -> Self {
        Self { repo, hotel_repo, notifications, pool }
    }

    /// Parses and validates the whole file, then stages it in one transaction.
    /// A single bad row rejects the file and nothing is stored.
    pub async fn upload(
        &self,
        company_id: Uuid,
        uploader: &User,
        file_name: String,
        bytes: Vec<u8>,
        file_type: FileType,
        report_type: Option<&str>,
    ) -> Result<UploadAccepted, AppError> {
        let report_type = normalize_report_type(file_type, report_type)?;

        let parse_name = file_name.clone();
        let rows = tokio::task::spawn_blocking(move || ingest_file(&parse_name, &bytes, file_type))
            .await
            .map_err(|e| anyhow::anyhow!("file parsing task failed: {}", e))??;

        let row_count = i32::try_from(rows.len())
            .map_err(|_| AppError::bad_request("The file has too many rows."))?;

        let mut tx = self.pool.begin().await?;
        let upload = self
            .repo
            .create_upload(
                &mut tx,
                company_id,
                uploader.id,
                &file_name,
                file_type,
                report_type.as_deref(),
                row_count,
                date_range(&rows),
            )
            .await?;
        self.repo.insert_rows(&mut tx, &upload, &rows).await?;
        tx.commit().await?;

        tracing::info!(
            upload_id = %upload.id,
            file_type = %file_type,
            rows = row_count,
            "📄 Upload staged: {}",
            file_name
        );

        let preview = rows.into_iter().take(PREVIEW_ROWS).collect();
        Ok(UploadAccepted { upload, preview })
    }

    pub async fn list(&self, company_id: Uuid, query: &UploadListQuery) -> Result<Vec<UploadData>, AppError> {
        self.repo.list(company_id, query.status, query.file_type).await
    }

    async fn get(&self, company_id: Uuid, upload_id: Uuid) -> Result<UploadData, AppError> {
        self.repo
            .find(company_id, upload_id)
            .await?
            .ok_or(AppError::NotFound("Upload"))
    }

    pub async fn detail(&self, company_id: Uuid, upload_id: Uuid) -> Result<UploadDetail, AppError> {
        let upload = self.get(company_id, upload_id).await?;
        let meta = self.repo.list_meta(upload.id).await?;
        Ok(UploadDetail { upload, meta })
    }

    pub async fn rows(
        &self,
        company_id: Uuid,
        upload_id: Uuid,
        query: &RowsQuery,
    ) -> Result<Vec<UploadedExtractDataFile>, AppError> {
        let upload = self.get(company_id, upload_id).await?;
        let (limit, offset) = query.limit_offset();
        self.repo.list_rows(upload.id, limit, offset).await
    }

    /// Attaches a pending batch to a hotel and a date range and promotes its
    /// rows to `saved`.
    pub async fn confirm(
        &self,
        company_id: Uuid,
        actor: &User,
        upload_id: Uuid,
        payload: &ConfirmUploadPayload,
    ) -> Result<UploadDetail, AppError> {
        let hotel = self
            .hotel_repo
            .find(company_id, payload.hotel_id)
            .await?
            .ok_or(AppError::NotFound("Hotel"))?;

        let mut tx = self.pool.begin().await?;

        let upload = self
            .repo
            .find_for_update(&mut tx, company_id, upload_id)
            .await?
            .ok_or(AppError::NotFound("Upload"))?;

        ensure_pending(upload.status)?;

        let row_range = self.repo.row_date_range(&mut tx, upload.id).await?;
        let (start, end) = resolve_range(payload.start_date, payload.end_date, row_range)?;

        ensure_not_registered(self.repo.meta_exists(&mut tx, upload.id, hotel.id, start, end).await?)?;

        self.repo.create_meta(&mut tx, upload.id, hotel.id, start, end).await?;
        let upload = self.repo.promote(&mut tx, upload.id, hotel.id).await?;

        let link = format!("/uploads/{}", upload.id);
        self.notifications
            .notify(
                &mut *tx,
                upload.uploaded_by,
                "Upload saved",
                &format!(
                    "{} ({} rows) is now saved for {} ({} to {}).",
                    upload.file_name, upload.row_count, hotel.name, start, end
                ),
                Some(&link),
            )
            .await?;

        tx.commit().await?;

        tracing::info!(upload_id = %upload.id, hotel_id = %hotel.id, confirmed_by = %actor.id, "Upload confirmed");

        let meta = self.repo.list_meta(upload.id).await?;
        Ok(UploadDetail { upload, meta })
    }

    pub async fn delete(&self, company_id: Uuid, upload_id: Uuid) -> Result<(), AppError> {
        let upload = self.get(company_id, upload_id).await?;

        let mut tx = self.pool.begin().await?;
        self.repo.delete_cascade(&mut tx, upload.id).await?;
        tx.commit().await?;

        tracing::info!(upload_id = %upload.id, "Upload deleted");
        Ok(())
    }

    pub async fn hotel_data(
        &self,
        company_id: Uuid,
        hotel_id: Uuid,
        query: &HotelDataQuery,
    ) -> Result<Vec<UploadedExtractDataFile>, AppError> {
        let hotel = self
            .hotel_repo
            .find(company_id, hotel_id)
            .await?
            .ok_or(AppError::NotFound("Hotel"))?;
        self.repo
            .saved_rows_for_hotel(hotel.id, query.file_type, query.from, query.to)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[test]
    fn range_defaults_to_the_rows() {
        assert_eq!(resolve_range(None, None, Some((d(1), d(31)))).unwrap(), (d(1), d(31)));
        assert_eq!(resolve_range(Some(d(5)), None, Some((d(1), d(31)))).unwrap(), (d(5), d(31)));
        assert_eq!(resolve_range(Some(d(2)), Some(d(3)), None).unwrap(), (d(2), d(3)));
    }

    #[test]
    fn inverted_or_missing_range_is_a_bad_request() {
        assert!(matches!(resolve_range(Some(d(10)), Some(d(9)), None), Err(AppError::BadRequest(_))));
        assert!(matches!(resolve_range(None, Some(d(1)), Some((d(5), d(6)))), Err(AppError::BadRequest(_))));
        assert!(matches!(resolve_range(None, None, None), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn confirming_twice_is_a_conflict() {
        assert!(ensure_pending(UploadStatus::Pending).is_ok());
        assert!(matches!(ensure_pending(UploadStatus::Saved), Err(AppError::Conflict(_))));
    }

    #[test]
    fn duplicate_metadata_is_a_conflict() {
        assert!(ensure_not_registered(false).is_ok());
        assert!(matches!(ensure_not_registered(true), Err(AppError::Conflict(_))));
    }

    #[test]
    fn str_report_types() {
        assert_eq!(normalize_report_type(FileType::Str, None).unwrap().as_deref(), Some("str"));
        assert_eq!(normalize_report_type(FileType::Str, Some(" OCR ")).unwrap().as_deref(), Some("ocr"));
        assert!(normalize_report_type(FileType::Str, Some("pdf")).is_err());
        assert_eq!(normalize_report_type(FileType::Booking, Some("")).unwrap(), None);
        assert_eq!(
            normalize_report_type(FileType::Booking, Some("pickup")).unwrap().as_deref(),
            Some("pickup")
        );
    }
}
