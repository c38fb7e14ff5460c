// src/db/upload_repo.rs

use chrono::NaiveDate;
use sqlx::{types::Json, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        forecast::{CompetitorRateSummary, DailyPerformance},
        upload::{
            FileType, MetaUploadData, NormalizedRow, UploadData, UploadStatus,
            UploadedExtractDataFile,
        },
    },
};

// Postgres caps a statement at 65535 bind parameters; each row uses 7.
const INSERT_CHUNK: usize = 5_000;

#[derive(Clone)]
pub struct UploadRepository {
    pool: PgPool,
}

impl UploadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  STAGING
    // =========================================================================

    pub async fn create_upload(
        &self,
        conn: &mut PgConnection,
        company_id: Uuid,
        uploaded_by: Uuid,
        file_name: &str,
        file_type: FileType,
        report_type: Option<&str>,
        row_count: i32,
        date_range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<UploadData, AppError> {
        let upload = sqlx::query_as::<_, UploadData>(
            r#"
            INSERT INTO upload_data
                (company_id, uploaded_by, file_name, file_type, report_type, row_count, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(uploaded_by)
        .bind(file_name)
        .bind(file_type)
        .bind(report_type)
        .bind(row_count)
        .bind(date_range.map(|(start, _)| start))
        .bind(date_range.map(|(_, end)| end))
        .fetch_one(&mut *conn)
        .await?;
        Ok(upload)
    }

    pub async fn insert_rows(
        &self,
        conn: &mut PgConnection,
        upload: &UploadData,
        rows: &[NormalizedRow],
    ) -> Result<(), AppError> {
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO uploaded_extract_data_files \
                 (upload_data_id, company_id, file_type, report_type, row_number, stay_date, data) ",
            );
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(upload.id)
                    .push_bind(upload.company_id)
                    .push_bind(upload.file_type)
                    .push_bind(upload.report_type.clone())
                    .push_bind(row.row_number as i32)
                    .push_bind(row.stay_date)
                    .push_bind(Json(row.data.clone()));
            });
            builder.build().execute(&mut *conn).await?;
        }
        Ok(())
    }

    pub async fn list(
        &self,
        company_id: Uuid,
        status: Option<UploadStatus>,
        file_type: Option<FileType>,
    ) -> Result<Vec<UploadData>, AppError> {
        let uploads = sqlx::query_as::<_, UploadData>(
            r#"
            SELECT * FROM upload_data
            WHERE company_id = $1
              AND ($2::upload_status IS NULL OR status = $2)
              AND ($3::upload_file_type IS NULL OR file_type = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(company_id)
        .bind(status)
        .bind(file_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(uploads)
    }

    pub async fn find(&self, company_id: Uuid, upload_id: Uuid) -> Result<Option<UploadData>, AppError> {
        let upload = sqlx::query_as::<_, UploadData>(
            "SELECT * FROM upload_data WHERE id = $1 AND company_id = $2",
        )
        .bind(upload_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(upload)
    }

    /// Same as `find` but row-locks the batch for the rest of the transaction.
    pub async fn find_for_update(
        &self,
        conn: &mut PgConnection,
        company_id: Uuid,
        upload_id: Uuid,
    ) -> Result<Option<UploadData>, AppError> {
        let upload = sqlx::query_as::<_, UploadData>(
            "SELECT * FROM upload_data WHERE id = $1 AND company_id = $2 FOR UPDATE",
        )
        .bind(upload_id)
        .bind(company_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(upload)
    }

    pub async fn list_meta(&self, upload_id: Uuid) -> Result<Vec<MetaUploadData>, AppError> {
        let meta = sqlx::query_as::<_, MetaUploadData>(
            "SELECT * FROM meta_upload_data WHERE upload_data_id = $1 ORDER BY created_at",
        )
        .bind(upload_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(meta)
    }

    pub async fn list_rows(
        &self,
        upload_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UploadedExtractDataFile>, AppError> {
        let rows = sqlx::query_as::<_, UploadedExtractDataFile>(
            r#"
            SELECT * FROM uploaded_extract_data_files
            WHERE upload_data_id = $1
            ORDER BY row_number
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(upload_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // =========================================================================
    //  CONFIRMATION
    // =========================================================================

    pub async fn row_date_range(
        &self,
        conn: &mut PgConnection,
        upload_id: Uuid,
    ) -> Result<Option<(NaiveDate, NaiveDate)>, AppError> {
        let range: (Option<NaiveDate>, Option<NaiveDate>) = sqlx::query_as(
            "SELECT MIN(stay_date), MAX(stay_date) FROM uploaded_extract_data_files WHERE upload_data_id = $1",
        )
        .bind(upload_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(range.0.zip(range.1))
    }

    pub async fn meta_exists(
        &self,
        conn: &mut PgConnection,
        upload_id: Uuid,
        hotel_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM meta_upload_data
                WHERE upload_data_id = $1 AND hotel_id = $2 AND start_date = $3 AND end_date = $4
            )
            "#,
        )
        .bind(upload_id)
        .bind(hotel_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(&mut *conn)
        .await?;
        Ok(exists)
    }

    pub async fn create_meta(
        &self,
        conn: &mut PgConnection,
        upload_id: Uuid,
        hotel_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<MetaUploadData, AppError> {
        let meta = sqlx::query_as::<_, MetaUploadData>(
            r#"
            INSERT INTO meta_upload_data (upload_data_id, hotel_id, start_date, end_date)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(upload_id)
        .bind(hotel_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(&mut *conn)
        .await?;
        Ok(meta)
    }

    /// Promotes the staged rows of a batch and the batch itself to `saved`.
    pub async fn promote(
        &self,
        conn: &mut PgConnection,
        upload_id: Uuid,
        hotel_id: Uuid,
    ) -> Result<UploadData, AppError> {
        sqlx::query(
            r#"
            UPDATE uploaded_extract_data_files
            SET status = 'saved', hotel_id = $2
            WHERE upload_data_id = $1
            "#,
        )
        .bind(upload_id)
        .bind(hotel_id)
        .execute(&mut *conn)
        .await?;

        let upload = sqlx::query_as::<_, UploadData>(
            "UPDATE upload_data SET status = 'saved', updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(upload_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(upload)
    }

    pub async fn delete_cascade(&self, conn: &mut PgConnection, upload_id: Uuid) -> Result<u64, AppError> {
        sqlx::query("DELETE FROM uploaded_extract_data_files WHERE upload_data_id = $1")
            .bind(upload_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM meta_upload_data WHERE upload_data_id = $1")
            .bind(upload_id)
            .execute(&mut *conn)
            .await?;
        let result = sqlx::query("DELETE FROM upload_data WHERE id = $1")
            .bind(upload_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    //  SAVED DATA (reports / forecast)
    // =========================================================================

    pub async fn saved_rows_for_hotel(
        &self,
        hotel_id: Uuid,
        file_type: Option<FileType>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<UploadedExtractDataFile>, AppError> {
        let rows = sqlx::query_as::<_, UploadedExtractDataFile>(
            r#"
            SELECT * FROM uploaded_extract_data_files
            WHERE hotel_id = $1
              AND status = 'saved'
              AND ($2::upload_file_type IS NULL OR file_type = $2)
              AND ($3::date IS NULL OR stay_date >= $3)
              AND ($4::date IS NULL OR stay_date <= $4)
            ORDER BY stay_date, row_number
            "#,
        )
        .bind(hotel_id)
        .bind(file_type)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn daily_performance(
        &self,
        hotel_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyPerformance>, AppError> {
        let rows = sqlx::query_as::<_, DailyPerformance>(
            r#"
            SELECT stay_date,
                   COALESCE(SUM((data->>'roomsSold')::bigint), 0)::bigint AS rooms_sold,
                   COALESCE(SUM((data->>'revenue')::numeric), 0) AS revenue
            FROM uploaded_extract_data_files
            WHERE hotel_id = $1 AND status = 'saved' AND file_type = 'booking'
              AND stay_date BETWEEN $2 AND $3
            GROUP BY stay_date
            ORDER BY stay_date
            "#,
        )
        .bind(hotel_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn competitor_rates(
        &self,
        hotel_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CompetitorRateSummary>, AppError> {
        let rows = sqlx::query_as::<_, CompetitorRateSummary>(
            r#"
            SELECT stay_date, AVG((data->>'rate')::numeric) AS average_rate
            FROM uploaded_extract_data_files
            WHERE hotel_id = $1 AND status = 'saved' AND file_type = 'competitor'
              AND stay_date BETWEEN $2 AND $3
            GROUP BY stay_date
            ORDER BY stay_date
            "#,
        )
        .bind(hotel_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
