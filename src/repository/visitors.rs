//! Visitor ledger repository: row storage and the check-in/check-out
//! state machine. The conditional update in `checkout` is the concurrency
//! guarantee: the WHERE clause is evaluated atomically with the write, so
//! of any number of concurrent checkouts for one id exactly one succeeds.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::visitor::{
        NewVisitorRecord, SortColumn, SortOrder, VisitStatus, VisitorQuery, VisitorRecord,
        VisitorSummary,
    },
};

const SUMMARY_COLUMNS: &str = "id, visitor_name, mobile, host_employee, host_email, purpose, \
     qr_pass_id, checkin_time, checkout_time, status, created_by";

#[derive(Clone)]
pub struct VisitorsRepository {
    pool: Pool<Postgres>,
}

impl VisitorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert a new record in state checked_in and return the stored row
    pub async fn create(&self, record: &NewVisitorRecord) -> AppResult<VisitorRecord> {
        let row = sqlx::query_as::<_, VisitorRecord>(
            r#"
            INSERT INTO visitor_records
                (visitor_name, mobile, host_employee, host_email, purpose, photo,
                 qr_pass_id, qr_payload, checkin_time, status, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'checked_in', $10)
            RETURNING *
            "#,
        )
        .bind(&record.visitor_name)
        .bind(&record.mobile)
        .bind(&record.host_employee)
        .bind(&record.host_email)
        .bind(&record.purpose)
        .bind(&record.photo)
        .bind(&record.qr_pass_id)
        .bind(&record.qr_payload)
        .bind(record.checkin_time)
        .bind(&record.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Get visitor record by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<VisitorRecord> {
        sqlx::query_as::<_, VisitorRecord>("SELECT * FROM visitor_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::VisitorNotFound(id))
    }

    /// Transition checked_in -> checked_out, conditioned on the current
    /// status. Zero rows affected is disambiguated into NotFound vs
    /// AlreadyCheckedOut so the caller can render a clear message.
    pub async fn checkout(&self, id: i64) -> AppResult<DateTime<Utc>> {
        let checkout_time: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            UPDATE visitor_records
            SET status = 'checked_out', checkout_time = NOW()
            WHERE id = $1 AND status = 'checked_in'
            RETURNING checkout_time
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match checkout_time {
            Some(time) => Ok(time),
            None => {
                let status: Option<VisitStatus> =
                    sqlx::query_scalar("SELECT status FROM visitor_records WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await?;

                match status {
                    Some(VisitStatus::CheckedOut) => Err(AppError::AlreadyCheckedOut(id)),
                    _ => Err(AppError::VisitorNotFound(id)),
                }
            }
        }
    }

    /// Search visitor records with filters and pagination.
    /// `creator_scope` restricts results to records created by that operator.
    pub async fn search(
        &self,
        query: &VisitorQuery,
        creator_scope: Option<&str>,
    ) -> AppResult<(Vec<VisitorSummary>, i64)> {
        let page = query.page();
        let limit = query.limit();
        let offset = (page - 1) * limit;

        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(creator) = creator_scope {
            params.push(creator.to_string());
            conditions.push(format!("created_by = ${}", params.len()));
        }

        if let Some(date) = query.date {
            params.push(date.to_string());
            conditions.push(format!("checkin_time::date = ${}::date", params.len()));
        }

        if let Some(status) = query.status {
            params.push(status.as_str().to_string());
            conditions.push(format!("status = ${}", params.len()));
        }

        if let Some(ref host_email) = query.host_email {
            params.push(host_email.clone());
            conditions.push(format!("LOWER(host_email) = LOWER(${})", params.len()));
        }

        if let Some(ref search) = query.search {
            params.push(format!("%{}%", search.to_lowercase()));
            let idx = params.len();
            conditions.push(format!(
                "(LOWER(visitor_name) LIKE ${idx} OR COALESCE(mobile, '') LIKE ${idx} \
                 OR LOWER(COALESCE(host_employee, '')) LIKE ${idx} OR LOWER(host_email) LIKE ${idx})"
            ));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        // Count the filtered set, independent of the page window
        let count_query = format!("SELECT COUNT(*) FROM visitor_records {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let sort_column = SortColumn::parse_or_default(query.sort_by.as_deref());
        let sort_order = SortOrder::parse_or_default(query.sort_order.as_deref());

        let select_query = format!(
            "SELECT {} FROM visitor_records {} ORDER BY {} {}, id {} LIMIT {} OFFSET {}",
            SUMMARY_COLUMNS,
            where_clause,
            sort_column.as_sql(),
            sort_order.as_sql(),
            sort_order.as_sql(),
            limit,
            offset
        );

        let mut select_builder = sqlx::query_as::<_, VisitorSummary>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let visitors = select_builder.fetch_all(&self.pool).await?;

        Ok((visitors, total))
    }

    /// Fetch an unpaginated window of records for export, ordered by check-in
    pub async fn export_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<VisitorSummary>> {
        let query = format!(
            "SELECT {} FROM visitor_records \
             WHERE checkin_time >= $1 AND checkin_time < $2 \
             ORDER BY checkin_time",
            SUMMARY_COLUMNS
        );

        let rows = sqlx::query_as::<_, VisitorSummary>(&query)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
