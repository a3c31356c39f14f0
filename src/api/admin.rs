//! Administrative endpoints: statistics and history export

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{error::AppResult, services::export};

use super::AuthenticatedOperator;

/// Aggregates over one time window
#[derive(Debug, Serialize, ToSchema)]
pub struct WindowStats {
    pub total: i64,
    pub active: i64,
    pub checked_out: i64,
    pub distinct_hosts: i64,
    pub first_checkin: Option<DateTime<Utc>>,
    pub last_checkin: Option<DateTime<Utc>>,
    /// Mean visit length; open visits count against the current clock
    pub avg_visit_minutes: Option<f64>,
}

/// Visit count per host
#[derive(Debug, Serialize, ToSchema)]
pub struct HostCount {
    pub host_email: String,
    pub visits: i64,
}

/// Statistics response
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub today: WindowStats,
    pub week: WindowStats,
    pub month: WindowStats,
    pub all_time: WindowStats,
    pub top_hosts: Vec<HostCount>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

/// Export query parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct ExportQuery {
    pub start_date: Option<NaiveDate>,
    /// Inclusive end date
    pub end_date: Option<NaiveDate>,
    pub format: Option<ExportFormat>,
}

/// Aggregate visitor statistics (admin only)
#[utoipa::path(
    get,
    path = "/admin/stats",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Aggregate counts", body = StatsResponse),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn stats(
    State(state): State<crate::AppState>,
    AuthenticatedOperator(claims): AuthenticatedOperator,
) -> AppResult<Json<StatsResponse>> {
    claims.require_admin()?;

    let response = state.services.stats.get_stats().await?;
    Ok(Json(response))
}

/// Export visit history as CSV or JSON (admin only)
#[utoipa::path(
    get,
    path = "/admin/export",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(ExportQuery),
    responses(
        (status = 200, description = "Exported window"),
        (status = 403, description = "Admin role required")
    )
)]
pub async fn export(
    State(state): State<crate::AppState>,
    AuthenticatedOperator(claims): AuthenticatedOperator,
    Query(query): Query<ExportQuery>,
) -> AppResult<Response> {
    claims.require_admin()?;

    let (start, end) = state
        .services
        .export
        .resolve_window(query.start_date, query.end_date, Utc::now());
    let records = state.services.export.fetch(start, end).await?;

    match query.format.unwrap_or(ExportFormat::Csv) {
        ExportFormat::Json => Ok(Json(records).into_response()),
        ExportFormat::Csv => {
            let csv = export::to_csv(&records);
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"visitors.csv\"",
                    ),
                ],
                csv,
            )
                .into_response())
        }
    }
}
