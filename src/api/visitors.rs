//! Visitor check-in/check-out endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::visitor::{CreateVisitorRequest, VisitorListResponse, VisitorQuery, VisitorRecord},
    services::visitors::PUBLIC_KIOSK,
};

use super::{AuthenticatedOperator, ClientMeta, MaybeOperator};

/// Check-in response with the generated pass
#[derive(Serialize, ToSchema)]
pub struct CreateVisitorResponse {
    pub success: bool,
    /// Ledger identifier of the new record
    pub id: i64,
    /// Human-facing pass identifier printed on the QR pass
    pub qr_pass_id: String,
    /// Embeddable data-URI PNG of the QR pass
    pub qr_code: String,
    pub visitor: VisitorRecord,
}

/// Checkout response
#[derive(Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub success: bool,
    pub checkout_time: DateTime<Utc>,
}

/// Check a visitor in.
///
/// In the default kiosk deployment no authentication is required and the
/// record is attributed to the public kiosk; with public check-in disabled
/// an operator token is mandatory.
#[utoipa::path(
    post,
    path = "/visitors",
    tag = "visitors",
    request_body = CreateVisitorRequest,
    responses(
        (status = 201, description = "Visitor checked in", body = CreateVisitorResponse),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Authentication required by this deployment")
    )
)]
pub async fn create_visitor(
    State(state): State<crate::AppState>,
    MaybeOperator(operator): MaybeOperator,
    meta: ClientMeta,
    Json(request): Json<CreateVisitorRequest>,
) -> AppResult<(StatusCode, Json<CreateVisitorResponse>)> {
    if !state.config.visitor.public_checkin && operator.is_none() {
        return Err(AppError::MissingToken);
    }

    let created_by = operator
        .as_ref()
        .map(|claims| claims.sub.clone())
        .unwrap_or_else(|| PUBLIC_KIOSK.to_string());

    let (record, qr_code) = state
        .services
        .visitors
        .check_in(request, &created_by, meta.ip, meta.user_agent)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateVisitorResponse {
            success: true,
            id: record.id,
            qr_pass_id: record.qr_pass_id.clone(),
            qr_code,
            visitor: record,
        }),
    ))
}

/// Check a visitor out. At most one call per visitor ever succeeds.
#[utoipa::path(
    put,
    path = "/visitors/{id}/checkout",
    tag = "visitors",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Visitor record ID")
    ),
    responses(
        (status = 200, description = "Visitor checked out", body = CheckoutResponse),
        (status = 404, description = "No such visitor"),
        (status = 409, description = "Already checked out")
    )
)]
pub async fn checkout_visitor(
    State(state): State<crate::AppState>,
    AuthenticatedOperator(claims): AuthenticatedOperator,
    meta: ClientMeta,
    Path(id): Path<i64>,
) -> AppResult<Json<CheckoutResponse>> {
    let checkout_time = state
        .services
        .visitors
        .check_out(id, &claims, meta.ip, meta.user_agent)
        .await?;

    Ok(Json(CheckoutResponse {
        success: true,
        checkout_time,
    }))
}

/// List visitor records with filters and pagination
#[utoipa::path(
    get,
    path = "/visitors",
    tag = "visitors",
    security(("bearer_auth" = [])),
    params(VisitorQuery),
    responses(
        (status = 200, description = "Filtered visitor page", body = VisitorListResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_visitors(
    State(state): State<crate::AppState>,
    AuthenticatedOperator(claims): AuthenticatedOperator,
    Query(query): Query<VisitorQuery>,
) -> AppResult<Json<VisitorListResponse>> {
    let response = state.services.visitors.list(&query, &claims).await?;
    Ok(Json(response))
}

/// Fetch one visitor record, photo included
#[utoipa::path(
    get,
    path = "/visitors/{id}",
    tag = "visitors",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Visitor record ID")
    ),
    responses(
        (status = 200, description = "Visitor record", body = VisitorRecord),
        (status = 404, description = "No such visitor")
    )
)]
pub async fn get_visitor(
    State(state): State<crate::AppState>,
    AuthenticatedOperator(_claims): AuthenticatedOperator,
    Path(id): Path<i64>,
) -> AppResult<Json<VisitorRecord>> {
    let record = state.services.visitors.get(id).await?;
    Ok(Json(record))
}
