//! Visitor record model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Visit lifecycle status. The only transition is checked_in -> checked_out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    CheckedIn,
    CheckedOut,
}

impl VisitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::CheckedIn => "checked_in",
            VisitStatus::CheckedOut => "checked_out",
        }
    }
}

impl std::fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VisitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checked_in" => Ok(VisitStatus::CheckedIn),
            "checked_out" => Ok(VisitStatus::CheckedOut),
            _ => Err(format!("Invalid visit status: {}", s)),
        }
    }
}

// SQLx conversion for VisitStatus (stored as TEXT)
impl sqlx::Type<Postgres> for VisitStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for VisitStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for VisitStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// Full visitor record from database
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct VisitorRecord {
    pub id: i64,
    pub visitor_name: String,
    pub mobile: Option<String>,
    pub host_employee: Option<String>,
    pub host_email: String,
    pub purpose: String,
    /// Base64-encoded photo payload, present only on by-id fetches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub qr_pass_id: String,
    /// JSON snapshot fixed at creation time; never updated on checkout
    pub qr_payload: String,
    pub checkin_time: DateTime<Utc>,
    pub checkout_time: Option<DateTime<Utc>>,
    pub status: VisitStatus,
    pub created_by: String,
}

/// Visitor row for listings and exports (photo and payload omitted)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct VisitorSummary {
    pub id: i64,
    pub visitor_name: String,
    pub mobile: Option<String>,
    pub host_employee: Option<String>,
    pub host_email: String,
    pub purpose: String,
    pub qr_pass_id: String,
    pub checkin_time: DateTime<Utc>,
    pub checkout_time: Option<DateTime<Utc>>,
    pub status: VisitStatus,
    pub created_by: String,
}

/// The snapshot encoded into the QR pass and stored alongside the record.
/// Field order is the serialization order; the payload must parse back to
/// the same id, name and check-in timestamp that were assigned at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrPayload {
    pub id: String,
    pub name: String,
    pub mobile: Option<String>,
    pub host: Option<String>,
    pub purpose: String,
    pub checkin: DateTime<Utc>,
    pub status: VisitStatus,
}

/// Fields of a record about to be inserted
#[derive(Debug, Clone)]
pub struct NewVisitorRecord {
    pub visitor_name: String,
    pub mobile: Option<String>,
    pub host_employee: Option<String>,
    pub host_email: String,
    pub purpose: String,
    pub photo: Option<String>,
    pub qr_pass_id: String,
    pub qr_payload: String,
    pub checkin_time: DateTime<Utc>,
    pub created_by: String,
}

/// Check-in request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateVisitorRequest {
    #[validate(length(min = 1, message = "visitor_name is required"))]
    pub visitor_name: String,
    pub mobile: Option<String>,
    pub host_employee: Option<String>,
    #[validate(email(message = "host_email must be a valid email address"))]
    pub host_email: String,
    #[validate(length(min = 1, message = "purpose is required"))]
    pub purpose: String,
    /// Optional visitor photo as base64 (a data-URI prefix is accepted)
    pub photo_base64: Option<String>,
}

/// Visitor listing query parameters
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct VisitorQuery {
    /// Restrict to visits checked in on this calendar date
    pub date: Option<NaiveDate>,
    pub status: Option<VisitStatus>,
    pub host_email: Option<String>,
    /// Case-insensitive substring match across name, mobile and host fields
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl VisitorQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }
}

/// Columns a listing may sort by. Anything else falls back to the default,
/// which keeps user input out of the ORDER BY clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    VisitorName,
    HostEmail,
    Status,
    CheckinTime,
    CheckoutTime,
}

impl SortColumn {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortColumn::VisitorName => "visitor_name",
            SortColumn::HostEmail => "host_email",
            SortColumn::Status => "status",
            SortColumn::CheckinTime => "checkin_time",
            SortColumn::CheckoutTime => "checkout_time",
        }
    }

    pub fn parse_or_default(s: Option<&str>) -> Self {
        match s {
            Some("visitor_name") => SortColumn::VisitorName,
            Some("host_email") => SortColumn::HostEmail,
            Some("status") => SortColumn::Status,
            Some("checkin_time") => SortColumn::CheckinTime,
            Some("checkout_time") => SortColumn::CheckoutTime,
            _ => SortColumn::CheckinTime,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn parse_or_default(s: Option<&str>) -> Self {
        match s.map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }
}

/// Pagination metadata for listings
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl PaginationMeta {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let pages = if total == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }
}

/// Visitor listing response
#[derive(Debug, Serialize, ToSchema)]
pub struct VisitorListResponse {
    pub visitors: Vec<VisitorSummary>,
    pub pagination: PaginationMeta,
}
