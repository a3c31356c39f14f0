//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{admin, auth, health, visitors};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Frontdesk API",
        version = "1.0.0",
        description = "Office Visitor Register REST API",
        contact(name = "Frontdesk Team")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        // Auth
        auth::login,
        auth::me,
        // Visitors
        visitors::create_visitor,
        visitors::checkout_visitor,
        visitors::list_visitors,
        visitors::get_visitor,
        // Admin
        admin::stats,
        admin::export,
    ),
    components(
        schemas(
            // Auth
            crate::models::operator::LoginRequest,
            crate::models::operator::LoginResponse,
            crate::models::operator::OperatorInfo,
            crate::models::operator::OperatorRole,
            // Visitors
            crate::models::visitor::CreateVisitorRequest,
            crate::models::visitor::VisitorRecord,
            crate::models::visitor::VisitorSummary,
            crate::models::visitor::VisitorListResponse,
            crate::models::visitor::PaginationMeta,
            crate::models::visitor::VisitStatus,
            visitors::CreateVisitorResponse,
            visitors::CheckoutResponse,
            // Admin
            admin::StatsResponse,
            admin::WindowStats,
            admin::HostCount,
            admin::ExportFormat,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "visitors", description = "Visitor check-in/check-out"),
        (name = "admin", description = "Statistics and export")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
