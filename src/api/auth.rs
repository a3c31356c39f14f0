//! Authentication endpoints

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    error::AppResult,
    models::operator::{LoginRequest, LoginResponse, OperatorInfo},
};

use super::{AuthenticatedOperator, ClientMeta};

/// Authenticate an operator and issue a session token
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account disabled"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    meta: ClientMeta,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    request.validate()?;

    let (token, operator) = state
        .services
        .auth
        .login(&request.username, &request.password, meta.ip, meta.user_agent)
        .await?;

    Ok(Json(LoginResponse {
        token,
        user: OperatorInfo::from(&operator),
    }))
}

/// Echo the authenticated principal
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current operator", body = OperatorInfo),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(AuthenticatedOperator(claims): AuthenticatedOperator) -> Json<OperatorInfo> {
    Json(OperatorInfo {
        id: claims.operator_id,
        username: claims.sub,
        email: claims.email,
        role: claims.role,
    })
}
