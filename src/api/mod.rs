//! API handlers for Frontdesk REST endpoints

pub mod admin;
pub mod auth;
pub mod health;
pub mod openapi;
pub mod rate_limit;
pub mod visitors;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{
        header::{AUTHORIZATION, USER_AGENT},
        request::Parts,
    },
};
use std::net::SocketAddr;

use crate::{error::AppError, models::operator::OperatorClaims, AppState};

/// Extractor for authenticated operator from JWT token
pub struct AuthenticatedOperator(pub OperatorClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedOperator {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = claims_from_parts(parts, state)?.ok_or(AppError::MissingToken)?;
        Ok(AuthenticatedOperator(claims))
    }
}

/// Extractor that tolerates a missing Authorization header (kiosk-mode
/// check-in). A header that is present but invalid is still rejected.
pub struct MaybeOperator(pub Option<OperatorClaims>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeOperator {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeOperator(claims_from_parts(parts, state)?))
    }
}

fn claims_from_parts(parts: &Parts, state: &AppState) -> Result<Option<OperatorClaims>, AppError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = header.to_str().map_err(|_| AppError::InvalidToken)?;
    let Some(token) = value.strip_prefix("Bearer ") else {
        return Err(AppError::InvalidToken);
    };

    let claims = OperatorClaims::from_token(token, &state.config.auth.jwt_secret).map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        }
    })?;

    Ok(Some(claims))
}

/// Caller origin metadata, recorded with audit events
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientMeta {
            ip: client_ip(parts),
            user_agent: parts
                .headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        })
    }
}

/// First X-Forwarded-For hop when present, otherwise the socket peer
fn client_ip(parts: &Parts) -> Option<String> {
    if let Some(forwarded) = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
}
