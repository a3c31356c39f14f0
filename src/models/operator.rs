//! Operator (receptionist/administrator) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;

/// Operator roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OperatorRole {
    Admin,
    Reception,
}

impl OperatorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorRole::Admin => "admin",
            OperatorRole::Reception => "reception",
        }
    }
}

impl std::fmt::Display for OperatorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OperatorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(OperatorRole::Admin),
            "reception" => Ok(OperatorRole::Reception),
            _ => Err(format!("Invalid operator role: {}", s)),
        }
    }
}

// SQLx conversion for OperatorRole (stored as TEXT)
impl sqlx::Type<Postgres> for OperatorRole {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for OperatorRole {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for OperatorRole {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// Full operator model from database
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Operator {
    pub id: i32,
    pub username: String,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: OperatorRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Public operator representation returned by auth endpoints
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OperatorInfo {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: OperatorRole,
}

impl From<&Operator> for OperatorInfo {
    fn from(op: &Operator) -> Self {
        OperatorInfo {
            id: op.id,
            username: op.username.clone(),
            email: op.email.clone(),
            role: op.role,
        }
    }
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: OperatorInfo,
}

/// JWT claims for authenticated operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorClaims {
    pub sub: String,
    pub operator_id: i32,
    pub email: String,
    pub role: OperatorRole,
    pub exp: i64,
    pub iat: i64,
}

impl OperatorClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Check if operator is admin
    pub fn is_admin(&self) -> bool {
        self.role == OperatorRole::Admin
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Administrator privileges required".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claims(exp_offset_secs: i64) -> OperatorClaims {
        let now = Utc::now().timestamp();
        OperatorClaims {
            sub: "alice".to_string(),
            operator_id: 3,
            email: "alice@frontdesk.local".to_string(),
            role: OperatorRole::Reception,
            exp: now + exp_offset_secs,
            iat: now,
        }
    }

    #[test]
    fn token_round_trip_preserves_identity() {
        let claims = claims(3600);
        let token = claims.create_token("secret").unwrap();
        let parsed = OperatorClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.sub, "alice");
        assert_eq!(parsed.operator_id, 3);
        assert_eq!(parsed.role, OperatorRole::Reception);
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = claims(-3600);
        let token = claims.create_token("secret").unwrap();
        let err = OperatorClaims::from_token(&token, "secret").unwrap_err();
        assert!(matches!(
            err.kind(),
            jsonwebtoken::errors::ErrorKind::ExpiredSignature
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = claims(3600).create_token("secret").unwrap();
        assert!(OperatorClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn reception_is_not_admin() {
        let claims = claims(3600);
        assert!(claims.require_admin().is_err());
    }

    #[test]
    fn role_parses_from_strings() {
        assert_eq!("admin".parse::<OperatorRole>().unwrap(), OperatorRole::Admin);
        assert_eq!(
            "Reception".parse::<OperatorRole>().unwrap(),
            OperatorRole::Reception
        );
        assert!("manager".parse::<OperatorRole>().is_err());
    }
}
