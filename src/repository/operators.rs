//! Operators repository for database operations

use sqlx::{Pool, Postgres};

use crate::{error::AppResult, models::operator::Operator};

#[derive(Clone)]
pub struct OperatorsRepository {
    pool: Pool<Postgres>,
}

impl OperatorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Look up an operator by username or email (both unique, case-insensitive)
    pub async fn get_by_login(&self, login: &str) -> AppResult<Option<Operator>> {
        let operator = sqlx::query_as::<_, Operator>(
            r#"
            SELECT * FROM operators
            WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($1)
            "#,
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(operator)
    }

    /// Stamp last_login_at. Callers treat failure as non-fatal.
    pub async fn touch_last_login(&self, id: i32) -> AppResult<()> {
        sqlx::query("UPDATE operators SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Seed the default administrator. Idempotent: an existing row with the
    /// bootstrap username is left untouched. Returns true when a row was
    /// actually created.
    pub async fn upsert_bootstrap_admin(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> AppResult<bool> {
        let created: Option<i32> = sqlx::query_scalar(
            r#"
            INSERT INTO operators (username, email, password_hash, role, is_active)
            VALUES ($1, $2, $3, 'admin', TRUE)
            ON CONFLICT (username) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(created.is_some())
    }
}
