//! Audit log repository. Append-only; rows are never updated or deleted.

use sqlx::{Pool, Postgres};

use crate::{error::AppResult, models::audit::NewAuditEvent};

#[derive(Clone)]
pub struct AuditRepository {
    pool: Pool<Postgres>,
}

impl AuditRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Append one audit event
    pub async fn append(&self, event: &NewAuditEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log
                (actor, action, target_table, target_id, before_state, after_state,
                 ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&event.actor)
        .bind(event.action.as_str())
        .bind(event.target_table)
        .bind(&event.target_id)
        .bind(&event.before_state)
        .bind(&event.after_state)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
