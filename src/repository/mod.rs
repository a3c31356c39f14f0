//! Repository layer for database operations

pub mod audit;
pub mod operators;
pub mod visitors;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub operators: operators::OperatorsRepository,
    pub visitors: visitors::VisitorsRepository,
    pub audit: audit::AuditRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            operators: operators::OperatorsRepository::new(pool.clone()),
            visitors: visitors::VisitorsRepository::new(pool.clone()),
            audit: audit::AuditRepository::new(pool.clone()),
            pool,
        }
    }
}
