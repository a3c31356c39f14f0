//! Visitor statistics service

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use sqlx::Row;

use crate::{
    api::admin::{HostCount, StatsResponse, WindowStats},
    error::AppResult,
    repository::Repository,
};

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Aggregate counts over today / trailing week / trailing month / all time
    pub async fn get_stats(&self) -> AppResult<StatsResponse> {
        let now = Utc::now();
        let today_start = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN));

        let today = self.window(Some(today_start)).await?;
        let week = self.window(Some(now - Duration::days(7))).await?;
        let month = self.window(Some(now - Duration::days(30))).await?;
        let all_time = self.window(None).await?;
        let top_hosts = self.top_hosts(5).await?;

        Ok(StatsResponse {
            today,
            week,
            month,
            all_time,
            top_hosts,
        })
    }

    /// One aggregate pass over the window. Average visit duration counts
    /// still-active visits against the current clock.
    async fn window(&self, since: Option<DateTime<Utc>>) -> AppResult<WindowStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'checked_in') AS active,
                   COUNT(*) FILTER (WHERE status = 'checked_out') AS checked_out,
                   COUNT(DISTINCT host_email) AS distinct_hosts,
                   MIN(checkin_time) AS first_checkin,
                   MAX(checkin_time) AS last_checkin,
                   (AVG(EXTRACT(EPOCH FROM (COALESCE(checkout_time, NOW()) - checkin_time)) / 60.0))::float8
                       AS avg_visit_minutes
            FROM visitor_records
            WHERE $1::timestamptz IS NULL OR checkin_time >= $1
            "#,
        )
        .bind(since)
        .fetch_one(&self.repository.pool)
        .await?;

        Ok(WindowStats {
            total: row.get("total"),
            active: row.get("active"),
            checked_out: row.get("checked_out"),
            distinct_hosts: row.get("distinct_hosts"),
            first_checkin: row.get("first_checkin"),
            last_checkin: row.get("last_checkin"),
            avg_visit_minutes: row.get("avg_visit_minutes"),
        })
    }

    async fn top_hosts(&self, limit: i64) -> AppResult<Vec<HostCount>> {
        let rows = sqlx::query(
            r#"
            SELECT host_email, COUNT(*) AS visits
            FROM visitor_records
            GROUP BY host_email
            ORDER BY visits DESC, host_email
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.repository.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| HostCount {
                host_email: row.get("host_email"),
                visits: row.get("visits"),
            })
            .collect())
    }
}
