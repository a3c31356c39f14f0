//! Visitor history export: resolves a date window and flattens it to CSV
//! or structured rows for JSON rendering.

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::{error::AppResult, models::visitor::VisitorSummary, repository::Repository};

#[derive(Clone)]
pub struct ExportService {
    repository: Repository,
    default_days: i64,
}

impl ExportService {
    pub fn new(repository: Repository, default_days: i64) -> Self {
        Self {
            repository,
            default_days,
        }
    }

    /// Resolve an optional date range into a concrete half-open window.
    /// With no range given the window is the trailing `default_days` days.
    pub fn resolve_window(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        resolve_window(start_date, end_date, now, self.default_days)
    }

    /// Fetch the window, unpaginated, ordered by check-in time
    pub async fn fetch(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<VisitorSummary>> {
        self.repository.visitors.export_window(start, end).await
    }
}

fn resolve_window(
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    now: DateTime<Utc>,
    default_days: i64,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = match end_date {
        // End date is inclusive: the window extends to the next midnight
        Some(date) => day_start(date.checked_add_days(Days::new(1)).unwrap_or(date)),
        None => now,
    };
    let start = match start_date {
        Some(date) => day_start(date),
        None => end - Duration::days(default_days),
    };
    (start, end)
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Render records as CSV: UTF-8 BOM for spreadsheet compatibility, comma
/// delimited, free-text fields double-quote escaped.
pub fn to_csv(records: &[VisitorSummary]) -> String {
    let mut csv = String::new();
    csv.push('\u{FEFF}');
    csv.push_str(
        "id,qr_pass_id,visitor_name,mobile,host_employee,host_email,purpose,status,checkin_time,checkout_time,created_by\n",
    );

    for record in records {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{}\n",
            record.id,
            escape_csv(&record.qr_pass_id),
            escape_csv(&record.visitor_name),
            escape_csv(record.mobile.as_deref().unwrap_or("")),
            escape_csv(record.host_employee.as_deref().unwrap_or("")),
            escape_csv(&record.host_email),
            escape_csv(&record.purpose),
            record.status.as_str(),
            record.checkin_time.to_rfc3339(),
            record
                .checkout_time
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            escape_csv(&record.created_by),
        ));
    }

    csv
}

/// Escape a value for CSV output
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::visitor::VisitStatus;

    fn record(purpose: &str) -> VisitorSummary {
        VisitorSummary {
            id: 42,
            visitor_name: "Jane Doe".to_string(),
            mobile: Some("9876543210".to_string()),
            host_employee: None,
            host_email: "host@x.com".to_string(),
            purpose: purpose.to_string(),
            qr_pass_id: "20260804101500-X3K9QA".to_string(),
            checkin_time: Utc.with_ymd_and_hms(2026, 8, 4, 10, 15, 0).unwrap(),
            checkout_time: None,
            status: VisitStatus::CheckedIn,
            created_by: "public_kiosk".to_string(),
        }
    }

    #[test]
    fn escape_csv_quotes_only_when_needed() {
        assert_eq!(escape_csv("hello"), "hello");
        assert_eq!(escape_csv("hello,world"), "\"hello,world\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn csv_starts_with_bom_and_header() {
        let csv = to_csv(&[]);
        assert!(csv.starts_with('\u{FEFF}'));
        assert!(csv.contains("id,qr_pass_id,visitor_name"));
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn one_record_yields_one_data_row() {
        let csv = to_csv(&[record("Meeting")]);
        assert_eq!(csv.lines().count(), 2);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("42,"));
        assert!(row.contains("Jane Doe"));
        assert!(row.contains("checked_in"));
        // Open visit: empty checkout column
        assert!(row.contains(",,public_kiosk") || row.ends_with(",public_kiosk"));
    }

    #[test]
    fn quoted_purpose_round_trips_exactly() {
        let csv = to_csv(&[record("Audit, \"phase 2\"")]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains("\"Audit, \"\"phase 2\"\"\""));
    }

    #[test]
    fn default_window_is_trailing_days() {
        let now = Utc.with_ymd_and_hms(2026, 8, 4, 12, 0, 0).unwrap();
        let (start, end) = resolve_window(None, None, now, 7);
        assert_eq!(end, now);
        assert_eq!(start, now - Duration::days(7));
    }

    #[test]
    fn explicit_range_covers_the_end_date_inclusively() {
        let now = Utc.with_ymd_and_hms(2026, 8, 4, 12, 0, 0).unwrap();
        let (start, end) = resolve_window(
            NaiveDate::from_ymd_opt(2026, 8, 1),
            NaiveDate::from_ymd_opt(2026, 8, 2),
            now,
            7,
        );
        assert_eq!(start.to_rfc3339(), "2026-08-01T00:00:00+00:00");
        // Inclusive end date: window closes at the following midnight
        assert_eq!(end.to_rfc3339(), "2026-08-03T00:00:00+00:00");
    }

    #[test]
    fn same_day_range_spans_one_day() {
        let now = Utc.with_ymd_and_hms(2026, 8, 4, 12, 0, 0).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 8, 4);
        let (start, end) = resolve_window(today, today, now, 7);
        assert_eq!(end - start, Duration::days(1));
    }
}
