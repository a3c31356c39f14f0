//! Visitor ledger service: validation policy, pass generation, and the
//! check-in/check-out orchestration with its side effects. The ledger row is
//! the source of truth; audit writes and notifications are isolated so their
//! failure never affects the transition outcome.

use base64::Engine;
use chrono::{DateTime, SubsecRound, Utc};
use serde_json::json;
use validator::Validate;

use crate::{
    config::VisitorConfig,
    error::{AppError, AppResult},
    models::{
        audit::{AuditAction, NewAuditEvent},
        operator::{OperatorClaims, OperatorRole},
        visitor::{
            CreateVisitorRequest, NewVisitorRecord, PaginationMeta, QrPayload, VisitStatus,
            VisitorListResponse, VisitorQuery, VisitorRecord,
        },
    },
    repository::Repository,
    services::{notify::NotifyService, qr},
};

/// Sentinel recorded as created_by for unauthenticated check-ins
pub const PUBLIC_KIOSK: &str = "public_kiosk";

#[derive(Clone)]
pub struct VisitorsService {
    repository: Repository,
    notify: NotifyService,
    policy: VisitorConfig,
}

impl VisitorsService {
    pub fn new(repository: Repository, notify: NotifyService, policy: VisitorConfig) -> Self {
        Self {
            repository,
            notify,
            policy,
        }
    }

    /// Check a visitor in: validate, persist in state checked_in, then queue
    /// the host notification. The caller never waits on mail delivery.
    /// Returns the stored record and an embeddable QR data URI.
    pub async fn check_in(
        &self,
        request: CreateVisitorRequest,
        created_by: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> AppResult<(VisitorRecord, String)> {
        request.validate()?;

        let mobile = request.mobile.filter(|m| !m.is_empty());
        validate_mobile(mobile.as_deref(), self.policy.mobile_digits)?;
        let photo = normalize_photo(request.photo_base64.as_deref())?;

        // Truncated to microseconds: the stored row must carry the same
        // stamp that goes into the payload snapshot
        let now = Utc::now().trunc_subsecs(6);
        let qr_pass_id = generate_pass_id(now);

        // Snapshot fixed at creation time; checkout does not touch it
        let payload = QrPayload {
            id: qr_pass_id.clone(),
            name: request.visitor_name.clone(),
            mobile: mobile.clone(),
            host: request.host_employee.clone(),
            purpose: request.purpose.clone(),
            checkin: now,
            status: VisitStatus::CheckedIn,
        };
        let qr_payload = qr::encode_payload(&payload)?;

        let record = self
            .repository
            .visitors
            .create(&NewVisitorRecord {
                visitor_name: request.visitor_name,
                mobile,
                host_employee: request.host_employee,
                host_email: request.host_email,
                purpose: request.purpose,
                photo,
                qr_pass_id,
                qr_payload: qr_payload.clone(),
                checkin_time: now,
                created_by: created_by.to_string(),
            })
            .await?;

        self.append_audit(NewAuditEvent {
            actor: (created_by != PUBLIC_KIOSK).then(|| created_by.to_string()),
            action: AuditAction::CreateVisitor,
            target_table: "visitor_records",
            target_id: Some(record.id.to_string()),
            before_state: None,
            after_state: Some(json!({
                "status": record.status.as_str(),
                "qr_pass_id": record.qr_pass_id,
                "host_email": record.host_email,
            })),
            ip_address: ip,
            user_agent,
        })
        .await;

        let qr_png = qr::render_png(&qr_payload)?;
        let qr_code = qr::data_uri(&qr_png);
        self.notify.enqueue_checkin(record.clone(), qr_png);

        Ok((record, qr_code))
    }

    /// Transition a visitor to checked_out. The repository's conditional
    /// update guarantees at most one success per record ever.
    pub async fn check_out(
        &self,
        id: i64,
        claims: &OperatorClaims,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> AppResult<DateTime<Utc>> {
        let checkout_time = self.repository.visitors.checkout(id).await?;

        self.append_audit(NewAuditEvent {
            actor: Some(claims.sub.clone()),
            action: AuditAction::CheckoutVisitor,
            target_table: "visitor_records",
            target_id: Some(id.to_string()),
            before_state: Some(json!({ "status": "checked_in" })),
            after_state: Some(json!({
                "status": "checked_out",
                "checkout_time": checkout_time,
            })),
            ip_address: ip,
            user_agent,
        })
        .await;

        if self.notify.checkout_email_enabled() {
            match self.repository.visitors.get_by_id(id).await {
                Ok(record) => self.notify.enqueue_checkout(record, checkout_time),
                Err(e) => tracing::warn!(
                    "Could not load visitor {} for checkout notification: {}",
                    id,
                    e
                ),
            }
        }

        Ok(checkout_time)
    }

    /// Get a visitor record by ID
    pub async fn get(&self, id: i64) -> AppResult<VisitorRecord> {
        self.repository.visitors.get_by_id(id).await
    }

    /// List visitor records. Reception-role operators are scoped to their own
    /// created records when the deployment enables creator scoping.
    pub async fn list(
        &self,
        query: &VisitorQuery,
        claims: &OperatorClaims,
    ) -> AppResult<VisitorListResponse> {
        let creator_scope = (self.policy.scope_reception_to_creator
            && claims.role == OperatorRole::Reception)
            .then_some(claims.sub.as_str());

        let (visitors, total) = self.repository.visitors.search(query, creator_scope).await?;

        Ok(VisitorListResponse {
            pagination: PaginationMeta::new(query.page(), query.limit(), total),
            visitors,
        })
    }

    /// A failed audit write is logged and never fails the operation
    async fn append_audit(&self, event: NewAuditEvent) {
        if let Err(e) = self.repository.audit.append(&event).await {
            tracing::warn!("Failed to write audit event: {}", e);
        }
    }
}

/// The optional mobile must be exactly the configured number of digits
fn validate_mobile(mobile: Option<&str>, digits: usize) -> AppResult<()> {
    match mobile {
        None => Ok(()),
        Some(m) if m.len() == digits && m.chars().all(|c| c.is_ascii_digit()) => Ok(()),
        Some(_) => Err(AppError::Validation(format!(
            "mobile must be exactly {} digits",
            digits
        ))),
    }
}

/// Accept a bare base64 payload or a data-URI wrapper; store the bare payload
fn normalize_photo(photo: Option<&str>) -> AppResult<Option<String>> {
    let Some(raw) = photo else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let payload = match raw.find("base64,") {
        Some(idx) if raw.starts_with("data:") => &raw[idx + "base64,".len()..],
        _ => raw,
    };

    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| AppError::Validation("photo_base64 is not valid base64 image data".to_string()))?;

    Ok(Some(payload.to_string()))
}

/// Pass id: check-in timestamp plus a random suffix. Practically unique
/// without a central sequence, and readable on a printed pass.
fn generate_pass_id(now: DateTime<Utc>) -> String {
    use rand::Rng;
    // Ambiguous glyphs (0/O, 1/I/L) are left out
    const CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();

    let suffix: String = (0..6)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();

    format!("{}-{}", now.format("%Y%m%d%H%M%S"), suffix)
}
