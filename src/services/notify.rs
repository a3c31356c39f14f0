//! Notification dispatcher: renders host-facing emails with an embedded QR
//! pass and hands them to the SMTP transport from a bounded background queue.
//! A slow or unreachable mail server never delays an HTTP response and never
//! rolls back a ledger transition.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Utc};
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use std::str::FromStr;
use tokio::sync::Notify;

use crate::{
    config::{EmailConfig, NotifyConfig},
    error::{AppError, AppResult},
    models::visitor::VisitorRecord,
};

/// Content-ids referenced from the HTML bodies
const CID_QR_PASS: &str = "qrpass";
const CID_PHOTO: &str = "visitorphoto";

/// One queued notification
#[derive(Debug, Clone)]
pub enum NotificationJob {
    CheckIn {
        record: VisitorRecord,
        qr_png: Vec<u8>,
    },
    CheckOut {
        record: VisitorRecord,
        checkout_time: DateTime<Utc>,
    },
}

/// Bounded FIFO of pending notifications, shared between request handlers
/// and the delivery workers. At capacity the oldest job is dropped so the
/// request path never blocks on mail.
pub struct NotificationQueue {
    jobs: Mutex<VecDeque<NotificationJob>>,
    ready: Notify,
    capacity: usize,
}

impl NotificationQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            jobs: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Notify::new(),
            capacity,
        }
    }

    pub fn push(&self, job: NotificationJob) {
        {
            let mut jobs = self.jobs.lock().unwrap();
            if jobs.len() >= self.capacity {
                jobs.pop_front();
                tracing::warn!(
                    "Notification queue full (capacity {}), dropping oldest job",
                    self.capacity
                );
            }
            jobs.push_back(job);
        }
        self.ready.notify_one();
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Workers re-poll the deque before parking, so a missed wakeup only
    /// delays a job until the next worker loops around.
    async fn next(&self) -> NotificationJob {
        loop {
            if let Some(job) = self.jobs.lock().unwrap().pop_front() {
                return job;
            }
            self.ready.notified().await;
        }
    }
}

#[derive(Clone)]
pub struct NotifyService {
    queue: Arc<NotificationQueue>,
    email: EmailConfig,
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl NotifyService {
    pub fn new(email: EmailConfig, notify: &NotifyConfig) -> AppResult<Self> {
        let mailer = if email.enabled {
            Some(build_mailer(&email)?)
        } else {
            None
        };

        Ok(Self {
            queue: Arc::new(NotificationQueue::new(notify.queue_capacity)),
            email,
            mailer,
        })
    }

    /// Spawn the fixed pool of background delivery workers
    pub fn spawn_workers(&self, workers: usize) {
        for worker in 0..workers.max(1) {
            let service = self.clone();
            tokio::spawn(async move {
                loop {
                    let job = service.queue.next().await;
                    if let Err(e) = service.deliver(job).await {
                        // Mail failures are logged here and nowhere else
                        tracing::error!(worker, "Failed to deliver notification: {}", e);
                    }
                }
            });
        }
    }

    /// Queue a check-in alert for the host. Never blocks the caller.
    pub fn enqueue_checkin(&self, record: VisitorRecord, qr_png: Vec<u8>) {
        if !self.email.enabled {
            tracing::debug!("Email disabled, skipping check-in notification");
            return;
        }
        self.queue.push(NotificationJob::CheckIn { record, qr_png });
    }

    /// Queue a checkout confirmation, when the deployment enables them
    pub fn enqueue_checkout(&self, record: VisitorRecord, checkout_time: DateTime<Utc>) {
        if !self.checkout_email_enabled() {
            return;
        }
        self.queue.push(NotificationJob::CheckOut {
            record,
            checkout_time,
        });
    }

    pub fn checkout_email_enabled(&self) -> bool {
        self.email.enabled && self.email.send_checkout_email
    }

    /// Wait for queued notifications to flush during shutdown
    pub async fn drain(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.queue.is_empty() {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    "Shutdown drain timed out with {} notification(s) pending",
                    self.queue.len()
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Probe the SMTP transport for the health endpoint; None when disabled
    pub async fn transport_reachable(&self) -> Option<bool> {
        match &self.mailer {
            None => None,
            Some(mailer) => Some(mailer.test_connection().await.unwrap_or(false)),
        }
    }

    async fn deliver(&self, job: NotificationJob) -> AppResult<()> {
        let Some(mailer) = &self.mailer else {
            return Ok(());
        };

        let message = match &job {
            NotificationJob::CheckIn { record, qr_png } => {
                self.build_checkin_email(record, qr_png)?
            }
            NotificationJob::CheckOut {
                record,
                checkout_time,
            } => self.build_checkout_email(record, *checkout_time)?,
        };

        mailer
            .send(message)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }

    fn build_checkin_email(&self, record: &VisitorRecord, qr_png: &[u8]) -> AppResult<Message> {
        let html = render_checkin_html(record, &self.format_local(record.checkin_time));

        let png_type = ContentType::parse("image/png")
            .map_err(|e| AppError::Internal(format!("Invalid content type: {}", e)))?;

        // The QR pass is referenced by content-id, not a data URI, so it
        // renders reliably across mail clients
        let mut related = MultiPart::related()
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(html),
            )
            .singlepart(
                Attachment::new_inline(CID_QR_PASS.to_string()).body(qr_png.to_vec(), png_type),
            );

        if let Some(photo) = &record.photo {
            match base64::engine::general_purpose::STANDARD.decode(photo) {
                Ok(bytes) => {
                    let photo_type = ContentType::parse(sniff_image_type(&bytes))
                        .map_err(|e| AppError::Internal(format!("Invalid content type: {}", e)))?;
                    related = related
                        .singlepart(Attachment::new_inline(CID_PHOTO.to_string()).body(bytes, photo_type));
                }
                Err(e) => {
                    tracing::warn!("Stored photo for visitor {} is not valid base64: {}", record.id, e);
                }
            }
        }

        self.message_builder(record)?
            .subject(format!("Visitor check-in: {}", record.visitor_name))
            .multipart(related)
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn build_checkout_email(
        &self,
        record: &VisitorRecord,
        checkout_time: DateTime<Utc>,
    ) -> AppResult<Message> {
        let duration = format_duration(checkout_time - record.checkin_time);
        let html = render_checkout_html(record, &self.format_local(checkout_time), &duration);

        self.message_builder(record)?
            .subject(format!("Visitor check-out: {}", record.visitor_name))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(format!(
                                "{} has checked out. Visit duration: {}.",
                                record.visitor_name, duration
                            )),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn message_builder(&self, record: &VisitorRecord) -> AppResult<lettre::message::MessageBuilder> {
        let from_name = self.email.smtp_from_name.as_deref().unwrap_or("Frontdesk");
        let from = Mailbox::from_str(&format!("{} <{}>", from_name, self.email.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;
        let to = Mailbox::from_str(&record.host_email)
            .map_err(|e| AppError::Internal(format!("Invalid host address: {}", e)))?;

        Ok(Message::builder().from(from).to(to))
    }

    fn format_local(&self, time: DateTime<Utc>) -> String {
        let offset = FixedOffset::east_opt(self.email.display_tz_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        time.with_timezone(&offset)
            .format("%d %b %Y, %I:%M %p")
            .to_string()
    }
}

fn build_mailer(config: &EmailConfig) -> AppResult<AsyncSmtpTransport<Tokio1Executor>> {
    let builder = if config.smtp_use_tls {
        // STARTTLS for secure connection
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
    }
    .port(config.smtp_port);

    let builder = if let (Some(username), Some(password)) =
        (&config.smtp_username, &config.smtp_password)
    {
        builder.credentials(Credentials::new(username.clone(), password.clone()))
    } else {
        builder
    };

    Ok(builder.build())
}

/// Visit duration as "H hour(s) M minute(s)", or just minutes under an hour
pub fn format_duration(duration: ChronoDuration) -> String {
    let minutes = duration.num_minutes().max(0);
    if minutes < 60 {
        format!("{} minute(s)", minutes)
    } else {
        format!("{} hour(s) {} minute(s)", minutes / 60, minutes % 60)
    }
}

/// Minimal escaping for values interpolated into the HTML bodies
fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn sniff_image_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else {
        "image/jpeg"
    }
}

fn render_checkin_html(record: &VisitorRecord, checkin_local: &str) -> String {
    let host_line = record
        .host_employee
        .as_deref()
        .map(|h| format!(" to see <strong>{}</strong>", escape_html(h)))
        .unwrap_or_default();
    let mobile_row = record
        .mobile
        .as_deref()
        .map(|m| {
            format!(
                "<tr><td style=\"padding:4px 12px 4px 0;color:#666;\">Mobile</td><td>{}</td></tr>",
                escape_html(m)
            )
        })
        .unwrap_or_default();
    let photo_block = if record.photo.is_some() {
        format!(
            "<p><img src=\"cid:{}\" alt=\"Visitor photo\" style=\"max-width:160px;border-radius:4px;\" /></p>",
            CID_PHOTO
        )
    } else {
        String::new()
    };

    format!(
        r#"<div style="font-family:Arial,sans-serif;max-width:560px;">
  <h2 style="color:#2c3e50;">Visitor check-in</h2>
  <p><strong>{name}</strong> has checked in{host_line}.</p>
  <table style="border-collapse:collapse;">
    <tr><td style="padding:4px 12px 4px 0;color:#666;">Name</td><td>{name}</td></tr>
    {mobile_row}
    <tr><td style="padding:4px 12px 4px 0;color:#666;">Purpose</td><td>{purpose}</td></tr>
    <tr><td style="padding:4px 12px 4px 0;color:#666;">Checked in at</td><td>{checkin}</td></tr>
    <tr><td style="padding:4px 12px 4px 0;color:#666;">Pass ID</td><td>{pass_id}</td></tr>
  </table>
  {photo_block}
  <p>Pass for the front desk:</p>
  <img src="cid:{cid_qr}" alt="Visitor QR pass" width="240" height="240" />
</div>"#,
        name = escape_html(&record.visitor_name),
        host_line = host_line,
        mobile_row = mobile_row,
        purpose = escape_html(&record.purpose),
        checkin = checkin_local,
        pass_id = escape_html(&record.qr_pass_id),
        photo_block = photo_block,
        cid_qr = CID_QR_PASS,
    )
}

fn render_checkout_html(record: &VisitorRecord, checkout_local: &str, duration: &str) -> String {
    format!(
        r#"<div style="font-family:Arial,sans-serif;max-width:560px;">
  <h2 style="color:#2c3e50;">Visitor check-out</h2>
  <p><strong>{name}</strong> has checked out at {checkout}.</p>
  <p>Visit duration: <strong>{duration}</strong>.</p>
</div>"#,
        name = escape_html(&record.visitor_name),
        checkout = checkout_local,
        duration = duration,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::visitor::VisitStatus;

    fn record(name: &str) -> VisitorRecord {
        VisitorRecord {
            id: 1,
            visitor_name: name.to_string(),
            mobile: None,
            host_employee: None,
            host_email: "host@example.com".to_string(),
            purpose: "Meeting".to_string(),
            photo: None,
            qr_pass_id: "20260804101500-X3K9QA".to_string(),
            qr_payload: "{}".to_string(),
            checkin_time: Utc::now(),
            checkout_time: None,
            status: VisitStatus::CheckedIn,
            created_by: "public_kiosk".to_string(),
        }
    }

    #[test]
    fn queue_drops_oldest_when_full() {
        let queue = NotificationQueue::new(2);
        for name in ["first", "second", "third"] {
            queue.push(NotificationJob::CheckIn {
                record: record(name),
                qr_png: Vec::new(),
            });
        }

        assert_eq!(queue.len(), 2);
        let NotificationJob::CheckIn { record, .. } = queue.jobs.lock().unwrap().pop_front().unwrap()
        else {
            panic!("expected a check-in job");
        };
        assert_eq!(record.visitor_name, "second");
    }

    #[test]
    fn duration_under_an_hour_is_minutes_only() {
        assert_eq!(format_duration(ChronoDuration::minutes(45)), "45 minute(s)");
        assert_eq!(format_duration(ChronoDuration::seconds(30)), "0 minute(s)");
    }

    #[test]
    fn duration_over_an_hour_includes_hours() {
        assert_eq!(
            format_duration(ChronoDuration::minutes(135)),
            "2 hour(s) 15 minute(s)"
        );
        assert_eq!(
            format_duration(ChronoDuration::minutes(60)),
            "1 hour(s) 0 minute(s)"
        );
    }

    #[test]
    fn negative_duration_clamps_to_zero() {
        assert_eq!(format_duration(ChronoDuration::minutes(-5)), "0 minute(s)");
    }

    #[test]
    fn html_escapes_visitor_input() {
        let mut r = record("<script>alert(1)</script>");
        r.purpose = "R&D \"review\"".to_string();
        let html = render_checkin_html(&r, "04 Aug 2026, 10:15 AM");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("R&amp;D &quot;review&quot;"));
        assert!(html.contains("cid:qrpass"));
    }

    #[test]
    fn image_type_sniffing() {
        assert_eq!(sniff_image_type(b"\x89PNG\r\n\x1a\nrest"), "image/png");
        assert_eq!(sniff_image_type(b"\xff\xd8\xffrest"), "image/jpeg");
    }
}
