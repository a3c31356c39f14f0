//! Audit trail model

use serde_json::Value;

/// Action tags recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    CreateVisitor,
    CheckoutVisitor,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "LOGIN",
            AuditAction::CreateVisitor => "CREATE_VISITOR",
            AuditAction::CheckoutVisitor => "CHECKOUT_VISITOR",
        }
    }
}

/// An audit event about to be appended. The log is append-only; a failed
/// write must never fail the operation that produced the event.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    /// Acting operator username, or None for unauthenticated channels
    pub actor: Option<String>,
    pub action: AuditAction,
    pub target_table: &'static str,
    pub target_id: Option<String>,
    pub before_state: Option<Value>,
    pub after_state: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
