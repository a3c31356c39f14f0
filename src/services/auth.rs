//! Authentication service: login, password hashing, administrator seeding

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use once_cell::sync::Lazy;

use crate::{
    config::{AdminConfig, AuthConfig},
    error::{AppError, AppResult},
    models::{
        audit::{AuditAction, NewAuditEvent},
        operator::{Operator, OperatorClaims},
    },
    repository::Repository,
};

/// Verified against on the no-such-account path so that an unknown username
/// and a wrong password cost the same amount of hashing work.
static DUMMY_PASSWORD_HASH: Lazy<String> = Lazy::new(|| {
    hash_password("frontdesk-dummy-comparison").expect("hashing a fixed password cannot fail")
});

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a password against an argon2 PHC string
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Authenticate an operator by username or email and issue a signed token.
    ///
    /// Both failure shapes return InvalidCredentials after exactly one hash
    /// verification; a disabled account is reported distinctly, but only once
    /// the account is known to exist.
    pub async fn login(
        &self,
        login: &str,
        password: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> AppResult<(String, Operator)> {
        let Some(operator) = self.repository.operators.get_by_login(login).await? else {
            let _ = verify_password(&DUMMY_PASSWORD_HASH, password);
            return Err(AppError::InvalidCredentials);
        };

        if !operator.is_active {
            return Err(AppError::AccountDisabled);
        }

        if !verify_password(&operator.password_hash, password) {
            return Err(AppError::InvalidCredentials);
        }

        // Best-effort: a failed stamp must not fail the login
        if let Err(e) = self.repository.operators.touch_last_login(operator.id).await {
            tracing::warn!(
                "Failed to update last login for {}: {}",
                operator.username,
                e
            );
        }

        let token = self.issue_token(&operator)?;

        let event = NewAuditEvent {
            actor: Some(operator.username.clone()),
            action: AuditAction::Login,
            target_table: "operators",
            target_id: Some(operator.id.to_string()),
            before_state: None,
            after_state: None,
            ip_address: ip,
            user_agent,
        };
        if let Err(e) = self.repository.audit.append(&event).await {
            tracing::warn!("Failed to write login audit event: {}", e);
        }

        Ok((token, operator))
    }

    fn issue_token(&self, operator: &Operator) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = OperatorClaims {
            sub: operator.username.clone(),
            operator_id: operator.id,
            email: operator.email.clone(),
            role: operator.role,
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Seed the default administrator at startup. Idempotent; when no
    /// bootstrap password is configured a random one is generated and
    /// logged exactly once.
    pub async fn bootstrap_admin(&self, admin: &AdminConfig) -> AppResult<()> {
        let (password, generated) = match &admin.bootstrap_password {
            Some(configured) => (configured.clone(), false),
            None => (generate_password(16), true),
        };

        let hash = hash_password(&password)?;
        let created = self
            .repository
            .operators
            .upsert_bootstrap_admin(&admin.bootstrap_username, &admin.bootstrap_email, &hash)
            .await?;

        if created {
            tracing::info!(
                "Seeded default administrator '{}'",
                admin.bootstrap_username
            );
            if generated {
                tracing::warn!(
                    "No bootstrap password configured; one-time password for '{}': {}",
                    admin.bootstrap_username,
                    password
                );
            }
        }

        Ok(())
    }
}

/// Random password for the seeded administrator when none is configured
fn generate_password(len: usize) -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip() {
        let hash = hash_password("s3cret").unwrap();
        assert!(verify_password(&hash, "s3cret"));
        assert!(!verify_password(&hash, "wrong"));
    }

    #[test]
    fn dummy_hash_never_matches() {
        // The miss path burns a verification that must always fail
        assert!(!verify_password(&DUMMY_PASSWORD_HASH, "anything"));
        assert!(!verify_password(&DUMMY_PASSWORD_HASH, ""));
    }

    #[test]
    fn malformed_hash_is_rejected_not_panicking() {
        assert!(!verify_password("not-a-phc-string", "password"));
    }

    #[test]
    fn generated_password_shape() {
        let p = generate_password(16);
        assert_eq!(p.len(), 16);
        assert!(p.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_password(16), generate_password(16));
    }
}
