//! Admin identity: sign-in, roles and login lockout.
//!
//! [`IdentityService`] is the seam an external identity provider plugs into.
//! [`StaticIdentity`] is the local implementation: one admin account whose
//! email and SHA-256 password digest come from the config.
//!
//! [`LoginGuard`] wraps any identity service with brute-force protection:
//! after 5 failed attempts sign-in is refused for 15 minutes. Attempts are
//! persisted so the lockout survives restarts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

/// File name of the persisted login attempts inside the state directory.
pub const ATTEMPTS_FILENAME: &str = "login-attempts.json";

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password must be at least 8 characters")]
    PasswordTooShort,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account is temporarily locked until {until}")]
    LockedOut { until: DateTime<Utc> },
    #[error("Not signed in")]
    NotSignedIn,
    #[error("Requires the {required:?} role, signed in as {actual:?}")]
    Forbidden { required: Role, actual: Role },
}

/// Admin roles, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Editor,
    #[default]
    Admin,
    SuperAdmin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub email: String,
    pub role: Role,
    pub signed_in_at: DateTime<Utc>,
}

impl AuthSession {
    /// Whether this session's role is at least `required`.
    pub fn require(&self, required: Role) -> Result<(), AuthError> {
        if self.role >= required {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                required,
                actual: self.role,
            })
        }
    }
}

/// Reject credentials that could never be valid before asking the provider.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    let email = email.trim();
    let valid_email = email
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.') && !domain.starts_with('.'));
    if !valid_email {
        return Err(AuthError::InvalidEmail);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooShort);
    }
    Ok(())
}

/// Hex SHA-256 digest of a password, as stored in `admin.password_sha256`.
pub fn password_digest(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

pub trait IdentityService {
    fn get_session(&self) -> Option<AuthSession>;
    fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;
    fn sign_out(&self);
    /// Receiver notified on every sign-in and sign-out.
    fn subscribe(&self) -> watch::Receiver<Option<AuthSession>>;
}

/// A single configured admin account.
#[derive(Debug)]
pub struct StaticIdentity {
    email: String,
    password_sha256: String,
    role: Role,
    state: watch::Sender<Option<AuthSession>>,
}

impl StaticIdentity {
    pub fn new(email: &str, password_sha256: &str, role: Role) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            email: email.trim().to_ascii_lowercase(),
            password_sha256: password_sha256.trim().to_ascii_lowercase(),
            role,
            state,
        }
    }
}

impl IdentityService for StaticIdentity {
    fn get_session(&self) -> Option<AuthSession> {
        self.state.borrow().clone()
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        validate_credentials(email, password)?;
        let email = email.trim().to_ascii_lowercase();
        if email != self.email || password_digest(password) != self.password_sha256 {
            return Err(AuthError::InvalidCredentials);
        }
        let session = AuthSession {
            email,
            role: self.role,
            signed_in_at: Utc::now(),
        };
        self.state.send_replace(Some(session.clone()));
        Ok(session)
    }

    fn sign_out(&self) {
        if self.state.send_replace(None).is_some() {
            info!("signed out");
        }
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.state.subscribe()
    }
}

/// How many failures are tolerated and for how long the lock lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lockout: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout: Duration::minutes(15),
        }
    }
}

/// Failed sign-in count and the time of the latest failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempts {
    pub count: u32,
    pub last_failure: Option<DateTime<Utc>>,
}

/// Sign-in front end that enforces [`LockoutPolicy`].
///
/// `now` is passed explicitly so lockout expiry is testable.
#[derive(Debug)]
pub struct LoginGuard {
    path: Option<PathBuf>,
    policy: LockoutPolicy,
    attempts: LoginAttempts,
}

impl LoginGuard {
    pub fn in_memory(policy: LockoutPolicy) -> Self {
        Self {
            path: None,
            policy,
            attempts: LoginAttempts::default(),
        }
    }

    /// Open persisted attempts at `path`. An unreadable file counts as no attempts.
    pub fn open(path: impl Into<PathBuf>, policy: LockoutPolicy) -> Self {
        let path = path.into();
        let attempts = std::fs::read_to_string(&path)
            .ok()
            .and_then(|c| serde_json::from_str(&c).ok())
            .unwrap_or_default();
        Self {
            path: Some(path),
            policy,
            attempts,
        }
    }

    pub fn attempts(&self) -> &LoginAttempts {
        &self.attempts
    }

    pub fn remaining_attempts(&self) -> u32 {
        self.policy.max_attempts.saturating_sub(self.attempts.count)
    }

    /// `Err(LockedOut)` while locked. An expired lock resets the count.
    pub fn check(&mut self, now: DateTime<Utc>) -> Result<(), AuthError> {
        if self.attempts.count < self.policy.max_attempts {
            return Ok(());
        }
        let until = self.attempts.last_failure.unwrap_or(now) + self.policy.lockout;
        if now < until {
            return Err(AuthError::LockedOut { until });
        }
        self.reset();
        Ok(())
    }

    /// Sign in through `identity`, counting failures.
    ///
    /// Malformed input is rejected without counting as an attempt.
    pub fn sign_in(
        &mut self,
        identity: &impl IdentityService,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthSession, AuthError> {
        self.check(now)?;
        validate_credentials(email, password)?;
        match identity.sign_in(email, password) {
            Ok(session) => {
                self.reset();
                info!(email = %session.email, role = ?session.role, "signed in");
                Ok(session)
            }
            Err(e) => {
                self.attempts.count += 1;
                self.attempts.last_failure = Some(now);
                self.persist();
                warn!(remaining = self.remaining_attempts(), "sign-in failed");
                Err(e)
            }
        }
    }

    fn reset(&mut self) {
        if self.attempts != LoginAttempts::default() {
            self.attempts = LoginAttempts::default();
            self.persist();
        }
    }

    fn persist(&self) {
        let Some(path) = &self.path else { return };
        if let Err(e) = write_attempts(path, &self.attempts) {
            warn!(path = %path.display(), error = %e, "could not persist login attempts");
        }
    }
}

fn write_attempts(path: &Path, attempts: &LoginAttempts) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(attempts)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const EMAIL: &str = "admin@example.com";
    const PASSWORD: &str = "correct horse";

    fn identity() -> StaticIdentity {
        StaticIdentity::new(EMAIL, &password_digest(PASSWORD), Role::Admin)
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-17T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn digest_is_hex_sha256() {
        assert_eq!(
            password_digest("password"),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
    }

    #[test]
    fn credential_format_checks() {
        assert_eq!(validate_credentials("nope", PASSWORD), Err(AuthError::InvalidEmail));
        assert_eq!(validate_credentials("a@b", PASSWORD), Err(AuthError::InvalidEmail));
        assert_eq!(validate_credentials(EMAIL, "short"), Err(AuthError::PasswordTooShort));
        assert!(validate_credentials(EMAIL, PASSWORD).is_ok());
    }

    #[test]
    fn sign_in_and_out() {
        let id = identity();
        assert_eq!(id.get_session(), None);

        let session = id.sign_in(" Admin@Example.com ", PASSWORD).unwrap();
        assert_eq!(session.email, EMAIL);
        assert_eq!(id.get_session(), Some(session));

        id.sign_out();
        assert_eq!(id.get_session(), None);
    }

    #[test]
    fn wrong_password_is_rejected() {
        let id = identity();
        assert_eq!(
            id.sign_in(EMAIL, "wrong password"),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(id.get_session(), None);
    }

    #[test]
    fn subscribers_see_state_changes() {
        let id = identity();
        let mut rx = id.subscribe();
        assert!(!rx.has_changed().unwrap());

        id.sign_in(EMAIL, PASSWORD).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_some());

        id.sign_out();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn role_hierarchy() {
        let session = AuthSession {
            email: EMAIL.into(),
            role: Role::Editor,
            signed_in_at: t0(),
        };
        assert!(session.require(Role::Viewer).is_ok());
        assert!(session.require(Role::Editor).is_ok());
        assert_eq!(
            session.require(Role::Admin),
            Err(AuthError::Forbidden {
                required: Role::Admin,
                actual: Role::Editor
            })
        );
    }

    #[test]
    fn lockout_after_five_failures() {
        let id = identity();
        let mut guard = LoginGuard::in_memory(LockoutPolicy::default());
        for _ in 0..5 {
            assert_eq!(
                guard.sign_in(&id, EMAIL, "wrong password", t0()),
                Err(AuthError::InvalidCredentials)
            );
        }
        assert_eq!(guard.remaining_attempts(), 0);

        // Even the right password is refused while locked.
        let later = t0() + Duration::minutes(14);
        assert!(matches!(
            guard.sign_in(&id, EMAIL, PASSWORD, later),
            Err(AuthError::LockedOut { .. })
        ));
    }

    #[test]
    fn lockout_expires() {
        let id = identity();
        let mut guard = LoginGuard::in_memory(LockoutPolicy::default());
        for _ in 0..5 {
            let _ = guard.sign_in(&id, EMAIL, "wrong password", t0());
        }
        let later = t0() + Duration::minutes(15);
        assert!(guard.sign_in(&id, EMAIL, PASSWORD, later).is_ok());
        assert_eq!(guard.remaining_attempts(), 5);
    }

    #[test]
    fn success_resets_count() {
        let id = identity();
        let mut guard = LoginGuard::in_memory(LockoutPolicy::default());
        let _ = guard.sign_in(&id, EMAIL, "wrong password", t0());
        let _ = guard.sign_in(&id, EMAIL, "wrong password", t0());
        assert_eq!(guard.remaining_attempts(), 3);

        guard.sign_in(&id, EMAIL, PASSWORD, t0()).unwrap();
        assert_eq!(guard.attempts(), &LoginAttempts::default());
    }

    #[test]
    fn malformed_input_does_not_count() {
        let id = identity();
        let mut guard = LoginGuard::in_memory(LockoutPolicy::default());
        assert_eq!(
            guard.sign_in(&id, "not-an-email", PASSWORD, t0()),
            Err(AuthError::InvalidEmail)
        );
        assert_eq!(guard.remaining_attempts(), 5);
    }

    #[test]
    fn attempts_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(ATTEMPTS_FILENAME);
        let id = identity();

        let mut guard = LoginGuard::open(&path, LockoutPolicy::default());
        for _ in 0..5 {
            let _ = guard.sign_in(&id, EMAIL, "wrong password", t0());
        }

        let mut reopened = LoginGuard::open(&path, LockoutPolicy::default());
        assert!(matches!(
            reopened.check(t0() + Duration::minutes(1)),
            Err(AuthError::LockedOut { .. })
        ));
    }

    #[test]
    fn corrupt_attempts_file_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(ATTEMPTS_FILENAME);
        std::fs::write(&path, "garbage").unwrap();
        let guard = LoginGuard::open(&path, LockoutPolicy::default());
        assert_eq!(guard.remaining_attempts(), 5);
    }
}
