/// Auth gateway
///
/// Email/password sign-in for the admin view. The error taxonomy is the
/// fixed code set the admin page knows how to phrase for the operator;
/// anything else passes through as its raw message.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

/// Consecutive failures per email before sign-in gets rate limited.
const MAX_FAILED_ATTEMPTS: u32 = 5;

/// An authenticated operator session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("auth/invalid-credential")]
    InvalidCredential,
    #[error("auth/user-not-found")]
    UserNotFound,
    #[error("auth/wrong-password")]
    WrongPassword,
    #[error("auth/too-many-requests")]
    TooManyRequests,
    #[error("{0}")]
    Other(String),
}

impl AuthError {
    /// Operator-facing message for the known code set, raw message for
    /// everything else.
    pub fn friendly_message(&self) -> String {
        match self {
            AuthError::InvalidCredential => "Email or password is incorrect".to_string(),
            AuthError::UserNotFound => "No user with that email".to_string(),
            AuthError::WrongPassword => "Wrong password".to_string(),
            AuthError::TooManyRequests => {
                "Too many attempts, wait a moment and try again".to_string()
            }
            AuthError::Other(msg) => msg.clone(),
        }
    }
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;
}

/// In-memory credential gateway with a consecutive-failure rate limiter.
pub struct LocalAuth {
    users: HashMap<String, String>,
    failures: Mutex<HashMap<String, u32>>,
}

impl LocalAuth {
    pub fn new() -> Self {
        LocalAuth {
            users: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_user(mut self, email: &str, password: &str) -> Self {
        self.users.insert(email.to_string(), password.to_string());
        self
    }

    fn record_failure(&self, email: &str) {
        let mut failures = self.failures.lock().expect("auth failure map poisoned");
        *failures.entry(email.to_string()).or_insert(0) += 1;
    }

    fn is_rate_limited(&self, email: &str) -> bool {
        let failures = self.failures.lock().expect("auth failure map poisoned");
        failures.get(email).copied().unwrap_or(0) >= MAX_FAILED_ATTEMPTS
    }

    fn clear_failures(&self, email: &str) {
        self.failures
            .lock()
            .expect("auth failure map poisoned")
            .remove(email);
    }
}

impl Default for LocalAuth {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthGateway for LocalAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredential);
        }
        if self.is_rate_limited(email) {
            return Err(AuthError::TooManyRequests);
        }

        match self.users.get(email) {
            None => {
                self.record_failure(email);
                Err(AuthError::UserNotFound)
            }
            Some(expected) if expected != password => {
                self.record_failure(email);
                Err(AuthError::WrongPassword)
            }
            Some(_) => {
                self.clear_failures(email);
                Ok(Session {
                    email: email.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> LocalAuth {
        LocalAuth::new().with_user("op@example.com", "hunter2")
    }

    #[tokio::test]
    async fn test_sign_in_success() {
        let auth = gateway();
        let session = auth.sign_in("op@example.com", "hunter2").await.unwrap();
        assert_eq!(session.email, "op@example.com");
    }

    #[tokio::test]
    async fn test_error_codes() {
        let auth = gateway();
        assert_eq!(
            auth.sign_in("", "x").await.unwrap_err(),
            AuthError::InvalidCredential
        );
        assert_eq!(
            auth.sign_in("ghost@example.com", "x").await.unwrap_err(),
            AuthError::UserNotFound
        );
        assert_eq!(
            auth.sign_in("op@example.com", "wrong").await.unwrap_err(),
            AuthError::WrongPassword
        );
    }

    #[tokio::test]
    async fn test_rate_limiter_trips_and_resets() {
        let auth = gateway();
        for _ in 0..MAX_FAILED_ATTEMPTS {
            let _ = auth.sign_in("op@example.com", "wrong").await;
        }
        // Even the right password is refused while limited
        assert_eq!(
            auth.sign_in("op@example.com", "hunter2").await.unwrap_err(),
            AuthError::TooManyRequests
        );

        auth.clear_failures("op@example.com");
        auth.sign_in("op@example.com", "hunter2").await.unwrap();
        // Counter is gone after a success
        assert!(!auth.is_rate_limited("op@example.com"));
    }

    #[test]
    fn test_friendly_messages() {
        assert_eq!(AuthError::WrongPassword.friendly_message(), "Wrong password");
        assert_eq!(
            AuthError::Other("backend unreachable".to_string()).friendly_message(),
            "backend unreachable"
        );
    }
}
