//! Session exchange against the identity provider.
//!
//! The callback route hands us a one-time code; we trade it for a session
//! over HTTPS. One call, no retries.

use serde::Deserialize;

use super::AuthError;

/// An authenticated session as returned by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
}

pub trait AuthProvider: Send + Sync {
    /// Exchange a one-time callback code for a session.
    fn exchange_code(&self, code: &str) -> Result<Session, AuthError>;
}

/// HTTP identity provider client.
pub struct HttpAuthProvider {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpAuthProvider {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[derive(serde::Serialize)]
struct ExchangeRequest<'a> {
    code: &'a str,
    grant_type: &'a str,
}

impl AuthProvider for HttpAuthProvider {
    fn exchange_code(&self, code: &str) -> Result<Session, AuthError> {
        let url = format!("{}/auth/v1/token", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ExchangeRequest {
                code,
                grant_type: "authorization_code",
            })
            .send()
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AuthError::AuthFailed(format!(
                "code exchange rejected (status {}): {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json::<Session>()
            .map_err(|e| AuthError::AuthFailed(format!("malformed session payload: {e}")))
    }
}

/// Mock provider for tests: accepts a single known code.
pub struct MockAuthProvider {
    valid_code: String,
    session: Session,
}

impl MockAuthProvider {
    pub fn new(valid_code: &str, user_id: &str) -> Self {
        Self {
            valid_code: valid_code.to_string(),
            session: Session {
                user_id: user_id.to_string(),
                email: format!("{user_id}@example.test"),
                access_token: "test-token".to_string(),
            },
        }
    }
}

impl AuthProvider for MockAuthProvider {
    fn exchange_code(&self, code: &str) -> Result<Session, AuthError> {
        if code == self.valid_code {
            Ok(self.session.clone())
        } else {
            Err(AuthError::AuthFailed("invalid or expired code".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_accepts_only_known_code() {
        let provider = MockAuthProvider::new("good-code", "user-1");

        let session = provider.exchange_code("good-code").unwrap();
        assert_eq!(session.user_id, "user-1");

        let err = provider.exchange_code("bad-code").unwrap_err();
        assert!(matches!(err, AuthError::AuthFailed(_)));
    }
}
