//! OAuth2 password-grant tokens.

use std::time::{Duration, Instant};

use serde::Deserialize;

/// Tokens are refreshed this long before the server-side expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the server omits `expires_in`.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(900);

/// Body of a successful `/api/oauth2/token` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token.
    pub access_token: String,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// A cached bearer token.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    refresh_at: Instant,
}

impl AccessToken {
    /// Build a token from a token response received at `issued_at`.
    pub fn from_response(response: TokenResponse, issued_at: Instant) -> Self {
        let lifetime = response
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LIFETIME);
        Self {
            value: response.access_token,
            refresh_at: issued_at + lifetime.saturating_sub(REFRESH_MARGIN),
        }
    }

    /// The bearer value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the token can still be used at `now`.
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        now < self.refresh_at
    }

    /// Whether the token can still be used.
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Instant::now())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("refresh_at", &self.refresh_at)
            .finish()
    }
}

/// Form fields of a password-grant token request.
pub(crate) fn password_grant<'a>(
    username: &'a str,
    password: &'a str,
) -> [(&'static str, &'a str); 3] {
    [
        ("grant_type", "password"),
        ("username", username),
        ("password", password),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_refreshes_before_expiry() {
        let issued = Instant::now();
        let token = AccessToken::from_response(
            TokenResponse {
                access_token: "abc".to_string(),
                expires_in: Some(3600),
            },
            issued,
        );

        assert_eq!(token.value(), "abc");
        assert!(token.is_fresh_at(issued + Duration::from_secs(3000)));
        assert!(!token.is_fresh_at(issued + Duration::from_secs(3540)));
    }

    #[test]
    fn test_short_lived_token_is_never_fresh() {
        let issued = Instant::now();
        let token = AccessToken::from_response(
            TokenResponse {
                access_token: "abc".to_string(),
                expires_in: Some(30),
            },
            issued,
        );
        assert!(!token.is_fresh_at(issued));
    }

    #[test]
    fn test_missing_expiry_uses_default() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"xyz","token_type":"bearer"}"#).unwrap();
        let issued = Instant::now();
        let token = AccessToken::from_response(response, issued);
        assert!(token.is_fresh_at(issued + Duration::from_secs(600)));
        assert!(!token.is_fresh_at(issued + Duration::from_secs(900)));
    }

    #[test]
    fn test_debug_redacts_value() {
        let token = AccessToken::from_response(
            TokenResponse {
                access_token: "super-secret".to_string(),
                expires_in: None,
            },
            Instant::now(),
        );
        assert!(!format!("{:?}", token).contains("super-secret"));
    }

    #[test]
    fn test_password_grant_fields() {
        let form = password_grant("admin", "pw");
        assert_eq!(form[0], ("grant_type", "password"));
        assert_eq!(form[1], ("username", "admin"));
    }
}
