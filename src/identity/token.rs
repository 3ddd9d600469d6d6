use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::SessionError;

const REFRESH_BUFFER_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdToken {
    pub fn new(token: String, issued_at: DateTime<Utc>, lifetime_seconds: i64) -> Self {
        Self {
            token,
            issued_at,
            expires_at: issued_at + Duration::seconds(lifetime_seconds),
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + Duration::minutes(REFRESH_BUFFER_MINUTES)
    }

    /// True when the backend flagged the user for re-issue after this token was minted.
    pub fn stale_after(&self, refresh_time: Option<DateTime<Utc>>) -> bool {
        refresh_time.is_some_and(|flagged| flagged > self.issued_at)
    }

    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Seam over the identity SDK that mints ID tokens for the signed-in user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_id_token(&self, force_refresh: bool) -> Result<IdToken, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn issued() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap()
    }

    fn create_test_token() -> IdToken {
        IdToken::new("id_token".to_string(), issued(), 3600)
    }

    #[test]
    fn new_token_is_valid() {
        let token = create_test_token();
        assert!(token.is_valid(issued() + Duration::minutes(10)));
    }

    #[test]
    fn expired_token_is_not_valid() {
        let token = create_test_token();
        assert!(!token.is_valid(issued() + Duration::hours(2)));
    }

    #[test]
    fn needs_refresh_detects_soon_to_expire_token() {
        let token = create_test_token();
        assert!(token.needs_refresh(issued() + Duration::minutes(57)));
    }

    #[test]
    fn needs_refresh_returns_false_for_fresh_token() {
        let token = create_test_token();
        assert!(!token.needs_refresh(issued() + Duration::minutes(1)));
    }

    #[test]
    fn refresh_flag_newer_than_token_marks_it_stale() {
        let token = create_test_token();

        assert!(token.stale_after(Some(issued() + Duration::minutes(1))));
        assert!(!token.stale_after(Some(issued() - Duration::minutes(1))));
        assert!(!token.stale_after(None));
    }

    #[test]
    fn bearer_header_prefixes_token() {
        assert_eq!(create_test_token().bearer_header(), "Bearer id_token");
    }
}
