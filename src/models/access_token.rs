//! Access token model - opaque bearer secrets backing sessions.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Access token entity. `expiry_utc = None` marks a persistent
/// ("remember me") session that never expires.
#[derive(Debug, Clone, FromRow)]
pub struct AccessToken {
    pub token_id: Uuid,
    pub token_text: String,
    pub user_id: Uuid,
    pub expiry_utc: Option<DateTime<Utc>>,
    pub last_used_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(user_id: Uuid, token_text: String, expiry_utc: Option<DateTime<Utc>>) -> Self {
        let now = Utc::now();
        Self {
            token_id: Uuid::new_v4(),
            token_text,
            user_id,
            expiry_utc,
            last_used_utc: now,
            created_utc: now,
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.expiry_utc.is_none()
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_utc.map_or(false, |expiry| expiry <= Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn persistent_token_never_expires() {
        let token = AccessToken::new(Uuid::new_v4(), "t".into(), None);
        assert!(token.is_persistent());
        assert!(!token.is_expired());
    }

    #[test]
    fn past_expiry_is_expired() {
        let token = AccessToken::new(
            Uuid::new_v4(),
            "t".into(),
            Some(Utc::now() - Duration::seconds(1)),
        );
        assert!(token.is_expired());
    }

    #[test]
    fn future_expiry_is_not_expired() {
        let token = AccessToken::new(
            Uuid::new_v4(),
            "t".into(),
            Some(Utc::now() + Duration::hours(1)),
        );
        assert!(!token.is_expired());
    }
}
