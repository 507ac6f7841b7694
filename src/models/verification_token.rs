//! Single-use tokens for email verification and password reset.
//!
//! Deleted upon successful consumption; a token value can never be
//! replayed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    EmailVerification,
    PasswordReset,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::EmailVerification => "email_verification",
            TokenKind::PasswordReset => "password_reset",
        }
    }
}

impl std::str::FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email_verification" => Ok(TokenKind::EmailVerification),
            "password_reset" => Ok(TokenKind::PasswordReset),
            _ => Err(format!("Invalid token kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub token_id: Uuid,
    pub token_text: String,
    pub user_id: Uuid,
    pub token_kind: String,
    pub expiry_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl VerificationToken {
    pub fn new(
        user_id: Uuid,
        token_text: String,
        kind: TokenKind,
        lifetime: chrono::Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            token_id: Uuid::new_v4(),
            token_text,
            user_id,
            token_kind: kind.as_str().to_string(),
            expiry_utc: now + lifetime,
            created_utc: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }
}
