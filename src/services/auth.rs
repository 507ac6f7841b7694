//! Registration, login and account-recovery flows.

use std::sync::Arc;

use chrono::Duration;

use crate::dtos::auth::{LoginRequest, LoginResponse, RegisterRequest, ResetPasswordRequest};
use crate::error::{unauthenticated, AppError};
use crate::models::{NewUser, TokenKind, User};
use crate::services::email::EmailProvider;
use crate::services::identity::IdentityResolver;
use crate::store::SharedStore;
use crate::utils::password::{hash_password, verify_password, Password};

#[derive(Clone)]
pub struct AuthService {
    store: SharedStore,
    email: Arc<dyn EmailProvider>,
    identity: IdentityResolver,
    session_lifetime: Duration,
    verification_lifetime: Duration,
    frontend_url: String,
}

impl AuthService {
    pub fn new(
        store: SharedStore,
        email: Arc<dyn EmailProvider>,
        session_lifetime: Duration,
        verification_lifetime: Duration,
        frontend_url: String,
    ) -> Self {
        let identity = IdentityResolver::new(store.clone());
        Self {
            store,
            email,
            identity,
            session_lifetime,
            verification_lifetime,
            frontend_url,
        }
    }

    /// Verify credentials and issue an access token.
    ///
    /// Unknown email and wrong password produce the same response, so the
    /// endpoint cannot be used to probe which addresses are registered.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AppError> {
        let user = self.store.find_user_by_email(&request.email).await?;

        let password = Password::new(request.password);
        let user = match user {
            Some(user) if verify_password(&password, &user.password_hash) => user,
            _ => {
                tracing::info!(email = %request.email, "Login failed");
                return Err(AppError::Unauthenticated(anyhow::anyhow!(
                    "Invalid email or password"
                )));
            }
        };

        let access_token = self
            .store
            .create_access_token(user.user_id, request.remember_me, self.session_lifetime)
            .await?;
        let identity = self.identity.resolve(user.user_id).await?;

        tracing::info!(user_id = %identity.user_id, persistent = request.remember_me, "Login succeeded");

        Ok(LoginResponse {
            user: identity,
            access_token,
        })
    }

    /// Create an account and send the verification email.
    ///
    /// The user row and its verification token are written together; the
    /// email goes out only after that write succeeds, and a delivery failure
    /// is logged rather than undoing the registration.
    pub async fn register(&self, request: RegisterRequest) -> Result<User, AppError> {
        let password_hash = hash_password(&Password::new(request.password))?;

        let (user, token) = self
            .store
            .register_user(
                NewUser {
                    display_name: request.name,
                    email: request.email,
                    password_hash: password_hash.into_string(),
                },
                self.verification_lifetime,
            )
            .await?;

        if let Err(e) = self
            .email
            .send_verification_email(&user.email, &token.token_text, &self.frontend_url)
            .await
        {
            tracing::error!(error = %e, user_id = %user.user_id, "Verification email failed after registration");
        }

        tracing::info!(user_id = %user.user_id, "User registered");
        Ok(user)
    }

    /// Consume a verification token and mark the account verified. Each
    /// token works exactly once; a second presentation fails like an unknown
    /// token.
    pub async fn verify_email(&self, token_value: &str) -> Result<(), AppError> {
        let token = self
            .store
            .consume_verification_token(token_value, TokenKind::EmailVerification)
            .await?
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid or expired token")))?;

        if token.is_expired() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid or expired token"
            )));
        }

        self.store.mark_email_verified(token.user_id).await?;
        tracing::info!(user_id = %token.user_id, "Email verified");
        Ok(())
    }

    /// Issue a fresh verification token and re-send the email.
    pub async fn resend_verification(&self, email: &str) -> Result<(), AppError> {
        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

        if user.is_verified() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Email is already verified"
            )));
        }

        let token = self
            .store
            .create_verification_token(
                user.user_id,
                TokenKind::EmailVerification,
                self.verification_lifetime,
            )
            .await?;

        self.email
            .send_verification_email(&user.email, &token.token_text, &self.frontend_url)
            .await
    }

    /// Start a password reset. Unknown addresses return success without
    /// sending anything.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let Some(user) = self.store.find_user_by_email(email).await? else {
            tracing::info!(email = %email, "Password reset requested for unknown email");
            return Ok(());
        };

        let token = self
            .store
            .create_verification_token(
                user.user_id,
                TokenKind::PasswordReset,
                self.verification_lifetime,
            )
            .await?;

        self.email
            .send_password_reset_email(&user.email, &token.token_text, &self.frontend_url)
            .await
    }

    /// Consume a reset token, set the new password and revoke every access
    /// token the user holds.
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), AppError> {
        let token = self
            .store
            .consume_verification_token(&request.token, TokenKind::PasswordReset)
            .await?
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid or expired token")))?;

        if token.is_expired() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid or expired token"
            )));
        }

        let password_hash = hash_password(&Password::new(request.new_password))?;
        self.store
            .update_password(token.user_id, password_hash.as_str())
            .await?;

        let revoked = self
            .store
            .revoke_access_tokens_for_user(token.user_id)
            .await?;
        tracing::info!(user_id = %token.user_id, revoked, "Password reset");
        Ok(())
    }

    /// Revoke the presented access token.
    pub async fn logout(&self, token_value: &str) -> Result<(), AppError> {
        if token_value.is_empty() {
            return Err(unauthenticated());
        }
        self.store.revoke_access_token(token_value).await
    }
}
