//! Persistence abstraction.
//!
//! One trait per entity, implemented by the PostgreSQL-backed [`PgStore`]
//! and by the in-memory [`MemoryStore`] used in tests. Components receive a
//! store handle explicitly; nothing reaches a process-wide database client.
//!
//! Multi-step mutations (registration, role creation with its permission
//! set, assignment replacement) are single trait methods so each backend can
//! make them atomic - a transaction in Postgres, one lock in memory.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::dtos::{ListParams, Page};
use crate::error::AppError;
use crate::models::{
    AccessToken, NewPermission, NewRole, NewUser, Permission, PermissionUpdate, Role, RoleUpdate,
    TokenKind, User, UserSummary, UserUpdate, VerificationToken,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn list_users(&self, params: &ListParams) -> Result<Page<UserSummary>, AppError>;

    /// Registration write: user row plus its email-verification token,
    /// committed together or not at all.
    async fn register_user(
        &self,
        user: NewUser,
        verification_lifetime: Duration,
    ) -> Result<(User, VerificationToken), AppError>;

    /// Management create: user row plus initial role assignments, atomic.
    async fn create_user(&self, user: NewUser, role_ids: &[Uuid]) -> Result<User, AppError>;

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<User, AppError>;

    /// Deletes the user; role assignments and tokens cascade.
    async fn delete_user(&self, user_id: Uuid) -> Result<(), AppError>;

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), AppError>;

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AppError>;

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>, AppError>;

    /// Assign roles, skipping (user, role) pairs that already exist.
    async fn assign_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<(), AppError>;

    async fn revoke_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<(), AppError>;
}

#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, AppError>;

    async fn list_roles(&self, params: &ListParams) -> Result<Page<Role>, AppError>;

    /// Create the role and its initial permission links atomically.
    async fn create_role(&self, role: NewRole) -> Result<Role, AppError>;

    /// Update the role; when `permission_ids` is present the permission set
    /// is replaced wholesale, atomically with the row update.
    async fn update_role(&self, role_id: Uuid, update: RoleUpdate) -> Result<Role, AppError>;

    async fn delete_role(&self, role_id: Uuid) -> Result<(), AppError>;

    async fn permissions_for_role(&self, role_id: Uuid) -> Result<Vec<Permission>, AppError>;

    /// Permission names granted by any of the given roles, deduplicated.
    async fn permission_names_for_roles(
        &self,
        role_ids: &[Uuid],
    ) -> Result<Vec<String>, AppError>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn find_permission_by_id(
        &self,
        permission_id: Uuid,
    ) -> Result<Option<Permission>, AppError>;

    async fn list_permissions(&self, params: &ListParams) -> Result<Page<Permission>, AppError>;

    async fn create_permission(&self, permission: NewPermission) -> Result<Permission, AppError>;

    async fn update_permission(
        &self,
        permission_id: Uuid,
        update: PermissionUpdate,
    ) -> Result<Permission, AppError>;

    async fn delete_permission(&self, permission_id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait AccessTokenStore: Send + Sync {
    /// Issue a new bearer token for the user. Non-persistent tokens expire
    /// `lifetime` from now; persistent tokens carry no expiry at all.
    async fn create_access_token(
        &self,
        user_id: Uuid,
        persistent: bool,
        lifetime: Duration,
    ) -> Result<String, AppError>;

    async fn find_access_token(&self, value: &str) -> Result<Option<AccessToken>, AppError>;

    /// Record a use of the token: `last_used_utc = now`, and when
    /// `new_expiry` is present, replace the expiry (sliding window).
    async fn touch_access_token(
        &self,
        token_id: Uuid,
        new_expiry: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;

    /// Remove the token; subsequent lookups fail closed.
    async fn revoke_access_token(&self, value: &str) -> Result<(), AppError>;

    async fn revoke_access_tokens_for_user(&self, user_id: Uuid) -> Result<u64, AppError>;
}

#[async_trait]
pub trait VerificationTokenStore: Send + Sync {
    async fn create_verification_token(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        lifetime: Duration,
    ) -> Result<VerificationToken, AppError>;

    /// Atomically delete and return the token. A given token value can be
    /// consumed at most once.
    async fn consume_verification_token(
        &self,
        value: &str,
        kind: TokenKind,
    ) -> Result<Option<VerificationToken>, AppError>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;
}

/// Umbrella trait: everything the application state needs from persistence.
pub trait Store:
    UserStore + RoleStore + PermissionStore + AccessTokenStore + VerificationTokenStore + HealthCheck
{
}

impl<T> Store for T where
    T: UserStore
        + RoleStore
        + PermissionStore
        + AccessTokenStore
        + VerificationTokenStore
        + HealthCheck
{
}

pub type SharedStore = Arc<dyn Store>;
