//! Builds the authorization-ready view of a user: the user row, every role
//! granted to it, and the union of all permissions those roles carry.

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Identity, RoleGrant};
use crate::store::SharedStore;

#[derive(Clone)]
pub struct IdentityResolver {
    store: SharedStore,
}

impl IdentityResolver {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Resolve a user id into its [`Identity`]. Fails with `NotFound` when
    /// the user row no longer exists; callers on the request path map that
    /// to an authentication failure rather than a server error.
    pub async fn resolve(&self, user_id: Uuid) -> Result<Identity, AppError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

        let roles = self.store.roles_for_user(user.user_id).await?;
        let role_ids: Vec<Uuid> = roles.iter().map(|r| r.role_id).collect();
        let permissions = self
            .store
            .permission_names_for_roles(&role_ids)
            .await?
            .into_iter()
            .collect();

        Ok(Identity {
            user_id: user.user_id,
            display_name: user.display_name,
            email: user.email,
            roles: roles
                .into_iter()
                .map(|r| RoleGrant {
                    name: r.role_name,
                    scope: r.scope,
                })
                .collect(),
            permissions,
        })
    }
}
