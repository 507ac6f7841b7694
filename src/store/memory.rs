//! In-memory store, used by the integration tests in place of PostgreSQL.
//!
//! Same substitution mechanism as the mock email provider: the application
//! only ever sees `Arc<dyn Store>`. One mutex stands in for transactional
//! atomicity - every multi-step mutation happens under a single lock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::dtos::{ListParams, Page};
use crate::error::AppError;
use crate::models::{
    AccessToken, NewPermission, NewRole, NewUser, Permission, PermissionUpdate, Role, RoleUpdate,
    TokenKind, User, UserSummary, UserUpdate, VerificationToken,
};
use crate::services::session::{generate_bearer_token, generate_single_use_token};
use crate::store::{
    AccessTokenStore, HealthCheck, PermissionStore, RoleStore, UserStore, VerificationTokenStore,
};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Role>,
    permissions: HashMap<Uuid, Permission>,
    role_users: Vec<(Uuid, Uuid)>,        // (user_id, role_id)
    role_permissions: Vec<(Uuid, Uuid)>,  // (role_id, permission_id)
    access_tokens: HashMap<Uuid, AccessToken>,
    verification_tokens: HashMap<Uuid, VerificationToken>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn paginate<T>(mut data: Vec<T>, params: &ListParams) -> Page<T> {
    let total_count = data.len() as u64;
    let start = params.offset() as usize;
    let data = if start >= data.len() {
        Vec::new()
    } else {
        data.drain(start..).take(params.limit as usize).collect()
    };
    Page {
        data,
        page: params.page,
        limit: params.limit,
        total_count,
    }
}

fn conflict(what: &str) -> AppError {
    AppError::Conflict(anyhow::anyhow!("Duplicate value for unique field: {}", what))
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.lock().users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self, params: &ListParams) -> Result<Page<UserSummary>, AppError> {
        let inner = self.lock();
        let mut rows: Vec<UserSummary> = inner
            .users
            .values()
            .filter(|u| {
                params.search.as_deref().map_or(true, |s| {
                    let s = s.to_lowercase();
                    u.display_name.to_lowercase().contains(&s)
                        || u.email.to_lowercase().contains(&s)
                })
            })
            .map(|u| {
                let roles = inner
                    .role_users
                    .iter()
                    .filter(|(uid, _)| *uid == u.user_id)
                    .filter_map(|(_, rid)| inner.roles.get(rid))
                    .map(|r| r.role_name.clone())
                    .collect();
                UserSummary {
                    user_id: u.user_id,
                    display_name: u.display_name.clone(),
                    email: u.email.clone(),
                    roles,
                    created_utc: u.created_utc,
                    updated_utc: u.updated_utc,
                }
            })
            .filter(|row| {
                params.filter("role").map_or(true, |wanted| {
                    let wanted = wanted.to_lowercase();
                    row.roles.iter().any(|r| r.to_lowercase().contains(&wanted))
                })
            })
            .collect();

        rows.sort_by(|a, b| {
            let ord = match params.sort.as_str() {
                "display_name" => a.display_name.cmp(&b.display_name),
                "email" => a.email.cmp(&b.email),
                "updated_utc" => a.updated_utc.cmp(&b.updated_utc),
                _ => a.created_utc.cmp(&b.created_utc),
            };
            if params.descending {
                ord.reverse()
            } else {
                ord
            }
        });

        Ok(paginate(rows, params))
    }

    async fn register_user(
        &self,
        user: NewUser,
        verification_lifetime: Duration,
    ) -> Result<(User, VerificationToken), AppError> {
        let mut inner = self.lock();
        if inner
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(conflict("users.email"));
        }

        let user = User::new(user.display_name, user.email, user.password_hash);
        let token = VerificationToken::new(
            user.user_id,
            generate_single_use_token(),
            TokenKind::EmailVerification,
            verification_lifetime,
        );
        inner.users.insert(user.user_id, user.clone());
        inner.verification_tokens.insert(token.token_id, token.clone());
        Ok((user, token))
    }

    async fn create_user(&self, user: NewUser, role_ids: &[Uuid]) -> Result<User, AppError> {
        let mut inner = self.lock();
        if inner
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(conflict("users.email"));
        }

        let user = User::new(user.display_name, user.email, user.password_hash);
        inner.users.insert(user.user_id, user.clone());
        for role_id in role_ids {
            if !inner.role_users.contains(&(user.user_id, *role_id)) {
                inner.role_users.push((user.user_id, *role_id));
            }
        }
        Ok(user)
    }

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<User, AppError> {
        let mut inner = self.lock();
        if let Some(email) = &update.email {
            if inner
                .users
                .values()
                .any(|u| u.user_id != user_id && u.email.eq_ignore_ascii_case(email))
            {
                return Err(conflict("users.email"));
            }
        }
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;
        if let Some(name) = update.display_name {
            user.display_name = name;
        }
        if let Some(email) = update.email {
            user.email = email;
        }
        user.updated_utc = Utc::now();
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut inner = self.lock();
        inner
            .users
            .remove(&user_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;
        inner.role_users.retain(|(uid, _)| *uid != user_id);
        inner.access_tokens.retain(|_, t| t.user_id != user_id);
        inner.verification_tokens.retain(|_, t| t.user_id != user_id);
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.email_verified_utc = Some(Utc::now());
            user.updated_utc = Utc::now();
        }
        Ok(())
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.password_hash = password_hash.to_string();
            user.updated_utc = Utc::now();
        }
        Ok(())
    }

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>, AppError> {
        let inner = self.lock();
        Ok(inner
            .role_users
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .filter_map(|(_, rid)| inner.roles.get(rid))
            .cloned()
            .collect())
    }

    async fn assign_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<(), AppError> {
        let mut inner = self.lock();
        for role_id in role_ids {
            if !inner.role_users.contains(&(user_id, *role_id)) {
                inner.role_users.push((user_id, *role_id));
            }
        }
        Ok(())
    }

    async fn revoke_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<(), AppError> {
        self.lock()
            .role_users
            .retain(|(uid, rid)| *uid != user_id || !role_ids.contains(rid));
        Ok(())
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, AppError> {
        Ok(self.lock().roles.get(&role_id).cloned())
    }

    async fn list_roles(&self, params: &ListParams) -> Result<Page<Role>, AppError> {
        let inner = self.lock();
        let mut rows: Vec<Role> = inner
            .roles
            .values()
            .filter(|r| {
                params
                    .search
                    .as_deref()
                    .map_or(true, |s| r.role_name.to_lowercase().contains(&s.to_lowercase()))
            })
            .filter(|r| {
                params
                    .filter("scope")
                    .map_or(true, |scope| r.scope.as_deref() == Some(scope))
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ord = match params.sort.as_str() {
                "role_name" => a.role_name.cmp(&b.role_name),
                "updated_utc" => a.updated_utc.cmp(&b.updated_utc),
                _ => a.created_utc.cmp(&b.created_utc),
            };
            if params.descending {
                ord.reverse()
            } else {
                ord
            }
        });

        Ok(paginate(rows, params))
    }

    async fn create_role(&self, role: NewRole) -> Result<Role, AppError> {
        let mut inner = self.lock();
        if inner.roles.values().any(|r| r.role_name == role.role_name) {
            return Err(conflict("roles.role_name"));
        }

        let created = Role::new(role.role_name, role.scope);
        inner.roles.insert(created.role_id, created.clone());
        for permission_id in role.permission_ids {
            if !inner
                .role_permissions
                .contains(&(created.role_id, permission_id))
            {
                inner.role_permissions.push((created.role_id, permission_id));
            }
        }
        Ok(created)
    }

    async fn update_role(&self, role_id: Uuid, update: RoleUpdate) -> Result<Role, AppError> {
        let mut inner = self.lock();
        let role = inner
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;
        if let Some(name) = update.role_name {
            role.role_name = name;
        }
        if let Some(scope) = update.scope {
            role.scope = scope;
        }
        role.updated_utc = Utc::now();
        let role = role.clone();

        if let Some(permission_ids) = update.permission_ids {
            inner.role_permissions.retain(|(rid, _)| *rid != role_id);
            for permission_id in permission_ids {
                inner.role_permissions.push((role_id, permission_id));
            }
        }
        Ok(role)
    }

    async fn delete_role(&self, role_id: Uuid) -> Result<(), AppError> {
        let mut inner = self.lock();
        inner
            .roles
            .remove(&role_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;
        inner.role_permissions.retain(|(rid, _)| *rid != role_id);
        inner.role_users.retain(|(_, rid)| *rid != role_id);
        Ok(())
    }

    async fn permissions_for_role(&self, role_id: Uuid) -> Result<Vec<Permission>, AppError> {
        let inner = self.lock();
        Ok(inner
            .role_permissions
            .iter()
            .filter(|(rid, _)| *rid == role_id)
            .filter_map(|(_, pid)| inner.permissions.get(pid))
            .cloned()
            .collect())
    }

    async fn permission_names_for_roles(
        &self,
        role_ids: &[Uuid],
    ) -> Result<Vec<String>, AppError> {
        let inner = self.lock();
        let mut names: Vec<String> = inner
            .role_permissions
            .iter()
            .filter(|(rid, _)| role_ids.contains(rid))
            .filter_map(|(_, pid)| inner.permissions.get(pid))
            .map(|p| p.permission_name.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn find_permission_by_id(
        &self,
        permission_id: Uuid,
    ) -> Result<Option<Permission>, AppError> {
        Ok(self.lock().permissions.get(&permission_id).cloned())
    }

    async fn list_permissions(&self, params: &ListParams) -> Result<Page<Permission>, AppError> {
        let inner = self.lock();
        let mut rows: Vec<Permission> = inner
            .permissions
            .values()
            .filter(|p| {
                params.search.as_deref().map_or(true, |s| {
                    let s = s.to_lowercase();
                    p.permission_name.to_lowercase().contains(&s)
                        || p.module_name.to_lowercase().contains(&s)
                })
            })
            .filter(|p| {
                params
                    .filter("name")
                    .map_or(true, |name| p.permission_name == name)
            })
            .filter(|p| {
                params
                    .filter("module")
                    .map_or(true, |module| p.module_name == module)
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ord = match params.sort.as_str() {
                "permission_name" => a.permission_name.cmp(&b.permission_name),
                "module_name" => a.module_name.cmp(&b.module_name),
                "updated_utc" => a.updated_utc.cmp(&b.updated_utc),
                _ => a.created_utc.cmp(&b.created_utc),
            };
            if params.descending {
                ord.reverse()
            } else {
                ord
            }
        });

        Ok(paginate(rows, params))
    }

    async fn create_permission(&self, permission: NewPermission) -> Result<Permission, AppError> {
        let mut inner = self.lock();
        if inner
            .permissions
            .values()
            .any(|p| p.permission_name == permission.permission_name)
        {
            return Err(conflict("permissions.permission_name"));
        }

        let created = Permission::new(permission.permission_name, permission.module_name);
        inner.permissions.insert(created.permission_id, created.clone());
        Ok(created)
    }

    async fn update_permission(
        &self,
        permission_id: Uuid,
        update: PermissionUpdate,
    ) -> Result<Permission, AppError> {
        let mut inner = self.lock();
        let permission = inner
            .permissions
            .get_mut(&permission_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Permission not found")))?;
        if let Some(name) = update.permission_name {
            permission.permission_name = name;
        }
        if let Some(module) = update.module_name {
            permission.module_name = module;
        }
        permission.updated_utc = Utc::now();
        Ok(permission.clone())
    }

    async fn delete_permission(&self, permission_id: Uuid) -> Result<(), AppError> {
        let mut inner = self.lock();
        inner
            .permissions
            .remove(&permission_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Permission not found")))?;
        inner.role_permissions.retain(|(_, pid)| *pid != permission_id);
        Ok(())
    }
}

#[async_trait]
impl AccessTokenStore for MemoryStore {
    async fn create_access_token(
        &self,
        user_id: Uuid,
        persistent: bool,
        lifetime: Duration,
    ) -> Result<String, AppError> {
        let expiry = if persistent {
            None
        } else {
            Some(Utc::now() + lifetime)
        };
        let token = AccessToken::new(user_id, generate_bearer_token(), expiry);
        let value = token.token_text.clone();
        self.lock().access_tokens.insert(token.token_id, token);
        Ok(value)
    }

    async fn find_access_token(&self, value: &str) -> Result<Option<AccessToken>, AppError> {
        Ok(self
            .lock()
            .access_tokens
            .values()
            .find(|t| t.token_text == value)
            .cloned())
    }

    async fn touch_access_token(
        &self,
        token_id: Uuid,
        new_expiry: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(token) = inner.access_tokens.get_mut(&token_id) {
            token.last_used_utc = Utc::now();
            if new_expiry.is_some() {
                token.expiry_utc = new_expiry;
            }
        }
        Ok(())
    }

    async fn revoke_access_token(&self, value: &str) -> Result<(), AppError> {
        self.lock().access_tokens.retain(|_, t| t.token_text != value);
        Ok(())
    }

    async fn revoke_access_tokens_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut inner = self.lock();
        let before = inner.access_tokens.len();
        inner.access_tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - inner.access_tokens.len()) as u64)
    }
}

#[async_trait]
impl VerificationTokenStore for MemoryStore {
    async fn create_verification_token(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        lifetime: Duration,
    ) -> Result<VerificationToken, AppError> {
        let token =
            VerificationToken::new(user_id, generate_single_use_token(), kind, lifetime);
        self.lock()
            .verification_tokens
            .insert(token.token_id, token.clone());
        Ok(token)
    }

    async fn consume_verification_token(
        &self,
        value: &str,
        kind: TokenKind,
    ) -> Result<Option<VerificationToken>, AppError> {
        let mut inner = self.lock();
        let found = inner
            .verification_tokens
            .values()
            .find(|t| t.token_text == value && t.token_kind == kind.as_str())
            .map(|t| t.token_id);
        Ok(found.and_then(|id| inner.verification_tokens.remove(&id)))
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
