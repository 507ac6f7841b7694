//! PostgreSQL-backed store.
//!
//! Plain `query_as` / `query` with explicit binds; dynamic fragments
//! (search, filters, sort) go through `QueryBuilder` with sort columns
//! restricted to the validated allow-lists upstream.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{postgres::PgPool, Postgres, QueryBuilder, Row};
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

/// PostgreSQL store wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_order_and_page(qb: &mut QueryBuilder<'_, Postgres>, params: &ListParams) {
        qb.push(" ORDER BY ");
        // Column name comes from a static allow-list, never raw user input.
        qb.push(params.sort.clone());
        qb.push(if params.descending { " DESC" } else { " ASC" });
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(params.limit));
        qb.push(" OFFSET ");
        qb.push_bind(params.offset());
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn list_users(&self, params: &ListParams) -> Result<Page<UserSummary>, AppError> {
        // Bound arguments cannot be shared between builders, so the WHERE
        // conditions are pushed into the page query and the count query
        // separately.
        fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, params: &ListParams) {
            if let Some(search) = &params.search {
                let like = format!("%{}%", search);
                qb.push(" AND (display_name ILIKE ");
                qb.push_bind(like.clone());
                qb.push(" OR email ILIKE ");
                qb.push_bind(like);
                qb.push(")");
            }
            if let Some(role) = params.filter("role") {
                qb.push(
                    " AND EXISTS (SELECT 1 FROM role_users ru \
                     JOIN roles r ON r.role_id = ru.role_id \
                     WHERE ru.user_id = users.user_id AND r.role_name ILIKE ",
                );
                qb.push_bind(format!("%{}%", role));
                qb.push(")");
            }
        }

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM users WHERE TRUE");
        push_conditions(&mut qb, params);
        Self::push_order_and_page(&mut qb, params);
        let users: Vec<User> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut count_qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM users WHERE TRUE");
        push_conditions(&mut count_qb, params);
        let total_count: i64 = count_qb
            .build()
            .fetch_one(&self.pool)
            .await?
            .try_get("total")
            .map_err(|e| AppError::Database(anyhow::anyhow!(e)))?;

        let user_ids: Vec<Uuid> = users.iter().map(|u| u.user_id).collect();
        let role_rows = sqlx::query(
            "SELECT ru.user_id, r.role_name FROM role_users ru \
             JOIN roles r ON r.role_id = ru.role_id WHERE ru.user_id = ANY($1)",
        )
        .bind(&user_ids)
        .fetch_all(&self.pool)
        .await?;

        let data = users
            .into_iter()
            .map(|u| {
                let roles = role_rows
                    .iter()
                    .filter(|row| row.get::<Uuid, _>("user_id") == u.user_id)
                    .map(|row| row.get::<String, _>("role_name"))
                    .collect();
                UserSummary {
                    user_id: u.user_id,
                    display_name: u.display_name,
                    email: u.email,
                    roles,
                    created_utc: u.created_utc,
                    updated_utc: u.updated_utc,
                }
            })
            .collect();

        Ok(Page {
            data,
            page: params.page,
            limit: params.limit,
            total_count: total_count as u64,
        })
    }

    async fn register_user(
        &self,
        user: NewUser,
        verification_lifetime: Duration,
    ) -> Result<(User, VerificationToken), AppError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (user_id, display_name, email, password_hash) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&mut *tx)
        .await?;

        let token = VerificationToken::new(
            user.user_id,
            generate_single_use_token(),
            TokenKind::EmailVerification,
            verification_lifetime,
        );
        sqlx::query(
            "INSERT INTO verification_tokens \
             (token_id, token_text, user_id, token_kind, expiry_utc) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(token.token_id)
        .bind(&token.token_text)
        .bind(token.user_id)
        .bind(&token.token_kind)
        .bind(token.expiry_utc)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((user, token))
    }

    async fn create_user(&self, user: NewUser, role_ids: &[Uuid]) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (user_id, display_name, email, password_hash) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&mut *tx)
        .await?;

        if !role_ids.is_empty() {
            sqlx::query(
                "INSERT INTO role_users (user_id, role_id) \
                 SELECT $1, unnest($2::uuid[]) ON CONFLICT DO NOTHING",
            )
            .bind(user.user_id)
            .bind(role_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(user)
    }

    async fn update_user(&self, user_id: Uuid, update: UserUpdate) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET display_name = COALESCE($2, display_name), \
             email = COALESCE($3, email), updated_utc = now() \
             WHERE user_id = $1 RETURNING *",
        )
        .bind(user_id)
        .bind(update.display_name)
        .bind(update.email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("User not found")));
        }
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET email_verified_utc = now(), updated_utc = now() \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET password_hash = $2, updated_utc = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<Role>, AppError> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT r.* FROM roles r \
             JOIN role_users ru ON ru.role_id = r.role_id WHERE ru.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    async fn assign_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO role_users (user_id, role_id) \
             SELECT $1, unnest($2::uuid[]) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_roles(&self, user_id: Uuid, role_ids: &[Uuid]) -> Result<(), AppError> {
        sqlx::query("DELETE FROM role_users WHERE user_id = $1 AND role_id = ANY($2)")
            .bind(user_id)
            .bind(role_ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn list_roles(&self, params: &ListParams) -> Result<Page<Role>, AppError> {
        fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, params: &ListParams) {
            if let Some(search) = &params.search {
                qb.push(" AND role_name ILIKE ");
                qb.push_bind(format!("%{}%", search));
            }
            if let Some(scope) = params.filter("scope") {
                qb.push(" AND scope = ");
                qb.push_bind(scope.to_string());
            }
        }

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM roles WHERE TRUE");
        push_conditions(&mut qb, params);
        Self::push_order_and_page(&mut qb, params);
        let data: Vec<Role> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut count_qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM roles WHERE TRUE");
        push_conditions(&mut count_qb, params);
        let total_count: i64 = count_qb
            .build()
            .fetch_one(&self.pool)
            .await?
            .try_get("total")
            .map_err(|e| AppError::Database(anyhow::anyhow!(e)))?;

        Ok(Page {
            data,
            page: params.page,
            limit: params.limit,
            total_count: total_count as u64,
        })
    }

    async fn create_role(&self, role: NewRole) -> Result<Role, AppError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Role>(
            "INSERT INTO roles (role_id, role_name, scope) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&role.role_name)
        .bind(&role.scope)
        .fetch_one(&mut *tx)
        .await?;

        if !role.permission_ids.is_empty() {
            sqlx::query(
                "INSERT INTO role_permissions (role_id, permission_id) \
                 SELECT $1, unnest($2::uuid[]) ON CONFLICT DO NOTHING",
            )
            .bind(created.role_id)
            .bind(&role.permission_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn update_role(&self, role_id: Uuid, update: RoleUpdate) -> Result<Role, AppError> {
        let mut tx = self.pool.begin().await?;

        let (set_scope, scope) = match update.scope {
            Some(scope) => (true, scope),
            None => (false, None),
        };

        let role = sqlx::query_as::<_, Role>(
            "UPDATE roles SET role_name = COALESCE($2, role_name), \
             scope = CASE WHEN $3 THEN $4 ELSE scope END, updated_utc = now() \
             WHERE role_id = $1 RETURNING *",
        )
        .bind(role_id)
        .bind(update.role_name)
        .bind(set_scope)
        .bind(scope)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;

        if let Some(permission_ids) = update.permission_ids {
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
            if !permission_ids.is_empty() {
                sqlx::query(
                    "INSERT INTO role_permissions (role_id, permission_id) \
                     SELECT $1, unnest($2::uuid[]) ON CONFLICT DO NOTHING",
                )
                .bind(role_id)
                .bind(&permission_ids)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(role)
    }

    async fn delete_role(&self, role_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM roles WHERE role_id = $1")
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Role not found")));
        }
        Ok(())
    }

    async fn permissions_for_role(&self, role_id: Uuid) -> Result<Vec<Permission>, AppError> {
        let permissions = sqlx::query_as::<_, Permission>(
            "SELECT p.* FROM permissions p \
             JOIN role_permissions rp ON rp.permission_id = p.permission_id \
             WHERE rp.role_id = $1",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }

    async fn permission_names_for_roles(
        &self,
        role_ids: &[Uuid],
    ) -> Result<Vec<String>, AppError> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT p.permission_name FROM permissions p \
             JOIN role_permissions rp ON rp.permission_id = p.permission_id \
             WHERE rp.role_id = ANY($1)",
        )
        .bind(role_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }
}

#[async_trait]
impl PermissionStore for PgStore {
    async fn find_permission_by_id(
        &self,
        permission_id: Uuid,
    ) -> Result<Option<Permission>, AppError> {
        let permission =
            sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE permission_id = $1")
                .bind(permission_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(permission)
    }

    async fn list_permissions(&self, params: &ListParams) -> Result<Page<Permission>, AppError> {
        fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, params: &ListParams) {
            if let Some(search) = &params.search {
                let like = format!("%{}%", search);
                qb.push(" AND (permission_name ILIKE ");
                qb.push_bind(like.clone());
                qb.push(" OR module_name ILIKE ");
                qb.push_bind(like);
                qb.push(")");
            }
            if let Some(name) = params.filter("name") {
                qb.push(" AND permission_name = ");
                qb.push_bind(name.to_string());
            }
            if let Some(module) = params.filter("module") {
                qb.push(" AND module_name = ");
                qb.push_bind(module.to_string());
            }
        }

        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM permissions WHERE TRUE");
        push_conditions(&mut qb, params);
        Self::push_order_and_page(&mut qb, params);
        let data: Vec<Permission> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut count_qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM permissions WHERE TRUE");
        push_conditions(&mut count_qb, params);
        let total_count: i64 = count_qb
            .build()
            .fetch_one(&self.pool)
            .await?
            .try_get("total")
            .map_err(|e| AppError::Database(anyhow::anyhow!(e)))?;

        Ok(Page {
            data,
            page: params.page,
            limit: params.limit,
            total_count: total_count as u64,
        })
    }

    async fn create_permission(&self, permission: NewPermission) -> Result<Permission, AppError> {
        let created = sqlx::query_as::<_, Permission>(
            "INSERT INTO permissions (permission_id, permission_name, module_name) \
             VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&permission.permission_name)
        .bind(&permission.module_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_permission(
        &self,
        permission_id: Uuid,
        update: PermissionUpdate,
    ) -> Result<Permission, AppError> {
        sqlx::query_as::<_, Permission>(
            "UPDATE permissions SET permission_name = COALESCE($2, permission_name), \
             module_name = COALESCE($3, module_name), updated_utc = now() \
             WHERE permission_id = $1 RETURNING *",
        )
        .bind(permission_id)
        .bind(update.permission_name)
        .bind(update.module_name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Permission not found")))
    }

    async fn delete_permission(&self, permission_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM permissions WHERE permission_id = $1")
            .bind(permission_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Permission not found")));
        }
        Ok(())
    }
}

#[async_trait]
impl AccessTokenStore for PgStore {
    async fn create_access_token(
        &self,
        user_id: Uuid,
        persistent: bool,
        lifetime: Duration,
    ) -> Result<String, AppError> {
        let token_text = generate_bearer_token();
        let expiry_utc = if persistent {
            None
        } else {
            Some(Utc::now() + lifetime)
        };

        sqlx::query(
            "INSERT INTO access_tokens (token_id, token_text, user_id, expiry_utc) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(&token_text)
        .bind(user_id)
        .bind(expiry_utc)
        .execute(&self.pool)
        .await?;

        Ok(token_text)
    }

    async fn find_access_token(&self, value: &str) -> Result<Option<AccessToken>, AppError> {
        let token =
            sqlx::query_as::<_, AccessToken>("SELECT * FROM access_tokens WHERE token_text = $1")
                .bind(value)
                .fetch_optional(&self.pool)
                .await?;
        Ok(token)
    }

    async fn touch_access_token(
        &self,
        token_id: Uuid,
        new_expiry: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        // COALESCE keeps the stored expiry (including NULL for persistent
        // tokens) when no renewal applies.
        sqlx::query(
            "UPDATE access_tokens SET last_used_utc = now(), \
             expiry_utc = COALESCE($2, expiry_utc) WHERE token_id = $1",
        )
        .bind(token_id)
        .bind(new_expiry)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_access_token(&self, value: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM access_tokens WHERE token_text = $1")
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke_access_tokens_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl VerificationTokenStore for PgStore {
    async fn create_verification_token(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        lifetime: Duration,
    ) -> Result<VerificationToken, AppError> {
        let token = VerificationToken::new(
            user_id,
            generate_single_use_token(),
            kind,
            lifetime,
        );
        sqlx::query(
            "INSERT INTO verification_tokens \
             (token_id, token_text, user_id, token_kind, expiry_utc) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(token.token_id)
        .bind(&token.token_text)
        .bind(token.user_id)
        .bind(&token.token_kind)
        .bind(token.expiry_utc)
        .execute(&self.pool)
        .await?;
        Ok(token)
    }

    async fn consume_verification_token(
        &self,
        value: &str,
        kind: TokenKind,
    ) -> Result<Option<VerificationToken>, AppError> {
        let token = sqlx::query_as::<_, VerificationToken>(
            "DELETE FROM verification_tokens \
             WHERE token_text = $1 AND token_kind = $2 RETURNING *",
        )
        .bind(value)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }
}

#[async_trait]
impl HealthCheck for PgStore {
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            AppError::Database(anyhow::anyhow!("Database health check failed: {}", e))
        })?;
        Ok(())
    }
}
