pub mod admin;
pub mod auth;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Raw list parameters as they arrive on the wire. `filter` holds
/// `key:value` pairs separated by commas (e.g. `role:admin,module:user`).
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub search: Option<String>,
    pub sort: Option<String>,
    #[serde(default = "default_sort_direction")]
    pub sort_direction: String,
    pub filter: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    25
}

fn default_sort_direction() -> String {
    "asc".to_string()
}

/// Per-entity allow-lists for sortable columns and filter keys.
#[derive(Debug, Clone, Copy)]
pub struct ListRules {
    pub default_sort: &'static str,
    pub allowed_sort: &'static [&'static str],
    pub allowed_filter: &'static [&'static str],
}

/// Validated list parameters, checked before any store access.
#[derive(Debug, Clone)]
pub struct ListParams {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub sort: String,
    pub descending: bool,
    pub filters: Vec<(String, String)>,
}

impl ListParams {
    pub fn offset(&self) -> i64 {
        i64::from(self.limit) * i64::from(self.page.saturating_sub(1))
    }

    pub fn filter(&self, key: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl ListQuery {
    /// Validate against an entity's allow-lists. Disallowed sort fields,
    /// sort directions, and filter keys are rejected here, before any
    /// store access.
    pub fn validated(self, rules: &ListRules) -> Result<ListParams, AppError> {
        let sort = self
            .sort
            .unwrap_or_else(|| rules.default_sort.to_string());
        if !rules.allowed_sort.contains(&sort.as_str()) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid sort field: {}",
                sort
            )));
        }

        let descending = match self.sort_direction.as_str() {
            "asc" => false,
            "desc" => true,
            other => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Invalid sort direction: {}",
                    other
                )))
            }
        };

        let mut filters = Vec::new();
        if let Some(raw) = self.filter.as_deref() {
            for pair in raw.split(',').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once(':').ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!("Invalid filter expression: {}", pair))
                })?;
                if !rules.allowed_filter.contains(&key) {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Invalid filter field: {}",
                        key
                    )));
                }
                filters.push((key.to_string(), value.to_string()));
            }
        }

        Ok(ListParams {
            page: self.page.max(1),
            limit: self.limit.clamp(1, 100),
            search: self.search.filter(|s| !s.is_empty()),
            sort,
            descending,
            filters,
        })
    }
}

/// Paginated response envelope for list endpoints.
#[derive(Debug, Serialize, ToSchema)]
#[aliases(
    UserPage = Page<crate::models::UserSummary>,
    RolePage = Page<crate::models::Role>,
    PermissionPage = Page<crate::models::Permission>
)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: ListRules = ListRules {
        default_sort: "created_utc",
        allowed_sort: &["display_name", "email", "created_utc"],
        allowed_filter: &["role"],
    };

    fn query() -> ListQuery {
        ListQuery {
            page: 1,
            limit: 25,
            search: None,
            sort: None,
            sort_direction: "asc".into(),
            filter: None,
        }
    }

    #[test]
    fn defaults_pass_validation() {
        let params = query().validated(&RULES).unwrap();
        assert_eq!(params.sort, "created_utc");
        assert!(!params.descending);
        assert!(params.filters.is_empty());
    }

    #[test]
    fn disallowed_sort_field_is_rejected() {
        let mut q = query();
        q.sort = Some("password_hash".into());
        assert!(matches!(
            q.validated(&RULES),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn disallowed_filter_key_is_rejected() {
        let mut q = query();
        q.filter = Some("password_hash:x".into());
        assert!(matches!(
            q.validated(&RULES),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn filters_parse_into_pairs() {
        let mut q = query();
        q.filter = Some("role:admin".into());
        let params = q.validated(&RULES).unwrap();
        assert_eq!(params.filter("role"), Some("admin"));
    }

    #[test]
    fn invalid_sort_direction_is_rejected() {
        let mut q = query();
        q.sort_direction = "sideways".into();
        assert!(q.validated(&RULES).is_err());
    }
}
