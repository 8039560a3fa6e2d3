//! Permission checks for users

use std::collections::HashSet;
use tracing::debug;

use crate::backends::{RegisteredBackend, Target};
use crate::error::AccountsResult;
use crate::models::UserRecord;

/// Answers permission questions by consulting backends in order.
///
/// Active superusers pass every check without any backend being asked.
/// A denied permission is `false` or an empty set, never an error; errors
/// raised by a backend are returned as is.
#[derive(Clone, Default)]
pub struct Authorizer {
    backends: Vec<RegisteredBackend>,
}

impl Authorizer {
    pub fn new(backends: Vec<RegisteredBackend>) -> Self {
        Self { backends }
    }

    pub async fn has_permission(
        &self,
        user: &UserRecord,
        permission: &str,
        target: Option<&Target>,
    ) -> AccountsResult<bool> {
        if user.is_active && user.is_superuser {
            return Ok(true);
        }

        for backend in &self.backends {
            if backend.has_permission(user, permission, target).await? {
                debug!("{} granted {} to user {}", backend.name(), permission, user.id);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// All of `permissions` must be granted
    pub async fn has_permissions(
        &self,
        user: &UserRecord,
        permissions: &[&str],
        target: Option<&Target>,
    ) -> AccountsResult<bool> {
        for permission in permissions {
            if !self.has_permission(user, permission, target).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn has_module_permissions(
        &self,
        user: &UserRecord,
        app_label: &str,
    ) -> AccountsResult<bool> {
        if user.is_active && user.is_superuser {
            return Ok(true);
        }

        for backend in &self.backends {
            if backend.has_module_permissions(user, app_label).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Union over the backends that support groups; the rest are skipped
    pub async fn all_group_permissions(
        &self,
        user: &UserRecord,
        target: Option<&Target>,
    ) -> AccountsResult<HashSet<String>> {
        let mut permissions = HashSet::new();
        for backend in &self.backends {
            if let Some(granted) = backend.group_permissions(user, target).await {
                permissions.extend(granted?);
            }
        }
        Ok(permissions)
    }

    pub async fn all_permissions(
        &self,
        user: &UserRecord,
        target: Option<&Target>,
    ) -> AccountsResult<HashSet<String>> {
        let mut permissions = HashSet::new();
        for backend in &self.backends {
            permissions.extend(backend.all_permissions(user, target).await?);
        }
        Ok(permissions)
    }
}
