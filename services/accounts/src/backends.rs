//! Authorization backends
//!
//! A backend answers permission questions about a user. Backends are
//! consulted in registration order by [`crate::authorization::Authorizer`].
//! Group permissions are an optional capability: backends that support
//! them implement [`GroupPermissionBackend`] and are registered as
//! [`RegisteredBackend::WithGroups`].

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::AccountsResult;
use crate::models::UserRecord;
use crate::repositories::Store;

/// A specific object a permission check is about
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub app_label: String,
    pub model: String,
    pub id: String,
}

impl Target {
    pub fn new(
        app_label: impl Into<String>,
        model: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            app_label: app_label.into(),
            model: model.into(),
            id: id.into(),
        }
    }
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    async fn has_permission(
        &self,
        user: &UserRecord,
        permission: &str,
        target: Option<&Target>,
    ) -> AccountsResult<bool>;

    /// Whether the user holds any permission in `app_label`
    async fn has_module_permissions(
        &self,
        user: &UserRecord,
        app_label: &str,
    ) -> AccountsResult<bool>;

    async fn all_permissions(
        &self,
        user: &UserRecord,
        target: Option<&Target>,
    ) -> AccountsResult<HashSet<String>>;
}

/// Backends that also grant permissions through group membership
#[async_trait]
pub trait GroupPermissionBackend: AuthBackend {
    async fn group_permissions(
        &self,
        user: &UserRecord,
        target: Option<&Target>,
    ) -> AccountsResult<HashSet<String>>;
}

/// A backend as registered with the authorizer, tagged by capability
#[derive(Clone)]
pub enum RegisteredBackend {
    Basic(Arc<dyn AuthBackend>),
    WithGroups(Arc<dyn GroupPermissionBackend>),
}

impl RegisteredBackend {
    pub fn name(&self) -> &str {
        match self {
            RegisteredBackend::Basic(backend) => backend.name(),
            RegisteredBackend::WithGroups(backend) => backend.name(),
        }
    }

    pub async fn has_permission(
        &self,
        user: &UserRecord,
        permission: &str,
        target: Option<&Target>,
    ) -> AccountsResult<bool> {
        match self {
            RegisteredBackend::Basic(backend) => {
                backend.has_permission(user, permission, target).await
            }
            RegisteredBackend::WithGroups(backend) => {
                backend.has_permission(user, permission, target).await
            }
        }
    }

    pub async fn has_module_permissions(
        &self,
        user: &UserRecord,
        app_label: &str,
    ) -> AccountsResult<bool> {
        match self {
            RegisteredBackend::Basic(backend) => {
                backend.has_module_permissions(user, app_label).await
            }
            RegisteredBackend::WithGroups(backend) => {
                backend.has_module_permissions(user, app_label).await
            }
        }
    }

    pub async fn all_permissions(
        &self,
        user: &UserRecord,
        target: Option<&Target>,
    ) -> AccountsResult<HashSet<String>> {
        match self {
            RegisteredBackend::Basic(backend) => backend.all_permissions(user, target).await,
            RegisteredBackend::WithGroups(backend) => backend.all_permissions(user, target).await,
        }
    }

    /// `None` for backends without the group capability
    pub async fn group_permissions(
        &self,
        user: &UserRecord,
        target: Option<&Target>,
    ) -> Option<AccountsResult<HashSet<String>>> {
        match self {
            RegisteredBackend::Basic(_) => None,
            RegisteredBackend::WithGroups(backend) => {
                Some(backend.group_permissions(user, target).await)
            }
        }
    }
}

/// Grants the permissions stored on the user record.
///
/// Inactive users get nothing. Active superusers get every stored
/// permission. Object-level targets are not supported and get nothing.
pub struct ModelBackend<S> {
    store: Arc<S>,
}

impl<S> ModelBackend<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: Store> ModelBackend<S> {
    async fn labels(&self, user: &UserRecord) -> AccountsResult<HashSet<String>> {
        let permissions = if user.is_superuser {
            self.store.list_permissions().await?
        } else {
            self.store.permissions_by_ids(&user.permissions).await?
        };

        let mut labels = HashSet::with_capacity(permissions.len());
        for permission in permissions {
            let content_type = self
                .store
                .content_type_by_id(permission.content_type)
                .await?;
            let Some(content_type) = content_type else {
                continue;
            };
            labels.insert(format!("{}.{}", content_type.app_label, permission.codename));
        }
        debug!("Resolved {} permissions for user {}", labels.len(), user.id);
        Ok(labels)
    }
}

#[async_trait]
impl<S: Store> AuthBackend for ModelBackend<S> {
    fn name(&self) -> &str {
        "model"
    }

    async fn has_permission(
        &self,
        user: &UserRecord,
        permission: &str,
        target: Option<&Target>,
    ) -> AccountsResult<bool> {
        if !user.is_active || target.is_some() {
            return Ok(false);
        }
        Ok(self.labels(user).await?.contains(permission))
    }

    async fn has_module_permissions(
        &self,
        user: &UserRecord,
        app_label: &str,
    ) -> AccountsResult<bool> {
        if !user.is_active {
            return Ok(false);
        }
        let prefix = format!("{}.", app_label);
        Ok(self
            .labels(user)
            .await?
            .iter()
            .any(|label| label.starts_with(&prefix)))
    }

    async fn all_permissions(
        &self,
        user: &UserRecord,
        target: Option<&Target>,
    ) -> AccountsResult<HashSet<String>> {
        if !user.is_active || target.is_some() {
            return Ok(HashSet::new());
        }
        self.labels(user).await
    }
}
