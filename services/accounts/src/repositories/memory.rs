//! In-process storage

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{ContentTypeRepository, PermissionRepository, UserRepository};
use crate::error::{AccountsError, AccountsResult};
use crate::models::{ContentTypeRecord, PermissionRecord, UserRecord};

/// Keeps every record in memory behind a single lock.
///
/// Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    content_types: HashMap<Uuid, ContentTypeRecord>,
    permissions: HashMap<Uuid, PermissionRecord>,
    users: HashMap<Uuid, UserRecord>,
}

impl MemoryState {
    fn check_username(&self, user: &UserRecord) -> AccountsResult<()> {
        let Some(username) = user.username.as_deref() else {
            return Ok(());
        };
        let taken = self
            .users
            .values()
            .any(|other| other.id != user.id && other.username.as_deref() == Some(username));
        if taken {
            return Err(AccountsError::duplicate("username", username));
        }
        Ok(())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentTypeRepository for MemoryStore {
    async fn insert_content_type(&self, content_type: &ContentTypeRecord) -> AccountsResult<()> {
        let mut state = self.state.write().await;
        let taken = state.content_types.values().any(|ct| {
            ct.id == content_type.id
                || (ct.app_label == content_type.app_label && ct.model == content_type.model)
        });
        if taken {
            return Err(AccountsError::duplicate("content_type", content_type.label()));
        }
        debug!("Storing content type {}", content_type.label());
        state
            .content_types
            .insert(content_type.id, content_type.clone());
        Ok(())
    }

    async fn content_type_by_id(&self, id: Uuid) -> AccountsResult<Option<ContentTypeRecord>> {
        Ok(self.state.read().await.content_types.get(&id).cloned())
    }

    async fn content_type_by_natural_key(
        &self,
        app_label: &str,
        model: &str,
    ) -> AccountsResult<Option<ContentTypeRecord>> {
        let state = self.state.read().await;
        Ok(state
            .content_types
            .values()
            .find(|ct| ct.app_label == app_label && ct.model == model)
            .cloned())
    }
}

#[async_trait]
impl PermissionRepository for MemoryStore {
    async fn insert_permission(&self, permission: &PermissionRecord) -> AccountsResult<()> {
        let mut state = self.state.write().await;
        if !state.content_types.contains_key(&permission.content_type) {
            return Err(AccountsError::not_found(
                "content type",
                permission.content_type.to_string(),
            ));
        }
        let taken = state.permissions.values().any(|p| {
            p.id == permission.id
                || (p.content_type == permission.content_type && p.codename == permission.codename)
        });
        if taken {
            return Err(AccountsError::duplicate("permission", permission.codename.clone()));
        }
        state.permissions.insert(permission.id, permission.clone());
        Ok(())
    }

    async fn permission_by_id(&self, id: Uuid) -> AccountsResult<Option<PermissionRecord>> {
        Ok(self.state.read().await.permissions.get(&id).cloned())
    }

    async fn permission_by_codename(
        &self,
        content_type_id: Uuid,
        codename: &str,
    ) -> AccountsResult<Option<PermissionRecord>> {
        let state = self.state.read().await;
        Ok(state
            .permissions
            .values()
            .find(|p| p.content_type == content_type_id && p.codename == codename)
            .cloned())
    }

    async fn permissions_by_ids(&self, ids: &[Uuid]) -> AccountsResult<Vec<PermissionRecord>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.permissions.get(id).cloned())
            .collect())
    }

    async fn list_permissions(&self) -> AccountsResult<Vec<PermissionRecord>> {
        let state = self.state.read().await;
        let mut permissions: Vec<_> = state.permissions.values().cloned().collect();
        permissions.sort_by(|a, b| {
            (a.content_type, &a.codename).cmp(&(b.content_type, &b.codename))
        });
        Ok(permissions)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: &UserRecord) -> AccountsResult<()> {
        let mut state = self.state.write().await;
        if state.users.contains_key(&user.id) {
            return Err(AccountsError::duplicate("id", user.id.to_string()));
        }
        state.check_username(user)?;
        debug!("Storing user {}", user.id);
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &UserRecord) -> AccountsResult<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user.id) {
            return Err(AccountsError::not_found("user", user.id.to_string()));
        }
        state.check_username(user)?;
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> AccountsResult<bool> {
        Ok(self.state.write().await.users.remove(&id).is_some())
    }

    async fn user_by_id(&self, id: Uuid) -> AccountsResult<Option<UserRecord>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> AccountsResult<Option<UserRecord>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username.as_deref() == Some(username))
            .cloned())
    }

    async fn user_by_uid(&self, uid: &str) -> AccountsResult<Option<UserRecord>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.uid == uid).cloned())
    }

    async fn users_by_email(&self, email: &str) -> AccountsResult<Vec<UserRecord>> {
        let state = self.state.read().await;
        let mut users: Vec<_> = state
            .users
            .values()
            .filter(|u| u.email == email)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.date_joined);
        Ok(users)
    }

    async fn user_by_provider(
        &self,
        provider_id: &str,
        uid: &str,
    ) -> AccountsResult<Option<UserRecord>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.provider(provider_id, uid).is_some())
            .cloned())
    }

    async fn list_users(&self) -> AccountsResult<Vec<UserRecord>> {
        let state = self.state.read().await;
        let mut users: Vec<_> = state.users.values().cloned().collect();
        users.sort_by_key(|u| u.date_joined);
        Ok(users)
    }
}
