//! Content types and permissions
//!
//! The catalog owns the records that application setup creates: one
//! content type per entity kind and the permissions scoped to it. It also
//! maps content types back to the entities they describe through
//! registered [`EntityLookup`]s.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AccountsError, AccountsResult};
use crate::models::{
    ContentTypeRecord, PermissionNaturalKey, PermissionRecord, UserRecord, permission,
};
use crate::repositories::{Store, UserRepository};

/// Field/value pairs an object must match
pub type LookupFilter = Map<String, Value>;

/// Actions that get a permission for every content type
pub const DEFAULT_ACTIONS: [&str; 3] = ["add", "change", "delete"];

/// Finds objects of one entity kind
#[async_trait]
pub trait EntityLookup: Send + Sync {
    /// An object matching every entry of `filter`, if any
    async fn find_one(&self, filter: &LookupFilter) -> AccountsResult<Option<Value>>;
}

pub struct Catalog<S> {
    store: Arc<S>,
    lookups: HashMap<(String, String), Arc<dyn EntityLookup>>,
}

impl<S: Store> Catalog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            lookups: HashMap::new(),
        }
    }

    /// Route [`Catalog::locate_instance`] calls for `app_label.model`
    pub fn register_lookup(
        &mut self,
        app_label: impl Into<String>,
        model: impl Into<String>,
        lookup: Arc<dyn EntityLookup>,
    ) {
        self.lookups.insert((app_label.into(), model.into()), lookup);
    }

    pub async fn content_type(&self, id: Uuid) -> AccountsResult<ContentTypeRecord> {
        self.store
            .content_type_by_id(id)
            .await?
            .ok_or_else(|| AccountsError::not_found("content type", id.to_string()))
    }

    /// Content type for `(app_label, model)`; `NotFound` on a miss
    pub async fn content_type_by_natural_key(
        &self,
        app_label: &str,
        model: &str,
    ) -> AccountsResult<ContentTypeRecord> {
        self.store
            .content_type_by_natural_key(app_label, model)
            .await?
            .ok_or_else(|| {
                AccountsError::not_found("content type", format!("{}.{}", app_label, model))
            })
    }

    pub async fn get_or_create_content_type(
        &self,
        name: &str,
        app_label: &str,
        model: &str,
    ) -> AccountsResult<ContentTypeRecord> {
        if let Some(existing) = self.store.content_type_by_natural_key(app_label, model).await? {
            return Ok(existing);
        }

        let content_type = ContentTypeRecord::new(name, app_label, model);
        content_type.validate()?;
        match self.store.insert_content_type(&content_type).await {
            Ok(()) => {
                info!("Registered content type {}", content_type.label());
                Ok(content_type)
            }
            // Lost a race with another writer
            Err(AccountsError::UniquenessViolation { .. }) => {
                self.content_type_by_natural_key(app_label, model).await
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve `content_type` to its entity kind and return the object
    /// matching `filter`.
    ///
    /// `NotFound` when the kind has no registered lookup or no object
    /// matches. Callers are expected to handle it.
    pub async fn locate_instance(
        &self,
        content_type: &ContentTypeRecord,
        filter: &LookupFilter,
    ) -> AccountsResult<Value> {
        let lookup = self
            .lookups
            .get(&content_type.natural_key())
            .ok_or_else(|| AccountsError::not_found("model", content_type.label()))?;

        lookup
            .find_one(filter)
            .await?
            .ok_or_else(|| {
                AccountsError::not_found(
                    "object",
                    format!("{} {}", content_type.label(), Value::Object(filter.clone())),
                )
            })
    }

    pub async fn create_permission(
        &self,
        name: &str,
        content_type: &ContentTypeRecord,
        codename: &str,
    ) -> AccountsResult<PermissionRecord> {
        let permission = PermissionRecord::new(name, content_type, codename);
        permission.validate()?;
        self.store.insert_permission(&permission).await?;
        Ok(permission)
    }

    /// Create the `add_`, `change_` and `delete_` permissions of a content
    /// type, keeping any that already exist.
    pub async fn ensure_default_permissions(
        &self,
        content_type: &ContentTypeRecord,
    ) -> AccountsResult<Vec<PermissionRecord>> {
        let mut permissions = Vec::with_capacity(DEFAULT_ACTIONS.len());
        for action in DEFAULT_ACTIONS {
            let codename = default_codename(action, &content_type.model);
            let existing = self
                .store
                .permission_by_codename(content_type.id, &codename)
                .await?;
            let permission = match existing {
                Some(permission) => permission,
                None => {
                    let name = default_permission_name(action, &content_type.name);
                    self.create_permission(&name, content_type, &codename).await?
                }
            };
            permissions.push(permission);
        }
        debug!("Default permissions ready for {}", content_type.label());
        Ok(permissions)
    }

    pub async fn permission(&self, id: Uuid) -> AccountsResult<PermissionRecord> {
        self.store
            .permission_by_id(id)
            .await?
            .ok_or_else(|| AccountsError::not_found("permission", id.to_string()))
    }

    pub async fn permission_natural_key(
        &self,
        permission: &PermissionRecord,
    ) -> AccountsResult<PermissionNaturalKey> {
        let content_type = self.content_type(permission.content_type).await?;
        Ok(permission.natural_key(&content_type)?)
    }

    pub async fn permission_by_natural_key(
        &self,
        codename: &str,
        app_label: &str,
        model: &str,
    ) -> AccountsResult<PermissionRecord> {
        let content_type = self.content_type_by_natural_key(app_label, model).await?;
        self.store
            .permission_by_codename(content_type.id, codename)
            .await?
            .ok_or_else(|| {
                AccountsError::not_found("permission", format!("{}.{}", app_label, codename))
            })
    }

    /// `app_label.codename`
    pub async fn permission_label(&self, permission: &PermissionRecord) -> AccountsResult<String> {
        let content_type = self.content_type(permission.content_type).await?;
        Ok(permission.label(&content_type)?)
    }
}

fn default_permission_name(action: &str, model_name: &str) -> String {
    format!("Can {} {}", action, model_name)
        .chars()
        .take(permission::NAME_MAX_LENGTH)
        .collect()
}

fn default_codename(action: &str, model: &str) -> String {
    format!("{}_{}", action, model)
        .chars()
        .take(permission::CODENAME_MAX_LENGTH)
        .collect()
}

/// Finds the user whose serialized fields match every filter entry.
///
/// Filters naming `id`, `username`, `uid` or `email` are narrowed through
/// the matching repository query; any other filter scans all users.
pub struct UserLookup<S> {
    store: Arc<S>,
}

impl<S> UserLookup<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: UserRepository> EntityLookup for UserLookup<S> {
    async fn find_one(&self, filter: &LookupFilter) -> AccountsResult<Option<Value>> {
        let text = |key: &str| filter.get(key).and_then(Value::as_str);

        let candidates: Vec<UserRecord> = if let Some(id) = text("id") {
            match Uuid::parse_str(id) {
                Ok(id) => self.store.user_by_id(id).await?.into_iter().collect(),
                Err(_) => Vec::new(),
            }
        } else if let Some(username) = text("username") {
            self.store.user_by_username(username).await?.into_iter().collect()
        } else if let Some(uid) = text("uid") {
            self.store.user_by_uid(uid).await?.into_iter().collect()
        } else if let Some(email) = text("email") {
            self.store.users_by_email(email).await?
        } else {
            self.store.list_users().await?
        };

        for user in candidates {
            let value = serde_json::to_value(&user)
                .map_err(|e| AccountsError::Configuration(e.to_string()))?;
            if filter.iter().all(|(key, expected)| value.get(key) == Some(expected)) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}
