//! Storage for account records
//!
//! The traits here are the storage collaborator: the service layer and the
//! authorization backends only ever see them. [`PgStore`] persists to
//! PostgreSQL, [`MemoryStore`] keeps everything in process.
//!
//! Implementations enforce the uniqueness rules of the model and report
//! violations as
//! [`AccountsError::UniquenessViolation`](crate::error::AccountsError::UniquenessViolation):
//!
//! - content types: `(app_label, model)`
//! - permissions: `(content_type, codename)`
//! - users: `username`, ignoring users without one

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AccountsResult;
use crate::models::{ContentTypeRecord, PermissionRecord, UserRecord};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait ContentTypeRepository: Send + Sync {
    async fn insert_content_type(&self, content_type: &ContentTypeRecord) -> AccountsResult<()>;

    async fn content_type_by_id(&self, id: Uuid) -> AccountsResult<Option<ContentTypeRecord>>;

    async fn content_type_by_natural_key(
        &self,
        app_label: &str,
        model: &str,
    ) -> AccountsResult<Option<ContentTypeRecord>>;
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn insert_permission(&self, permission: &PermissionRecord) -> AccountsResult<()>;

    async fn permission_by_id(&self, id: Uuid) -> AccountsResult<Option<PermissionRecord>>;

    async fn permission_by_codename(
        &self,
        content_type_id: Uuid,
        codename: &str,
    ) -> AccountsResult<Option<PermissionRecord>>;

    /// Permissions with the given ids, in the order of `ids`. Unknown ids are
    /// skipped.
    async fn permissions_by_ids(&self, ids: &[Uuid]) -> AccountsResult<Vec<PermissionRecord>>;

    async fn list_permissions(&self) -> AccountsResult<Vec<PermissionRecord>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert_user(&self, user: &UserRecord) -> AccountsResult<()>;

    /// Overwrite a stored user. Last writer wins.
    async fn update_user(&self, user: &UserRecord) -> AccountsResult<()>;

    /// `false` if there was nothing to delete
    async fn delete_user(&self, id: Uuid) -> AccountsResult<bool>;

    async fn user_by_id(&self, id: Uuid) -> AccountsResult<Option<UserRecord>>;

    async fn user_by_username(&self, username: &str) -> AccountsResult<Option<UserRecord>>;

    async fn user_by_uid(&self, uid: &str) -> AccountsResult<Option<UserRecord>>;

    async fn users_by_email(&self, email: &str) -> AccountsResult<Vec<UserRecord>>;

    async fn user_by_provider(
        &self,
        provider_id: &str,
        uid: &str,
    ) -> AccountsResult<Option<UserRecord>>;

    /// Every user, oldest first
    async fn list_users(&self) -> AccountsResult<Vec<UserRecord>>;
}

/// Everything the account services need from storage
pub trait Store: ContentTypeRepository + PermissionRepository + UserRepository {}

impl<T> Store for T where T: ContentTypeRepository + PermissionRepository + UserRepository {}
