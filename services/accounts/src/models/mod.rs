//! Account models

pub mod content_type;
pub mod permission;
pub mod provider;
pub mod user;

// Re-export for convenience
pub use content_type::ContentTypeRecord;
pub use permission::{PermissionNaturalKey, PermissionRecord};
pub use provider::{OAuthProfile, ProviderRecord};
pub use user::{Gender, UserRecord, normalize_email};

/// How a pending record should be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteIntent {
    Insert,
    Update,
}

/// A modified record that has not been persisted yet.
///
/// Model methods never touch storage; they hand back a `Pending` and the
/// service layer commits it through a repository.
#[must_use = "pending changes are lost unless committed"]
#[derive(Debug, Clone)]
pub struct Pending<T> {
    record: T,
    intent: WriteIntent,
}

impl<T> Pending<T> {
    pub fn insert(record: T) -> Self {
        Self {
            record,
            intent: WriteIntent::Insert,
        }
    }

    pub fn update(record: T) -> Self {
        Self {
            record,
            intent: WriteIntent::Update,
        }
    }

    pub fn intent(&self) -> WriteIntent {
        self.intent
    }

    pub fn record(&self) -> &T {
        &self.record
    }

    pub fn into_record(self) -> T {
        self.record
    }
}
