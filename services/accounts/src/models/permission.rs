//! Permission model and natural keys

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ContentTypeRecord;
use crate::validation::{self, ValidationError, ValidationErrorKind, ValidationResult};

pub const NAME_MAX_LENGTH: usize = 50;
pub const CODENAME_MAX_LENGTH: usize = 100;

/// A capability scoped to one content type.
///
/// Permissions are global per kind of object: "may change articles", never
/// "may change this article".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PermissionRecord {
    pub id: Uuid,
    pub name: String,
    #[sqlx(rename = "content_type_id")]
    pub content_type: Uuid,
    pub codename: String,
}

/// Storage-independent identity of a permission: `(codename, app_label, model)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionNaturalKey {
    pub codename: String,
    pub app_label: String,
    pub model: String,
}

impl PermissionRecord {
    pub fn new(
        name: impl Into<String>,
        content_type: &ContentTypeRecord,
        codename: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            content_type: content_type.id,
            codename: codename.into(),
        }
    }

    /// Natural key of this permission; `content_type` must be the record it
    /// references.
    pub fn natural_key(
        &self,
        content_type: &ContentTypeRecord,
    ) -> Result<PermissionNaturalKey, ValidationError> {
        self.check_content_type(content_type)?;
        let (app_label, model) = content_type.natural_key();
        Ok(PermissionNaturalKey {
            codename: self.codename.clone(),
            app_label,
            model,
        })
    }

    /// The `app_label.codename` label authorization checks are phrased in
    pub fn label(&self, content_type: &ContentTypeRecord) -> Result<String, ValidationError> {
        self.check_content_type(content_type)?;
        Ok(format!("{}.{}", content_type.app_label, self.codename))
    }

    /// Human readable `app_label | content type | name`
    pub fn describe(&self, content_type: &ContentTypeRecord) -> Result<String, ValidationError> {
        self.check_content_type(content_type)?;
        Ok(format!(
            "{} | {} | {}",
            content_type.app_label, content_type, self.name
        ))
    }

    pub fn validate(&self) -> ValidationResult {
        validation::max_length("name", &self.name, NAME_MAX_LENGTH)?;
        validation::not_blank("codename", &self.codename)?;
        validation::max_length("codename", &self.codename, CODENAME_MAX_LENGTH)
    }

    fn check_content_type(&self, content_type: &ContentTypeRecord) -> ValidationResult {
        if content_type.id != self.content_type {
            return Err(ValidationError::new(
                "content_type",
                ValidationErrorKind::ReferenceMismatch,
            ));
        }
        Ok(())
    }
}

impl PermissionNaturalKey {
    pub fn new(
        codename: impl Into<String>,
        app_label: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            codename: codename.into(),
            app_label: app_label.into(),
            model: model.into(),
        }
    }
}
