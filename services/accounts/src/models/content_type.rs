//! Content type model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use crate::validation::{self, ValidationResult};

pub const NAME_MAX_LENGTH: usize = 100;
pub const APP_LABEL_MAX_LENGTH: usize = 100;
pub const MODEL_MAX_LENGTH: usize = 100;

/// Identifies an application entity kind by namespace and model name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ContentTypeRecord {
    pub id: Uuid,
    pub name: String,
    pub app_label: String,
    pub model: String,
}

impl ContentTypeRecord {
    pub fn new(
        name: impl Into<String>,
        app_label: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            app_label: app_label.into(),
            model: model.into(),
        }
    }

    /// `(app_label, model)`, unique across content types
    pub fn natural_key(&self) -> (String, String) {
        (self.app_label.clone(), self.model.clone())
    }

    /// `app_label.model`, the form used in configuration and logs
    pub fn label(&self) -> String {
        format!("{}.{}", self.app_label, self.model)
    }

    pub fn validate(&self) -> ValidationResult {
        validation::max_length("name", &self.name, NAME_MAX_LENGTH)?;
        validation::not_blank("app_label", &self.app_label)?;
        validation::max_length("app_label", &self.app_label, APP_LABEL_MAX_LENGTH)?;
        validation::not_blank("model", &self.model)?;
        validation::max_length("model", &self.model, MODEL_MAX_LENGTH)
    }
}

impl fmt::Display for ContentTypeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
