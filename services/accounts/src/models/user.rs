//! User model and credential handling

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{Pending, PermissionRecord, ProviderRecord};
use crate::error::AccountsResult;
use crate::hashers::{self, Hashers};
use crate::validation::{self, ValidationResult};

pub const USERNAME_MAX_LENGTH: usize = 250;
pub const NAME_MAX_LENGTH: usize = 250;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const PASSWORD_MAX_LENGTH: usize = 128;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Unset,
    Male,
    Female,
}

impl Gender {
    /// Column value; `Unset` is stored as NULL
    pub fn as_db(&self) -> Option<&'static str> {
        match self {
            Gender::Unset => None,
            Gender::Male => Some("male"),
            Gender::Female => Some("female"),
        }
    }

    pub fn from_db(value: Option<&str>) -> Self {
        match value {
            Some("male") => Gender::Male,
            Some("female") => Gender::Female,
            _ => Gender::Unset,
        }
    }
}

/// User entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    /// Unique among the users that have one
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    /// Encoded hash, see [`crate::hashers`]. Never serialized.
    #[serde(default, skip_serializing)]
    pub password: String,
    /// May log into the admin site
    pub is_staff: bool,
    /// Unset this instead of deleting accounts
    pub is_active: bool,
    /// Has every permission without it being assigned
    pub is_superuser: bool,
    pub last_login: DateTime<Utc>,
    pub date_joined: DateTime<Utc>,
    /// Directly granted permissions, in grant order
    pub permissions: Vec<Uuid>,
    pub birthdate: Option<NaiveDate>,
    pub web_url: Option<String>,
    pub facebook_page: Option<String>,
    pub youtube_channel: Option<String>,
    pub gender: Gender,
    pub is_complete: bool,
    pub providers: Vec<ProviderRecord>,
    pub photo_url: Option<String>,
    pub uid: String,
    pub display_name: Option<String>,
}

/// Lower-case the domain part of an address (everything after the first
/// `@`). Values without an `@` are returned untouched.
pub fn normalize_email(email: &str) -> String {
    match email.trim().split_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

impl UserRecord {
    /// A fresh, active record with an unusable password
    pub fn new(email: impl Into<String>, uid: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: None,
            first_name: None,
            last_name: None,
            email: email.into(),
            password: hashers::make_unusable(),
            is_staff: false,
            is_active: true,
            is_superuser: false,
            last_login: now,
            date_joined: now,
            permissions: Vec::new(),
            birthdate: None,
            web_url: None,
            facebook_page: None,
            youtube_channel: None,
            gender: Gender::Unset,
            is_complete: false,
            providers: Vec::new(),
            photo_url: None,
            uid: uid.into(),
            display_name: None,
        }
    }

    /// Build a new user with a normalized email and a hashed password.
    ///
    /// A missing email is kept empty and rejected by [`UserRecord::validate`]
    /// when the pending insert is committed.
    pub fn create(
        username: &str,
        password: &str,
        email: Option<&str>,
        hashers: &Hashers,
    ) -> AccountsResult<Pending<UserRecord>> {
        let email = email.map(normalize_email).unwrap_or_default();
        let mut user = UserRecord::new(email, Uuid::new_v4().to_string());
        user.username = Some(username.to_string());
        user.password = hashers.make_hash(password)?;
        Ok(Pending::insert(user))
    }

    /// Replace the stored hash with one of `password`
    pub fn set_credential(
        mut self,
        hashers: &Hashers,
        password: &str,
    ) -> AccountsResult<Pending<UserRecord>> {
        self.password = hashers.make_hash(password)?;
        Ok(Pending::update(self))
    }

    /// Never errors; a mismatch or an unreadable hash is `false`
    pub fn check_credential(&self, hashers: &Hashers, password: &str) -> bool {
        hashers.verify(password, &self.password)
    }

    pub fn set_unusable_credential(mut self) -> Pending<UserRecord> {
        self.password = hashers::make_unusable();
        Pending::update(self)
    }

    pub fn has_usable_credential(&self) -> bool {
        hashers::is_usable(&self.password)
    }

    /// First and last name separated by a space
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }

    pub fn short_name(&self) -> &str {
        self.first_name.as_deref().unwrap_or_default()
    }

    /// Append a permission reference; `false` if it was already granted
    pub fn grant(&mut self, permission: &PermissionRecord) -> bool {
        if self.permissions.contains(&permission.id) {
            return false;
        }
        self.permissions.push(permission.id);
        true
    }

    /// `false` if the permission was not granted
    pub fn revoke(&mut self, permission: &PermissionRecord) -> bool {
        let before = self.permissions.len();
        self.permissions.retain(|id| *id != permission.id);
        self.permissions.len() != before
    }

    /// Attach a login identity, replacing an existing one for the same
    /// provider account
    pub fn link_provider(&mut self, provider: ProviderRecord) {
        match self.providers.iter_mut().find(|p| p.same_identity(&provider)) {
            Some(existing) => *existing = provider,
            None => self.providers.push(provider),
        }
    }

    pub fn unlink_provider(&mut self, provider_id: &str, uid: &str) -> bool {
        let before = self.providers.len();
        self.providers
            .retain(|p| !(p.provider_id == provider_id && p.uid == uid));
        self.providers.len() != before
    }

    pub fn provider(&self, provider_id: &str, uid: &str) -> Option<&ProviderRecord> {
        self.providers
            .iter()
            .find(|p| p.provider_id == provider_id && p.uid == uid)
    }

    pub fn validate(&self) -> ValidationResult {
        if let Some(username) = self.username.as_deref() {
            validation::not_blank("username", username)?;
            validation::max_length("username", username, USERNAME_MAX_LENGTH)?;
        }
        validation::optional_max_length("first_name", self.first_name.as_deref(), NAME_MAX_LENGTH)?;
        validation::optional_max_length("last_name", self.last_name.as_deref(), NAME_MAX_LENGTH)?;
        // Format is not checked; addresses without `@` are kept verbatim.
        validation::not_blank("email", &self.email)?;
        validation::max_length("email", &self.email, EMAIL_MAX_LENGTH)?;
        validation::max_length("password", &self.password, PASSWORD_MAX_LENGTH)?;
        validation::not_blank("uid", &self.uid)?;
        validation::optional_url("web_url", self.web_url.as_deref())?;
        validation::optional_url("facebook_page", self.facebook_page.as_deref())?;
        validation::optional_url("youtube_channel", self.youtube_channel.as_deref())?;
        validation::optional_url("photo_url", self.photo_url.as_deref())?;
        for provider in &self.providers {
            provider.validate()?;
        }
        Ok(())
    }
}

impl fmt::Display for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.username.as_deref().unwrap_or_default())
    }
}
