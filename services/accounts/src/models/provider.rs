//! Third-party login identities embedded in a user

use serde::{Deserialize, Serialize};

use crate::validation::{self, ValidationResult};

/// A social login identity (Google, Facebook, ...) owned by one user.
///
/// Has no identity of its own; it is stored and deleted with its user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Identifier of the account at the provider
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub email: String,
    /// Provider identifier such as `google.com` or `facebook.com`
    pub provider_id: String,
}

/// Profile returned by an OAuth provider after a successful login
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub provider_id: String,
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl ProviderRecord {
    pub fn new(
        provider_id: impl Into<String>,
        uid: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            photo_url: None,
            email: email.into(),
            provider_id: provider_id.into(),
        }
    }

    pub fn from_profile(profile: OAuthProfile) -> Self {
        Self {
            uid: profile.id,
            display_name: profile.name,
            photo_url: profile.picture,
            email: profile.email,
            provider_id: profile.provider_id,
        }
    }

    /// Whether both records describe the same account at the same provider
    pub fn same_identity(&self, other: &ProviderRecord) -> bool {
        self.provider_id == other.provider_id && self.uid == other.uid
    }

    pub fn validate(&self) -> ValidationResult {
        validation::email("providers.email", &self.email)?;
        validation::not_blank("providers.provider_id", &self.provider_id)?;
        validation::optional_url("providers.photo_url", self.photo_url.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationErrorKind;

    #[test]
    fn profile_maps_onto_provider() {
        let provider = ProviderRecord::from_profile(OAuthProfile {
            provider_id: "google.com".to_string(),
            id: "10987".to_string(),
            email: "ana@gmail.com".to_string(),
            name: Some("Ana Torres".to_string()),
            picture: Some("https://lh3.googleusercontent.com/a/photo.jpg".to_string()),
        });

        assert_eq!(provider.uid, "10987");
        assert_eq!(provider.display_name.as_deref(), Some("Ana Torres"));
        assert!(provider.validate().is_ok());
    }

    #[test]
    fn email_and_provider_id_are_required() {
        let provider = ProviderRecord::new("facebook.com", "42", "");
        assert_eq!(provider.validate().unwrap_err().field, "providers.email");

        let provider = ProviderRecord::new(" ", "42", "ana@example.com");
        let err = provider.validate().unwrap_err();
        assert_eq!(err.field, "providers.provider_id");
        assert_eq!(err.kind, ValidationErrorKind::Blank);
    }

    #[test]
    fn identity_is_provider_and_uid() {
        let a = ProviderRecord::new("google.com", "1", "a@example.com");
        let b = ProviderRecord::new("google.com", "1", "other@example.com");
        let c = ProviderRecord::new("facebook.com", "1", "a@example.com");
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));
    }
}
