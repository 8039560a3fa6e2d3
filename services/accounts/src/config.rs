//! Accounts configuration

use config::{Config, Environment};
use serde::Deserialize;
use std::fmt;

use crate::error::{AccountsError, AccountsResult};
use crate::hashers::{Argon2Hasher, Hashers, Pbkdf2Sha256Hasher};

/// Settings for hashing, mail and bootstrap
#[derive(Clone, Deserialize)]
pub struct AccountsConfig {
    /// Hasher algorithms, preferred first
    pub password_hashers: Vec<String>,
    pub pbkdf2_iterations: u32,
    pub argon2_memory_kib: u32,
    pub argon2_time_cost: u32,
    pub argon2_parallelism: u32,
    /// Sender used when `email_user` is given none
    pub default_from_email: String,
    /// `app_label.model` entries registered at bootstrap
    pub content_types: Vec<String>,
    pub superuser_username: Option<String>,
    pub superuser_email: Option<String>,
    pub superuser_password: Option<String>,
}

impl AccountsConfig {
    /// Load configuration from `ACCOUNTS_*` environment variables
    ///
    /// # Environment Variables
    /// - `ACCOUNTS_PASSWORD_HASHERS`: comma separated (default: "argon2,pbkdf2_sha256")
    /// - `ACCOUNTS_PBKDF2_ITERATIONS`: (default: 600000)
    /// - `ACCOUNTS_ARGON2_MEMORY_KIB`: (default: 19456)
    /// - `ACCOUNTS_ARGON2_TIME_COST`: (default: 2)
    /// - `ACCOUNTS_ARGON2_PARALLELISM`: (default: 1)
    /// - `ACCOUNTS_DEFAULT_FROM_EMAIL`: (default: "webmaster@localhost")
    /// - `ACCOUNTS_CONTENT_TYPES`: comma separated `app_label.model` list (default: empty)
    /// - `ACCOUNTS_SUPERUSER_USERNAME`, `ACCOUNTS_SUPERUSER_EMAIL`,
    ///   `ACCOUNTS_SUPERUSER_PASSWORD`: optional superuser created at bootstrap
    pub fn from_env() -> AccountsResult<Self> {
        let settings = Config::builder()
            .set_default("password_hashers", vec!["argon2", "pbkdf2_sha256"])?
            .set_default("pbkdf2_iterations", i64::from(Pbkdf2Sha256Hasher::DEFAULT_ITERATIONS))?
            .set_default("argon2_memory_kib", i64::from(argon2::Params::DEFAULT_M_COST))?
            .set_default("argon2_time_cost", i64::from(argon2::Params::DEFAULT_T_COST))?
            .set_default("argon2_parallelism", i64::from(argon2::Params::DEFAULT_P_COST))?
            .set_default("default_from_email", "webmaster@localhost")?
            .set_default("content_types", Vec::<String>::new())?
            .add_source(
                Environment::with_prefix("ACCOUNTS")
                    .prefix_separator("_")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("password_hashers")
                    .with_list_parse_key("content_types"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn hashers(&self) -> AccountsResult<Hashers> {
        let argon2 = Argon2Hasher::new(
            self.argon2_memory_kib,
            self.argon2_time_cost,
            self.argon2_parallelism,
        )?;
        Hashers::from_names(&self.password_hashers, self.pbkdf2_iterations, argon2)
    }

    /// Parsed `(app_label, model)` pairs of [`AccountsConfig::content_types`]
    pub fn content_type_labels(&self) -> AccountsResult<Vec<(String, String)>> {
        self.content_types
            .iter()
            .map(|label| {
                label
                    .trim()
                    .split_once('.')
                    .filter(|(app, model)| !app.is_empty() && !model.is_empty())
                    .map(|(app, model)| (app.to_string(), model.to_lowercase()))
                    .ok_or_else(|| {
                        AccountsError::Configuration(format!(
                            "content type must look like app_label.model: {}",
                            label
                        ))
                    })
            })
            .collect()
    }

    /// Username, email and password, when all three are configured
    pub fn superuser(&self) -> Option<(&str, &str, &str)> {
        Some((
            self.superuser_username.as_deref()?,
            self.superuser_email.as_deref()?,
            self.superuser_password.as_deref()?,
        ))
    }
}

impl fmt::Debug for AccountsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountsConfig")
            .field("password_hashers", &self.password_hashers)
            .field("pbkdf2_iterations", &self.pbkdf2_iterations)
            .field("argon2_memory_kib", &self.argon2_memory_kib)
            .field("argon2_time_cost", &self.argon2_time_cost)
            .field("argon2_parallelism", &self.argon2_parallelism)
            .field("default_from_email", &self.default_from_email)
            .field("content_types", &self.content_types)
            .field("superuser_username", &self.superuser_username)
            .field("superuser_email", &self.superuser_email)
            .field(
                "superuser_password",
                &self.superuser_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "ACCOUNTS_PASSWORD_HASHERS",
        "ACCOUNTS_PBKDF2_ITERATIONS",
        "ACCOUNTS_CONTENT_TYPES",
        "ACCOUNTS_SUPERUSER_USERNAME",
        "ACCOUNTS_SUPERUSER_EMAIL",
        "ACCOUNTS_SUPERUSER_PASSWORD",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_accounts_config_defaults() {
        clear_env();

        let config = AccountsConfig::from_env().unwrap();
        assert_eq!(config.password_hashers, vec!["argon2", "pbkdf2_sha256"]);
        assert_eq!(config.pbkdf2_iterations, 600_000);
        assert_eq!(config.argon2_memory_kib, 19 * 1024);
        assert_eq!(config.default_from_email, "webmaster@localhost");
        assert!(config.content_types.is_empty());
        assert!(config.superuser().is_none());
        assert_eq!(config.hashers().unwrap().preferred().algorithm(), "argon2");
    }

    #[test]
    #[serial]
    fn test_accounts_config_from_env_with_custom_values() {
        clear_env();
        unsafe {
            std::env::set_var("ACCOUNTS_PASSWORD_HASHERS", "pbkdf2_sha256,argon2");
            std::env::set_var("ACCOUNTS_PBKDF2_ITERATIONS", "1000");
            std::env::set_var("ACCOUNTS_CONTENT_TYPES", "blog.Article,trips.trip");
            std::env::set_var("ACCOUNTS_SUPERUSER_USERNAME", "admin");
            std::env::set_var("ACCOUNTS_SUPERUSER_EMAIL", "admin@trotamundia.com");
            std::env::set_var("ACCOUNTS_SUPERUSER_PASSWORD", "changeme");
        }

        let config = AccountsConfig::from_env().unwrap();
        assert_eq!(config.pbkdf2_iterations, 1000);
        assert_eq!(
            config.hashers().unwrap().preferred().algorithm(),
            "pbkdf2_sha256"
        );
        assert_eq!(
            config.content_type_labels().unwrap(),
            vec![
                ("blog".to_string(), "article".to_string()),
                ("trips".to_string(), "trip".to_string())
            ]
        );
        assert_eq!(
            config.superuser(),
            Some(("admin", "admin@trotamundia.com", "changeme"))
        );

        let printed = format!("{:?}", config);
        assert!(!printed.contains("changeme"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("admin@trotamundia.com"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_malformed_content_type_label() {
        clear_env();
        unsafe {
            std::env::set_var("ACCOUNTS_CONTENT_TYPES", "blog");
        }

        let config = AccountsConfig::from_env().unwrap();
        assert!(matches!(
            config.content_type_labels(),
            Err(AccountsError::Configuration(_))
        ));

        clear_env();
    }
}
