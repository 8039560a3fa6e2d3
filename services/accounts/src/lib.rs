//! Accounts
//!
//! User, permission and content type records with credential hashing and
//! pluggable authorization.
//!
//! Records are plain data. Changes made through model methods come back as
//! [`models::Pending`] values and are written by [`AccountService`] through
//! a [`repositories::Store`], either [`PgStore`] or [`MemoryStore`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use accounts::{AccountService, AccountsConfig, LogMailer, MemoryStore};
//!
//! # async fn run() -> accounts::AccountsResult<()> {
//! let config = AccountsConfig::from_env()?;
//! let service = AccountService::new(
//!     Arc::new(MemoryStore::new()),
//!     config.hashers()?,
//!     Arc::new(LogMailer::new(config.default_from_email.clone())),
//!     config.default_from_email.clone(),
//! );
//!
//! let user = service.create_user("bob", "s3cret", Some("Bob@EXAMPLE.com")).await?;
//! assert_eq!(user.email, "Bob@example.com");
//! # Ok(())
//! # }
//! ```

pub mod authorization;
pub mod backends;
pub mod catalog;
pub mod config;
pub mod error;
pub mod hashers;
pub mod mail;
pub mod models;
pub mod repositories;
pub mod service;
pub mod validation;

pub use authorization::Authorizer;
pub use backends::{AuthBackend, GroupPermissionBackend, ModelBackend, RegisteredBackend, Target};
pub use catalog::{Catalog, EntityLookup, LookupFilter, UserLookup};
pub use config::AccountsConfig;
pub use error::{AccountsError, AccountsResult};
pub use hashers::{Hashers, PasswordHasher};
pub use mail::{LogMailer, MailMessage, Mailer};
pub use repositories::{MemoryStore, PgStore, Store};
pub use service::AccountService;
