//! Common library for the Trotamundia services
//!
//! This crate provides shared functionality used across the services,
//! namely PostgreSQL connectivity and the storage error type.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, health_check, init_pool};
//!
//! # async fn run() -> Result<(), common::error::DatabaseError> {
//! let config = DatabaseConfig::from_env()?;
//! let pool = init_pool(&config).await?;
//! assert!(health_check(&pool).await?);
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod error;
