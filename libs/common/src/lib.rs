//! Common library for the home care services
//!
//! This crate provides the pieces shared by the `auth` and `api` services:
//! database connectivity and schema, the account entity, session tokens,
//! roles and statuses, the JSON response envelope, request authentication,
//! settings, tracing setup and field encryption.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     run_migrations(&pool).await?;
//!     println!("Database health check: {}", health_check(&pool).await?);
//!     Ok(())
//! }
//! ```

pub mod access;
pub mod auth;
pub mod crypto;
pub mod database;
pub mod error;
pub mod middleware;
pub mod pagination;
pub mod response;
pub mod settings;
pub mod telemetry;
pub mod token;
pub mod validation;
