//! Shared types, errors, and configuration for Tesoro.
//!
//! This crate provides common types used across all other crates:
//! - Money and currency types with decimal precision
//! - Typed IDs for type-safe entity references
//! - Application-wide error types
//! - Configuration management
//! - JWT claims used to resolve the caller's agencies

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod types;

pub use auth::Claims;
pub use config::{AppConfig, Environment};
pub use error::{AppError, AppResult};
pub use jwt::{JwtConfig, JwtError, JwtService};
