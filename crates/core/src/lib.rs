//! Core types and shared functionality for shelf.
//!
//! This crate provides:
//! - The `Book` record and result selection
//! - Query validation
//! - File-backed result cache
//! - Unified error types
//! - Configuration structures

pub mod book;
pub mod cache;
pub mod config;
pub mod error;
pub mod query;
pub mod selection;

pub use book::Book;
pub use cache::{CacheStats, CacheStore, CleanupPolicy, CleanupReport, query_key};
pub use config::{AppConfig, ConfigError};
pub use error::{Error, FailureClass};
pub use query::validate_query;
