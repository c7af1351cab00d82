//! Herd Ledger - Milking and Calving Records
//!
//! A Rust library for recording dairy herd production and births in a
//! spreadsheet-style workbook.
//!
//! # Features
//!
//! - Production records with an inline photo, fitted to a fixed text budget
//! - Calf registrations linked to their mother by ID and name
//! - Row-addressed edits that keep the stored photo unless a new one is given
//! - Herd statistics over every production record
//! - Layered configuration, structured logging and metrics

/// Configuration management
pub mod config;
/// Error types
pub mod error;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Photo fitting
pub mod photo;
/// Repository pattern for data access
pub mod repository;
/// Record submission and lookup
pub mod service;
/// Herd statistics
pub mod stats;
/// Input validation and sanitization
pub mod validation;
/// CSV-per-sheet workbook store
pub mod workbook;

// Re-export key components for easier access
pub use error::{HerdError, Result};
pub use models::{CalfRecord, CowSummary, ProductionRecord, StoredRow};
pub use repository::HerdRepository;
pub use service::{HerdService, PhotoUpload};
pub use workbook::Workbook;
