//! This module aggregates various utility submodules used throughout the application.

/// The SQLite-backed sound archive.
pub mod database;
