//! # Noticeboard Shared Library
//!
//! This crate contains the domain models, persistence operations, and
//! session machinery shared by the noticeboard API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models, visibility queries, and pagination
//! - `auth`: Password hashing utilities
//! - `confirm`: The two-step save/confirm flow state machine
//! - `session`: Redis-backed session store
//! - `db`: Connection pool and migration helpers
//! - `redis`: Redis client wrapper

pub mod auth;
pub mod confirm;
pub mod db;
pub mod models;
pub mod redis;
pub mod session;

/// Current version of the noticeboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
