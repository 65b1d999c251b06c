//! # Noticeboard API Server Library
//!
//! Core functionality for the noticeboard API server: a session-backed
//! bulletin-board administration backend.
//!
//! ## Modules
//!
//! - `app`: Application state, router, and session/auth middleware
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `forms`: Form parsing and validation
//! - `uploads`: Profile-image staging and promotion
//! - `routes`: Route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod forms;
pub mod routes;
pub mod uploads;
