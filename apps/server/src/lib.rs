//! Product and brand catalog over PostgreSQL
//!
//! The interesting part lives in [`db`]: chunked `COPY` bulk inserts, set-based
//! `UNNEST` bulk updates applied in identifier order inside one transaction, and
//! keyset pagination whose total count ignores the cursor.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{Error, Result, Stage};
