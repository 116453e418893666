//! Core shared infrastructure: configuration, error types, data models.

pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod models;
