//! Library crate for quiz-relay-back, exposing modules for binaries and integration tests.

/// Configuration loading.
pub mod config;
/// Question bank access.
pub mod dao;
/// Wire payloads.
pub mod dto;
/// HTTP error mapping.
pub mod error;
/// axum routers.
pub mod routes;
/// Handler logic.
pub mod services;
/// Registry, sessions and broadcast hubs.
pub mod state;
