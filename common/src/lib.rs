// Shared library for the todo service: configuration, storage bootstrap and data access

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod retry;
pub mod telemetry;
