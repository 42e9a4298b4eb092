//! Common types and configuration shared across fedstat crates.
//!
//! This crate contains the base building blocks for the fedstat engine, including:
//! - **Configuration**: Strongly typed application and catalog configuration (`config`).
//! - **Models**: Provider configs, stored queries, results, and join specs (`models`).
//! - **Resilience**: Exponential backoff retry helpers (`retry`).
pub mod config;
pub mod models;
pub mod retry;
