//! Stratum is a configuration-driven, read-only HTTP gateway.
//!
//! Each configured project exposes one route backed by either a database
//! column or a remote API. Responses are cached in Redis under
//! `<project>:<id>` for the project's TTL. A database value may itself
//! point at the payload (a data URI, plain base64 or an http(s) URL) and
//! is resolved before serving.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate, health).
//! - [`config`] -- Config file and environment loading plus validation.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`gateway`] -- Route matching and the per-request cache/fetch lifecycle.
//! - [`source`] -- Database and API data sources, indirection resolution and
//!   the shared outbound HTTP client.
//! - [`pool`] -- Lazily-connected database pools keyed by connection string.
//! - [`cache`] -- Redis-backed or disabled response cache.
//! - [`health`] -- `GET /health` liveness handler.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`server`] -- Axum server setup, shared application state, HTTP client, and
//!   graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cache;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod logging;
pub mod pool;
pub mod server;
pub mod source;
