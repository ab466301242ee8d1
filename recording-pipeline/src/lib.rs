//! recording-pipeline library crate.
//!
//! Exposes the domain model, repositories, orchestrator, and background
//! controllers so the binary crate (and integration tests) can assemble them
//! through `ServiceContainer`.

pub mod artifact_store;
pub mod automation;
pub mod config;
pub mod config_resolver;
pub mod container;
pub mod control_plane;
pub mod credentials;
pub mod database;
pub mod domain;
pub mod error;
pub mod executors;
pub mod failure_handler;
pub mod logging;
pub mod pipeline;
pub mod providers;
pub mod queue_dispatcher;
pub mod quota_service;
pub mod retention;
pub mod services;
pub mod source_sync;
pub mod status_aggregator;
pub mod template_matcher;
pub mod topic_formatter;

pub use error::{Error, Result};
