//! Pipewright Core Library
//!
//! This is the core library for the Pipewright task pipeline runner. It provides
//! all the business logic for loading a pipeline, expanding aliases, running
//! tasks one after another and reacting to file changes.
//!
//! ## Architecture
//!
//! The core library is organized into several modules:
//!
//! - [`pipeline`] - High-level pipeline management interface
//! - [`execution`] - Alias expansion, the sequential runner and built-in executors
//! - [`registry`] - Task name to executor bindings
//! - [`config_store`] - Task configuration and runtime values with `<%= key %>` templates
//! - [`events`] - Topic based event bus
//! - [`environment`] - Environment profiles and dotenv files
//! - [`coverage`] - lcov parsing, thresholds and report upload
//! - [`watch`] - Re-running tasks on file changes
//! - [`configs`] - Configuration parsing for the pipeline and task files
//! - [`results`] - Result types for pipeline operations
//! - [`tasks`] - Task display utilities
//! - [`types`] - Common error types and type aliases
//!
//! ## Usage
//!
//! The primary entry point is the [`PipelineManager`] which provides a high-level
//! interface for all pipeline operations:
//!
//! ```rust,no_run
//! use pipewright_core::pipeline::{PipelineManager, PipelineManagerConfig};
//! use std::path::PathBuf;
//!
//! # fn example() -> pipewright_core::types::PipewrightResult<()> {
//! let manager = PipelineManager::new(PipelineManagerConfig {
//!     workspace_root: PathBuf::from("."),
//! })?;
//!
//! let tasks = manager.list_tasks();
//! # Ok(())
//! # }
//! ```

pub mod config_store;
pub mod configs;
pub mod coverage;
pub mod environment;
pub mod events;
pub mod execution;
pub mod pipeline;
pub mod registry;
pub mod results;
pub mod tasks;
pub mod types;
pub mod watch;

// Re-export the main types for easier usage
pub use pipeline::{PipelineManager, PipelineManagerConfig, RunOptions};
pub use types::{PipewrightError, PipewrightResult};
