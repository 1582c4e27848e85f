//! Task execution module
//!
//! This module handles the actual execution of tasks: alias expansion, the
//! sequential runner and the built-in executors.

pub mod command;
pub mod expander;
pub mod inline;
pub mod runner;

pub use command::CommandExecutor;
pub use expander::{alias_cycles, AliasExpander, AliasTable};
pub use runner::{TaskRunner, TaskRunnerConfig};
