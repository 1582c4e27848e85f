//! Configuration parsing for pipeline and task files

pub mod pipeline;
pub mod tasks;
