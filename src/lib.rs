//! Kiln - staged dependency builds with a signature-gated cache
//!
//! Builds a project's dependencies in place through a fixed sequence of
//! stages, restoring dependency directories from a persistent cache only
//! when the cache signature matches the current toolchain and cache layout.

pub mod cache;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod envdir;
pub mod error;
pub mod hooks;
pub mod manifest;
pub mod pipeline;
pub mod planner;
pub mod profile;
pub mod runner;
pub mod ui;

pub use error::{KilnError, KilnResult};
