//! CLI command implementations

pub mod cache;
pub mod compile;
pub mod completions;
pub mod config;
pub mod detect;

pub use cache::execute as cache;
pub use compile::execute as compile;
pub use completions::execute as completions;
pub use config::execute as config;
pub use detect::execute as detect;
