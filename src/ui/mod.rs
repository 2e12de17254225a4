//! Terminal output for build progress
//!
//! Uses `cliclack` for styled output on interactive terminals and falls
//! back to plain `[OK]`/`[WARN]` lines in CI, where build logs are read
//! as text.
//!
//! # Example
//!
//! ```rust,ignore
//! use kiln::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//!
//! ui::intro(&ctx, "kiln compile");
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Restoring cache");
//! // ... do work ...
//! spinner.stop("Restored node_modules");
//!
//! ui::step_warn_hint(&ctx, "engines.node is unspecified", "Pin a version in package.json");
//! ui::outro_success(&ctx, "Build succeeded");
//! ```

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, note, outro_error, outro_success, remark, section,
    step_error_detail, step_info, step_ok, step_ok_detail, step_warn, step_warn_hint,
};
pub use progress::TaskSpinner;
pub use prompts::confirm;
pub use theme::{init_theme, KilnTheme};
