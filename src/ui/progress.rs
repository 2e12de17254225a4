//! Stage spinner with CI fallback

use super::context::UiContext;
use console::style;
use std::time::Instant;

/// A spinner for a long-running stage
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
    started: Option<Instant>,
}

impl TaskSpinner {
    /// Create a new spinner (nothing is shown until `start`)
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
            started: None,
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        self.started = Some(Instant::now());

        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        }
        // Plain mode: the stage header already said what is happening
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        let message = self.with_elapsed(message);
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else {
            println!("       {} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else {
            println!("       {} {}", style("[FAIL]").red(), message);
        }
    }

    fn with_elapsed(&self, message: &str) -> String {
        match self.started {
            Some(start) if start.elapsed().as_secs() >= 1 => {
                format!("{} ({}s)", message, start.elapsed().as_secs())
            }
            _ => message.to_string(),
        }
    }
}
