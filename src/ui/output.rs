//! Output functions for consistent build formatting
//!
//! Interactive terminals get cliclack output. Everything else gets the
//! classic build-log layout: `-----> ` stage headers with step lines
//! indented underneath so they line up with the header text.

use super::context::UiContext;
use console::{style, Style, StyledObject};
use std::fmt::Display;

/// Indent for lines under a `-----> ` header
const STEP_INDENT: &str = "       ";

/// Print one indented plain-mode line, optionally tagged
fn plain_step(tag: Option<StyledObject<&str>>, message: impl Display) {
    match tag {
        Some(tag) => println!("{}{} {}", STEP_INDENT, tag, message),
        None => println!("{}{}", STEP_INDENT, message),
    }
}

/// Display intro banner
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).yellow().bold()).ok();
    } else {
        println!("{}", style(title).bold());
    }
}

/// Display success outro
pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        println!();
        println!("{} {}", style("[OK]").green(), message);
    }
}

/// Display error outro
pub fn outro_error(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).red().bold()).ok();
    } else {
        println!();
        println!("{} {}", style("[ERROR]").red(), message);
    }
}

/// Display a titled block of lines
pub fn note(ctx: &UiContext, title: &str, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::note(title, message).ok();
        return;
    }
    println!("{}:", style(title).bold());
    for line in message.lines() {
        println!("  {}", line);
    }
}

/// Display a stage header
pub fn section(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::step(style(title).bold()).ok();
    } else {
        println!("-----> {}", title);
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(message).ok();
    } else {
        plain_step(Some(style("[OK]").green()), message);
    }
}

pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(format!("{} ({})", message, style(detail).dim())).ok();
    } else {
        plain_step(Some(style("[OK]").green()), format!("{} ({})", message, detail));
    }
}

/// Display a non-fatal warning
pub fn step_warn(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::warning(message).ok();
    } else {
        plain_step(Some(style("[WARN]").yellow()), message);
    }
}

/// Display a warning followed by what to do about it
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::warning(format!("{} - {}", message, style(hint).dim())).ok();
    } else {
        plain_step(Some(style("[WARN]").yellow()), format!("{} - {}", message, hint));
    }
}

pub fn step_error_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::error(format!("{}: {}", message, style(detail).red())).ok();
    } else {
        plain_step(Some(style("[FAIL]").red()), format!("{}: {}", message, detail));
    }
}

pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::info(message).ok();
    } else {
        plain_step(None, message);
    }
}

/// Display a dimmed aside
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        plain_step(None, style(message).dim());
    }
}

/// Print a `key: value` line
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Print a `key: value` line colored by whether the value is good news
pub fn key_value_status(ctx: &UiContext, key: &str, value: &str, ok: bool) {
    if ctx.use_fancy_output() {
        let value_style = if ok {
            Style::new().green()
        } else {
            Style::new().yellow()
        };
        println!("  {}: {}", style(key).dim(), value_style.apply_to(value));
    } else {
        let tag = if ok { "[OK]" } else { "[WARN]" };
        println!("  {} {}: {}", tag, key, value);
    }
}
