//! One module per top-level subcommand, plus shared output helpers.

pub mod allocation;
pub mod berth;
pub mod daemon;
pub mod init;
pub mod vessel;

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use harbor_core::BookingStatus;
use serde::Serialize;

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render JSON")?
    );
    Ok(())
}

pub(crate) fn status_label(status: BookingStatus) -> ColoredString {
    match status {
        BookingStatus::New => status.as_str().bright_black(),
        BookingStatus::InProgress => status.as_str().yellow(),
        BookingStatus::Approved => status.as_str().green().bold(),
        BookingStatus::Rejected => status.as_str().red(),
        BookingStatus::Cancelled => status.as_str().magenta(),
    }
}

/// Overwrite `target` only when a flag was given.
pub(crate) fn set(target: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *target = value;
    }
}
