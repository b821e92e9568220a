//! Domain models for the spy cat agency.
//!
//! - [`Cat`]: a field agent. Works at most one active mission at a time.
//! - [`Mission`]: an operation owning one to three [`Target`]s. Its `completed`
//!   flag is derived from the targets and never set directly.
//! - [`Target`]: a unit of surveillance. Completion is one-way; notes lock once
//!   the target or its mission is completed.

mod cat;
mod mission;
mod target;

pub use cat::*;
pub use mission::*;
pub use target::*;

use crate::{Error, Result};

/// Requires `value` to be non-blank and at most `max` characters long.
fn require_text(field: &str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(Error::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}
