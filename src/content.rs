//! Editable payload of a versioned entity and the rules for merging partial edits
use std::fmt::Debug;

use crate::error::{MarketError, MarketResult};

/// How an edit request's empty strings are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    /// `None` and `Some("")` both leave the stored value alone.
    #[default]
    EmptyMeansUnchanged,
    /// Only `None` leaves the value alone; `Some("")` clears it.
    Explicit,
}

pub trait Content:
    Clone
    + PartialEq
    + Debug
    + Send
    + Sync
    + minicbor::Encode<()>
    + for<'b> minicbor::Decode<'b, ()>
    + 'static
{
    /// Partial update; every field optional.
    type Edit: Debug;

    fn validate(&self) -> MarketResult<()>;

    /// Applies `edit` in place, returning whether anything changed.
    fn apply(&mut self, edit: &Self::Edit, mode: EditMode) -> bool;
}

/// Merges one optional field, reporting whether the stored value changed.
pub fn merge_field(current: &mut String, update: Option<&String>, mode: EditMode) -> bool {
    let Some(update) = update else {
        return false;
    };
    if update.is_empty() && mode == EditMode::EmptyMeansUnchanged {
        return false;
    }
    if *current == *update {
        return false;
    }
    current.clone_from(update);
    true
}

pub(crate) fn require(field: &'static str, value: &str, max_chars: usize) -> MarketResult<()> {
    if value.trim().is_empty() {
        return Err(MarketError::ValidationFailed(format!("{field} is required")));
    }
    limit(field, value, max_chars)
}

pub(crate) fn limit(field: &'static str, value: &str, max_chars: usize) -> MarketResult<()> {
    if value.chars().count() > max_chars {
        return Err(MarketError::ValidationFailed(format!(
            "{field} exceeds {max_chars} characters"
        )));
    }
    Ok(())
}
