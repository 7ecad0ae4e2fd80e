//! Closed status enumerations and the rules for who may observe them
use std::fmt::{Debug, Display};

use crate::error::{MarketError, MarketResult};

/// Who may read a status value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Any known employee.
    Public,
    /// Only employees responsible for the owning organization.
    Owners,
}

/// A per-kind status enumeration.
///
/// Any member may be set by an authorized actor; there is no transition matrix.
pub trait Status:
    Copy
    + Eq
    + Debug
    + Display
    + Send
    + Sync
    + minicbor::Encode<()>
    + for<'b> minicbor::Decode<'b, ()>
    + 'static
{
    const ALL: &'static [Self];
    const INITIAL: Self;

    fn as_str(&self) -> &'static str;
    fn visibility(&self) -> Visibility;
}

/// Case-insensitive, whitespace-tolerant parse into one of `S::ALL`.
pub fn parse_status<S: Status>(raw: &str) -> MarketResult<S> {
    let wanted = raw.trim();
    S::ALL
        .iter()
        .copied()
        .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
        .ok_or_else(|| MarketError::InvalidStatus(raw.to_string()))
}

// Display + FromStr for a status enum in terms of the trait above
macro_rules! status_text {
    ($status:ty) => {
        impl std::fmt::Display for $status {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::status::Status::as_str(self))
            }
        }

        impl std::str::FromStr for $status {
            type Err = $crate::error::MarketError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $crate::status::parse_status(s)
            }
        }
    };
}
pub(crate) use status_text;
