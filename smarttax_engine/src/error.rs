//! Error types for the tax engine.
//!
//! The engine itself never fails on well-formed input within range; every error here
//! is a contract violation by the caller (bad input) or by whoever
//! authored a rate table.

use rust_decimal::Decimal;
use thiserror::Error;

/// Rejection of a tax computation request.
///
/// Field names are reported using the wire names of the request so that
/// callers can map them straight back to the offending form field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// A required amount was absent from the request.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    /// An amount was NaN or infinite.
    #[error("field `{0}` must be a finite number")]
    NonFinite(&'static str),
    /// An amount was below zero.
    #[error("field `{field}` must not be negative, got {value}")]
    Negative { field: &'static str, value: Decimal },
    /// An amount was finite but too large to compute with.
    #[error("field `{field}` must not exceed {max}")]
    OutOfRange { field: &'static str, max: Decimal },
}

/// A rate table that cannot be used for computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateTableError {
    #[error("rate table `{0}` has no slabs")]
    NoSlabs(String),
    #[error("rate table `{version}`: first slab must start at 0, starts at {from}")]
    FirstSlabNotZero { version: String, from: Decimal },
    #[error("rate table `{version}`: slab thresholds must be strictly ascending ({previous} then {next})")]
    UnsortedSlabs {
        version: String,
        previous: Decimal,
        next: Decimal,
    },
    #[error("rate table `{version}`: rate `{name}` must be between 0 and 1, got {value}")]
    RateOutOfRange {
        version: String,
        name: &'static str,
        value: Decimal,
    },
    #[error("rate table `{version}`: amount `{name}` must not be negative, got {value}")]
    NegativeAmount {
        version: String,
        name: &'static str,
        value: Decimal,
    },
}
