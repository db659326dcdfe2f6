//! SmartTax engine library crate.
//!
//! This crate computes Indian personal income tax under the New Tax
//! Regime from already-parsed salary and capital-gains figures.  External
//! applications may depend on `smarttax_engine` and call
//! [`engine::compute_tax`] directly or embed the HTTP API via
//! [`api::build_router`].
//!
//! ```
//! use rust_decimal_macros::dec;
//! use smarttax_engine::{compute_tax, RateTable, TaxInput};
//!
//! let input = TaxInput::salaried(dec!(1200000), dec!(50000));
//! let result = compute_tax(&input, &RateTable::fy2024_25()).unwrap();
//! assert_eq!(result.salary_taxable_income, dec!(1125000));
//! assert!(result.is_refund);
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod logging;
pub mod models;
pub mod tax;

pub use engine::{compute_batch, compute_tax, slab_tax};
pub use error::{InputError, RateTableError};
pub use models::{FilingType, TaxCalculationRequest, TaxInput, TaxResult};
pub use tax::{ExemptionAllocation, RateTable};
