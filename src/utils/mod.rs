//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `eventrelay` application.
//!
//! It centralizes the crate-level error type and the logging bootstrap so
//! every component reports faults the same way.

pub mod error;
pub mod logging;

pub use error::RelayError;

#[cfg(test)]
mod tests;
