//! Numerical utilities: correlation statistics, quantiles and least squares.

pub mod correlation;
pub mod ols;
pub mod quantile;

pub use correlation::*;
pub use ols::*;
pub use quantile::*;
