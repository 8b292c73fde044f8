//! Symbolic expression algebra and MNA data model for Kirchhoff.
//!
//! This crate provides the [`Expr`] symbolic algebra (substitute,
//! differentiate, expand) and the small [`Equation`]/[`Arrow`] types that
//! the rest of the workspace builds its classifier, kernel, and runtime
//! driver on.

pub mod discretize;
pub mod equation;
pub mod error;
pub mod expr;
pub mod newton;
pub mod solve;

pub use discretize::trapezoidal;
pub use equation::{Arrow, Equation};
pub use error::{Error, Result};
pub use expr::{Expr, Func, Symbol};
pub use newton::nsolve;
pub use solve::solve;
