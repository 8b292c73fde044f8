//! Kernel builder and per-sample interpreter for Kirchhoff.
//!
//! Turns a classified [`kirchhoff_solver::Simulation`] into a [`Kernel`]
//! specialized for one (inputs, outputs) signature: dead-code elimination
//! (`prune`) picks the live subset of bindings, `build` assembles them into
//! a runnable [`Kernel`], and [`KernelCache`] keeps built kernels alive for
//! the life of the process that owns them.

mod build;
mod cache;
mod kernel;
mod prune;

pub use build::build;
pub use cache::KernelCache;
pub use kernel::Kernel;
