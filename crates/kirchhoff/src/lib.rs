//! Kirchhoff: a time-domain circuit simulator core.
//!
//! Consumes a symbolic MNA circuit description (`kirchhoff-devices`),
//! classifies it once into the four equation strata (`kirchhoff-solver`),
//! and streams input/output buffers through a per-signature compiled kernel
//! (`kirchhoff-kernel`). [`Simulation`] is the runtime driver: it owns the
//! global state, the kernel cache, and the current simulation time.

mod simulation;

pub use kirchhoff_core::{Error, Result};
pub use kirchhoff_devices::{Capacitor, Circuit, Diode, Node, OpAmp, Resistor, VoltageSource, Waveform};
pub use simulation::Simulation;

/// Re-exported so callers can build `inputs`/`outputs`/`parameters` maps
/// without depending on `kirchhoff-core` directly.
pub use kirchhoff_core::Expr;
