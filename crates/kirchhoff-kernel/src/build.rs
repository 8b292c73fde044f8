//! Kernel-build entry point (spec.md §4.3): ties a classified `Simulation`,
//! dead-code pruning, and the tree-walking interpreter together for one
//! (inputs, outputs) signature.

use kirchhoff_core::Expr;
use kirchhoff_solver::Simulation;

use crate::kernel::Kernel;
use crate::prune;

/// Builds a kernel specialized to one (inputs, outputs) signature.
///
/// Infallible for the tree-walking interpreter this crate compiles to:
/// `Simulation` already guarantees every unknown closed into one of the
/// four strata (spec.md §3 invariant 1), so pruning can only ever narrow
/// that set, never leave a gap. A future native-codegen backend (Design
/// Note option a) is the one that could plausibly fail here and return
/// `kirchhoff_core::Error::BuildFailure`.
pub fn build(sim: &Simulation, inputs: &[Expr], outputs: Vec<(String, Expr)>) -> Kernel {
    let requested_outputs: Vec<Expr> = outputs.iter().map(|(_, e)| e.clone()).collect();
    let pruned = prune::prune(sim, inputs, &requested_outputs);
    Kernel::new(pruned, outputs)
}
