//! The classifier's output: the four equation strata plus everything the
//! runtime driver needs to build and run a kernel (spec.md §3).

use indexmap::{IndexMap, IndexSet};
use kirchhoff_core::{Arrow, Equation, Expr};

/// A fully classified circuit, ready for the kernel builder.
#[derive(Debug, Clone)]
pub struct Simulation {
    /// Step length `h = 1 / (sample_rate * oversample)`, left symbolic
    /// until kernel-build time.
    pub h: Expr,
    /// Unknowns whose closed form is independent of any other remaining
    /// unknown.
    pub trivial: Vec<Arrow>,
    /// Unknowns whose discretized solution gives the next-step value.
    pub differential: Vec<Arrow>,
    /// Remaining unknowns closed-form in terms of inputs and
    /// already-solved unknowns.
    pub linear: Vec<Arrow>,
    /// `y -> f(t, y)` for every `differential` entry: the raw, pre-
    /// discretization right-hand side the trapezoidal binding was built
    /// from. The kernel builder needs this to re-evaluate `f` at the new
    /// step and commit it into `f.previous()` for the next sample; it is
    /// not recoverable from `differential` alone once discretized.
    pub derivative_exprs: IndexMap<Expr, Expr>,
    /// Implicit residual system driven to zero by Newton iteration.
    pub nonlinear: Vec<Equation>,
    /// Variables the Newton solver operates on (the `f0` left-hand sides).
    pub unknowns: IndexSet<Expr>,
    /// Fresh variables substituting non-linear subexpressions.
    pub f0: Vec<Arrow>,
    /// Per-component voltage expressions, by component name, so the
    /// runtime driver can register them as output selectors.
    pub components: IndexMap<String, Expr>,
}

impl Simulation {
    /// Every original-MNA unknown resolved by this classification, across
    /// all four strata (spec.md §3 invariant 1).
    pub fn all_resolved_unknowns(&self) -> IndexSet<Expr> {
        let mut all = IndexSet::new();
        all.extend(self.trivial.iter().map(|a| a.left.clone()));
        all.extend(self.differential.iter().map(|a| a.left.clone()));
        all.extend(self.linear.iter().map(|a| a.left.clone()));
        all.extend(self.unknowns.iter().cloned());
        all
    }

    /// The previous-step globals every binding in this classification
    /// reads or writes (spec.md §3 invariants 2 and 3): one pair per
    /// `differential` entry (value and derivative), and one per `f0`
    /// left-hand side / Newton unknown.
    pub fn global_keys(&self) -> IndexSet<Expr> {
        let mut keys = IndexSet::new();
        for arrow in &self.differential {
            keys.insert(arrow.left.previous());
            if let Some(f) = self.derivative_exprs.get(&arrow.left) {
                keys.insert(f.previous());
            }
        }
        for arrow in &self.f0 {
            keys.insert(arrow.left.clone());
        }
        keys
    }
}
