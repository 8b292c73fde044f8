//! Dead-code pruning (spec.md §4.3): drop any binding whose left-hand side
//! has no transitive consumer among the requested outputs, and trim the
//! input list to what's actually read.

use indexmap::IndexSet;
use kirchhoff_core::{Arrow, Equation, Expr};
use kirchhoff_solver::Simulation;

/// Everything from a [`Simulation`] that survives dead-code elimination for
/// one particular (inputs, outputs) request.
pub struct Pruned {
    pub hoisted: Vec<Arrow>,
    pub input_trivial: Vec<Arrow>,
    pub differential: Vec<Arrow>,
    pub derivative_exprs: Vec<(Expr, Expr)>,
    pub linear: Vec<Arrow>,
    pub f0: Vec<Arrow>,
    pub nonlinear: Vec<Equation>,
    pub newton_unknowns: Vec<Expr>,
    pub inputs: Vec<Expr>,
}

/// Runs `IsExpressionUsed` transitively from the requested output
/// expressions (plus the non-linear residual system, which must always run
/// if Newton unknowns exist) back through every binding category.
pub fn prune(sim: &Simulation, requested_inputs: &[Expr], requested_outputs: &[Expr]) -> Pruned {
    let mut needed: IndexSet<Expr> = requested_outputs.iter().cloned().collect();

    // The non-linear residual must run in full if any Newton unknown is
    // live, since every nonlinear equation contributes to the same solve.
    if !sim.unknowns.is_empty() {
        for eq in &sim.nonlinear {
            needed.insert(eq.lhs.clone());
            needed.insert(eq.rhs.clone());
        }
        for u in &sim.unknowns {
            needed.insert(u.clone());
        }
    }

    // All candidate producer bindings, most-derived first so a single
    // pass tends to converge quickly (the loop still runs to a fixpoint
    // regardless of order).
    let candidates: Vec<&Arrow> = sim
        .f0
        .iter()
        .chain(sim.linear.iter())
        .chain(sim.differential.iter())
        .chain(sim.trivial.iter())
        .collect();

    let mut expanded: IndexSet<Expr> = IndexSet::new();
    loop {
        let mut progressed = false;
        for arrow in &candidates {
            if expanded.contains(&arrow.left) {
                continue;
            }
            let is_used = needed.contains(&arrow.left) || needed.iter().any(|n| n.is_function_of(&arrow.left));
            if is_used {
                needed.insert(arrow.left.clone());
                needed.insert(arrow.right.clone());
                expanded.insert(arrow.left.clone());
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    let keep = |a: &&Arrow| needed.contains(&a.left);
    let hoisted = sim.trivial.iter().filter(keep).cloned().collect::<Vec<_>>();
    let differential = sim.differential.iter().filter(keep).cloned().collect::<Vec<_>>();
    let linear = sim.linear.iter().filter(keep).cloned().collect::<Vec<_>>();
    let f0 = sim.f0.iter().filter(keep).cloned().collect::<Vec<_>>();

    let derivative_exprs = differential
        .iter()
        .filter_map(|a| sim.derivative_exprs.get(&a.left).map(|f| (a.left.clone(), f.clone())))
        .collect();

    let newton_unknowns: Vec<Expr> = sim.unknowns.iter().filter(|u| needed.contains(*u)).cloned().collect();
    let nonlinear = if newton_unknowns.is_empty() { Vec::new() } else { sim.nonlinear.clone() };

    let inputs: Vec<Expr> =
        requested_inputs.iter().filter(|i| needed.iter().any(|n| n.is_function_of(i))).cloned().collect();

    // Hoisted bindings that reference a surviving input, or the simulation
    // clock itself (a fixed-waveform source needs no external input buffer
    // to still vary with `Time`), move to the "recompute every oversample
    // step" bucket; everything else is truly constant for the call and
    // gets hoisted out of the inner loop.
    let (input_trivial, hoisted): (Vec<Arrow>, Vec<Arrow>) = hoisted
        .into_iter()
        .partition(|a| a.right.is_function_of(&Expr::Time) || inputs.iter().any(|i| a.right.is_function_of(i)));

    Pruned { hoisted, input_trivial, differential, derivative_exprs, linear, f0, nonlinear, newton_unknowns, inputs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::{indexset, IndexMap};
    use kirchhoff_core::Equation;

    #[test]
    fn drops_a_trivial_binding_no_output_depends_on() {
        let used = Expr::var("used");
        let unused = Expr::var("unused");
        let sim = Simulation {
            h: Expr::var("h"),
            trivial: vec![
                Arrow::new(used.clone(), Expr::constant(1.0)),
                Arrow::new(unused, Expr::constant(2.0)),
            ],
            differential: Vec::new(),
            derivative_exprs: IndexMap::new(),
            linear: Vec::new(),
            nonlinear: Vec::new(),
            unknowns: indexset! {},
            f0: Vec::new(),
            components: IndexMap::new(),
        };
        let pruned = prune(&sim, &[], &[used.clone()]);
        assert_eq!(pruned.hoisted.len(), 1);
        assert_eq!(pruned.hoisted[0].left, used);
    }

    #[test]
    fn keeps_the_full_nonlinear_system_when_any_newton_unknown_is_requested() {
        let f0_var = Expr::var("f0_0");
        let sim = Simulation {
            h: Expr::var("h"),
            trivial: Vec::new(),
            differential: Vec::new(),
            derivative_exprs: IndexMap::new(),
            linear: vec![Arrow::new(Expr::var("v"), f0_var.clone())],
            nonlinear: vec![Equation::new(f0_var.clone(), Expr::constant(0.5))],
            unknowns: indexset! { f0_var.clone() },
            f0: vec![Arrow::new(f0_var.clone(), Expr::constant(0.5))],
            components: IndexMap::new(),
        };
        let pruned = prune(&sim, &[], &[Expr::var("v")]);
        assert_eq!(pruned.nonlinear.len(), 1);
        assert_eq!(pruned.newton_unknowns.len(), 1);
    }
}
