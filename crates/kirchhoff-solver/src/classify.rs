//! The equation classifier & solver pipeline (spec.md §4.1): turns raw MNA
//! equations and unknowns into the four strata a [`crate::Simulation`]
//! holds.

use indexmap::{IndexMap, IndexSet};
use kirchhoff_core::{solve, trapezoidal, Arrow, Equation, Error, Expr, Result};

use crate::types::Simulation;

/// A term `T` is linear in `x` iff `T / x` is not a function of `x`
/// (spec.md §4.1 stage 2). A term linear in *some* member of `unknowns` is
/// treated as linear for classification purposes, even if it also
/// references other unknowns (e.g. a cross term `x * y` is linear in `x`).
fn term_is_linear(term: &Expr, unknowns: &IndexSet<Expr>) -> bool {
    let touches: Vec<&Expr> = unknowns.iter().filter(|x| term.is_function_of(x)).collect();
    if touches.is_empty() {
        return true;
    }
    touches
        .into_iter()
        .any(|x| !(term.clone() / x.clone()).expand().is_function_of(x))
}

fn to_equations(residuals: Vec<Expr>) -> Vec<Equation> {
    residuals.into_iter().map(|r| Equation::new(r, Expr::zero())).collect()
}

/// Runs the full classifier pipeline described in spec.md §4.1 over a raw
/// MNA system (as produced by `kirchhoff_devices::Circuit::analyze`).
pub fn classify(
    raw_equations: Vec<Equation>,
    raw_unknowns: IndexSet<Expr>,
    components: IndexMap<String, Expr>,
) -> Result<Simulation> {
    let h = Expr::var("h");

    // Stage 1 — trivial elimination.
    let (trivial, leftover) = solve(&raw_equations, &raw_unknowns);
    let trivial_lhs: IndexSet<Expr> = trivial.iter().map(|a| a.left.clone()).collect();
    let mut remaining_unknowns: IndexSet<Expr> =
        raw_unknowns.difference(&trivial_lhs).cloned().collect();
    let mut remaining_equations = to_equations(leftover);

    // Stage 2 — non-linear extraction.
    let mut f0 = Vec::new();
    let mut linearized = Vec::with_capacity(remaining_equations.len());
    for eq in &remaining_equations {
        let residual = eq.residual();
        let mut kept = Vec::new();
        let mut nonlinear_terms = Vec::new();
        for term in residual.additive_terms() {
            if term_is_linear(&term, &remaining_unknowns) {
                kept.push(term);
            } else {
                nonlinear_terms.push(term);
            }
        }
        if nonlinear_terms.is_empty() {
            linearized.push(Equation::new(residual, Expr::zero()));
            continue;
        }
        let f0_var = Expr::var(format!("f0_{}", f0.len()));
        let nonlinear_sum = if nonlinear_terms.len() == 1 {
            nonlinear_terms.into_iter().next().unwrap()
        } else {
            Expr::Add(nonlinear_terms)
        };
        f0.push(Arrow::new(f0_var.clone(), nonlinear_sum));
        kept.push(f0_var);
        linearized.push(Equation::new(Expr::Add(kept).expand(), Expr::zero()));
    }
    remaining_equations = linearized;

    // Stage 3 — differential handling.
    let dy_dt: IndexSet<Expr> = remaining_unknowns.iter().filter(|x| x.is_d()).cloned().collect();
    let underived: IndexSet<Expr> = dy_dt.iter().filter_map(|d| d.d_of().cloned()).collect();
    // A differential's underivative need not be a bare node unknown: a
    // floating component (neither terminal grounded) differentiates a
    // compound voltage like `v_a - v_b`, so excluding transient algebraic
    // couplings has to check whether an atomic unknown occurs *within* some
    // underived expression, not whether it equals one outright.
    let algebraic_to_solve: IndexSet<Expr> = remaining_unknowns
        .iter()
        .filter(|x| !x.is_d() && !underived.iter().any(|u| u.is_function_of(x)))
        .cloned()
        .collect();

    let (algebraic_solved, leftover) = solve(&remaining_equations, &algebraic_to_solve);
    remaining_equations = to_equations(leftover);
    let mut linear = algebraic_solved;

    let (dy_dt_solved, leftover) = solve(&remaining_equations, &dy_dt);
    remaining_equations = to_equations(leftover);
    if dy_dt_solved.len() != dy_dt.len() {
        return Err(Error::ConfigurationError(
            "could not isolate every derivative unknown during classification".into(),
        ));
    }
    let mut differential = Vec::with_capacity(dy_dt_solved.len());
    let mut derivative_exprs = IndexMap::new();
    for arrow in &dy_dt_solved {
        let y = arrow.left.d_of().ok_or_else(|| {
            Error::ConfigurationError("a dy_dt solution's left side was not a D(y, t) marker".into())
        })?;
        let binding = trapezoidal(y, &arrow.right, &h);
        // `f(t, y)` commonly references `y` itself (e.g. an RC node's
        // `dv/dt = (vin - v)/(rc)`), so the trapezoidal binding is only
        // implicit in `y` until isolated; close it explicitly here rather
        // than leaving a self-referential `differential` entry for the
        // kernel builder to trip over.
        let implicit = Equation::new(binding.left.clone(), binding.right.clone());
        let mut just_y = IndexSet::new();
        just_y.insert(y.clone());
        let (closed, _) = solve(std::slice::from_ref(&implicit), &just_y);
        let resolved = match closed.into_iter().next() {
            Some(solved) if solved.left == *y => solved,
            _ => binding,
        };
        differential.push(resolved);
        derivative_exprs.insert(y.clone(), arrow.right.clone());
    }

    let linear_lhs: IndexSet<Expr> = linear.iter().map(|a| a.left.clone()).collect();
    let differential_lhs: IndexSet<Expr> = differential.iter().map(|a| a.left.clone()).collect();
    remaining_unknowns = remaining_unknowns
        .into_iter()
        .filter(|u| !linear_lhs.contains(u) && !dy_dt.contains(u) && !differential_lhs.contains(u))
        .collect();

    // Stage 4 — linear closure.
    let (stage4_solved, leftover) = solve(&remaining_equations, &remaining_unknowns);
    remaining_equations = to_equations(leftover);
    let stage4_lhs: IndexSet<Expr> = stage4_solved.iter().map(|a| a.left.clone()).collect();
    linear.extend(stage4_solved);
    remaining_unknowns = remaining_unknowns.difference(&stage4_lhs).cloned().collect();

    // Every original unknown must have landed in trivial/differential/linear
    // by now (spec.md §3 invariant 1); anything left in `remaining_unknowns`
    // or `remaining_equations` is a system our sequential isolation could not
    // close, not a non-linear residual.
    if !remaining_unknowns.is_empty() || !remaining_equations.is_empty() {
        return Err(Error::ConfigurationError(format!(
            "classifier could not close the linear system; {} unknown(s) and {} equation(s) left over",
            remaining_unknowns.len(),
            remaining_equations.len()
        )));
    }

    // Stage 5 — residual. `solve` isolates unknowns purely syntactically, so
    // a `linear` binding may still be circular through an `f0` variable
    // (e.g. a diode's node voltage closes in terms of its own non-linear
    // current). Push every trivial/differential/linear binding into each
    // f0's defining expression; whatever f0 variables remain reachable from
    // that substitution are exactly what Newton iteration must solve for,
    // and `f0_i - substituted_rhs_i = 0` is its residual.
    let closed_form: IndexMap<Expr, Expr> = trivial
        .iter()
        .chain(linear.iter())
        .chain(differential.iter())
        .map(|a| (a.left.clone(), a.right.clone()))
        .collect();
    let f0_lhs: IndexSet<Expr> = f0.iter().map(|a| a.left.clone()).collect();
    let mut nonlinear = Vec::new();
    let mut newton_unknowns = IndexSet::new();
    for arrow in &f0 {
        let mut rhs = arrow.right.clone();
        for _ in 0..=closed_form.len() {
            let next = rhs.substitute(&closed_form).expand();
            if next == rhs {
                break;
            }
            rhs = next;
        }
        if rhs.is_function_of_any(&f0_lhs) {
            newton_unknowns.insert(arrow.left.clone());
            nonlinear.push(Equation::new(arrow.left.clone(), rhs));
        }
    }

    Ok(Simulation {
        h,
        trivial,
        differential,
        derivative_exprs,
        linear,
        nonlinear,
        unknowns: newton_unknowns,
        f0,
        components,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexset;
    use kirchhoff_core::Func;

    #[test]
    fn wire_passthrough_is_purely_trivial() {
        let input = Expr::var("v_in");
        let output = Expr::var("v_out");
        let equations = vec![Equation::new(output.clone(), input.clone())];
        let unknowns = indexset! { output.clone() };
        let sim = classify(equations, unknowns, IndexMap::new()).unwrap();
        assert_eq!(sim.trivial.len(), 1);
        assert!(sim.differential.is_empty());
        assert!(sim.nonlinear.is_empty());
        assert!(sim.unknowns.is_empty());
    }

    #[test]
    fn rc_lowpass_produces_one_differential_binding() {
        // Capacitor between node v and ground, current i = C * D(v, t);
        // node equation: i = (Vin - v) / R (no branch-current unknown for
        // the resistor to keep this test minimal).
        let v = Expr::var("v");
        let vin = Expr::var("vin");
        let i = Expr::var("i_c");
        let dv = v.clone().derivative_marker(Expr::Time);
        let r = Expr::constant(1_000.0);
        let c = Expr::constant(1e-6);

        let eq1 = Equation::new(i.clone(), c * dv.clone());
        let eq2 = Equation::new(i, (vin.clone() - v.clone()) / r);
        let unknowns = indexset! { v.clone(), dv, Expr::var("i_c") };

        let sim = classify(vec![eq1, eq2], unknowns, IndexMap::new()).unwrap();
        assert_eq!(sim.differential.len(), 1);
        assert_eq!(sim.differential[0].left, v);
        assert!(sim.nonlinear.is_empty());
    }

    #[test]
    fn diode_residual_ends_up_in_the_nonlinear_stratum() {
        // Resistor from vin to the node (i = (vin - v)/r) in series with a
        // diode to ground (i = Is*(exp(v/Vt) - 1)): the shared branch
        // current closes trivially, but the node voltage only closes in
        // terms of its own non-linear current, so it stays circular through
        // the f0 Newton unknown.
        let v = Expr::var("v");
        let vin = Expr::var("vin");
        let i = Expr::var("i_d");
        let r = Expr::constant(1_000.0);
        let shockley = Expr::constant(1e-14) * (Expr::call(Func::Exp, v.clone() / Expr::constant(0.025)) - Expr::one());
        let kcl = Equation::new(i.clone(), (vin - v.clone()) / r);
        let diode_law = Equation::new(i.clone(), shockley);
        let unknowns = indexset! { v, i };

        let sim = classify(vec![kcl, diode_law], unknowns, IndexMap::new()).unwrap();
        assert_eq!(sim.nonlinear.len(), 1);
        assert_eq!(sim.f0.len(), 1);
        assert_eq!(sim.unknowns.len(), 1);
    }
}
