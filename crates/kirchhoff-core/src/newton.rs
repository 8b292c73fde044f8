//! `NSolve`, the symbolic-algebra contract's Newton-Raphson refinement
//! entry point (spec.md §6 / §4.4).

use indexmap::IndexMap;
use nalgebra::{DMatrix, DVector};

use crate::equation::Equation;
use crate::expr::Expr;

/// `NSolve(equations, guess, n_iterations)`: `n_iterations` fixed
/// Newton-Raphson refinements of `guess` against `equations`'s residuals,
/// mutating `guess` in place. `context` supplies every other variable
/// (inputs, previous-step globals) the residuals reference but that this
/// call does not solve for.
///
/// The classifier's caller always passes `n_iterations = 1` and loops
/// externally (spec.md §4.4), so that emitted/interpreted code has a
/// predictable, constant-size instruction mix per call.
pub fn nsolve(
    equations: &[Equation],
    unknowns: &[Expr],
    guess: &mut IndexMap<Expr, f64>,
    context: &IndexMap<Expr, f64>,
    n_iterations: u32,
) {
    let n = unknowns.len();
    if n == 0 {
        return;
    }

    let residuals: Vec<Expr> = equations.iter().map(Equation::residual).collect();
    let jacobian: Vec<Vec<Expr>> = residuals
        .iter()
        .map(|r| unknowns.iter().map(|x| r.d(x)).collect())
        .collect();

    for _ in 0..n_iterations {
        let mut env = context.clone();
        for x in unknowns {
            env.insert(x.clone(), guess.get(x).copied().unwrap_or(0.0));
        }

        let r = DVector::from_iterator(n, residuals.iter().map(|e| e.eval(&env)));
        let mut j = DMatrix::zeros(n, n);
        for (row, exprs) in jacobian.iter().enumerate() {
            for (col, entry) in exprs.iter().enumerate() {
                j[(row, col)] = entry.eval(&env);
            }
        }

        // An undetermined step (singular Jacobian) propagates as NaN
        // rather than panicking — spec.md §7 treats non-convergent Newton
        // as an uncaught condition whose symptom is a non-finite sample.
        let delta = j
            .lu()
            .solve(&(-r))
            .unwrap_or_else(|| DVector::from_element(n, f64::NAN));

        for (k, x) in unknowns.iter().enumerate() {
            let updated = guess.get(x).copied().unwrap_or(0.0) + delta[k];
            guess.insert(x.clone(), updated);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;

    #[test]
    fn converges_on_a_scalar_square_root() {
        let x = Expr::var("x");
        let eq = Equation::new(x.clone().powi(2), Expr::constant(4.0));
        let mut guess = indexmap! { x.clone() => 3.0 };
        nsolve(&[eq], &[x.clone()], &mut guess, &IndexMap::new(), 8);
        assert!((guess[&x] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn no_op_on_an_empty_unknown_set() {
        let mut guess = IndexMap::new();
        nsolve(&[], &[], &mut guess, &IndexMap::new(), 5);
        assert!(guess.is_empty());
    }
}
