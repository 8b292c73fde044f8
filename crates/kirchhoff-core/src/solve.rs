//! `Solve`, the symbolic-algebra contract's general equation solver
//! (spec.md §6): isolate as many unknowns as can be derived in closed
//! form, substituting progress back into the remaining system until no
//! more equations yield.

use indexmap::{IndexMap, IndexSet};

use crate::equation::{Arrow, Equation};
use crate::expr::Expr;

/// Attempts to isolate `x` from `residual = 0` (`residual` already
/// expanded). Returns `Some(rhs)` with `x = rhs` iff every term that
/// references `x` does so linearly (divides out cleanly); `None` if `x`
/// does not appear, or appears non-linearly in some term.
fn isolate(residual: &Expr, x: &Expr) -> Option<Expr> {
    let mut coefficient_terms = Vec::new();
    let mut rest = Vec::new();
    let mut touched = false;

    for term in residual.additive_terms() {
        if !term.is_function_of(x) {
            rest.push(term);
            continue;
        }
        touched = true;
        let divided = (term.clone() / x.clone()).expand();
        if divided.is_function_of(x) {
            return None;
        }
        coefficient_terms.push(divided);
    }

    if !touched {
        return None;
    }

    let coefficient = if coefficient_terms.len() == 1 {
        coefficient_terms.into_iter().next().unwrap()
    } else {
        Expr::Add(coefficient_terms).expand()
    };
    let numerator = Expr::Neg(Box::new(Expr::Add(rest))).expand();
    Some((numerator / coefficient).expand())
}

/// `Solve(system, unknowns) -> list<Arrow>`: as many closed-form solutions
/// for `unknowns` as can be derived from `equations`, solving and
/// back-substituting to a fixed point. A solution is only accepted once its
/// right-hand side no longer references any unsolved member of `unknowns`
/// (the independence predicate spec.md §4.1 stages 1 and 4 both rely on).
///
/// Returns the solved bindings plus the residuals of every equation that
/// was *not* consumed producing one, so a caller can feed what's left to a
/// later stage.
pub fn solve(equations: &[Equation], unknowns: &IndexSet<Expr>) -> (Vec<Arrow>, Vec<Expr>) {
    let mut remaining: Vec<Expr> = equations.iter().map(Equation::residual).collect();
    let mut pending: IndexSet<Expr> = unknowns.clone();
    let mut solved = Vec::new();

    loop {
        let mut progressed = false;
        for x in pending.clone() {
            let mut hit = None;
            for (i, residual) in remaining.iter().enumerate() {
                if let Some(rhs) = isolate(residual, &x) {
                    if !rhs.is_function_of_any(&pending) {
                        hit = Some((i, rhs));
                        break;
                    }
                }
            }
            let Some((i, rhs)) = hit else { continue };
            remaining.remove(i);
            pending.shift_remove(&x);

            let mut bindings = IndexMap::new();
            bindings.insert(x.clone(), rhs.clone());
            for eq in remaining.iter_mut() {
                *eq = eq.substitute(&bindings).expand();
            }

            solved.push(Arrow::new(x, rhs));
            progressed = true;
        }
        if !progressed {
            break;
        }
    }

    (solved, remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexset;

    #[test]
    fn solves_a_single_linear_equation() {
        let x = Expr::var("x");
        // x - (10 - 2) = 0 -> x = 8
        let eq = Equation::new(x.clone(), Expr::constant(10.0) - Expr::constant(2.0));
        let (solved, leftover) = solve(&[eq], &indexset! { x.clone() });
        assert_eq!(solved.len(), 1);
        assert_eq!(solved[0].left, x);
        assert_eq!(solved[0].right, Expr::constant(8.0));
        assert!(leftover.is_empty());
    }

    #[test]
    fn chains_substitution_across_two_equations() {
        let x = Expr::var("x");
        let y = Expr::var("y");
        // x = 5; y = x + 1 -> requires substituting x's solution first.
        let eq1 = Equation::new(x.clone(), Expr::constant(5.0));
        let eq2 = Equation::new(y.clone(), x.clone() + Expr::constant(1.0));
        let (solved, _) = solve(&[eq1, eq2], &indexset! { x.clone(), y.clone() });
        assert_eq!(solved.len(), 2);
        let y_binding = solved.iter().find(|a| a.left == y).unwrap();
        assert_eq!(y_binding.right, Expr::constant(6.0));
    }

    #[test]
    fn leaves_a_mutually_coupled_pair_unsolved() {
        let x = Expr::var("x");
        let y = Expr::var("y");
        // x = y; y = x (no closed form without more information).
        let eq1 = Equation::new(x.clone(), y.clone());
        let eq2 = Equation::new(y.clone(), x.clone());
        let (solved, leftover) = solve(&[eq1, eq2], &indexset! { x.clone(), y.clone() });
        assert!(solved.is_empty());
        assert_eq!(leftover.len(), 2);
    }
}
