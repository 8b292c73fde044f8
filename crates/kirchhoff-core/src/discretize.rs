//! `NDSolve`, the symbolic-algebra contract's discretization entry point
//! (spec.md §6): turns a derivative's defining expression into a
//! trapezoidal update for the underlying state variable.

use crate::equation::Arrow;
use crate::expr::Expr;

/// One step of trapezoidal integration (spec.md §4.2): given
/// `dy/dt = f(t, y)` and step `h`, produce
/// `y = y0 + (h/2)(f(t,y) + f(t0,y0))`, where `y0 = y.previous()` and
/// `f(t0,y0) = derivative_expr.previous()` are the previous-step globals
/// (spec.md §3 invariant 2).
///
/// `y` is the underlying state variable (e.g. a capacitor voltage) and
/// `derivative_expr` is `f(t,y)` — the already-solved right-hand side of
/// the `dy_dt` unknown's defining equation.
pub fn trapezoidal(y: &Expr, derivative_expr: &Expr, h: &Expr) -> Arrow {
    let y_prev = y.previous();
    let derivative_prev = derivative_expr.previous();
    let half_h = h.clone() / Expr::constant(2.0);
    let rhs = y_prev + half_h * (derivative_expr.clone() + derivative_prev);
    Arrow::new(y.clone(), rhs.expand())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trapezoidal_binding_reduces_to_the_textbook_formula() {
        let y = Expr::var("v");
        let f = Expr::var("f");
        let h = Expr::var("h");

        let binding = trapezoidal(&y, &f, &h);
        assert_eq!(binding.left, y);

        let mut env = indexmap::IndexMap::new();
        env.insert(y.previous(), 1.0);
        env.insert(f.clone(), 2.0);
        env.insert(f.previous(), 4.0);
        env.insert(h.clone(), 0.1);
        // 1 + (0.1/2)*(2+4) = 1.3
        assert!((binding.right.eval(&env) - 1.3).abs() < 1e-12);
    }
}
