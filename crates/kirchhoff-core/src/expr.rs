//! Symbolic expression algebra.
//!
//! [`Expr`] is the opaque node type the rest of the workspace builds on:
//! components contribute raw [`Expr`]s, the solver pipeline substitutes,
//! differentiates, and expands them, and the kernel builder eventually
//! compiles what is left into an [IR](kirchhoff_kernel) program.
//!
//! Expressions are immutable trees built from a small set of constructors.
//! Equality and hashing treat structurally identical trees as equal, which
//! is what lets `Expr` key the deterministic maps (`IndexMap<Expr, _>`) used
//! throughout the classifier and the runtime's global-cell table.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// An interned variable name.
pub type Symbol = Arc<str>;

/// Unary transcendental functions the algebra understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Func {
    Exp,
    Ln,
    Sin,
    Cos,
    Tanh,
    Sqrt,
}

impl Func {
    fn eval(self, x: f64) -> f64 {
        match self {
            Func::Exp => x.exp(),
            Func::Ln => x.ln(),
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tanh => x.tanh(),
            Func::Sqrt => x.sqrt(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Func::Exp => "exp",
            Func::Ln => "ln",
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tanh => "tanh",
            Func::Sqrt => "sqrt",
        }
    }
}

/// A node in the symbolic expression tree.
///
/// `D(y, t)` represents the as-yet-unsolved derivative `dy/dt`; the
/// classifier's differential stage (`kirchhoff-solver`) is what turns it
/// into a discretized, closed-form binding.
#[derive(Debug, Clone)]
pub enum Expr {
    Const(f64),
    Var(Symbol),
    /// The simulation's continuous time variable.
    Time,
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Call(Func, Box<Expr>),
    /// `D(inner, wrt)` — symbolic derivative of `inner` with respect to `wrt`.
    D(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn var(name: impl AsRef<str>) -> Expr {
        Expr::Var(Arc::from(name.as_ref()))
    }

    pub fn constant(value: f64) -> Expr {
        Expr::Const(value)
    }

    pub fn zero() -> Expr {
        Expr::Const(0.0)
    }

    pub fn one() -> Expr {
        Expr::Const(1.0)
    }

    pub fn call(f: Func, arg: Expr) -> Expr {
        Expr::Call(f, Box::new(arg))
    }

    pub fn powi(self, n: i32) -> Expr {
        Expr::Pow(Box::new(self), Box::new(Expr::Const(n as f64)))
    }

    /// Symbolic `d(self)/d(wrt)`, as `D(self, wrt)`.
    pub fn derivative_marker(self, wrt: Expr) -> Expr {
        Expr::D(Box::new(self), Box::new(wrt))
    }

    /// The distinct symbol naming "the previous-step value of `self`",
    /// i.e. `self.Evaluate(t -> t0)` (spec.md §3 invariant 2). Used to key
    /// global cells for differential unknowns, separately from the
    /// current-step expression itself.
    pub fn previous(&self) -> Expr {
        Expr::var(format!("prev[{self}]"))
    }

    /// True iff this node is a derivative marker `D(_, Time)`.
    pub fn is_d(&self) -> bool {
        matches!(self, Expr::D(_, wrt) if wrt.as_ref() == &Expr::Time)
    }

    /// If this is `D(y, Time)`, returns `y`; otherwise `None`.
    pub fn d_of(&self) -> Option<&Expr> {
        match self {
            Expr::D(inner, wrt) if wrt.as_ref() == &Expr::Time => Some(inner),
            _ => None,
        }
    }

    /// True iff `x` occurs anywhere in this tree (free-variable occurrence test).
    pub fn is_function_of(&self, x: &Expr) -> bool {
        if self == x {
            return true;
        }
        match self {
            Expr::Const(_) | Expr::Var(_) | Expr::Time => false,
            Expr::Add(terms) | Expr::Mul(terms) => terms.iter().any(|t| t.is_function_of(x)),
            Expr::Pow(base, exp) => base.is_function_of(x) || exp.is_function_of(x),
            Expr::Neg(inner) => inner.is_function_of(x),
            Expr::Call(_, inner) => inner.is_function_of(x),
            Expr::D(inner, wrt) => inner.is_function_of(x) || wrt.is_function_of(x),
        }
    }

    /// True iff this tree references any member of `xs`.
    pub fn is_function_of_any(&self, xs: &indexmap::IndexSet<Expr>) -> bool {
        xs.iter().any(|x| self.is_function_of(x))
    }

    /// Structural substitution: replace every occurrence of a key with its
    /// bound value. Keys are matched top-down, so binding a compound
    /// subexpression takes priority over binding its pieces.
    pub fn substitute(&self, bindings: &indexmap::IndexMap<Expr, Expr>) -> Expr {
        if let Some(bound) = bindings.get(self) {
            return bound.clone();
        }
        match self {
            Expr::Const(_) | Expr::Var(_) | Expr::Time => self.clone(),
            Expr::Add(terms) => Expr::Add(terms.iter().map(|t| t.substitute(bindings)).collect()),
            Expr::Mul(terms) => Expr::Mul(terms.iter().map(|t| t.substitute(bindings)).collect()),
            Expr::Pow(base, exp) => Expr::Pow(
                Box::new(base.substitute(bindings)),
                Box::new(exp.substitute(bindings)),
            ),
            Expr::Neg(inner) => Expr::Neg(Box::new(inner.substitute(bindings))),
            Expr::Call(f, inner) => Expr::Call(*f, Box::new(inner.substitute(bindings))),
            Expr::D(inner, wrt) => Expr::D(
                Box::new(inner.substitute(bindings)),
                Box::new(wrt.substitute(bindings)),
            ),
        }
    }

    /// Single-variable substitution convenience, used heavily by the classifier.
    pub fn substitute_one(&self, from: &Expr, to: &Expr) -> Expr {
        let mut map = indexmap::IndexMap::new();
        map.insert(from.clone(), to.clone());
        self.substitute(&map)
    }

    /// Symbolic derivative of `self` with respect to `wrt`.
    ///
    /// Handles the constructors the MNA layer actually produces: sums,
    /// products, constant powers, negation, and the transcendental call
    /// forms a diode/op-amp model might introduce. `D` nodes are treated as
    /// opaque unless differentiating with respect to themselves.
    pub fn d(&self, wrt: &Expr) -> Expr {
        match self {
            Expr::Const(_) => Expr::zero(),
            Expr::Var(_) | Expr::Time => {
                if self == wrt {
                    Expr::one()
                } else {
                    Expr::zero()
                }
            }
            Expr::Add(terms) => Expr::Add(terms.iter().map(|t| t.d(wrt)).collect()).expand(),
            Expr::Mul(factors) => {
                // Product rule: d(f1*f2*...*fn) = sum_i (d(fi) * prod_{j!=i} fj)
                let mut sum = Vec::with_capacity(factors.len());
                for i in 0..factors.len() {
                    let mut term: Vec<Expr> = factors.clone();
                    term[i] = factors[i].d(wrt);
                    sum.push(Expr::Mul(term));
                }
                Expr::Add(sum).expand()
            }
            Expr::Pow(base, exp) => {
                // Only constant exponents are supported, which covers every
                // use in the MNA layer (squares, reciprocals, sqrt).
                if let Expr::Const(n) = exp.as_ref() {
                    let reduced = Expr::Pow(base.clone(), Box::new(Expr::Const(n - 1.0)));
                    Expr::Mul(vec![
                        Expr::Const(*n),
                        reduced,
                        base.d(wrt),
                    ])
                    .expand()
                } else {
                    Expr::zero()
                }
            }
            Expr::Neg(inner) => Expr::Neg(Box::new(inner.d(wrt))),
            Expr::Call(f, inner) => {
                let outer_d = match f {
                    Func::Exp => Expr::Call(Func::Exp, inner.clone()),
                    Func::Ln => Expr::Pow(inner.clone(), Box::new(Expr::Const(-1.0))),
                    Func::Sin => Expr::Call(Func::Cos, inner.clone()),
                    Func::Cos => Expr::Neg(Box::new(Expr::Call(Func::Sin, inner.clone()))),
                    Func::Tanh => Expr::Add(vec![
                        Expr::one(),
                        Expr::Neg(Box::new(
                            Expr::Call(Func::Tanh, inner.clone()).powi(2),
                        )),
                    ]),
                    Func::Sqrt => Expr::Mul(vec![
                        Expr::Const(0.5),
                        Expr::Pow(inner.clone(), Box::new(Expr::Const(-0.5))),
                    ]),
                };
                Expr::Mul(vec![outer_d, inner.d(wrt)]).expand()
            }
            Expr::D(inner, marker_wrt) => {
                if marker_wrt.as_ref() == wrt {
                    inner.d(wrt)
                } else {
                    Expr::D(Box::new(self.clone()), Box::new(wrt.clone()))
                }
            }
        }
    }

    /// Flattens nested sums and distributes negation/multiplication by
    /// constants over sums, so that additive terms can be extracted and
    /// classified by the classifier. This is *not* full polynomial
    /// expansion — it goes exactly as far as the classifier needs.
    pub fn expand(&self) -> Expr {
        match self {
            Expr::Add(terms) => {
                let mut flat = Vec::new();
                for t in terms {
                    match t.expand() {
                        Expr::Add(inner) => flat.extend(inner),
                        other => flat.push(other),
                    }
                }
                flat.retain(|t| !matches!(t, Expr::Const(c) if *c == 0.0));
                if flat.is_empty() {
                    Expr::zero()
                } else if flat.len() == 1 {
                    flat.into_iter().next().unwrap()
                } else {
                    Expr::Add(flat)
                }
            }
            Expr::Neg(inner) => match inner.expand() {
                Expr::Add(terms) => {
                    Expr::Add(terms.into_iter().map(|t| Expr::Neg(Box::new(t)).expand()).collect())
                }
                Expr::Neg(doubly) => *doubly,
                Expr::Const(c) => Expr::Const(-c),
                other => Expr::Neg(Box::new(other)),
            },
            Expr::Mul(factors) => {
                let expanded: Vec<Expr> = factors.iter().map(|f| f.expand()).collect();
                // Distribute a single additive factor across the rest.
                if let Some(pos) = expanded.iter().position(|f| matches!(f, Expr::Add(_))) {
                    if let Expr::Add(sum_terms) = &expanded[pos] {
                        let mut distributed = Vec::with_capacity(sum_terms.len());
                        for term in sum_terms {
                            let mut rest = expanded.clone();
                            rest[pos] = term.clone();
                            distributed.push(Expr::Mul(rest).expand());
                        }
                        return Expr::Add(distributed).expand();
                    }
                }
                // Fold constant factors together.
                let mut constant = 1.0;
                let mut rest = Vec::new();
                for f in expanded {
                    match f {
                        Expr::Const(c) => constant *= c,
                        other => rest.push(other),
                    }
                }
                if constant == 0.0 {
                    return Expr::zero();
                }

                // Combine factors that share a base, e.g. `x * x^-1 -> x^0
                // -> 1`. This is what lets the classifier's "T/x is not a
                // function of x" linearity test (spec.md §4.1 stage 2)
                // actually cancel a bare unknown introduced by division.
                let mut bases: Vec<(Expr, f64)> = Vec::new();
                let mut opaque = Vec::new();
                for f in rest {
                    let (base, exponent) = match &f {
                        Expr::Pow(base, exp) if matches!(exp.as_ref(), Expr::Const(_)) => {
                            let Expr::Const(n) = exp.as_ref() else { unreachable!() };
                            ((**base).clone(), *n)
                        }
                        _ => (f.clone(), 1.0),
                    };
                    if let Some(entry) = bases.iter_mut().find(|(b, _)| b == &base) {
                        entry.1 += exponent;
                    } else if matches!(f, Expr::Pow(..)) {
                        bases.push((base, exponent));
                    } else {
                        opaque.push((base, exponent));
                    }
                }
                // Opaque (non-`Pow`) factors can still cancel against a
                // later `Pow` of the same base; fold them in as exponent-1
                // entries once all factors are seen.
                for (base, exponent) in opaque {
                    if let Some(entry) = bases.iter_mut().find(|(b, _)| b == &base) {
                        entry.1 += exponent;
                    } else {
                        bases.push((base, exponent));
                    }
                }

                let mut rest = Vec::new();
                for (base, exponent) in bases {
                    if exponent == 0.0 {
                        continue;
                    } else if let Expr::Const(b) = base {
                        // A numeric base: fold straight into the running
                        // constant instead of emitting a `Pow` node.
                        constant *= b.powf(exponent);
                    } else if exponent == 1.0 {
                        rest.push(base);
                    } else {
                        rest.push(Expr::Pow(Box::new(base), Box::new(Expr::Const(exponent))));
                    }
                }
                if constant == 0.0 {
                    return Expr::zero();
                }

                if rest.is_empty() {
                    return Expr::Const(constant);
                }
                if constant != 1.0 {
                    rest.insert(0, Expr::Const(constant));
                }
                if rest.len() == 1 {
                    rest.into_iter().next().unwrap()
                } else {
                    Expr::Mul(rest)
                }
            }
            Expr::Pow(base, exp) => {
                let base = base.expand();
                let exp = exp.expand();
                match (&base, &exp) {
                    (Expr::Const(b), Expr::Const(e)) => Expr::Const(b.powf(*e)),
                    _ => Expr::Pow(Box::new(base), Box::new(exp)),
                }
            }
            Expr::Call(f, inner) => Expr::Call(*f, Box::new(inner.expand())),
            Expr::D(inner, wrt) => Expr::D(Box::new(inner.expand()), wrt.clone()),
            Expr::Const(_) | Expr::Var(_) | Expr::Time => self.clone(),
        }
    }

    /// Expands, then splits the top-level sum into additive terms. A
    /// non-`Add` expression is its own single term.
    pub fn additive_terms(&self) -> Vec<Expr> {
        match self.expand() {
            Expr::Add(terms) => terms,
            other => vec![other],
        }
    }

    /// Numerically evaluate this expression given bindings for every
    /// `Var`/`Time`/`D` leaf it references. Used by the Newton residual
    /// evaluator and by tests; the compiled kernel itself resolves these
    /// lookups to direct slot loads at build time instead.
    pub fn eval(&self, env: &indexmap::IndexMap<Expr, f64>) -> f64 {
        match self {
            Expr::Const(c) => *c,
            Expr::Var(_) | Expr::Time | Expr::D(..) => {
                *env.get(self).unwrap_or_else(|| panic!("unbound expression in eval(): {self:?}"))
            }
            Expr::Add(terms) => terms.iter().map(|t| t.eval(env)).sum(),
            Expr::Mul(factors) => factors.iter().map(|f| f.eval(env)).product(),
            Expr::Pow(base, exp) => base.eval(env).powf(exp.eval(env)),
            Expr::Neg(inner) => -inner.eval(env),
            Expr::Call(f, inner) => f.eval(inner.eval(env)),
        }
    }
}

impl std::ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::Add(vec![self, rhs])
    }
}

impl std::ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::Add(vec![self, Expr::Neg(Box::new(rhs))])
    }
}

impl std::ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::Mul(vec![self, rhs])
    }
}

impl std::ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::Mul(vec![self, Expr::Pow(Box::new(rhs), Box::new(Expr::Const(-1.0)))])
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Neg(Box::new(self))
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expr::Const(a), Expr::Const(b)) => a.to_bits() == b.to_bits(),
            (Expr::Var(a), Expr::Var(b)) => a == b,
            (Expr::Time, Expr::Time) => true,
            (Expr::Add(a), Expr::Add(b)) | (Expr::Mul(a), Expr::Mul(b)) => a == b,
            (Expr::Pow(ab, ae), Expr::Pow(bb, be)) => ab == bb && ae == be,
            (Expr::Neg(a), Expr::Neg(b)) => a == b,
            (Expr::Call(af, a), Expr::Call(bf, b)) => af == bf && a == b,
            (Expr::D(ai, aw), Expr::D(bi, bw)) => ai == bi && aw == bw,
            _ => false,
        }
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Expr::Const(c) => c.to_bits().hash(state),
            Expr::Var(s) => s.hash(state),
            Expr::Time => {}
            Expr::Add(terms) | Expr::Mul(terms) => terms.hash(state),
            Expr::Pow(base, exp) => {
                base.hash(state);
                exp.hash(state);
            }
            Expr::Neg(inner) => inner.hash(state),
            Expr::Call(f, inner) => {
                f.hash(state);
                inner.hash(state);
            }
            Expr::D(inner, wrt) => {
                inner.hash(state);
                wrt.hash(state);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(c) => write!(f, "{c}"),
            Expr::Var(s) => write!(f, "{s}"),
            Expr::Time => write!(f, "t"),
            Expr::Add(terms) => {
                write!(f, "(")?;
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
            Expr::Mul(factors) => {
                write!(f, "(")?;
                for (i, t) in factors.iter().enumerate() {
                    if i > 0 {
                        write!(f, " * ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
            Expr::Pow(base, exp) => write!(f, "{base}^{exp}"),
            Expr::Neg(inner) => write!(f, "-{inner}"),
            Expr::Call(func, inner) => write!(f, "{}({inner})", func.name()),
            Expr::D(inner, wrt) => write!(f, "d({inner})/d({wrt})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_compare_by_name() {
        assert_eq!(Expr::var("x"), Expr::var("x"));
        assert_ne!(Expr::var("x"), Expr::var("y"));
    }

    #[test]
    fn is_function_of_finds_nested_occurrences() {
        let x = Expr::var("x");
        let y = Expr::var("y");
        let e = (x.clone() * Expr::constant(2.0)) + y.clone();
        assert!(e.is_function_of(&x));
        assert!(e.is_function_of(&y));
        assert!(!e.is_function_of(&Expr::var("z")));
    }

    #[test]
    fn derivative_of_linear_term() {
        let x = Expr::var("x");
        let r = Expr::constant(1000.0);
        let e = x.clone() * r;
        assert_eq!(e.d(&x), Expr::constant(1000.0));
    }

    #[test]
    fn derivative_of_product_rule() {
        let x = Expr::var("x");
        let e = x.clone() * x.clone();
        // d(x*x)/dx = x + x
        let d = e.d(&x);
        let value = d.eval(&indexmap::indexmap! { x.clone() => 3.0 });
        assert!((value - 6.0).abs() < 1e-12);
    }

    #[test]
    fn substitution_replaces_matching_subtree() {
        let x = Expr::var("x");
        let y = Expr::var("y");
        let e = x.clone() + Expr::constant(1.0);
        let substituted = e.substitute_one(&x, &y);
        assert_eq!(substituted, y + Expr::constant(1.0));
    }

    #[test]
    fn additive_terms_splits_top_level_sum() {
        let x = Expr::var("x");
        let y = Expr::var("y");
        let e = x.clone() + y.clone() - Expr::constant(5.0);
        let terms = e.additive_terms();
        assert_eq!(terms.len(), 3);
    }

    #[test]
    fn expand_distributes_multiplication_over_addition() {
        let x = Expr::var("x");
        let y = Expr::var("y");
        let e = Expr::constant(2.0) * (x.clone() + y.clone());
        let expanded = e.expand();
        let terms = expanded.additive_terms();
        assert_eq!(terms.len(), 2);
    }

    #[test]
    fn dividing_a_linear_term_by_its_unknown_cancels_it() {
        // The classifier's linearity test (spec.md §4.1 stage 2) is
        // "T / x is not a function of x"; that only works if x * x^-1
        // actually cancels during expand().
        let x = Expr::var("x");
        let r = Expr::constant(1_000.0);
        let term = x.clone() * r;
        let divided = (term / x.clone()).expand();
        assert!(!divided.is_function_of(&x));
        assert_eq!(divided, Expr::constant(1_000.0));
    }

    #[test]
    fn dividing_a_nonlinear_term_by_its_unknown_does_not_cancel() {
        let x = Expr::var("x");
        let term = Expr::call(Func::Exp, x.clone());
        let divided = (term / x.clone()).expand();
        assert!(divided.is_function_of(&x));
    }

    #[test]
    fn d_marker_roundtrip() {
        let v = Expr::var("v1");
        let dv = v.clone().derivative_marker(Expr::Time);
        assert!(dv.is_d());
        assert_eq!(dv.d_of(), Some(&v));
    }
}
