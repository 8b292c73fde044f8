//! Independent sources.

use indexmap::IndexSet;
use kirchhoff_core::{Equation, Expr, Func};

use crate::component::Component;
use crate::node::Node;

/// A time-domain waveform, expressed symbolically so it folds into the
/// same classifier pipeline as every other equation instead of needing a
/// special-cased "external input" concept at this layer.
#[derive(Debug, Clone)]
pub enum Waveform {
    Dc(f64),
    Sine { amplitude: f64, frequency_hz: f64, phase_rad: f64 },
    Step { before: f64, after: f64, at_time: f64 },
    /// Not a fixed function of time: the source's value is an unbound
    /// symbol the runtime driver streams in as an input buffer. Lets a
    /// voltage source sit at the same MNA branch equation as every other
    /// waveform instead of needing a special-cased "this is an input" path
    /// through the classifier.
    External(Expr),
}

impl Waveform {
    pub fn into_expr(self) -> Expr {
        match self {
            Waveform::Dc(v) => Expr::constant(v),
            Waveform::External(e) => e,
            Waveform::Sine { amplitude, frequency_hz, phase_rad } => {
                let omega = 2.0 * std::f64::consts::PI * frequency_hz;
                Expr::constant(amplitude)
                    * Expr::call(Func::Sin, Expr::constant(omega) * Expr::Time + Expr::constant(phase_rad))
            }
            // A true step isn't representable by this algebra's smooth
            // function set; approximate with a steep tanh ramp, which is
            // smooth enough for the Newton solver and close enough for a
            // sample-rate-scale transition.
            Waveform::Step { before, after, at_time } => {
                let mid = (before + after) / 2.0;
                let half_span = (after - before) / 2.0;
                let steepness = 1.0e6;
                Expr::constant(mid)
                    + Expr::constant(half_span)
                        * Expr::call(
                            Func::Tanh,
                            Expr::constant(steepness) * (Expr::Time - Expr::constant(at_time)),
                        )
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct VoltageSource {
    name: String,
    pos: Node,
    neg: Node,
    waveform: Waveform,
}

impl VoltageSource {
    pub fn new(name: impl Into<String>, pos: Node, neg: Node, waveform: Waveform) -> Self {
        Self {
            name: name.into(),
            pos,
            neg,
            waveform,
        }
    }

    fn current(&self) -> Expr {
        Expr::var(format!("i_{}", self.name))
    }

    fn voltage_expr(&self) -> Expr {
        Node::voltage_between(&self.pos, &self.neg)
    }
}

impl Component for VoltageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn analyze(&self, equations: &mut Vec<Equation>, unknowns: &mut IndexSet<Expr>) {
        let i = self.current();
        unknowns.insert(i);
        // Branch equation: Vpos - Vneg = waveform(t). This is a function of
        // Time alone, so trivial elimination (stage 1) picks it straight up
        // when one terminal is ground.
        equations.push(Equation::new(self.voltage_expr(), self.waveform.clone().into_expr()));
    }

    fn current_contributions(&self) -> Vec<(Node, Expr)> {
        let i = self.current();
        vec![(self.pos.clone(), i.clone()), (self.neg.clone(), -i)]
    }

    fn voltage(&self) -> Option<Expr> {
        Some(self.voltage_expr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_source_branch_equation_is_a_constant() {
        let v = VoltageSource::new("V1", Node::named("a"), Node::ground(), Waveform::Dc(5.0));
        let mut eqs = Vec::new();
        let mut unknowns = IndexSet::new();
        v.analyze(&mut eqs, &mut unknowns);
        assert_eq!(eqs[0].rhs, Expr::constant(5.0));
    }

    #[test]
    fn sine_waveform_is_a_function_of_time() {
        let e = Waveform::Sine { amplitude: 1.0, frequency_hz: 1_000.0, phase_rad: 0.0 }.into_expr();
        assert!(e.is_function_of(&Expr::Time));
    }

    #[test]
    fn external_waveform_branch_equation_is_left_unbound() {
        let v_in = Expr::var("v_in");
        let v = VoltageSource::new("V1", Node::named("a"), Node::ground(), Waveform::External(v_in.clone()));
        let mut eqs = Vec::new();
        let mut unknowns = IndexSet::new();
        v.analyze(&mut eqs, &mut unknowns);
        assert_eq!(eqs[0].rhs, v_in.clone());
        assert!(!unknowns.contains(&v_in));
    }
}
