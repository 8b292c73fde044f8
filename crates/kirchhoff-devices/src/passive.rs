//! Linear passive components: resistor and capacitor.

use indexmap::IndexSet;
use kirchhoff_core::{Equation, Expr};

use crate::component::Component;
use crate::node::Node;

#[derive(Debug, Clone)]
pub struct Resistor {
    name: String,
    pos: Node,
    neg: Node,
    resistance: f64,
}

impl Resistor {
    pub fn new(name: impl Into<String>, pos: Node, neg: Node, resistance: f64) -> Self {
        Self {
            name: name.into(),
            pos,
            neg,
            resistance,
        }
    }

    fn current(&self) -> Expr {
        Expr::var(format!("i_{}", self.name))
    }

    fn voltage_expr(&self) -> Expr {
        Node::voltage_between(&self.pos, &self.neg)
    }
}

impl Component for Resistor {
    fn name(&self) -> &str {
        &self.name
    }

    fn analyze(&self, equations: &mut Vec<Equation>, unknowns: &mut IndexSet<Expr>) {
        let i = self.current();
        unknowns.insert(i.clone());
        // Ohm's law: i = (Vpos - Vneg) / R.
        equations.push(Equation::new(i, self.voltage_expr() / Expr::constant(self.resistance)));
    }

    fn current_contributions(&self) -> Vec<(Node, Expr)> {
        let i = self.current();
        vec![(self.pos.clone(), i.clone()), (self.neg.clone(), -i)]
    }

    fn voltage(&self) -> Option<Expr> {
        Some(self.voltage_expr())
    }
}

#[derive(Debug, Clone)]
pub struct Capacitor {
    name: String,
    pos: Node,
    neg: Node,
    capacitance: f64,
}

impl Capacitor {
    pub fn new(name: impl Into<String>, pos: Node, neg: Node, capacitance: f64) -> Self {
        Self {
            name: name.into(),
            pos,
            neg,
            capacitance,
        }
    }

    fn current(&self) -> Expr {
        Expr::var(format!("i_{}", self.name))
    }

    fn voltage_expr(&self) -> Expr {
        Node::voltage_between(&self.pos, &self.neg)
    }
}

impl Component for Capacitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn analyze(&self, equations: &mut Vec<Equation>, unknowns: &mut IndexSet<Expr>) {
        let i = self.current();
        unknowns.insert(i.clone());
        // i = C * dV/dt. The derivative marker itself is registered as an
        // unknown; the differential stage of the classifier (spec.md §4.1
        // stage 3) is what turns it into a discretized binding.
        let dv = self.voltage_expr().derivative_marker(Expr::Time);
        unknowns.insert(dv.clone());
        equations.push(Equation::new(i, Expr::constant(self.capacitance) * dv));
    }

    fn current_contributions(&self) -> Vec<(Node, Expr)> {
        let i = self.current();
        vec![(self.pos.clone(), i.clone()), (self.neg.clone(), -i)]
    }

    fn voltage(&self) -> Option<Expr> {
        Some(self.voltage_expr())
    }
}
