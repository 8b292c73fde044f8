//! Ideal operational amplifier (nullor model: no input current, no output
//! impedance, infinite open-loop gain). No saturation modeling — see
//! Non-goals.

use indexmap::IndexSet;
use kirchhoff_core::{Equation, Expr};

use crate::component::Component;
use crate::node::Node;

#[derive(Debug, Clone)]
pub struct OpAmp {
    name: String,
    plus: Node,
    minus: Node,
    out: Node,
}

impl OpAmp {
    pub fn new(name: impl Into<String>, plus: Node, minus: Node, out: Node) -> Self {
        Self {
            name: name.into(),
            plus,
            minus,
            out,
        }
    }

    fn output_current(&self) -> Expr {
        Expr::var(format!("i_{}", self.name))
    }
}

impl Component for OpAmp {
    fn name(&self) -> &str {
        &self.name
    }

    fn analyze(&self, equations: &mut Vec<Equation>, unknowns: &mut IndexSet<Expr>) {
        // The output branch current is free; the feedback network
        // surrounding the op-amp determines it. The virtual short is the
        // only constraint this component contributes.
        unknowns.insert(self.output_current());
        equations.push(Equation::new(self.plus.expr(), self.minus.expr()));
    }

    fn current_contributions(&self) -> Vec<(Node, Expr)> {
        // Ideal inputs draw no current; only the output branch carries one.
        vec![(self.out.clone(), self.output_current())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_short_equates_the_two_inputs() {
        let op = OpAmp::new("U1", Node::named("p"), Node::named("n"), Node::named("out"));
        let mut eqs = Vec::new();
        let mut unknowns = IndexSet::new();
        op.analyze(&mut eqs, &mut unknowns);
        assert_eq!(eqs[0].lhs, Node::named("p").expr());
        assert_eq!(eqs[0].rhs, Node::named("n").expr());
    }

    #[test]
    fn only_the_output_node_carries_a_current_contribution() {
        let op = OpAmp::new("U1", Node::named("p"), Node::named("n"), Node::named("out"));
        let contributions = op.current_contributions();
        assert_eq!(contributions.len(), 1);
        assert_eq!(contributions[0].0, Node::named("out"));
    }
}
