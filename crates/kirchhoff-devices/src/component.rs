//! The component contract and the [`Circuit`] that assembles components
//! into a raw MNA system.
//!
//! Each component contributes its own branch equations and unknowns
//! (`analyze`) plus the signed currents it injects into the nodes it
//! touches (`current_contributions`); `Circuit::analyze` closes the loop by
//! writing one Kirchhoff current-law equation per net.

use indexmap::{IndexMap, IndexSet};
use kirchhoff_core::{Equation, Expr};

use crate::node::Node;

/// A schematic part: something that can append MNA equations and declare
/// the unknowns it introduces.
pub trait Component: std::fmt::Debug {
    fn name(&self) -> &str;

    /// Appends this component's branch equations and declares the
    /// unknowns (branch currents, derivative markers, ...) it introduces.
    fn analyze(&self, equations: &mut Vec<Equation>, unknowns: &mut IndexSet<Expr>);

    /// The signed current this component injects into each node it is
    /// wired to (current flowing from the component into the net).
    fn current_contributions(&self) -> Vec<(Node, Expr)>;

    /// The voltage across this component, for ideal two-terminal parts
    /// that want to register a component-voltage output. `None` for
    /// components (like an op-amp) with no single well-defined voltage.
    fn voltage(&self) -> Option<Expr> {
        None
    }
}

/// A netlist: an ordered collection of components plus the set of nets
/// they are wired to.
#[derive(Debug, Default)]
pub struct Circuit {
    components: Vec<Box<dyn Component>>,
    nodes: IndexSet<String>,
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or reuses) a named net.
    pub fn node(&mut self, name: impl AsRef<str>) -> Node {
        self.nodes.insert(name.as_ref().to_string());
        Node::named(name)
    }

    pub fn ground(&self) -> Node {
        Node::ground()
    }

    pub fn add<C: Component + 'static>(&mut self, component: C) {
        self.components.push(Box::new(component));
    }

    /// Runs every component's `analyze`, then closes each net with a
    /// Kirchhoff current-law equation, producing the raw MNA system
    /// spec.md §4.1 stage 1 starts from.
    ///
    /// Returns the raw equations, the full unknown set (branch currents,
    /// derivative markers, and one node-voltage unknown per net), and the
    /// component-voltage map used to register output selectors.
    pub fn analyze(&self) -> (Vec<Equation>, IndexSet<Expr>, IndexMap<String, Expr>) {
        let mut equations = Vec::new();
        let mut unknowns = IndexSet::new();

        for node in &self.nodes {
            unknowns.insert(Node::named(node).expr());
        }

        let mut kcl: IndexMap<String, Vec<Expr>> =
            self.nodes.iter().map(|n| (n.clone(), Vec::new())).collect();

        for component in &self.components {
            component.analyze(&mut equations, &mut unknowns);
            for (node, current) in component.current_contributions() {
                if node.is_ground() {
                    continue;
                }
                let key = node_name(&node);
                kcl.entry(key).or_default().push(current);
            }
        }

        for (_, terms) in kcl {
            let sum = if terms.is_empty() {
                Expr::zero()
            } else {
                Expr::Add(terms)
            };
            equations.push(Equation::new(sum, Expr::zero()));
        }

        let mut components_out = IndexMap::new();
        for component in &self.components {
            if let Some(v) = component.voltage() {
                components_out.insert(component.name().to_string(), v);
            }
        }

        (equations, unknowns, components_out)
    }
}

/// Recovers the net name a `Node` was built from, for keying the KCL map.
/// Nodes are always built via `Node::named`, whose `Expr::Var` carries the
/// `v_<name>` symbol.
fn node_name(node: &Node) -> String {
    match node.expr() {
        Expr::Var(sym) => sym.strip_prefix("v_").unwrap_or(&sym).to_string(),
        other => unreachable!("non-ground node with non-variable expression: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passive::Resistor;

    #[test]
    fn two_resistors_to_ground_close_into_one_kcl_equation_per_node() {
        let mut circuit = Circuit::new();
        let input = circuit.node("in");
        let mid = circuit.node("mid");
        circuit.add(Resistor::new("R1", input.clone(), mid.clone(), 1_000.0));
        circuit.add(Resistor::new("R2", mid.clone(), circuit.ground(), 1_000.0));

        let (equations, unknowns, _) = circuit.analyze();
        // 2 branch equations + 2 KCL equations (in, mid).
        assert_eq!(equations.len(), 4);
        assert!(unknowns.contains(&mid.expr()));
    }
}
