//! Circuit nodes: named net voltages plus the fixed ground reference.

use kirchhoff_core::Expr;

/// A net in a schematic. Two-terminal components are wired between a pair
/// of these; [`Node::ground`] is the fixed `0V` reference and never becomes
/// an unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node(Expr);

impl Node {
    /// A named net. Two calls with the same name refer to the same net.
    pub fn named(name: impl AsRef<str>) -> Node {
        Node(Expr::var(format!("v_{}", name.as_ref())))
    }

    pub fn ground() -> Node {
        Node(Expr::zero())
    }

    pub fn is_ground(&self) -> bool {
        self.0 == Expr::zero()
    }

    pub fn expr(&self) -> Expr {
        self.0.clone()
    }

    /// The voltage across a two-terminal part wired between `pos` and
    /// `neg`. Special-cased for ground on either terminal so a grounded
    /// component's voltage is the bare node expression, not `node - 0`:
    /// that distinction matters once a capacitor's derivative marker needs
    /// to structurally match the bare node unknown elsewhere in the system
    /// (spec.md §4.1 stage 3, `underived`).
    pub fn voltage_between(pos: &Node, neg: &Node) -> Expr {
        if neg.is_ground() {
            pos.expr()
        } else if pos.is_ground() {
            -neg.expr()
        } else {
            pos.expr() - neg.expr()
        }
    }
}
