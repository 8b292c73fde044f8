//! Shockley diode: the workspace's canonical nonlinear component, used to
//! exercise the classifier's non-linear extraction stage and the Newton
//! solver it feeds.

use indexmap::IndexSet;
use kirchhoff_core::{Equation, Expr, Func};

use crate::component::Component;
use crate::node::Node;

#[derive(Debug, Clone)]
pub struct Diode {
    name: String,
    anode: Node,
    cathode: Node,
    /// Saturation current, amps.
    saturation_current: f64,
    /// Thermal voltage `n * Vt`, volts (~0.026 at room temperature, n=1).
    thermal_voltage: f64,
}

impl Diode {
    pub fn new(name: impl Into<String>, anode: Node, cathode: Node) -> Self {
        Self::with_parameters(name, anode, cathode, 1e-14, 0.025_85)
    }

    pub fn with_parameters(
        name: impl Into<String>,
        anode: Node,
        cathode: Node,
        saturation_current: f64,
        thermal_voltage: f64,
    ) -> Self {
        Self {
            name: name.into(),
            anode,
            cathode,
            saturation_current,
            thermal_voltage,
        }
    }

    fn current(&self) -> Expr {
        Expr::var(format!("i_{}", self.name))
    }

    fn voltage_expr(&self) -> Expr {
        Node::voltage_between(&self.anode, &self.cathode)
    }
}

impl Component for Diode {
    fn name(&self) -> &str {
        &self.name
    }

    fn analyze(&self, equations: &mut Vec<Equation>, unknowns: &mut IndexSet<Expr>) {
        let i = self.current();
        unknowns.insert(i.clone());
        // Shockley equation: i = Is * (exp(Vd / Vt) - 1).
        let vd = self.voltage_expr();
        let shockley = Expr::constant(self.saturation_current)
            * (Expr::call(Func::Exp, vd / Expr::constant(self.thermal_voltage)) - Expr::one());
        equations.push(Equation::new(i, shockley));
    }

    fn current_contributions(&self) -> Vec<(Node, Expr)> {
        let i = self.current();
        vec![(self.anode.clone(), -i.clone()), (self.cathode.clone(), i)]
    }

    fn voltage(&self) -> Option<Expr> {
        Some(self.voltage_expr())
    }
}
