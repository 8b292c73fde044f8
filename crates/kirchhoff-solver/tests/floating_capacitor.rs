//! Regression coverage for a capacitor wired between two non-ground nodes.
//!
//! Unlike the in-crate classify.rs unit tests (which hand-write the raw
//! equations for a grounded capacitor), a floating capacitor's differential
//! left-hand side is a compound voltage, not a bare node unknown, so a
//! realistic test needs a full Kirchhoff current-law closure at both of its
//! terminals to stay well-posed. `kirchhoff_devices::Circuit` builds that
//! closure directly.

use kirchhoff_devices::{Capacitor, Circuit, Resistor, VoltageSource, Waveform};
use kirchhoff_solver::classify;

#[test]
fn floating_capacitor_defers_both_terminals_to_linear_closure() {
    let mut circuit = Circuit::new();
    let input = circuit.node("in");
    let a = circuit.node("a");
    let b = circuit.node("b");
    let ground = circuit.ground();

    circuit.add(VoltageSource::new("V1", input.clone(), ground.clone(), Waveform::Dc(5.0)));
    circuit.add(Resistor::new("R1", input, a.clone(), 1_000.0));
    circuit.add(Capacitor::new("C1", a.clone(), b.clone(), 1e-6));
    circuit.add(Resistor::new("R2", b, ground, 10_000.0));

    let (equations, unknowns, components) = circuit.analyze();
    let sim = classify(equations, unknowns, components)
        .expect("a fully-closed KCL system around a floating capacitor should classify");

    // The capacitor's voltage differential closes in stage 3, but neither
    // terminal is a bare node unknown any differential absorbs outright:
    // both must be resolved by stage 4's linear closure instead of being
    // misclassified as ordinary algebraic unknowns stage 3 tries to close.
    assert_eq!(sim.differential.len(), 1);
    let node_a = a.expr();
    assert!(sim.linear.iter().any(|arrow| arrow.left == node_a));
    assert!(sim.nonlinear.is_empty());
}
