//! Runs spec.md §8's literal scenarios end to end: build a circuit, drive
//! it through `Simulation::process`, and check the result against the
//! scenario's analytic expectation.

use anyhow::{anyhow, Result};
use kirchhoff::{Capacitor, Circuit, Diode, Expr, OpAmp, Resistor, Simulation, VoltageSource, Waveform};

fn check(name: &str, ok: bool, detail: impl std::fmt::Display) -> Result<()> {
    if ok {
        println!("  ok   {name}: {detail}");
        Ok(())
    } else {
        println!("  FAIL {name}: {detail}");
        Err(anyhow!("scenario failed: {name}"))
    }
}

/// Scenario 1: one input node wired straight through to one output node.
pub fn wire_passthrough() -> Result<()> {
    println!("wire passthrough");
    println!("================");

    let mut circuit = Circuit::new();
    let input = circuit.node("in");
    let output = circuit.node("out");
    circuit.add(VoltageSource::new("Vin", input.clone(), circuit.ground(), Waveform::External(Expr::var("signal_in"))));
    circuit.add(Resistor::new("Rwire", input, output, 1_000.0));

    let mut sim = Simulation::new(&circuit, 48_000.0, 1, 0)?;
    let samples = [1.0, -1.0, 0.5];
    let mut out = [0.0; 3];
    sim.process_mono(Expr::var("signal_in"), &samples, Expr::var("v_out"), &mut out)?;

    let matches = out.iter().zip(samples.iter()).all(|(o, i)| (o - i).abs() < 1e-12);
    check("output tracks input exactly", matches, format!("{out:?}"))
}

/// Scenario 2: RC low-pass, step input, compare the settled sample against
/// the textbook exponential charging curve.
pub fn rc_lowpass() -> Result<()> {
    println!();
    println!("RC low-pass");
    println!("===========");

    let r = 1_000.0;
    let c = 1e-6;
    let sample_rate = 48_000.0;
    let n = 1_000;

    let mut circuit = Circuit::new();
    let input = circuit.node("in");
    let output = circuit.node("out");
    circuit.add(VoltageSource::new("Vin", input.clone(), circuit.ground(), Waveform::External(Expr::var("signal_in"))));
    circuit.add(Resistor::new("R1", input, output.clone(), r));
    circuit.add(Capacitor::new("C1", output, circuit.ground(), c));

    let mut sim = Simulation::new(&circuit, sample_rate, 1, 0)?;
    let samples = vec![1.0; n];
    let mut out = vec![0.0; n];
    sim.process_mono(Expr::var("signal_in"), &samples, Expr::var("v_out"), &mut out)?;

    let expected = 1.0 - (-(n as f64) / (sample_rate * r * c)).exp();
    let actual = out[n - 1];
    check("settled sample matches the RC charging curve", (actual - expected).abs() < 1e-3, format!("{actual:.6} vs {expected:.6}"))
}

/// Scenario 3: ideal voltage source into an open circuit.
pub fn open_circuit_sine() -> Result<()> {
    println!();
    println!("ideal source into an open circuit");
    println!("==================================");

    let sample_rate = 48_000.0;
    let frequency_hz = 1_000.0;
    let n = 48;

    let mut circuit = Circuit::new();
    let output = circuit.node("out");
    circuit.add(VoltageSource::new("Vin", output.clone(), circuit.ground(), Waveform::Sine { amplitude: 1.0, frequency_hz, phase_rad: 0.0 }));

    let mut sim = Simulation::new(&circuit, sample_rate, 1, 0)?;
    let mut out = vec![0.0; n];
    let mut outputs = indexmap::IndexMap::new();
    outputs.insert(Expr::var("v_out"), out.as_mut_slice());
    sim.process(n, &indexmap::IndexMap::new(), &mut outputs, &indexmap::IndexMap::new())?;

    let max_error = out
        .iter()
        .enumerate()
        .map(|(i, v)| (v - (2.0 * std::f64::consts::PI * frequency_hz * i as f64 / sample_rate).sin()).abs())
        .fold(0.0_f64, f64::max);
    check("matches the closed-form sine within tolerance", max_error < 1e-12, format!("max error {max_error:e}"))
}

/// Scenario 4: ideal op-amp voltage follower.
pub fn voltage_follower() -> Result<()> {
    println!();
    println!("op-amp voltage follower");
    println!("=======================");

    let mut circuit = Circuit::new();
    let input = circuit.node("in");
    let output = circuit.node("out");
    circuit.add(VoltageSource::new("Vin", input.clone(), circuit.ground(), Waveform::External(Expr::var("signal_in"))));
    circuit.add(OpAmp::new("U1", input, output.clone(), output));

    let mut sim = Simulation::new(&circuit, 48_000.0, 1, 0)?;
    let samples = [0.0, 0.25, 0.5, 0.75, 1.0];
    let mut out = [0.0; 5];
    sim.process_mono(Expr::var("signal_in"), &samples, Expr::var("v_out"), &mut out)?;

    let matches = out.iter().zip(samples.iter()).all(|(o, i)| (o - i).abs() < 1e-12);
    check("output follows input exactly", matches, format!("{out:?}"))
}

fn half_wave_rectifier_circuit() -> Result<Simulation> {
    let mut circuit = Circuit::new();
    let input = circuit.node("in");
    let output = circuit.node("out");
    circuit.add(VoltageSource::new("Vin", input.clone(), circuit.ground(), Waveform::Sine { amplitude: 1.0, frequency_hz: 100.0, phase_rad: 0.0 }));
    circuit.add(Diode::new("D1", input, output.clone()));
    circuit.add(Resistor::new("Rload", output, circuit.ground(), 1_000.0));
    let sim = Simulation::new(&circuit, 48_000.0, 1, 10)?;
    Ok(sim)
}

/// Scenario 5: diode half-wave rectifier, the one scenario that engages
/// the Newton solver.
pub fn half_wave_rectifier() -> Result<()> {
    println!();
    println!("diode half-wave rectifier");
    println!("==========================");

    let sample_rate = 48_000.0;
    let frequency_hz = 100.0;
    let n = 480;

    let mut sim = half_wave_rectifier_circuit()?;
    let mut out = vec![0.0; n];
    let mut outputs = indexmap::IndexMap::new();
    outputs.insert(Expr::var("v_out"), out.as_mut_slice());
    sim.process(n, &indexmap::IndexMap::new(), &mut outputs, &indexmap::IndexMap::new())?;

    let forward_drop = 0.7;
    let ok = out.iter().enumerate().all(|(i, v)| {
        let input = (2.0 * std::f64::consts::PI * frequency_hz * i as f64 / sample_rate).sin();
        if input < 0.0 {
            v.abs() <= 1e-6
        } else {
            (input - v).abs() <= forward_drop
        }
    });
    check("rectifies: negative half clamped, positive half passes", ok, format!("{} samples", out.len()))
}

/// Scenario 6: `Reset` then an identical re-run reproduces scenario 5's
/// buffer bit-for-bit.
pub fn determinism() -> Result<()> {
    println!();
    println!("determinism across reset");
    println!("=========================");

    let n = 480;
    let mut sim = half_wave_rectifier_circuit()?;

    let mut first = vec![0.0; n];
    {
        let mut outputs = indexmap::IndexMap::new();
        outputs.insert(Expr::var("v_out"), first.as_mut_slice());
        sim.process(n, &indexmap::IndexMap::new(), &mut outputs, &indexmap::IndexMap::new())?;
    }

    sim.reset();

    let mut second = vec![0.0; n];
    {
        let mut outputs = indexmap::IndexMap::new();
        outputs.insert(Expr::var("v_out"), second.as_mut_slice());
        sim.process(n, &indexmap::IndexMap::new(), &mut outputs, &indexmap::IndexMap::new())?;
    }

    let identical = first == second;
    check("reset + re-run reproduces the buffer bit-for-bit", identical, format!("{n} samples"))
}
