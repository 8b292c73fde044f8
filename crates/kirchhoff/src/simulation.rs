//! The runtime driver (spec.md §4.5): holds global state across calls,
//! marshals input/output buffers, performs oversampling, and selects or
//! builds a kernel for the requested (inputs, outputs, parameters)
//! signature.

use std::time::Instant;

use indexmap::IndexMap;
use kirchhoff_core::{Error, Expr, Result};
use kirchhoff_devices::Circuit;
use kirchhoff_kernel::KernelCache;

/// How many trailing samples of each output buffer the optional divergence
/// guard inspects after a `process` call.
const DIVERGENCE_TAIL: usize = 16;

/// A classified circuit, ready to be driven sample-by-sample.
///
/// Built once per circuit (`Simulation::new` runs the classifier pipeline
/// exactly once); `process` may be called repeatedly with different
/// (inputs, outputs, parameters) signatures, each compiling and caching its
/// own kernel on first use.
pub struct Simulation {
    classification: kirchhoff_solver::Simulation,
    sample_rate: f64,
    oversample: u32,
    newton_iterations: u32,
    h: f64,
    kernels: KernelCache,
    globals: IndexMap<Expr, f64>,
    t: f64,
    divergence_guard: bool,
}

impl Simulation {
    /// Runs the classifier pipeline once over `circuit` and allocates one
    /// global cell per differential state, derivative, and Newton/`f0`
    /// unknown (spec.md §3 invariants 2 and 3).
    pub fn new(circuit: &Circuit, sample_rate: f64, oversample: u32, newton_iterations: u32) -> Result<Self> {
        let start = Instant::now();
        let (equations, unknowns, components) = circuit.analyze();
        log::info!(
            "[{}ms] building simulation: {} equation(s), {} unknown(s)",
            start.elapsed().as_millis(),
            equations.len(),
            unknowns.len(),
        );
        for eq in &equations {
            log::debug!("[{}ms]   mna: {} = {}", start.elapsed().as_millis(), eq.lhs, eq.rhs);
        }

        let classification = kirchhoff_solver::classify(equations, unknowns, components)?;

        log::info!(
            "[{}ms] classified: {} trivial, {} differential, {} linear, {} f0, {} newton unknown(s)",
            start.elapsed().as_millis(),
            classification.trivial.len(),
            classification.differential.len(),
            classification.linear.len(),
            classification.f0.len(),
            classification.unknowns.len(),
        );
        for arrow in &classification.trivial {
            log::debug!("[{}ms]   trivial: {} := {}", start.elapsed().as_millis(), arrow.left, arrow.right);
        }
        for arrow in &classification.differential {
            log::debug!("[{}ms]   differential: {} := {}", start.elapsed().as_millis(), arrow.left, arrow.right);
        }
        for arrow in &classification.linear {
            log::debug!("[{}ms]   linear: {} := {}", start.elapsed().as_millis(), arrow.left, arrow.right);
        }
        for arrow in &classification.f0 {
            log::debug!("[{}ms]   f0: {} := {}", start.elapsed().as_millis(), arrow.left, arrow.right);
        }
        for (name, expr) in &classification.components {
            log::debug!("[{}ms]   component voltage: {name} = {expr}", start.elapsed().as_millis());
        }

        let globals = classification.global_keys().into_iter().map(|k| (k, 0.0)).collect();
        let h = 1.0 / (sample_rate * f64::from(oversample));

        Ok(Self {
            classification,
            sample_rate,
            oversample,
            newton_iterations,
            h,
            kernels: KernelCache::new(),
            globals,
            t: 0.0,
            divergence_guard: false,
        })
    }

    /// Enables the optional divergence guard (spec.md §5/§9): after each
    /// `process` call, if any output buffer's tail has gone non-finite,
    /// the simulation resets its state and the call reports
    /// `Error::Diverged` instead of returning normally. Off by default —
    /// spec.md §9 notes the equivalent check was disabled upstream and
    /// leaves enabling it a policy choice.
    pub fn with_divergence_guard(mut self, enabled: bool) -> Self {
        self.divergence_guard = enabled;
        self
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn oversample(&self) -> u32 {
        self.oversample
    }

    /// Current simulation time, advanced by every `process` call's return
    /// value.
    pub fn t(&self) -> f64 {
        self.t
    }

    /// The expression registered for a named component's voltage (spec.md
    /// §6, "ideal two-terminal components expose a voltage expression").
    /// Used to resolve a human-readable output request into the
    /// `Expression` key `process` expects.
    pub fn component_voltage(&self, name: &str) -> Result<Expr> {
        self.classification
            .components
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownOutput(name.to_string()))
    }

    /// Zeros every global cell and sets the simulation clock back to zero
    /// (spec.md §4.5 `Reset`).
    pub fn reset(&mut self) {
        for v in self.globals.values_mut() {
            *v = 0.0;
        }
        self.t = 0.0;
    }

    /// Runs `n` samples through the kernel built for this
    /// (inputs, outputs, parameters) signature, building and caching it on
    /// first use. Returns the new simulation time (also stored in `self`).
    pub fn process(
        &mut self,
        n: usize,
        inputs: &IndexMap<Expr, &[f64]>,
        outputs: &mut IndexMap<Expr, &mut [f64]>,
        parameters: &IndexMap<Expr, f64>,
    ) -> Result<f64> {
        for (expr, buffer) in inputs {
            if buffer.len() != n {
                return Err(Error::LengthMismatch {
                    which: expr.to_string(),
                    expected: n,
                    actual: buffer.len(),
                });
            }
        }
        for (expr, buffer) in outputs.iter() {
            if buffer.len() != n {
                return Err(Error::LengthMismatch {
                    which: expr.to_string(),
                    expected: n,
                    actual: buffer.len(),
                });
            }
        }

        let input_keys: Vec<Expr> = inputs.keys().cloned().collect();
        let output_entries: Vec<(String, Expr)> = outputs.keys().map(|e| (e.to_string(), e.clone())).collect();
        let parameter_keys: Vec<Expr> = parameters.keys().cloned().collect();

        let Simulation { classification, kernels, globals, .. } = self;
        let kernel = kernels.get_or_build(&input_keys, &output_entries, &parameter_keys, || {
            kirchhoff_kernel::build(classification, &input_keys, output_entries.clone())
        });

        let t = kernel.run(n, self.t, self.h, self.oversample, self.newton_iterations, inputs, outputs, parameters, globals);
        self.t = t;

        if self.divergence_guard && outputs.values().any(|buffer| tail_has_nonfinite(buffer)) {
            log::warn!("simulation diverged, resetting");
            self.reset();
            return Err(Error::Diverged);
        }

        Ok(t)
    }

    /// Convenience overload for the common single-input, single-output
    /// case (spec.md §4.5 "convenience overloads delegate to the general
    /// form").
    pub fn process_mono(&mut self, input: Expr, input_buffer: &[f64], output: Expr, output_buffer: &mut [f64]) -> Result<f64> {
        let n = input_buffer.len();
        let mut inputs = IndexMap::new();
        inputs.insert(input, input_buffer);
        let mut outputs = IndexMap::new();
        outputs.insert(output, output_buffer);
        self.process(n, &inputs, &mut outputs, &IndexMap::new())
    }
}

fn tail_has_nonfinite(buffer: &&mut [f64]) -> bool {
    let start = buffer.len().saturating_sub(DIVERGENCE_TAIL);
    buffer[start..].iter().any(|v| !v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kirchhoff_devices::{Capacitor, Resistor, Waveform, VoltageSource};

    fn wire_passthrough() -> Simulation {
        let mut circuit = Circuit::new();
        let input = circuit.node("in");
        let output = circuit.node("out");
        // The streamed-in signal needs its own symbol, distinct from the
        // "in" node's own v_in voltage, or the branch equation collapses
        // to the tautology v_in = v_in and never closes.
        circuit.add(VoltageSource::new("Vin", input.clone(), circuit.ground(), Waveform::External(Expr::var("signal_in"))));
        // With nothing else attached to "out", KCL forces this resistor's
        // current to zero regardless of its value, so v_out == v_in exactly.
        circuit.add(Resistor::new("Rwire", input, output, 1_000.0));
        Simulation::new(&circuit, 48_000.0, 1, 0).unwrap()
    }

    fn rc_lowpass() -> Simulation {
        let mut circuit = Circuit::new();
        let input = circuit.node("in");
        let output = circuit.node("out");
        circuit.add(VoltageSource::new("Vin", input.clone(), circuit.ground(), Waveform::External(Expr::var("signal_in"))));
        circuit.add(Resistor::new("R1", input, output.clone(), 1_000.0));
        circuit.add(Capacitor::new("C1", output, circuit.ground(), 1e-6));
        Simulation::new(&circuit, 48_000.0, 1, 0).unwrap()
    }

    #[test]
    fn reset_zeros_globals_and_time() {
        let mut sim = rc_lowpass();
        assert!(!sim.globals.is_empty(), "an RC low-pass should carry at least one global cell");
        sim.t = 5.0;
        for v in sim.globals.values_mut() {
            *v = 1.0;
        }
        sim.reset();
        assert_eq!(sim.t(), 0.0);
        assert!(sim.globals.values().all(|v| *v == 0.0));
    }

    #[test]
    fn process_rejects_a_mismatched_input_buffer_length() {
        let mut sim = wire_passthrough();
        let samples = [1.0, 2.0, 3.0];
        let mut out = [0.0; 2];
        let mut inputs = IndexMap::new();
        inputs.insert(Expr::var("signal_in"), &samples[..]);
        let mut outputs = IndexMap::new();
        let out_expr = Expr::var("v_out");
        outputs.insert(out_expr, &mut out[..]);

        let err = sim.process(3, &inputs, &mut outputs, &IndexMap::new()).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { .. }));
    }

    #[test]
    fn unknown_component_voltage_request_fails() {
        let sim = wire_passthrough();
        let err = sim.component_voltage("DoesNotExist").unwrap_err();
        assert!(matches!(err, Error::UnknownOutput(_)));
    }
}
