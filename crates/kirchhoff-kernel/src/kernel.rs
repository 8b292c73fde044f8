//! The compiled per-sample kernel (spec.md §4.3): a tree-walking
//! interpreter over the pruned, flattened binding list, specialized for
//! one (inputs, outputs, parameters) signature (Design Note option b —
//! true native codegen/JIT is out of scope without a toolchain to drive
//! it).

use indexmap::IndexMap;
use kirchhoff_core::{nsolve, Equation, Expr};

use crate::prune::Pruned;

/// One differential unknown, carrying both its discretized update and the
/// raw `f(t, y)` it discretizes (needed to refresh `f.previous()` each
/// step; see [`kirchhoff_solver::Simulation::derivative_exprs`]).
struct Differential {
    y: Expr,
    rhs: Expr,
    y_previous: Expr,
    f: Expr,
    f_previous: Expr,
}

/// A built kernel, specialized to one signature. Owns nothing but its own
/// expression trees; global state lives in the caller's `globals` map
/// (spec.md §9, "mutable globals inside a pure kernel").
pub struct Kernel {
    hoisted: Vec<(Expr, Expr)>,
    input_trivial: Vec<(Expr, Expr)>,
    differential: Vec<Differential>,
    linear: Vec<(Expr, Expr)>,
    /// `f0` bindings that resolved to a closed form not circular through
    /// any Newton unknown: non-linear, but evaluated straight-line like a
    /// `linear` binding, once per oversample step.
    f0_closed: Vec<(Expr, Expr)>,
    /// `f0` bindings still reachable from the residual system after
    /// substitution; refreshed once Newton has converged this step.
    f0_newton: Vec<(Expr, Expr)>,
    nonlinear: Vec<Equation>,
    newton_unknowns: Vec<Expr>,
    pub(crate) inputs: Vec<Expr>,
    pub(crate) outputs: Vec<(String, Expr)>,
}

impl Kernel {
    pub(crate) fn new(pruned: Pruned, outputs: Vec<(String, Expr)>) -> Self {
        let differential = pruned
            .differential
            .into_iter()
            .map(|a| {
                let f = pruned
                    .derivative_exprs
                    .iter()
                    .find(|pair| pair.0 == a.left)
                    .map(|pair| pair.1.clone())
                    .unwrap_or_else(Expr::zero);
                Differential {
                    y_previous: a.left.previous(),
                    f_previous: f.previous(),
                    y: a.left,
                    rhs: a.right,
                    f,
                }
            })
            .collect();
        let (f0_newton, f0_closed): (Vec<_>, Vec<_>) =
            pruned.f0.into_iter().partition(|a| pruned.newton_unknowns.contains(&a.left));
        Kernel {
            hoisted: pruned.hoisted.into_iter().map(|a| (a.left, a.right)).collect(),
            input_trivial: pruned.input_trivial.into_iter().map(|a| (a.left, a.right)).collect(),
            differential,
            linear: pruned.linear.into_iter().map(|a| (a.left, a.right)).collect(),
            f0_closed: f0_closed.into_iter().map(|a| (a.left, a.right)).collect(),
            f0_newton: f0_newton.into_iter().map(|a| (a.left, a.right)).collect(),
            nonlinear: pruned.nonlinear,
            newton_unknowns: pruned.newton_unknowns,
            inputs: pruned.inputs,
            outputs,
        }
    }

    pub fn inputs(&self) -> &[Expr] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[(String, Expr)] {
        &self.outputs
    }

    /// Runs the emission plan of spec.md §4.3 over `n` host samples,
    /// returning the new simulation time (the kernel's declared return
    /// value).
    ///
    /// `inputs`/`outputs` are keyed by the same `Expr` this kernel was
    /// built against; `globals` is the `Simulation`'s fixed-layout record
    /// of previous-step cells, read and written in place.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        n: usize,
        t0: f64,
        h: f64,
        oversample: u32,
        newton_iterations: u32,
        inputs: &IndexMap<Expr, &[f64]>,
        outputs: &mut IndexMap<Expr, &mut [f64]>,
        parameters: &IndexMap<Expr, f64>,
        globals: &mut IndexMap<Expr, f64>,
    ) -> f64 {
        let inv_oversample = 1.0 / f64::from(oversample);
        let mut t = t0;

        let mut env: IndexMap<Expr, f64> = IndexMap::new();
        env.extend(parameters.iter().map(|(k, v)| (k.clone(), *v)));
        env.insert(Expr::var("h"), h);

        for (lhs, rhs) in &self.hoisted {
            let value = rhs.eval(&env);
            env.insert(lhs.clone(), value);
        }

        for step in 0..n {
            let mut input_delta: IndexMap<Expr, f64> = IndexMap::new();
            for input in &self.inputs {
                let va = *globals.entry(input.clone()).or_insert(0.0);
                let vb = inputs.get(input).map(|buf| buf[step]).unwrap_or(0.0);
                input_delta.insert(input.clone(), (vb - va) * inv_oversample);
                env.insert(input.clone(), va);
            }

            let mut accumulators: IndexMap<Expr, f64> =
                outputs.keys().map(|o| (o.clone(), 0.0)).collect();

            for _ov in 0..oversample {
                t += h;
                env.insert(Expr::Time, t);
                for input in &self.inputs {
                    let v = env[input] + input_delta[input];
                    env.insert(input.clone(), v);
                }

                for (lhs, rhs) in &self.input_trivial {
                    let value = rhs.eval(&env);
                    env.insert(lhs.clone(), value);
                }

                // Evaluate every differential RHS before committing any
                // global: old-state semantics must survive the whole step
                // (spec.md §5 ordering guarantee).
                let new_values: Vec<f64> = self
                    .differential
                    .iter()
                    .map(|d| {
                        let mut local = env.clone();
                        local.insert(d.y_previous.clone(), globals.get(&d.y_previous).copied().unwrap_or(0.0));
                        local.insert(d.f_previous.clone(), globals.get(&d.f_previous).copied().unwrap_or(0.0));
                        d.rhs.eval(&local)
                    })
                    .collect();
                for (d, new_value) in self.differential.iter().zip(new_values) {
                    env.insert(d.y.clone(), new_value);
                    globals.insert(d.y_previous.clone(), new_value);
                    let new_f = d.f.eval(&env);
                    globals.insert(d.f_previous.clone(), new_f);
                }

                for (lhs, rhs) in &self.linear {
                    let value = rhs.eval(&env);
                    env.insert(lhs.clone(), value);
                }

                // Non-linear `f0` bindings that never close back on a
                // Newton unknown are just straight-line evaluations, like
                // `linear`, but kept in their own bucket to document why
                // (spec.md §3 invariant 4 only requires circular ones to
                // live inside Newton).
                for (lhs, rhs) in &self.f0_closed {
                    let value = rhs.eval(&env);
                    env.insert(lhs.clone(), value);
                }

                if !self.newton_unknowns.is_empty() {
                    let mut guess: IndexMap<Expr, f64> = self
                        .newton_unknowns
                        .iter()
                        .map(|u| (u.clone(), globals.get(u).copied().unwrap_or(0.0)))
                        .collect();
                    let mut it = newton_iterations;
                    while it > 0 {
                        nsolve(&self.nonlinear, &self.newton_unknowns, &mut guess, &env, 1);
                        for u in &self.newton_unknowns {
                            globals.insert(u.clone(), guess[u]);
                            env.insert(u.clone(), guess[u]);
                        }
                        it -= 1;
                    }
                    for (lhs, rhs) in &self.f0_newton {
                        let value = rhs.eval(&env);
                        globals.insert(lhs.clone(), value);
                        env.insert(lhs.clone(), value);
                    }
                    // Any `linear` binding that closes in terms of a
                    // Newton unknown (e.g. a node voltage set by a diode's
                    // converged current) was evaluated above against last
                    // step's f0; refresh it now that f0 has converged so
                    // `components`/outputs see a self-consistent step.
                    for (lhs, rhs) in &self.linear {
                        let value = rhs.eval(&env);
                        env.insert(lhs.clone(), value);
                    }
                }

                for (_, expr) in &self.outputs {
                    let value = expr.eval(&env);
                    if let Some(acc) = accumulators.get_mut(expr) {
                        *acc += value;
                    }
                }

                for input in &self.inputs {
                    globals.insert(input.clone(), env[input]);
                }
            }

            for (expr, acc) in &accumulators {
                if let Some(buffer) = outputs.get_mut(expr) {
                    buffer[step] = acc * inv_oversample;
                }
            }
        }

        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prune::Pruned;

    fn pruned(
        hoisted: Vec<(Expr, Expr)>,
        input_trivial: Vec<(Expr, Expr)>,
        differential: Vec<(Expr, Expr)>,
        derivative_exprs: Vec<(Expr, Expr)>,
        linear: Vec<(Expr, Expr)>,
        inputs: Vec<Expr>,
    ) -> Pruned {
        let arrow = |(l, r): (Expr, Expr)| kirchhoff_core::Arrow::new(l, r);
        Pruned {
            hoisted: hoisted.into_iter().map(arrow).collect(),
            input_trivial: input_trivial.into_iter().map(arrow).collect(),
            differential: differential.into_iter().map(arrow).collect(),
            derivative_exprs,
            linear: linear.into_iter().map(arrow).collect(),
            f0: Vec::new(),
            nonlinear: Vec::new(),
            newton_unknowns: Vec::new(),
            inputs,
        }
    }

    #[test]
    fn wire_passthrough_tracks_the_input_exactly() {
        let v_in = Expr::var("v_in");
        let v_out = Expr::var("v_out");
        let p = pruned(
            Vec::new(),
            vec![(v_out.clone(), v_in.clone())],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            vec![v_in.clone()],
        );
        let kernel = Kernel::new(p, vec![("out".into(), v_out.clone())]);

        let samples = [1.0, 2.0, 3.0];
        let mut out = [0.0; 3];
        let mut inputs = IndexMap::new();
        inputs.insert(v_in.clone(), &samples[..]);
        let mut outputs = IndexMap::new();
        outputs.insert(v_out, &mut out[..]);

        let t = kernel.run(
            3,
            0.0,
            0.1,
            1,
            1,
            &inputs,
            &mut outputs,
            &IndexMap::new(),
            &mut IndexMap::new(),
        );

        assert_eq!(out, [1.0, 2.0, 3.0]);
        assert!((t - 0.3).abs() < 1e-12);
    }

    #[test]
    fn constant_derivative_integrates_linearly() {
        // dv/dt = 1 discretizes (trapezoidally, with a constant derivative)
        // to `v = prev[v] + h`; running it forward should walk `v` up by
        // `h` every sample with a zero initial condition.
        let v = Expr::var("v");
        let h = Expr::var("h");
        let p = pruned(
            Vec::new(),
            Vec::new(),
            vec![(v.clone(), v.previous() + h)],
            vec![(v.clone(), Expr::constant(1.0))],
            Vec::new(),
            Vec::new(),
        );
        let kernel = Kernel::new(p, vec![("v".into(), v.clone())]);

        let mut out = [0.0; 3];
        let mut outputs = IndexMap::new();
        outputs.insert(v, &mut out[..]);

        kernel.run(
            3,
            0.0,
            0.1,
            1,
            1,
            &IndexMap::new(),
            &mut outputs,
            &IndexMap::new(),
            &mut IndexMap::new(),
        );

        assert!((out[0] - 0.1).abs() < 1e-12);
        assert!((out[1] - 0.2).abs() < 1e-12);
        assert!((out[2] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn oversampling_averages_the_output_within_a_host_sample() {
        // Two oversample ticks per host sample, input held at a constant
        // value throughout: the averaged output should equal that constant
        // regardless of the oversample factor.
        let v_in = Expr::var("v_in");
        let v_out = Expr::var("v_out");
        let p = pruned(
            Vec::new(),
            vec![(v_out.clone(), v_in.clone())],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            vec![v_in.clone()],
        );
        let kernel = Kernel::new(p, vec![("out".into(), v_out.clone())]);

        let samples = [5.0];
        let mut out = [0.0; 1];
        let mut inputs = IndexMap::new();
        inputs.insert(v_in.clone(), &samples[..]);
        let mut outputs = IndexMap::new();
        outputs.insert(v_out, &mut out[..]);
        let mut globals = IndexMap::new();
        globals.insert(v_in, 5.0);

        kernel.run(1, 0.0, 0.05, 2, 1, &inputs, &mut outputs, &IndexMap::new(), &mut globals);

        assert!((out[0] - 5.0).abs() < 1e-12);
    }
}
