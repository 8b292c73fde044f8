//! Kernel cache (spec.md §4.3: "kernel lifetime = process lifetime").
//!
//! Kernels are specialized per (inputs, outputs, parameters) signature and
//! reused for the life of the process. The teacher's own cache
//! (`spicier_solver::transient::solver`'s `Option<CachedSparseLu>`) is a
//! single slot, since one solver call only ever drives one system; a
//! `Simulation` can be called with many distinct signatures over its
//! lifetime, so this generalizes that idiom to a keyed map.

use std::collections::HashMap;

use kirchhoff_core::Expr;

use crate::kernel::Kernel;

fn signature(inputs: &[Expr], outputs: &[(String, Expr)], parameters: &[Expr]) -> String {
    let mut inputs: Vec<String> = inputs.iter().map(|e| e.to_string()).collect();
    inputs.sort();
    let mut outputs: Vec<String> = outputs.iter().map(|(name, e)| format!("{name}={e}")).collect();
    outputs.sort();
    let mut parameters: Vec<String> = parameters.iter().map(|e| e.to_string()).collect();
    parameters.sort();
    format!("in[{}]|out[{}]|par[{}]", inputs.join(","), outputs.join(","), parameters.join(","))
}

/// Caches built kernels by (inputs, outputs, parameters) signature. One
/// `KernelCache` lives for the lifetime of its owning `Simulation`.
#[derive(Default)]
pub struct KernelCache {
    kernels: HashMap<String, Kernel>,
}

impl KernelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the kernel for this signature, building and caching one via
    /// `build` on first use.
    pub fn get_or_build(
        &mut self,
        key_inputs: &[Expr],
        key_outputs: &[(String, Expr)],
        key_parameters: &[Expr],
        build: impl FnOnce() -> Kernel,
    ) -> &Kernel {
        let key = signature(key_inputs, key_outputs, key_parameters);
        self.kernels.entry(key).or_insert_with(|| {
            log::debug!("kirchhoff-kernel: cache miss, building new kernel for signature");
            build()
        })
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prune::Pruned;

    fn empty_kernel() -> Kernel {
        Kernel::new(
            Pruned {
                hoisted: Vec::new(),
                input_trivial: Vec::new(),
                differential: Vec::new(),
                derivative_exprs: Vec::new(),
                linear: Vec::new(),
                f0: Vec::new(),
                nonlinear: Vec::new(),
                newton_unknowns: Vec::new(),
                inputs: Vec::new(),
            },
            Vec::new(),
        )
    }

    #[test]
    fn reuses_the_kernel_for_a_repeated_signature() {
        let mut cache = KernelCache::new();
        let inputs = [Expr::var("v_in")];
        let outputs = [("out".to_string(), Expr::var("v_out"))];
        let mut build_calls = 0;

        {
            let _ = cache.get_or_build(&inputs, &outputs, &[], || {
                build_calls += 1;
                empty_kernel()
            });
        }
        {
            let _ = cache.get_or_build(&inputs, &outputs, &[], || {
                build_calls += 1;
                empty_kernel()
            });
        }

        assert_eq!(build_calls, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_output_selections_build_distinct_kernels() {
        let mut cache = KernelCache::new();
        let inputs: [Expr; 0] = [];
        let a = [("a".to_string(), Expr::var("v_a"))];
        let b = [("b".to_string(), Expr::var("v_b"))];

        let _ = cache.get_or_build(&inputs, &a, &[], empty_kernel);
        let _ = cache.get_or_build(&inputs, &b, &[], empty_kernel);

        assert_eq!(cache.len(), 2);
    }
}
