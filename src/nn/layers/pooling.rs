//! Average- and max-pooling over non-overlapping windows of the flat
//! input vector (spec §4.1 "Layer kinds": avgpool, maxpool).

use std::io::{Read, Write};

use rand::{Rng, RngCore};

use crate::errors::XcsfResult;
use crate::io::{read_i32, write_i32};
use crate::nn::layer::{Layer, LayerCore, LayerKind};
use crate::nn::layer_args::LayerArgs;
use crate::params::Params;

fn out_len(n_inputs: usize, pool_size: usize) -> usize {
    (n_inputs + pool_size - 1) / pool_size
}

#[derive(Debug)]
pub struct AvgPoolLayer {
    core: LayerCore,
    pool_size: usize,
}

impl AvgPoolLayer {
    pub fn new(args: &LayerArgs, params: &Params, rng: &mut impl Rng) -> Self {
        let pool_size = args.pool_size.max(1);
        let n_out = out_len(args.n_inputs, pool_size);
        let core = LayerCore::new(
            args.n_inputs,
            n_out,
            args.options,
            crate::activations::Activation::Linear,
            args.eta,
            args.momentum,
            args.decay,
            params,
            rng,
        );
        Self { core, pool_size }
    }
}

impl Layer for AvgPoolLayer {
    fn core(&self) -> &LayerCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }
    fn kind(&self) -> LayerKind {
        LayerKind::AvgPool
    }
    fn rand(&mut self, _rng: &mut dyn RngCore) {}

    fn forward(&mut self, input: &[f64]) {
        for (o, chunk) in self.core.output.iter_mut().zip(input.chunks(self.pool_size)) {
            *o = chunk.iter().sum::<f64>() / chunk.len() as f64;
        }
    }

    fn backward(&mut self, prev_input: &[f64], prev_delta: Option<&mut [f64]>) {
        if let Some(prev_delta) = prev_delta {
            for (o, chunk_start) in (0..self.core.n_outputs).zip((0..prev_input.len()).step_by(self.pool_size)) {
                let chunk_len = (prev_input.len() - chunk_start).min(self.pool_size);
                let share = self.core.delta[o] / chunk_len as f64;
                for i in chunk_start..chunk_start + chunk_len {
                    prev_delta[i] += share;
                }
            }
        }
    }

    fn update(&mut self) {}
    fn mutate(&mut self, _params: &Params, _rng: &mut dyn RngCore) -> bool {
        false
    }

    fn resize(&mut self, prev_n_outputs: usize) {
        self.core.n_inputs = prev_n_outputs;
        self.core.resize_outputs(out_len(prev_n_outputs, self.pool_size));
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(AvgPoolLayer { core: self.core.clone(), pool_size: self.pool_size })
    }
    fn print(&self) -> String {
        format!("avgpool({})", self.pool_size)
    }
    fn save_payload(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_i32(w, self.pool_size as i32)
    }
    fn load_payload(&mut self, r: &mut dyn Read) -> XcsfResult<()> {
        self.pool_size = read_i32(r)? as usize;
        Ok(())
    }
}

#[derive(Debug)]
pub struct MaxPoolLayer {
    core: LayerCore,
    pool_size: usize,
    argmax: Vec<usize>,
}

impl MaxPoolLayer {
    pub fn new(args: &LayerArgs, params: &Params, rng: &mut impl Rng) -> Self {
        let pool_size = args.pool_size.max(1);
        let n_out = out_len(args.n_inputs, pool_size);
        let core = LayerCore::new(
            args.n_inputs,
            n_out,
            args.options,
            crate::activations::Activation::Linear,
            args.eta,
            args.momentum,
            args.decay,
            params,
            rng,
        );
        Self { core, pool_size, argmax: vec![0; n_out] }
    }
}

impl Layer for MaxPoolLayer {
    fn core(&self) -> &LayerCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }
    fn kind(&self) -> LayerKind {
        LayerKind::MaxPool
    }
    fn rand(&mut self, _rng: &mut dyn RngCore) {}

    fn forward(&mut self, input: &[f64]) {
        for (o, chunk_start) in (0..self.core.n_outputs).zip((0..input.len()).step_by(self.pool_size)) {
            let chunk_len = (input.len() - chunk_start).min(self.pool_size);
            let (best_idx, &best_val) = input[chunk_start..chunk_start + chunk_len]
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .unwrap();
            self.argmax[o] = chunk_start + best_idx;
            self.core.output[o] = best_val;
        }
    }

    fn backward(&mut self, _prev_input: &[f64], prev_delta: Option<&mut [f64]>) {
        if let Some(prev_delta) = prev_delta {
            for o in 0..self.core.n_outputs {
                prev_delta[self.argmax[o]] += self.core.delta[o];
            }
        }
    }

    fn update(&mut self) {}
    fn mutate(&mut self, _params: &Params, _rng: &mut dyn RngCore) -> bool {
        false
    }

    fn resize(&mut self, prev_n_outputs: usize) {
        self.core.n_inputs = prev_n_outputs;
        let n_out = out_len(prev_n_outputs, self.pool_size);
        self.core.resize_outputs(n_out);
        self.argmax = vec![0; n_out];
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(MaxPoolLayer { core: self.core.clone(), pool_size: self.pool_size, argmax: self.argmax.clone() })
    }
    fn print(&self) -> String {
        format!("maxpool({})", self.pool_size)
    }
    fn save_payload(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_i32(w, self.pool_size as i32)
    }
    fn load_payload(&mut self, r: &mut dyn Read) -> XcsfResult<()> {
        self.pool_size = read_i32(r)? as usize;
        self.argmax = vec![0; self.core.n_outputs];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::tests_support::sample;
    use rand::SeedableRng;

    #[test]
    fn avgpool_averages_each_window() {
        let params = sample();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut args = LayerArgs::dense(4, 4, crate::activations::Activation::Linear);
        args.pool_size = 2;
        let mut layer = AvgPoolLayer::new(&args, &params, &mut rng);
        layer.forward(&[1.0, 3.0, 2.0, 8.0]);
        assert_eq!(layer.output(), &[2.0, 5.0]);
    }

    #[test]
    fn maxpool_routes_gradient_to_the_argmax_only() {
        let params = sample();
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let mut args = LayerArgs::dense(4, 4, crate::activations::Activation::Linear);
        args.pool_size = 2;
        let mut layer = MaxPoolLayer::new(&args, &params, &mut rng);
        layer.forward(&[1.0, 3.0, 8.0, 2.0]);
        assert_eq!(layer.output(), &[3.0, 8.0]);
        layer.core.delta = vec![1.0, 1.0];
        let mut prev_delta = vec![0.0; 4];
        layer.backward(&[1.0, 3.0, 8.0, 2.0], Some(&mut prev_delta));
        assert_eq!(prev_delta, vec![0.0, 1.0, 1.0, 0.0]);
    }
}
