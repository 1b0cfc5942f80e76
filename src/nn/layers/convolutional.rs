//! 1-D convolution over the flat input vector: `channels` output feature
//! maps, each a size-`kernel_size` weight-shared filter slid with the
//! given `stride`. Because the filter weights don't depend on the input
//! length, `resize` only has to recompute the output length — the weights
//! themselves are untouched (spec §4.1 `resize`: "preserving as much
//! learned state as possible" is trivially all of it here).

use std::io::{Read, Write};

use rand::{Rng, RngCore};
use rand_distr::{Distribution, StandardNormal};

use crate::activations::Activation;
use crate::errors::XcsfResult;
use crate::io::{read_f64_vec, read_i32, write_f64_vec, write_i32};
use crate::nn::layer::{Layer, LayerCore, LayerKind, LayerOptions, SAM_ETA, SAM_FUNCTIONS, SAM_WEIGHTS};
use crate::nn::layer_args::LayerArgs;
use crate::params::Params;

fn out_positions(n_inputs: usize, kernel_size: usize, stride: usize) -> usize {
    if n_inputs < kernel_size {
        0
    } else {
        (n_inputs - kernel_size) / stride + 1
    }
}

#[derive(Debug)]
pub struct ConvolutionalLayer {
    core: LayerCore,
    channels: usize,
    kernel_size: usize,
    stride: usize,
    out_len: usize,
    /// Row-major `channels x kernel_size`.
    weights: Vec<f64>,
    bias: Vec<f64>,
    preact: Vec<f64>,
    weight_grad: Vec<f64>,
    bias_grad: Vec<f64>,
    weight_vel: Vec<f64>,
    bias_vel: Vec<f64>,
}

impl ConvolutionalLayer {
    pub fn new(args: &LayerArgs, params: &Params, rng: &mut impl Rng) -> Self {
        let channels = args.channels.max(1);
        let kernel_size = args.kernel_size.max(1);
        let stride = args.stride.max(1);
        let out_len = out_positions(args.n_inputs, kernel_size, stride).max(1);
        let n_out = channels * out_len;
        let core = LayerCore::new(
            args.n_inputs,
            n_out,
            args.options,
            args.activation,
            args.eta,
            args.momentum,
            args.decay,
            params,
            rng,
        );
        let mut layer = Self {
            core,
            channels,
            kernel_size,
            stride,
            out_len,
            weights: vec![0.0; channels * kernel_size],
            bias: vec![0.0; channels],
            preact: vec![0.0; n_out],
            weight_grad: vec![0.0; channels * kernel_size],
            bias_grad: vec![0.0; channels],
            weight_vel: vec![0.0; channels * kernel_size],
            bias_vel: vec![0.0; channels],
        };
        layer.rand(rng);
        layer
    }

    fn recompute_out_len(&mut self) {
        self.out_len = out_positions(self.core.n_inputs, self.kernel_size, self.stride).max(1);
        let n_out = self.channels * self.out_len;
        self.preact.resize(n_out, 0.0);
        self.core.resize_outputs(n_out);
    }
}

impl Layer for ConvolutionalLayer {
    fn core(&self) -> &LayerCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }
    fn kind(&self) -> LayerKind {
        LayerKind::Convolutional
    }

    fn rand(&mut self, rng: &mut dyn RngCore) {
        for w in self.weights.iter_mut() {
            let z: f64 = StandardNormal.sample(rng);
            *w = z * (1.0 / (self.kernel_size as f64).max(1.0)).sqrt();
        }
        self.bias.iter_mut().for_each(|b| *b = 0.0);
    }

    fn forward(&mut self, input: &[f64]) {
        for c in 0..self.channels {
            for p in 0..self.out_len {
                let start = p * self.stride;
                let mut sum = self.bias[c];
                for k in 0..self.kernel_size {
                    if start + k < input.len() {
                        sum += self.weights[c * self.kernel_size + k] * input[start + k];
                    }
                }
                let idx = c * self.out_len + p;
                self.preact[idx] = sum;
                self.core.output[idx] = self.core.activation.apply(sum);
            }
        }
    }

    fn backward(&mut self, prev_input: &[f64], prev_delta: Option<&mut [f64]>) {
        let mut local = vec![0.0; self.core.n_outputs];
        for idx in 0..local.len() {
            local[idx] = self.core.delta[idx] * self.core.activation.derivative(self.preact[idx], self.core.output[idx]);
        }
        for c in 0..self.channels {
            for p in 0..self.out_len {
                let l = local[c * self.out_len + p];
                self.bias_grad[c] += l;
                let start = p * self.stride;
                for k in 0..self.kernel_size {
                    if start + k < prev_input.len() {
                        self.weight_grad[c * self.kernel_size + k] += l * prev_input[start + k];
                    }
                }
            }
        }
        if let Some(prev_delta) = prev_delta {
            for c in 0..self.channels {
                for p in 0..self.out_len {
                    let l = local[c * self.out_len + p];
                    let start = p * self.stride;
                    for k in 0..self.kernel_size {
                        if start + k < prev_delta.len() {
                            prev_delta[start + k] += l * self.weights[c * self.kernel_size + k];
                        }
                    }
                }
            }
        }
    }

    fn update(&mut self) {
        if self.core.options.contains(LayerOptions::SGD_WEIGHTS) {
            let eta = self.core.eta;
            let momentum = self.core.momentum;
            let decay = self.core.decay;
            for idx in 0..self.weights.len() {
                let grad = self.weight_grad[idx] - decay * self.weights[idx];
                self.weight_vel[idx] = momentum * self.weight_vel[idx] + eta * grad;
                self.weights[idx] += self.weight_vel[idx];
            }
            for c in 0..self.bias.len() {
                self.bias_vel[c] = momentum * self.bias_vel[c] + eta * self.bias_grad[c];
                self.bias[c] += self.bias_vel[c];
            }
        }
        self.weight_grad.iter_mut().for_each(|g| *g = 0.0);
        self.bias_grad.iter_mut().for_each(|g| *g = 0.0);
    }

    fn mutate(&mut self, params: &Params, rng: &mut dyn RngCore) -> bool {
        self.core.sam.adapt(rng);
        let mut changed = false;

        if self.core.options.contains(LayerOptions::EVOLVE_WEIGHTS) {
            let rate = self.core.sam.get(SAM_WEIGHTS);
            for w in self.weights.iter_mut() {
                if rng.gen::<f64>() < rate {
                    let z: f64 = StandardNormal.sample(rng);
                    *w += z * params.p_mutation;
                    changed = true;
                }
            }
        }

        if self.core.options.contains(LayerOptions::EVOLVE_FUNCTIONS) {
            let rate = self.core.sam.get(SAM_FUNCTIONS);
            if rng.gen::<f64>() < rate.max(params.f_mutation) {
                let new_act = Activation::random(rng);
                if new_act != self.core.activation {
                    self.core.activation = new_act;
                    changed = true;
                }
            }
        }

        if self.core.options.contains(LayerOptions::EVOLVE_ETA) {
            let rate = self.core.sam.get(SAM_ETA);
            if rng.gen::<f64>() < rate.max(params.e_mutation) {
                let z: f64 = StandardNormal.sample(rng);
                self.core.eta = (self.core.eta * z.exp()).max(1e-8);
                changed = true;
            }
        }

        changed
    }

    fn resize(&mut self, prev_n_outputs: usize) {
        self.core.n_inputs = prev_n_outputs;
        self.recompute_out_len();
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(ConvolutionalLayer {
            core: self.core.clone(),
            channels: self.channels,
            kernel_size: self.kernel_size,
            stride: self.stride,
            out_len: self.out_len,
            weights: self.weights.clone(),
            bias: self.bias.clone(),
            preact: self.preact.clone(),
            weight_grad: self.weight_grad.clone(),
            bias_grad: self.bias_grad.clone(),
            weight_vel: self.weight_vel.clone(),
            bias_vel: self.bias_vel.clone(),
        })
    }

    fn print(&self) -> String {
        format!("convolutional(channels={}, kernel={}, stride={})", self.channels, self.kernel_size, self.stride)
    }

    fn save_payload(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_i32(w, self.channels as i32)?;
        write_i32(w, self.kernel_size as i32)?;
        write_i32(w, self.stride as i32)?;
        write_f64_vec(w, &self.weights)?;
        write_f64_vec(w, &self.bias)
    }

    fn load_payload(&mut self, r: &mut dyn Read) -> XcsfResult<()> {
        self.channels = read_i32(r)? as usize;
        self.kernel_size = read_i32(r)? as usize;
        self.stride = read_i32(r)? as usize;
        self.weights = read_f64_vec(r)?;
        self.bias = read_f64_vec(r)?;
        self.recompute_out_len();
        self.weight_grad = vec![0.0; self.weights.len()];
        self.bias_grad = vec![0.0; self.bias.len()];
        self.weight_vel = vec![0.0; self.weights.len()];
        self.bias_vel = vec![0.0; self.bias.len()];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::tests_support::sample;
    use rand::SeedableRng;

    #[test]
    fn forward_slides_the_shared_kernel_across_the_input() {
        let params = sample();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut args = LayerArgs::dense(5, 1, Activation::Linear);
        args.kind = LayerKind::Convolutional;
        args.channels = 1;
        args.kernel_size = 2;
        args.stride = 1;
        let mut layer = ConvolutionalLayer::new(&args, &params, &mut rng);
        layer.weights = vec![1.0, 1.0];
        layer.bias = vec![0.0];
        layer.forward(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(layer.output(), &[3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn resize_recomputes_output_length_without_touching_weights() {
        let params = sample();
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let mut args = LayerArgs::dense(5, 1, Activation::Linear);
        args.kind = LayerKind::Convolutional;
        args.channels = 2;
        args.kernel_size = 2;
        args.stride = 1;
        let mut layer = ConvolutionalLayer::new(&args, &params, &mut rng);
        let before_weights = layer.weights.clone();
        layer.resize(9);
        assert_eq!(layer.weights, before_weights);
        assert_eq!(layer.n_outputs(), 2 * 8);
    }
}
