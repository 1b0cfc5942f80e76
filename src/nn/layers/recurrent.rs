//! A single-step Elman recurrent layer: `h_t = f(W_xh x_t + W_hh h_{t-1} +
//! b)`, with `h_0 = 0` and the hidden state carried across successive
//! `forward` calls for the lifetime of the layer.
//!
//! Gradients are truncated to one step (the recurrent weight matrix's
//! contribution from steps before `t-1` is not backpropagated) — full
//! backprop-through-time needs a time-indexed caller the rest of this
//! crate's representation-layer contract does not provide (classifiers
//! are evaluated one input vector at a time, spec §4.4). Noted as a
//! deliberate scope simplification in `DESIGN.md`.

use std::io::{Read, Write};

use rand::{Rng, RngCore};
use rand_distr::{Distribution, StandardNormal};

use crate::activations::Activation;
use crate::errors::XcsfResult;
use crate::io::{read_f64_vec, write_f64_vec};
use crate::nn::layer::{Layer, LayerCore, LayerKind, LayerOptions, SAM_ETA, SAM_FUNCTIONS, SAM_WEIGHTS};
use crate::nn::layer_args::LayerArgs;
use crate::params::Params;

#[derive(Debug)]
pub struct RecurrentLayer {
    core: LayerCore,
    w_xh: Vec<f64>,
    w_hh: Vec<f64>,
    bias: Vec<f64>,
    hidden: Vec<f64>,
    hidden_prev: Vec<f64>,
    preact: Vec<f64>,
    w_xh_grad: Vec<f64>,
    w_hh_grad: Vec<f64>,
    bias_grad: Vec<f64>,
    w_xh_vel: Vec<f64>,
    w_hh_vel: Vec<f64>,
    bias_vel: Vec<f64>,
}

impl RecurrentLayer {
    pub fn new(args: &LayerArgs, params: &Params, rng: &mut impl Rng) -> Self {
        let n_in = args.n_inputs;
        let n_out = args.n_outputs;
        let core = LayerCore::new(
            n_in,
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
            w_xh: vec![0.0; n_out * n_in],
            w_hh: vec![0.0; n_out * n_out],
            bias: vec![0.0; n_out],
            hidden: vec![0.0; n_out],
            hidden_prev: vec![0.0; n_out],
            preact: vec![0.0; n_out],
            w_xh_grad: vec![0.0; n_out * n_in],
            w_hh_grad: vec![0.0; n_out * n_out],
            bias_grad: vec![0.0; n_out],
            w_xh_vel: vec![0.0; n_out * n_in],
            w_hh_vel: vec![0.0; n_out * n_out],
            bias_vel: vec![0.0; n_out],
        };
        layer.rand(rng);
        layer
    }
}

impl Layer for RecurrentLayer {
    fn core(&self) -> &LayerCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }
    fn kind(&self) -> LayerKind {
        LayerKind::Recurrent
    }

    fn rand(&mut self, rng: &mut dyn RngCore) {
        let n_in = self.core.n_inputs;
        let n_out = self.core.n_outputs;
        for w in self.w_xh.iter_mut() {
            let z: f64 = StandardNormal.sample(rng);
            *w = z * (1.0 / (n_in as f64).max(1.0)).sqrt();
        }
        for w in self.w_hh.iter_mut() {
            let z: f64 = StandardNormal.sample(rng);
            *w = z * (1.0 / (n_out as f64).max(1.0)).sqrt();
        }
        self.bias.iter_mut().for_each(|b| *b = 0.0);
        self.hidden.iter_mut().for_each(|h| *h = 0.0);
    }

    fn forward(&mut self, input: &[f64]) {
        let n_in = self.core.n_inputs;
        let n_out = self.core.n_outputs;
        self.hidden_prev = self.hidden.clone();
        for j in 0..n_out {
            let mut sum = self.bias[j];
            for i in 0..n_in {
                sum += self.w_xh[j * n_in + i] * input[i];
            }
            for k in 0..n_out {
                sum += self.w_hh[j * n_out + k] * self.hidden_prev[k];
            }
            self.preact[j] = sum;
            self.core.output[j] = self.core.activation.apply(sum);
        }
        self.hidden = self.core.output.clone();
    }

    fn backward(&mut self, prev_input: &[f64], prev_delta: Option<&mut [f64]>) {
        let n_in = self.core.n_inputs;
        let n_out = self.core.n_outputs;
        let mut local = vec![0.0; n_out];
        for j in 0..n_out {
            local[j] = self.core.delta[j] * self.core.activation.derivative(self.preact[j], self.core.output[j]);
            self.bias_grad[j] += local[j];
            for i in 0..n_in {
                self.w_xh_grad[j * n_in + i] += local[j] * prev_input[i];
            }
            for k in 0..n_out {
                self.w_hh_grad[j * n_out + k] += local[j] * self.hidden_prev[k];
            }
        }
        if let Some(prev_delta) = prev_delta {
            for i in 0..n_in {
                let mut acc = 0.0;
                for j in 0..n_out {
                    acc += local[j] * self.w_xh[j * n_in + i];
                }
                prev_delta[i] += acc;
            }
        }
    }

    fn update(&mut self) {
        if self.core.options.contains(LayerOptions::SGD_WEIGHTS) {
            let eta = self.core.eta;
            let momentum = self.core.momentum;
            let decay = self.core.decay;
            for idx in 0..self.w_xh.len() {
                let grad = self.w_xh_grad[idx] - decay * self.w_xh[idx];
                self.w_xh_vel[idx] = momentum * self.w_xh_vel[idx] + eta * grad;
                self.w_xh[idx] += self.w_xh_vel[idx];
            }
            for idx in 0..self.w_hh.len() {
                let grad = self.w_hh_grad[idx] - decay * self.w_hh[idx];
                self.w_hh_vel[idx] = momentum * self.w_hh_vel[idx] + eta * grad;
                self.w_hh[idx] += self.w_hh_vel[idx];
            }
            for j in 0..self.bias.len() {
                self.bias_vel[j] = momentum * self.bias_vel[j] + eta * self.bias_grad[j];
                self.bias[j] += self.bias_vel[j];
            }
        }
        self.w_xh_grad.iter_mut().for_each(|g| *g = 0.0);
        self.w_hh_grad.iter_mut().for_each(|g| *g = 0.0);
        self.bias_grad.iter_mut().for_each(|g| *g = 0.0);
    }

    fn mutate(&mut self, params: &Params, rng: &mut dyn RngCore) -> bool {
        self.core.sam.adapt(rng);
        let mut changed = false;

        if self.core.options.contains(LayerOptions::EVOLVE_WEIGHTS) {
            let rate = self.core.sam.get(SAM_WEIGHTS);
            for w in self.w_xh.iter_mut().chain(self.w_hh.iter_mut()) {
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

    /// Only `w_xh`'s columns depend on the upstream layer's width; the
    /// recurrent weight matrix `w_hh` is `n_outputs x n_outputs` and is
    /// untouched by an upstream resize.
    fn resize(&mut self, prev_n_outputs: usize) {
        let old_n_in = self.core.n_inputs;
        if prev_n_outputs == old_n_in {
            return;
        }
        let n_out = self.core.n_outputs;
        let copy_cols = old_n_in.min(prev_n_outputs);
        let mut new_w = vec![0.0; n_out * prev_n_outputs];
        for j in 0..n_out {
            for i in 0..copy_cols {
                new_w[j * prev_n_outputs + i] = self.w_xh[j * old_n_in + i];
            }
        }
        self.w_xh = new_w;
        self.w_xh_grad = vec![0.0; n_out * prev_n_outputs];
        self.w_xh_vel = vec![0.0; n_out * prev_n_outputs];
        self.core.n_inputs = prev_n_outputs;
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(RecurrentLayer {
            core: self.core.clone(),
            w_xh: self.w_xh.clone(),
            w_hh: self.w_hh.clone(),
            bias: self.bias.clone(),
            hidden: self.hidden.clone(),
            hidden_prev: self.hidden_prev.clone(),
            preact: self.preact.clone(),
            w_xh_grad: self.w_xh_grad.clone(),
            w_hh_grad: self.w_hh_grad.clone(),
            bias_grad: self.bias_grad.clone(),
            w_xh_vel: self.w_xh_vel.clone(),
            w_hh_vel: self.w_hh_vel.clone(),
            bias_vel: self.bias_vel.clone(),
        })
    }

    fn print(&self) -> String {
        format!("recurrent({} -> {})", self.core.n_inputs, self.core.n_outputs)
    }

    fn save_payload(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_f64_vec(w, &self.w_xh)?;
        write_f64_vec(w, &self.w_hh)?;
        write_f64_vec(w, &self.bias)?;
        write_f64_vec(w, &self.hidden)
    }

    fn load_payload(&mut self, r: &mut dyn Read) -> XcsfResult<()> {
        self.w_xh = read_f64_vec(r)?;
        self.w_hh = read_f64_vec(r)?;
        self.bias = read_f64_vec(r)?;
        self.hidden = read_f64_vec(r)?;
        let n_in = self.core.n_inputs;
        let n_out = self.core.n_outputs;
        self.hidden_prev = vec![0.0; n_out];
        self.preact = vec![0.0; n_out];
        self.w_xh_grad = vec![0.0; n_out * n_in];
        self.w_hh_grad = vec![0.0; n_out * n_out];
        self.bias_grad = vec![0.0; n_out];
        self.w_xh_vel = vec![0.0; n_out * n_in];
        self.w_hh_vel = vec![0.0; n_out * n_out];
        self.bias_vel = vec![0.0; n_out];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::tests_support::sample;
    use rand::SeedableRng;

    #[test]
    fn hidden_state_carries_across_successive_forward_calls() {
        let params = sample();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let args = LayerArgs::dense(2, 3, Activation::Tanh);
        let mut layer = RecurrentLayer::new(&args, &params, &mut rng);
        layer.forward(&[0.1, 0.2]);
        let first = layer.output().to_vec();
        layer.forward(&[0.1, 0.2]);
        let second = layer.output().to_vec();
        // same input, but hidden state differs between steps => outputs differ
        assert_ne!(first, second);
    }
}
