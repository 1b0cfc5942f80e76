//! A single-step LSTM cell: input, forget, candidate and output gates
//! stacked into one `4*n_outputs x n_inputs` / `4*n_outputs x n_outputs`
//! weight pair, cell and hidden state carried across `forward` calls.
//!
//! Like [`crate::nn::layers::RecurrentLayer`], backward is truncated to
//! one step — the cell-state gradient from later time steps is not
//! threaded back in, since the rest of this crate evaluates a net on one
//! input vector at a time rather than an explicit sequence.

use std::io::{Read, Write};

use rand::{Rng, RngCore};
use rand_distr::{Distribution, StandardNormal};

use crate::activations::Activation;
use crate::errors::XcsfResult;
use crate::io::{read_f64_vec, write_f64_vec};
use crate::nn::layer::{Layer, LayerCore, LayerKind, LayerOptions, SAM_ETA, SAM_WEIGHTS};
use crate::nn::layer_args::LayerArgs;
use crate::params::Params;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug)]
pub struct LstmLayer {
    core: LayerCore,
    /// Row-major `4*n_outputs x n_inputs`, gate order [i, f, g, o].
    w_x: Vec<f64>,
    /// Row-major `4*n_outputs x n_outputs`.
    w_h: Vec<f64>,
    bias: Vec<f64>,
    cell: Vec<f64>,
    hidden: Vec<f64>,
    cell_prev: Vec<f64>,
    hidden_prev: Vec<f64>,
    gate_i: Vec<f64>,
    gate_f: Vec<f64>,
    gate_g: Vec<f64>,
    gate_o: Vec<f64>,
    tanh_c: Vec<f64>,
    w_x_grad: Vec<f64>,
    w_h_grad: Vec<f64>,
    bias_grad: Vec<f64>,
    w_x_vel: Vec<f64>,
    w_h_vel: Vec<f64>,
    bias_vel: Vec<f64>,
}

impl LstmLayer {
    pub fn new(args: &LayerArgs, params: &Params, rng: &mut impl Rng) -> Self {
        let n_in = args.n_inputs;
        let n_out = args.n_outputs;
        let core = LayerCore::new(
            n_in,
            n_out,
            args.options,
            Activation::Tanh,
            args.eta,
            args.momentum,
            args.decay,
            params,
            rng,
        );
        let mut layer = Self {
            core,
            w_x: vec![0.0; 4 * n_out * n_in],
            w_h: vec![0.0; 4 * n_out * n_out],
            bias: vec![0.0; 4 * n_out],
            cell: vec![0.0; n_out],
            hidden: vec![0.0; n_out],
            cell_prev: vec![0.0; n_out],
            hidden_prev: vec![0.0; n_out],
            gate_i: vec![0.0; n_out],
            gate_f: vec![0.0; n_out],
            gate_g: vec![0.0; n_out],
            gate_o: vec![0.0; n_out],
            tanh_c: vec![0.0; n_out],
            w_x_grad: vec![0.0; 4 * n_out * n_in],
            w_h_grad: vec![0.0; 4 * n_out * n_out],
            bias_grad: vec![0.0; 4 * n_out],
            w_x_vel: vec![0.0; 4 * n_out * n_in],
            w_h_vel: vec![0.0; 4 * n_out * n_out],
            bias_vel: vec![0.0; 4 * n_out],
        };
        layer.rand(rng);
        layer
    }
}

impl Layer for LstmLayer {
    fn core(&self) -> &LayerCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }
    fn kind(&self) -> LayerKind {
        LayerKind::Lstm
    }

    fn rand(&mut self, rng: &mut dyn RngCore) {
        let n_in = self.core.n_inputs;
        let n_out = self.core.n_outputs;
        for w in self.w_x.iter_mut() {
            let z: f64 = StandardNormal.sample(rng);
            *w = z * (1.0 / (n_in as f64).max(1.0)).sqrt();
        }
        for w in self.w_h.iter_mut() {
            let z: f64 = StandardNormal.sample(rng);
            *w = z * (1.0 / (n_out as f64).max(1.0)).sqrt();
        }
        self.bias.iter_mut().for_each(|b| *b = 0.0);
        self.cell.iter_mut().for_each(|c| *c = 0.0);
        self.hidden.iter_mut().for_each(|h| *h = 0.0);
    }

    fn forward(&mut self, input: &[f64]) {
        let n_in = self.core.n_inputs;
        let n_out = self.core.n_outputs;
        self.cell_prev = self.cell.clone();
        self.hidden_prev = self.hidden.clone();

        let mut z = vec![0.0; 4 * n_out];
        for row in 0..4 * n_out {
            let mut sum = self.bias[row];
            for i in 0..n_in {
                sum += self.w_x[row * n_in + i] * input[i];
            }
            for k in 0..n_out {
                sum += self.w_h[row * n_out + k] * self.hidden_prev[k];
            }
            z[row] = sum;
        }

        for j in 0..n_out {
            self.gate_i[j] = sigmoid(z[j]);
            self.gate_f[j] = sigmoid(z[n_out + j]);
            self.gate_g[j] = z[2 * n_out + j].tanh();
            self.gate_o[j] = sigmoid(z[3 * n_out + j]);
            self.cell[j] = self.gate_f[j] * self.cell_prev[j] + self.gate_i[j] * self.gate_g[j];
            self.tanh_c[j] = self.cell[j].tanh();
            self.hidden[j] = self.gate_o[j] * self.tanh_c[j];
        }
        self.core.output.copy_from_slice(&self.hidden);
    }

    fn backward(&mut self, prev_input: &[f64], prev_delta: Option<&mut [f64]>) {
        let n_in = self.core.n_inputs;
        let n_out = self.core.n_outputs;
        let mut d_gate = vec![0.0; 4 * n_out];
        for j in 0..n_out {
            let d_h = self.core.delta[j];
            let d_o = d_h * self.tanh_c[j] * self.gate_o[j] * (1.0 - self.gate_o[j]);
            let d_c = d_h * self.gate_o[j] * (1.0 - self.tanh_c[j] * self.tanh_c[j]);
            let d_i = d_c * self.gate_g[j] * self.gate_i[j] * (1.0 - self.gate_i[j]);
            let d_f = d_c * self.cell_prev[j] * self.gate_f[j] * (1.0 - self.gate_f[j]);
            let d_g = d_c * self.gate_i[j] * (1.0 - self.gate_g[j] * self.gate_g[j]);
            d_gate[j] = d_i;
            d_gate[n_out + j] = d_f;
            d_gate[2 * n_out + j] = d_g;
            d_gate[3 * n_out + j] = d_o;
        }

        for row in 0..4 * n_out {
            self.bias_grad[row] += d_gate[row];
            for i in 0..n_in {
                self.w_x_grad[row * n_in + i] += d_gate[row] * prev_input[i];
            }
            for k in 0..n_out {
                self.w_h_grad[row * n_out + k] += d_gate[row] * self.hidden_prev[k];
            }
        }

        if let Some(prev_delta) = prev_delta {
            for i in 0..n_in {
                let mut acc = 0.0;
                for row in 0..4 * n_out {
                    acc += d_gate[row] * self.w_x[row * n_in + i];
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
            for idx in 0..self.w_x.len() {
                let grad = self.w_x_grad[idx] - decay * self.w_x[idx];
                self.w_x_vel[idx] = momentum * self.w_x_vel[idx] + eta * grad;
                self.w_x[idx] += self.w_x_vel[idx];
            }
            for idx in 0..self.w_h.len() {
                let grad = self.w_h_grad[idx] - decay * self.w_h[idx];
                self.w_h_vel[idx] = momentum * self.w_h_vel[idx] + eta * grad;
                self.w_h[idx] += self.w_h_vel[idx];
            }
            for row in 0..self.bias.len() {
                self.bias_vel[row] = momentum * self.bias_vel[row] + eta * self.bias_grad[row];
                self.bias[row] += self.bias_vel[row];
            }
        }
        self.w_x_grad.iter_mut().for_each(|g| *g = 0.0);
        self.w_h_grad.iter_mut().for_each(|g| *g = 0.0);
        self.bias_grad.iter_mut().for_each(|g| *g = 0.0);
    }

    fn mutate(&mut self, params: &Params, rng: &mut dyn RngCore) -> bool {
        self.core.sam.adapt(rng);
        let mut changed = false;

        if self.core.options.contains(LayerOptions::EVOLVE_WEIGHTS) {
            let rate = self.core.sam.get(SAM_WEIGHTS);
            for w in self.w_x.iter_mut().chain(self.w_h.iter_mut()) {
                if rng.gen::<f64>() < rate {
                    let z: f64 = StandardNormal.sample(rng);
                    *w += z * params.p_mutation;
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
        let old_n_in = self.core.n_inputs;
        if prev_n_outputs == old_n_in {
            return;
        }
        let n_out = self.core.n_outputs;
        let copy_cols = old_n_in.min(prev_n_outputs);
        let mut new_w_x = vec![0.0; 4 * n_out * prev_n_outputs];
        for row in 0..4 * n_out {
            for i in 0..copy_cols {
                new_w_x[row * prev_n_outputs + i] = self.w_x[row * old_n_in + i];
            }
        }
        self.w_x = new_w_x;
        self.w_x_grad = vec![0.0; 4 * n_out * prev_n_outputs];
        self.w_x_vel = vec![0.0; 4 * n_out * prev_n_outputs];
        self.core.n_inputs = prev_n_outputs;
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(LstmLayer {
            core: self.core.clone(),
            w_x: self.w_x.clone(),
            w_h: self.w_h.clone(),
            bias: self.bias.clone(),
            cell: self.cell.clone(),
            hidden: self.hidden.clone(),
            cell_prev: self.cell_prev.clone(),
            hidden_prev: self.hidden_prev.clone(),
            gate_i: self.gate_i.clone(),
            gate_f: self.gate_f.clone(),
            gate_g: self.gate_g.clone(),
            gate_o: self.gate_o.clone(),
            tanh_c: self.tanh_c.clone(),
            w_x_grad: self.w_x_grad.clone(),
            w_h_grad: self.w_h_grad.clone(),
            bias_grad: self.bias_grad.clone(),
            w_x_vel: self.w_x_vel.clone(),
            w_h_vel: self.w_h_vel.clone(),
            bias_vel: self.bias_vel.clone(),
        })
    }

    fn print(&self) -> String {
        format!("lstm({} -> {})", self.core.n_inputs, self.core.n_outputs)
    }

    fn save_payload(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_f64_vec(w, &self.w_x)?;
        write_f64_vec(w, &self.w_h)?;
        write_f64_vec(w, &self.bias)?;
        write_f64_vec(w, &self.cell)?;
        write_f64_vec(w, &self.hidden)
    }

    fn load_payload(&mut self, r: &mut dyn Read) -> XcsfResult<()> {
        self.w_x = read_f64_vec(r)?;
        self.w_h = read_f64_vec(r)?;
        self.bias = read_f64_vec(r)?;
        self.cell = read_f64_vec(r)?;
        self.hidden = read_f64_vec(r)?;
        let n_in = self.core.n_inputs;
        let n_out = self.core.n_outputs;
        self.cell_prev = vec![0.0; n_out];
        self.hidden_prev = vec![0.0; n_out];
        self.gate_i = vec![0.0; n_out];
        self.gate_f = vec![0.0; n_out];
        self.gate_g = vec![0.0; n_out];
        self.gate_o = vec![0.0; n_out];
        self.tanh_c = vec![0.0; n_out];
        self.w_x_grad = vec![0.0; 4 * n_out * n_in];
        self.w_h_grad = vec![0.0; 4 * n_out * n_out];
        self.bias_grad = vec![0.0; 4 * n_out];
        self.w_x_vel = vec![0.0; 4 * n_out * n_in];
        self.w_h_vel = vec![0.0; 4 * n_out * n_out];
        self.bias_vel = vec![0.0; 4 * n_out];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::tests_support::sample;
    use rand::SeedableRng;

    #[test]
    fn cell_state_persists_and_bounds_the_output() {
        let params = sample();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let args = LayerArgs::dense(3, 4, Activation::Tanh);
        let mut layer = LstmLayer::new(&args, &params, &mut rng);
        layer.forward(&[0.2, -0.1, 0.3]);
        for &o in layer.output() {
            assert!(o.abs() <= 1.0);
        }
        let c1 = layer.cell.clone();
        layer.forward(&[0.2, -0.1, 0.3]);
        assert_ne!(c1, layer.cell);
    }
}
