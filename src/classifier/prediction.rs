//! L2 — prediction substrates (spec §4.4 catalogue: `CONSTANT`,
//! `NLMS_LINEAR`, `NLMS_QUADRATIC`, `RLS_LINEAR`, `RLS_QUADRATIC`,
//! `NEURAL`).
//!
//! Every substrate predicts a single scalar; `compute` never mutates state
//! (pure read of the current weights), `update` is the substrate's own
//! online training step.

use std::io::{Read, Write};

use rand::Rng;

use crate::errors::XcsfResult;
use crate::io::*;
use crate::nn::layer::LayerOptions;
use crate::nn::layer_args::LayerArgs;
use crate::nn::net::Net;
use crate::params::{Params, PredictionType};

/// `[1, x_0..x_{n-1}]` (spec §B "Quadratic prediction feature expansion"
/// describes the quadratic case; the linear case is the same idea without
/// the quadratic terms).
fn linear_features(x: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(x.len() + 1);
    out.push(1.0);
    out.extend_from_slice(x);
    out
}

/// `[1, x_0..x_{n-1}, x_0*x_0, x_0*x_1, ..., x_{n-1}*x_{n-1}]` (spec §B):
/// bias, linear terms, then the upper triangle (including the diagonal) of
/// the outer product, length `1 + n + n(n+1)/2`.
fn quadratic_features(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mut out = Vec::with_capacity(1 + n + n * (n + 1) / 2);
    out.push(1.0);
    out.extend_from_slice(x);
    for i in 0..n {
        for j in i..n {
            out.push(x[i] * x[j]);
        }
    }
    out
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[derive(Debug, Clone)]
pub struct ConstantPrediction {
    value: f64,
}

impl ConstantPrediction {
    fn init(params: &Params) -> Self {
        Self { value: params.pred_x0 }
    }

    fn compute(&self, _input: &[f64]) -> f64 {
        self.value
    }

    fn update(&mut self, params: &Params, truth: f64) {
        self.value += params.beta * (truth - self.value);
    }

    fn save(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_f64(w, self.value)
    }

    fn load(r: &mut dyn Read) -> XcsfResult<Self> {
        Ok(Self { value: read_f64(r)? })
    }
}

/// Shared state for both normalized-LMS predictors; `quadratic` selects
/// which feature expansion `compute`/`update` apply.
#[derive(Debug, Clone)]
pub struct NlmsPrediction {
    quadratic: bool,
    weights: Vec<f64>,
}

impl NlmsPrediction {
    fn n_features(num_inputs: usize, quadratic: bool) -> usize {
        if quadratic {
            1 + num_inputs + num_inputs * (num_inputs + 1) / 2
        } else {
            1 + num_inputs
        }
    }

    fn init(num_inputs: usize, params: &Params, quadratic: bool) -> Self {
        let n = Self::n_features(num_inputs, quadratic);
        let mut weights = vec![0.0; n];
        weights[0] = params.pred_x0;
        Self { quadratic, weights }
    }

    fn features(&self, x: &[f64]) -> Vec<f64> {
        if self.quadratic {
            quadratic_features(x)
        } else {
            linear_features(x)
        }
    }

    fn compute(&self, x: &[f64]) -> f64 {
        dot(&self.weights, &self.features(x))
    }

    fn update(&mut self, params: &Params, x: &[f64], truth: f64) {
        let phi = self.features(x);
        let error = truth - dot(&self.weights, &phi);
        let norm: f64 = phi.iter().map(|v| v * v).sum::<f64>() + 1e-8;
        let eta = params.pred_eta;
        for (w, p) in self.weights.iter_mut().zip(phi.iter()) {
            *w += eta * error * p / norm;
        }
    }

    fn save(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_f64_vec(w, &self.weights)
    }

    fn load(quadratic: bool, r: &mut dyn Read) -> XcsfResult<Self> {
        Ok(Self { quadratic, weights: read_f64_vec(r)? })
    }
}

/// Shared state for both recursive-least-squares predictors (spec §B
/// "RLS gain-matrix reset").
#[derive(Debug, Clone)]
pub struct RlsPrediction {
    quadratic: bool,
    weights: Vec<f64>,
    /// Row-major `n x n` gain matrix.
    gain: Vec<f64>,
}

impl RlsPrediction {
    fn n_features(num_inputs: usize, quadratic: bool) -> usize {
        NlmsPrediction::n_features(num_inputs, quadratic)
    }

    fn init(num_inputs: usize, params: &Params, quadratic: bool) -> Self {
        let n = Self::n_features(num_inputs, quadratic);
        let mut weights = vec![0.0; n];
        weights[0] = params.pred_x0;
        let gain = Self::reset_gain(n, params);
        Self { quadratic, weights, gain }
    }

    fn reset_gain(n: usize, params: &Params) -> Vec<f64> {
        let mut gain = vec![0.0; n * n];
        for i in 0..n {
            gain[i * n + i] = params.pred_rls_scale_factor;
        }
        gain
    }

    fn features(&self, x: &[f64]) -> Vec<f64> {
        if self.quadratic {
            quadratic_features(x)
        } else {
            linear_features(x)
        }
    }

    fn compute(&self, x: &[f64]) -> f64 {
        dot(&self.weights, &self.features(x))
    }

    fn update(&mut self, params: &Params, x: &[f64], truth: f64) {
        let n = self.weights.len();
        let phi = self.features(x);
        let lambda = params.pred_rls_lambda;

        // k = P phi / (lambda + phi^T P phi)
        let mut p_phi = vec![0.0; n];
        for i in 0..n {
            let mut sum = 0.0;
            for j in 0..n {
                sum += self.gain[i * n + j] * phi[j];
            }
            p_phi[i] = sum;
        }
        let denom = lambda + dot(&phi, &p_phi);
        let k: Vec<f64> = p_phi.iter().map(|v| v / denom).collect();

        let error = truth - dot(&self.weights, &phi);
        for (w, ki) in self.weights.iter_mut().zip(k.iter()) {
            *w += ki * error;
        }

        // P = (P - k (phi^T P)) / lambda ; phi^T P = p_phi^T (P symmetric)
        let mut new_gain = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                new_gain[i * n + j] = (self.gain[i * n + j] - k[i] * p_phi[j]) / lambda;
            }
        }
        self.gain = new_gain;
    }

    fn save(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_f64_vec(w, &self.weights)?;
        write_f64_vec(w, &self.gain)
    }

    fn load(quadratic: bool, r: &mut dyn Read) -> XcsfResult<Self> {
        let weights = read_f64_vec(r)?;
        let gain = read_f64_vec(r)?;
        Ok(Self { quadratic, weights, gain })
    }
}

#[derive(Debug, Clone)]
pub struct NeuralPrediction {
    net: Net,
}

impl NeuralPrediction {
    fn build_args(num_inputs: usize, params: &Params) -> LayerArgs {
        let mut options = LayerOptions::empty();
        if params.pred_sgd_weights {
            options |= LayerOptions::SGD_WEIGHTS;
        }
        if params.pred_evolve_weights {
            options |= LayerOptions::EVOLVE_WEIGHTS;
        }
        if params.pred_evolve_functions {
            options |= LayerOptions::EVOLVE_FUNCTIONS;
        }
        if params.pred_evolve_neurons {
            options |= LayerOptions::EVOLVE_NEURONS;
        }
        if params.pred_evolve_eta {
            options |= LayerOptions::EVOLVE_ETA;
        }
        let mut hidden = LayerArgs::dense(num_inputs, params.pred_num_hidden_neurons, params.pred_hidden_neuron_activation);
        hidden.options = options;
        hidden.n_init = params.pred_num_hidden_neurons;
        hidden.n_max = params.pred_max_hidden_neurons;
        hidden.max_neuron_grow = if params.pred_evolve_neurons { 1 } else { 0 };
        hidden.eta = params.pred_eta;
        hidden.momentum = params.pred_momentum;
        let mut output = LayerArgs::dense(params.pred_num_hidden_neurons, 1, crate::activations::Activation::Linear);
        output.options = options;
        output.eta = params.pred_eta;
        output.momentum = params.pred_momentum;
        hidden.next = Some(Box::new(output));
        hidden
    }

    fn init(num_inputs: usize, params: &Params, rng: &mut impl Rng) -> XcsfResult<Self> {
        let net = Self::build_args(num_inputs, params).into_net(params, rng)?;
        Ok(Self { net })
    }

    fn compute(&mut self, input: &[f64]) -> XcsfResult<f64> {
        self.net.propagate(input)?;
        Ok(self.net.output()[0])
    }

    fn update(&mut self, input: &[f64], truth: f64) -> XcsfResult<()> {
        self.net.propagate(input)?;
        self.net.learn(&[truth], input)
    }

    fn save(&self, w: &mut dyn Write) -> XcsfResult<()> {
        self.net.save(w)
    }

    fn load(r: &mut dyn Read) -> XcsfResult<Self> {
        Ok(Self { net: Net::load(r)? })
    }
}

/// A prediction substrate selected by `PRED_TYPE` (spec §4.4).
#[derive(Debug, Clone)]
pub enum Prediction {
    Constant(ConstantPrediction),
    Nlms(NlmsPrediction),
    Rls(RlsPrediction),
    Neural(NeuralPrediction),
}

impl Prediction {
    pub fn init(num_inputs: usize, params: &Params, rng: &mut impl Rng) -> XcsfResult<Self> {
        Ok(match params.pred_type {
            PredictionType::Constant => Prediction::Constant(ConstantPrediction::init(params)),
            PredictionType::NlmsLinear => Prediction::Nlms(NlmsPrediction::init(num_inputs, params, false)),
            PredictionType::NlmsQuadratic => Prediction::Nlms(NlmsPrediction::init(num_inputs, params, true)),
            PredictionType::RlsLinear => Prediction::Rls(RlsPrediction::init(num_inputs, params, false)),
            PredictionType::RlsQuadratic => Prediction::Rls(RlsPrediction::init(num_inputs, params, true)),
            PredictionType::Neural => Prediction::Neural(NeuralPrediction::init(num_inputs, params, rng)?),
        })
    }

    /// `cover` (spec §4.4): predictions have no geometric notion of
    /// matching an input. For every substrate except RLS this simply
    /// re-initializes fresh state the same way `init` does. RLS is the one
    /// substrate spec §B gives an explicit re-covering rule for: honor
    /// `PRED_RESET` by reinitializing *only* the gain matrix to
    /// `scale_factor * I` when set, leaving the learned weights (and, when
    /// unset, the gain matrix too) carried over from before.
    pub fn cover(&mut self, num_inputs: usize, params: &Params, rng: &mut impl Rng) -> XcsfResult<()> {
        match self {
            Prediction::Rls(p) if params.pred_reset => {
                p.gain = RlsPrediction::reset_gain(p.weights.len(), params);
                Ok(())
            }
            Prediction::Rls(_) => Ok(()),
            _ => {
                *self = Self::init(num_inputs, params, rng)?;
                Ok(())
            }
        }
    }

    pub fn compute(&mut self, input: &[f64]) -> XcsfResult<f64> {
        Ok(match self {
            Prediction::Constant(p) => p.compute(input),
            Prediction::Nlms(p) => p.compute(input),
            Prediction::Rls(p) => p.compute(input),
            Prediction::Neural(p) => p.compute(input)?,
        })
    }

    pub fn update(&mut self, params: &Params, input: &[f64], truth: f64) -> XcsfResult<()> {
        match self {
            Prediction::Constant(p) => p.update(params, truth),
            Prediction::Nlms(p) => p.update(params, input, truth),
            Prediction::Rls(p) => p.update(params, input, truth),
            Prediction::Neural(p) => p.update(input, truth)?,
        }
        Ok(())
    }

    /// `mutate` (spec §4.4 vtable): only the neural predictor carries
    /// evolvable structure; the linear predictors train exclusively by
    /// gradient/recursive updates in `update`.
    pub fn mutate(&mut self, params: &Params, rng: &mut impl Rng) -> bool {
        match self {
            Prediction::Neural(p) => p.net.mutate(params, rng),
            _ => false,
        }
    }

    pub fn print(&self) -> String {
        match self {
            Prediction::Constant(p) => format!("constant({:.4})", p.value),
            Prediction::Nlms(p) => format!("nlms(quadratic={}, n={})", p.quadratic, p.weights.len()),
            Prediction::Rls(p) => format!("rls(quadratic={}, n={})", p.quadratic, p.weights.len()),
            Prediction::Neural(_) => "neural_prediction".to_string(),
        }
    }

    pub fn save(&self, w: &mut dyn Write) -> XcsfResult<()> {
        match self {
            Prediction::Constant(p) => p.save(w),
            Prediction::Nlms(p) => p.save(w),
            Prediction::Rls(p) => p.save(w),
            Prediction::Neural(p) => p.save(w),
        }
    }

    pub fn load(pred_type: PredictionType, r: &mut dyn Read) -> XcsfResult<Self> {
        Ok(match pred_type {
            PredictionType::Constant => Prediction::Constant(ConstantPrediction::load(r)?),
            PredictionType::NlmsLinear => Prediction::Nlms(NlmsPrediction::load(false, r)?),
            PredictionType::NlmsQuadratic => Prediction::Nlms(NlmsPrediction::load(true, r)?),
            PredictionType::RlsLinear => Prediction::Rls(RlsPrediction::load(false, r)?),
            PredictionType::RlsQuadratic => Prediction::Rls(RlsPrediction::load(true, r)?),
            PredictionType::Neural => Prediction::Neural(NeuralPrediction::load(r)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::tests_support::sample;
    use rand::SeedableRng;

    #[test]
    fn constant_prediction_moves_toward_truth() {
        let params = sample();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut pred = Prediction::init(2, &params, &mut rng).unwrap();
        let before = pred.compute(&[0.0, 0.0]).unwrap();
        pred.update(&params, &[0.0, 0.0], 10.0).unwrap();
        let after = pred.compute(&[0.0, 0.0]).unwrap();
        assert!((after - 10.0).abs() < (before - 10.0).abs());
    }

    #[test]
    fn nlms_linear_reduces_squared_error_over_repeated_updates() {
        let mut params = sample();
        params.pred_type = PredictionType::NlmsLinear;
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let mut pred = Prediction::init(2, &params, &mut rng).unwrap();
        let x = [0.5, -0.3];
        let truth = 2.0;
        let err_before = (pred.compute(&x).unwrap() - truth).abs();
        for _ in 0..50 {
            pred.update(&params, &x, truth).unwrap();
        }
        let err_after = (pred.compute(&x).unwrap() - truth).abs();
        assert!(err_after < err_before);
    }

    #[test]
    fn rls_linear_fits_a_single_point_in_one_step() {
        let mut params = sample();
        params.pred_type = PredictionType::RlsLinear;
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let mut pred = Prediction::init(1, &params, &mut rng).unwrap();
        let x = [0.4];
        pred.update(&params, &x, 3.0).unwrap();
        let out = pred.compute(&x).unwrap();
        assert!((out - 3.0).abs() < 1e-6);
    }

    #[test]
    fn quadratic_feature_vector_has_expected_length_and_terms() {
        let f = quadratic_features(&[2.0, 3.0]);
        // [1, 2, 3, 4, 6, 9]
        assert_eq!(f, vec![1.0, 2.0, 3.0, 4.0, 6.0, 9.0]);
    }

    #[test]
    fn pred_reset_reinitializes_only_the_rls_gain_matrix_on_cover() {
        let mut params = sample();
        params.pred_type = PredictionType::RlsLinear;
        params.pred_reset = true;
        let mut rng = rand::rngs::StdRng::seed_from_u64(4);
        let mut pred = Prediction::init(1, &params, &mut rng).unwrap();
        pred.update(&params, &[0.4], 3.0).unwrap();
        let Prediction::Rls(before) = &pred else { unreachable!() };
        let weights_before_cover = before.weights.clone();
        let gain_before_cover = before.gain.clone();

        pred.cover(1, &params, &mut rng).unwrap();

        let Prediction::Rls(after) = &pred else { unreachable!() };
        assert_eq!(after.gain, RlsPrediction::reset_gain(after.weights.len(), &params));
        assert_ne!(gain_before_cover, after.gain);
        assert_eq!(after.weights, weights_before_cover);
    }

    #[test]
    fn cover_without_pred_reset_leaves_rls_state_untouched() {
        let mut params = sample();
        params.pred_type = PredictionType::RlsLinear;
        params.pred_reset = false;
        let mut rng = rand::rngs::StdRng::seed_from_u64(9);
        let mut pred = Prediction::init(1, &params, &mut rng).unwrap();
        pred.update(&params, &[0.4], 3.0).unwrap();
        let Prediction::Rls(before) = &pred else { unreachable!() };
        let gain_before = before.gain.clone();
        let weights_before = before.weights.clone();

        pred.cover(1, &params, &mut rng).unwrap();

        let Prediction::Rls(after) = &pred else { unreachable!() };
        assert_eq!(after.gain, gain_before);
        assert_eq!(after.weights, weights_before);
    }
}
