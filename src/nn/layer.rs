//! L1 — the uniform layer contract (spec §4.1 "Layer contract").
//!
//! Every concrete layer kind (connected, convolutional, recurrent, LSTM,
//! softmax, dropout, noise, average/max pooling, upsample) implements
//! [`Layer`] and embeds a [`LayerCore`] for the fields every kind shares:
//! shape, output/delta buffers, the option bitset, and the per-layer
//! self-adaptive mutation rates.

use std::io::{Read, Write};

use bitflags::bitflags;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::activations::Activation;
use crate::errors::XcsfResult;
use crate::params::{Params, SamType};
use crate::sam::Sam;

/// The discrete set of neural layer kinds the core recognizes (spec §4.1).
/// Used both as the vtable/tag discriminant and as the `kind:i32` field
/// written ahead of each layer's payload in the persistence format (spec
/// §6 "Net format").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum LayerKind {
    Connected = 0,
    Convolutional = 1,
    Recurrent = 2,
    Lstm = 3,
    Softmax = 4,
    Dropout = 5,
    Noise = 6,
    AvgPool = 7,
    MaxPool = 8,
    Upsample = 9,
}

impl LayerKind {
    pub fn from_tag(tag: i32) -> Option<Self> {
        use LayerKind::*;
        Some(match tag {
            0 => Connected,
            1 => Convolutional,
            2 => Recurrent,
            3 => Lstm,
            4 => Softmax,
            5 => Dropout,
            6 => Noise,
            7 => AvgPool,
            8 => MaxPool,
            9 => Upsample,
            _ => return None,
        })
    }
}

bitflags! {
    /// Per-layer option bitset (spec §4.1 "Layer option bitset"), derived
    /// from `LayerArgs` at construction and immutable afterwards. Each bit
    /// gates one mutation/training effect.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct LayerOptions: u8 {
        const EVOLVE_WEIGHTS   = 0b0000_0001;
        const EVOLVE_NEURONS   = 0b0000_0010;
        const EVOLVE_FUNCTIONS = 0b0000_0100;
        const EVOLVE_ETA       = 0b0000_1000;
        const EVOLVE_CONNECT   = 0b0001_0000;
        const SGD_WEIGHTS      = 0b0010_0000;
    }
}

/// Index convention for a layer's self-adaptive mutation-rate vector: one
/// rate per mutable effect named in spec §4.1 `mutate`.
pub const SAM_WEIGHTS: usize = 0;
pub const SAM_FUNCTIONS: usize = 1;
pub const SAM_ETA: usize = 2;
pub const SAM_NEURONS: usize = 3;
pub const NUM_SAM_RATES: usize = 4;

/// Fields shared by every layer kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerCore {
    pub n_inputs: usize,
    pub n_outputs: usize,
    pub output: Vec<f64>,
    pub delta: Vec<f64>,
    pub options: LayerOptions,
    pub activation: Activation,
    pub eta: f64,
    pub momentum: f64,
    pub decay: f64,
    pub sam: Sam,
}

impl LayerCore {
    pub fn new(
        n_inputs: usize,
        n_outputs: usize,
        options: LayerOptions,
        activation: Activation,
        eta: f64,
        momentum: f64,
        decay: f64,
        params: &Params,
        rng: &mut impl rand::Rng,
    ) -> Self {
        Self {
            n_inputs,
            n_outputs,
            output: vec![0.0; n_outputs],
            delta: vec![0.0; n_outputs],
            options,
            activation,
            eta,
            momentum,
            decay,
            sam: Sam::new(NUM_SAM_RATES, params.sam_min, params.sam_type, rng),
        }
    }

    pub fn zero_delta(&mut self) {
        self.delta.iter_mut().for_each(|d| *d = 0.0);
    }

    pub fn resize_outputs(&mut self, n_outputs: usize) {
        self.n_outputs = n_outputs;
        self.output.resize(n_outputs, 0.0);
        self.delta.resize(n_outputs, 0.0);
    }

    pub fn save<W: Write>(&self, w: &mut W) -> XcsfResult<()> {
        use crate::io::*;
        write_i32(w, self.n_inputs as i32)?;
        write_i32(w, self.n_outputs as i32)?;
        write_i32(w, self.options.bits() as i32)?;
        write_i32(w, activation_tag(self.activation))?;
        write_f64(w, self.eta)?;
        write_f64(w, self.momentum)?;
        write_f64(w, self.decay)?;
        self.sam.save(w)
    }

    pub fn load<R: Read>(r: &mut R) -> XcsfResult<Self> {
        use crate::io::*;
        let n_inputs = read_i32(r)? as usize;
        let n_outputs = read_i32(r)? as usize;
        let options = LayerOptions::from_bits_truncate(read_i32(r)? as u8);
        let activation = activation_from_tag(read_i32(r)?);
        let eta = read_f64(r)?;
        let momentum = read_f64(r)?;
        let decay = read_f64(r)?;
        let mut sam = Sam::new(NUM_SAM_RATES, 0.0001, SamType::LogNormal, &mut rand::thread_rng());
        sam.load(r)?;
        Ok(Self {
            n_inputs,
            n_outputs,
            output: vec![0.0; n_outputs],
            delta: vec![0.0; n_outputs],
            options,
            activation,
            eta,
            momentum,
            decay,
            sam,
        })
    }
}

pub fn activation_tag(a: Activation) -> i32 {
    match a {
        Activation::Logistic => 0,
        Activation::Relu => 1,
        Activation::Tanh => 2,
        Activation::Linear => 3,
        Activation::Gaussian => 4,
        Activation::Sin => 5,
        Activation::SoftPlus => 6,
        Activation::Selu => 7,
        Activation::Leaky => 8,
        Activation::Loggy => 9,
    }
}

pub fn activation_from_tag(tag: i32) -> Activation {
    match tag {
        0 => Activation::Logistic,
        1 => Activation::Relu,
        2 => Activation::Tanh,
        3 => Activation::Linear,
        4 => Activation::Gaussian,
        5 => Activation::Sin,
        6 => Activation::SoftPlus,
        7 => Activation::Selu,
        8 => Activation::Leaky,
        _ => Activation::Loggy,
    }
}

/// The uniform operation set every layer kind must implement (spec §4.1).
///
/// `forward`/`backward` never allocate: they read/write the buffers owned
/// by `core()`. `resize` adjusts `n_inputs` to a new upstream layer size,
/// preserving as much learned state as possible.
pub trait Layer: std::fmt::Debug + Send + Sync {
    fn core(&self) -> &LayerCore;
    fn core_mut(&mut self) -> &mut LayerCore;
    fn kind(&self) -> LayerKind;

    /// Re-randomizes all trainable state (used by `cover` and initial
    /// construction).
    fn rand(&mut self, rng: &mut dyn RngCore);

    /// Reads `input` (length `n_inputs`), fills `self.core().output`.
    fn forward(&mut self, input: &[f64]);

    /// Reads `self.core().delta` (already populated by the downstream
    /// layer), accumulates weight-gradients internally, and — if
    /// `prev_delta` is `Some` — accumulates input-gradients into it.
    fn backward(&mut self, prev_input: &[f64], prev_delta: Option<&mut [f64]>);

    /// Applies accumulated gradients using `eta`/`momentum`/`decay`, then
    /// zeros the gradient accumulators. No-op for layers without weights.
    fn update(&mut self);

    /// Attempts a random mutation gated by the option bitset and the
    /// layer's own (freshly self-adapted) rates. Returns whether anything
    /// changed.
    fn mutate(&mut self, params: &Params, rng: &mut dyn RngCore) -> bool;

    /// Adjusts `n_inputs` to match `prev_n_outputs`, zero-filling any new
    /// input positions' weights and keeping the rest.
    fn resize(&mut self, prev_n_outputs: usize);

    fn clone_box(&self) -> Box<dyn Layer>;

    fn print(&self) -> String;

    /// Kind-specific payload only — the shared `LayerCore` fields and the
    /// `kind` tag are written by [`crate::nn::net::Net::save`].
    fn save_payload(&self, w: &mut dyn Write) -> XcsfResult<()>;
    fn load_payload(&mut self, r: &mut dyn Read) -> XcsfResult<()>;

    fn n_inputs(&self) -> usize {
        self.core().n_inputs
    }
    fn n_outputs(&self) -> usize {
        self.core().n_outputs
    }
    fn output(&self) -> &[f64] {
        &self.core().output
    }
    fn delta(&self) -> &[f64] {
        &self.core().delta
    }
    fn delta_mut(&mut self) -> &mut [f64] {
        &mut self.core_mut().delta
    }
    fn zero_delta(&mut self) {
        self.core_mut().zero_delta();
    }
}
