//! L1 — `LayerArgs`: the config-time net template (spec §3 "LayerArgs
//! node").
//!
//! The upstream design chains these head-to-tail as a singly-linked list
//! built by the config stage. Per design note "Linked lists → owned
//! arrays", this crate keeps the field `next: Option<Box<LayerArgs>>` only
//! so a caller can still build the chain the way the original config
//! parser does (one node pushed per net-topology line), but the consuming
//! side ([`LayerArgs::into_net`]) walks it into a flat, index-addressed
//! [`crate::nn::net::Net`] — nothing downstream of construction ever
//! chases the `next` pointer itself.

use rand::Rng;

use crate::activations::Activation;
use crate::errors::{XcsfError, XcsfResult};
use crate::nn::layer::{LayerKind, LayerOptions};
use crate::nn::layers;
use crate::nn::net::Net;
use crate::params::Params;

/// One node of the net template chain: a layer kind tag, its shape
/// parameters, and its training/evolution flags (spec §3 "LayerArgs
/// node").
#[derive(Debug, Clone)]
pub struct LayerArgs {
    pub kind: LayerKind,
    pub n_inputs: usize,
    /// Neuron/channel count for dense, recurrent, LSTM and convolutional
    /// layers. Ignored (and forced equal to `n_inputs`) by shape-preserving
    /// kinds (softmax, dropout, noise).
    pub n_outputs: usize,
    pub activation: Activation,
    pub eta: f64,
    pub momentum: f64,
    pub decay: f64,
    pub options: LayerOptions,

    /// Bounds and step for `EVOLVE_NEURONS` (spec §4.1 `mutate`).
    pub n_init: usize,
    pub n_max: usize,
    pub max_neuron_grow: usize,

    /// Convolutional shape.
    pub kernel_size: usize,
    pub stride: usize,
    pub channels: usize,

    /// Pooling window (avg/max pool) or integer upsample factor.
    pub pool_size: usize,

    /// Dropout / noise probability (drop rate or Gaussian stddev
    /// respectively).
    pub probability: f64,

    pub next: Option<Box<LayerArgs>>,
}

impl LayerArgs {
    /// A minimal, valid dense-layer template, handy as a base for tests and
    /// for callers that only want to override a couple of fields.
    pub fn dense(n_inputs: usize, n_outputs: usize, activation: Activation) -> Self {
        Self {
            kind: LayerKind::Connected,
            n_inputs,
            n_outputs,
            activation,
            eta: 0.1,
            momentum: 0.0,
            decay: 0.0,
            options: LayerOptions::empty(),
            n_init: n_outputs,
            n_max: n_outputs,
            max_neuron_grow: 0,
            kernel_size: 0,
            stride: 1,
            channels: 1,
            pool_size: 0,
            probability: 0.0,
            next: None,
        }
    }

    /// Validates this node in isolation (spec §7 "Configuration errors":
    /// zero-sized image dimensions, `evolve_neurons` without
    /// `max_neuron_grow >= 1`, ...). Does not recurse into `next` — callers
    /// validate the whole chain via [`validate_chain`].
    pub fn validate(&self) -> XcsfResult<()> {
        if self.n_inputs == 0 {
            return Err(XcsfError::InvalidLayerArgs("n_inputs must be nonzero".into()));
        }
        match self.kind {
            LayerKind::Connected | LayerKind::Recurrent | LayerKind::Lstm => {
                if self.n_outputs == 0 {
                    return Err(XcsfError::InvalidLayerArgs("n_outputs must be nonzero".into()));
                }
            }
            LayerKind::Convolutional => {
                if self.n_outputs == 0 || self.channels == 0 || self.kernel_size == 0 {
                    return Err(XcsfError::InvalidLayerArgs(
                        "convolutional layer has a zero-sized image dimension".into(),
                    ));
                }
                if self.kernel_size > self.n_inputs {
                    return Err(XcsfError::InvalidLayerArgs(
                        "convolutional kernel_size exceeds n_inputs".into(),
                    ));
                }
            }
            LayerKind::AvgPool | LayerKind::MaxPool => {
                if self.pool_size == 0 {
                    return Err(XcsfError::InvalidLayerArgs("pool_size must be nonzero".into()));
                }
            }
            LayerKind::Upsample => {
                if self.pool_size == 0 {
                    return Err(XcsfError::InvalidLayerArgs("upsample factor must be nonzero".into()));
                }
            }
            LayerKind::Dropout | LayerKind::Noise | LayerKind::Softmax => {}
        }
        if self.options.contains(LayerOptions::EVOLVE_NEURONS) && self.max_neuron_grow == 0 {
            return Err(XcsfError::InvalidLayerArgs(
                "evolve_neurons requires max_neuron_grow >= 1".into(),
            ));
        }
        if self.options.contains(LayerOptions::EVOLVE_NEURONS) && self.n_max < self.n_init {
            return Err(XcsfError::InvalidLayerArgs("n_max must be >= n_init".into()));
        }
        Ok(())
    }

    /// Validates the whole chain starting at `self` (spec §7: "empty layer
    /// list" is handled by the caller — a chain always has at least one
    /// node by construction).
    pub fn validate_chain(&self) -> XcsfResult<()> {
        self.validate()?;
        if let Some(next) = &self.next {
            next.validate_chain()
        } else {
            Ok(())
        }
    }

    /// Consumes the chain, instantiating one concrete [`Layer`] per node
    /// and assembling them into a [`Net`] in tail→input to head→output
    /// order (i.e. the order the chain is given in — spec §3 "consumed to
    /// instantiate a Net, then freed").
    ///
    /// [`Layer`]: crate::nn::layer::Layer
    pub fn into_net(self, params: &Params, rng: &mut impl Rng) -> XcsfResult<Net> {
        self.validate_chain()?;
        let mut net = Net::empty();
        let mut node = Some(self);
        while let Some(args) = node {
            let layer = layers::build(&args, params, rng)?;
            net.push_tail(layer)?;
            node = args.next.map(|b| *b);
        }
        if net.n_layers() == 0 {
            return Err(XcsfError::InvalidLayerArgs("layer chain is empty".into()));
        }
        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_sized_convolutional_kernel() {
        let mut args = LayerArgs::dense(4, 4, Activation::Linear);
        args.kind = LayerKind::Convolutional;
        args.channels = 1;
        args.kernel_size = 0;
        assert!(args.validate().is_err());
    }

    #[test]
    fn rejects_evolve_neurons_without_growth_step() {
        let mut args = LayerArgs::dense(4, 4, Activation::Linear);
        args.options = LayerOptions::EVOLVE_NEURONS;
        args.max_neuron_grow = 0;
        assert!(args.validate().is_err());
    }

    #[test]
    fn accepts_a_well_formed_dense_chain() {
        let a = LayerArgs::dense(4, 4, Activation::Linear);
        let b = LayerArgs { next: Some(Box::new(LayerArgs::dense(4, 2, Activation::Logistic))), ..a.clone() };
        assert!(b.validate_chain().is_ok());
    }
}
