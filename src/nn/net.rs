//! L1 — the net engine (spec §4.2 "Net engine").
//!
//! Per design note "Linked lists → owned arrays": the doubly-linked chain
//! of the original design is rendered here as a plain `Vec<Box<dyn
//! Layer>>`, index 0 being the **tail** (first, input-facing layer) and
//! the last index being the **head** (last, output-facing layer) — this is
//! the orientation spec §4.2 fixes ("tail is the first ... head is the
//! last ... this follows from push adding at the output end"). `n_inputs`,
//! `n_outputs` and `output()` are computed on demand from the tail/head
//! rather than cached fields kept in sync by every mutation, which removes
//! an entire class of cache-invalidation bugs without changing observable
//! behavior (spec §8 invariant 1 still holds, just non-redundantly).

use std::io::{Read, Write};

use rand::Rng;

use crate::errors::{XcsfError, XcsfResult};
use crate::io::{read_i32, write_i32};
use crate::nn::layer::{Layer, LayerKind};
use crate::nn::layers;
use crate::params::Params;

#[derive(Debug)]
pub struct Net {
    layers: Vec<Box<dyn Layer>>,
}

impl Clone for Net {
    /// Deep copy (spec §8 invariant 6: "mutating a copy never observably
    /// changes the original") — each layer's own `clone_box` owns a fresh
    /// copy of its weight/buffer storage.
    fn clone(&self) -> Self {
        Self { layers: self.layers.iter().map(|l| l.clone_box()).collect() }
    }
}

impl Net {
    pub fn empty() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    /// Spec §3 Net invariant: `n_inputs == tail.n_inputs`.
    pub fn n_inputs(&self) -> usize {
        self.layers.first().map(|l| l.n_inputs()).unwrap_or(0)
    }

    /// Spec §3 Net invariant: `n_outputs == head.n_outputs`.
    pub fn n_outputs(&self) -> usize {
        self.layers.last().map(|l| l.n_outputs()).unwrap_or(0)
    }

    /// Spec §3 Net invariant: `output == head.output`.
    pub fn output(&self) -> &[f64] {
        self.layers.last().map(|l| l.output()).unwrap_or(&[])
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    /// Appends a layer at the current vec end. Used only while consuming a
    /// [`crate::nn::layer_args::LayerArgs`] chain, which is already given
    /// in tail-to-head order; not a spec-named operation itself.
    pub(crate) fn push_tail(&mut self, layer: Box<dyn Layer>) -> XcsfResult<()> {
        if let Some(prev) = self.layers.last() {
            if prev.n_outputs() != layer.n_inputs() {
                return Err(XcsfError::NetContractViolation(format!(
                    "layer n_inputs {} does not match previous layer n_outputs {}",
                    layer.n_inputs(),
                    prev.n_outputs()
                )));
            }
        }
        self.layers.push(layer);
        Ok(())
    }

    /// `insert(layer, position)` (spec §4.2): `position == 0` inserts at
    /// the head (output end); `position == n_layers` inserts at the tail.
    pub fn insert(&mut self, layer: Box<dyn Layer>, position: usize) -> XcsfResult<()> {
        let len = self.layers.len();
        if position > len {
            return Err(XcsfError::NetContractViolation(format!(
                "insert position {position} out of range for {len} layers"
            )));
        }
        let idx = len - position;
        self.layers.insert(idx, layer);
        Ok(())
    }

    /// `remove(position)` (spec §4.2): refuses to remove the sole
    /// remaining layer.
    pub fn remove(&mut self, position: usize) -> XcsfResult<Box<dyn Layer>> {
        let len = self.layers.len();
        if len <= 1 {
            return Err(XcsfError::NetContractViolation("cannot remove the sole remaining layer".into()));
        }
        if position >= len {
            return Err(XcsfError::NetContractViolation(format!(
                "remove position {position} out of range for {len} layers"
            )));
        }
        let idx = len - 1 - position;
        Ok(self.layers.remove(idx))
    }

    /// `propagate(input)` (spec §4.2): walks tail→head, feeding each
    /// layer's output as the next layer's input.
    pub fn propagate(&mut self, input: &[f64]) -> XcsfResult<()> {
        if self.layers.is_empty() {
            return Err(XcsfError::NetContractViolation("propagate before layers installed".into()));
        }
        if input.len() != self.n_inputs() {
            return Err(XcsfError::ShapeMismatch { expected: self.n_inputs(), found: input.len() });
        }
        let mut carry = input.to_vec();
        for layer in self.layers.iter_mut() {
            layer.forward(&carry);
            carry = layer.output().to_vec();
        }
        Ok(())
    }

    /// `learn(truth, input)` (spec §4.2): the four phases in the order the
    /// spec fixes. Requires `propagate(input)` to have been called
    /// immediately prior so `output()` reflects `input` (the net does not
    /// re-run the forward pass itself — only phases (i)-(iv) below belong
    /// to `learn`).
    pub fn learn(&mut self, truth: &[f64], input: &[f64]) -> XcsfResult<()> {
        if self.layers.is_empty() {
            return Err(XcsfError::NetContractViolation("learn before layers installed".into()));
        }
        if truth.len() != self.n_outputs() {
            return Err(XcsfError::ShapeMismatch { expected: self.n_outputs(), found: truth.len() });
        }

        // (i) zero every layer's delta
        for layer in self.layers.iter_mut() {
            layer.zero_delta();
        }

        // (ii) seed the head's delta as truth - output
        {
            let head = self.layers.last_mut().expect("non-empty checked above");
            let out: Vec<f64> = head.output().to_vec();
            let delta = head.delta_mut();
            for i in 0..delta.len() {
                delta[i] = truth[i] - out[i];
            }
        }

        // (iii) walk head→tail running backward, passing the downstream
        // layer's output and delta to the layer ahead of it.
        let len = self.layers.len();
        for i in (0..len).rev() {
            let prev_input: Vec<f64> = if i == 0 { input.to_vec() } else { self.layers[i - 1].output().to_vec() };
            if i == 0 {
                self.layers[i].backward(&prev_input, None);
            } else {
                let mut prev_delta = vec![0.0; self.layers[i - 1].n_outputs()];
                self.layers[i].backward(&prev_input, Some(&mut prev_delta));
                self.layers[i - 1].delta_mut().copy_from_slice(&prev_delta);
            }
        }

        // (iv) walk tail→head running update (fixed order for determinism)
        for layer in self.layers.iter_mut() {
            layer.update();
        }
        Ok(())
    }

    /// `mutate()` (spec §4.2): walks tail→head; if a layer's `n_outputs`
    /// changed, the following layer is resized before being mutated.
    /// Returns the logical OR of per-layer changes.
    pub fn mutate(&mut self, params: &Params, rng: &mut impl Rng) -> bool {
        let mut changed = false;
        let len = self.layers.len();
        for i in 0..len {
            let before = self.layers[i].n_outputs();
            if self.layers[i].mutate(params, rng) {
                changed = true;
            }
            let after = self.layers[i].n_outputs();
            if after != before && i + 1 < len {
                self.layers[i + 1].resize(after);
            }
        }
        changed
    }

    /// `resize()` (spec §4.2): an independent pass that repairs size
    /// mismatches without mutating anything.
    pub fn resize(&mut self) {
        let len = self.layers.len();
        for i in 1..len {
            let prev_n_outputs = self.layers[i - 1].n_outputs();
            if self.layers[i].n_inputs() != prev_n_outputs {
                self.layers[i].resize(prev_n_outputs);
            }
        }
    }

    /// `save` (spec §4.2, spec §6 "Net format"): `(n_layers, n_inputs,
    /// n_outputs)` then, per layer in tail→head order, the kind tag
    /// followed by the layer's own payload.
    pub fn save<W: Write>(&self, w: &mut W) -> XcsfResult<()> {
        write_i32(w, self.layers.len() as i32)?;
        write_i32(w, self.n_inputs() as i32)?;
        write_i32(w, self.n_outputs() as i32)?;
        for layer in &self.layers {
            write_i32(w, layer.kind() as i32)?;
            layer.core().save(w)?;
            layer.save_payload(w)?;
        }
        Ok(())
    }

    /// `load` mirrors `save` exactly, rebuilding the layer list by
    /// appending in tail→head order.
    pub fn load<R: Read>(r: &mut R) -> XcsfResult<Self> {
        let n_layers = read_i32(r)? as usize;
        let _n_inputs = read_i32(r)?;
        let _n_outputs = read_i32(r)?;
        let mut net = Net::empty();
        for _ in 0..n_layers {
            let tag = read_i32(r)?;
            let kind = LayerKind::from_tag(tag).ok_or_else(|| XcsfError::UnknownTag(tag.to_string()))?;
            let mut layer = layers::empty_shell(kind);
            let core = crate::nn::layer::LayerCore::load(r)?;
            *layer.core_mut() = core;
            layer.load_payload(r)?;
            net.layers.push(layer);
        }
        Ok(net)
    }
}
