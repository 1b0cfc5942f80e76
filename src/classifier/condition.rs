//! L2 — condition substrates (spec §4.4 catalogue: `TERNARY`, `RECTANGLE`,
//! `ELLIPSOID`, `GP_TREE`, `NEURAL`, `DGP`).
//!
//! Rendered as a tagged enum per design note "Vtable dispatch -> sum types
//! or trait objects" (spec §9): a `Condition` owns exactly one substrate's
//! state and dispatches `compute`/`mutate`/`crossover`/`cover` by matching
//! on the variant instead of chasing a `(tag, state, vtable)` triple.
//!
//! `Condition::compute` plays the role spec §4.4's vtable calls `compute`
//! for this slot: it reports whether the condition matches an input, not a
//! continuous value — the continuous-valued substrates (GP tree, neural,
//! DGP) apply their own threshold internally.

use std::io::{Read, Write};

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::activations::Activation;
use crate::errors::{XcsfError, XcsfResult};
use crate::gp::GpTree;
use crate::io::*;
use crate::nn::layer::{activation_from_tag, activation_tag, LayerOptions};
use crate::nn::layer_args::LayerArgs;
use crate::nn::net::Net;
use crate::params::{ConditionType, Params};

/// Bounded retry count for substrates whose `cover` re-randomizes rather
/// than deterministically widening (spec §4.4 "Covering ... bounded only by
/// the substrate's own convergence; callers treat non-termination as a
/// configuration error", spec §8 scenario S6's "bounded number of
/// re-randomisations (e.g. 1000)").
const MAX_COVER_ATTEMPTS: usize = 1000;

/// GP-tree conditions are not bounded by a config key (`GP_MAX_LEN` is not
/// among the recognized keys in spec §6); this mirrors the literal bound
/// already used by the GP engine's own tests.
const GP_COND_MAX_LEN: usize = 512;

const NEURAL_MATCH_THRESHOLD: f64 = 0.5;
const CONTINUOUS_MATCH_THRESHOLD: f64 = 0.0;
const TERNARY_BITS_PER_DIM: usize = 8;
const DGP_HIDDEN_NODES: usize = 4;
const DGP_CYCLES: usize = 3;

/// One position of a ternary condition string: a fixed bit, or `#`
/// (don't-care, always matches) per the classic ternary-string XCS
/// condition (spec §B "Interval-style conditions").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trit {
    Zero,
    One,
    DontCare,
}

fn encode_bits(x: f64, min: f64, max: f64, bits: usize) -> Vec<bool> {
    let span = (max - min).max(1e-12);
    let frac = ((x - min) / span).clamp(0.0, 1.0);
    let scale = ((1u64 << bits) - 1) as f64;
    let code = (frac * scale).round() as u64;
    (0..bits).rev().map(|b| (code >> b) & 1 == 1).collect()
}

#[derive(Debug, Clone)]
pub struct TernaryCondition {
    num_inputs: usize,
    bits_per_dim: usize,
    trits: Vec<Trit>,
}

impl TernaryCondition {
    fn init(num_inputs: usize, rng: &mut impl Rng) -> Self {
        let bits_per_dim = TERNARY_BITS_PER_DIM;
        let trits = (0..num_inputs * bits_per_dim)
            .map(|_| match rng.gen_range(0..3) {
                0 => Trit::Zero,
                1 => Trit::One,
                _ => Trit::DontCare,
            })
            .collect();
        Self { num_inputs, bits_per_dim, trits }
    }

    fn compute(&self, params: &Params, input: &[f64]) -> bool {
        for (dim, &x) in input.iter().enumerate() {
            let bits = encode_bits(x, params.cond_min, params.cond_max, self.bits_per_dim);
            let base = dim * self.bits_per_dim;
            for (i, bit) in bits.into_iter().enumerate() {
                match self.trits[base + i] {
                    Trit::DontCare => continue,
                    Trit::Zero if !bit => continue,
                    Trit::One if bit => continue,
                    _ => return false,
                }
            }
        }
        true
    }

    /// Widens to `#` every bit position that currently mismatches `input`
    /// (spec §B: "widen to enclose input"). Deterministic, never fails.
    fn cover(&mut self, params: &Params, input: &[f64]) {
        for (dim, &x) in input.iter().enumerate() {
            let bits = encode_bits(x, params.cond_min, params.cond_max, self.bits_per_dim);
            let base = dim * self.bits_per_dim;
            for (i, bit) in bits.into_iter().enumerate() {
                let trit = &mut self.trits[base + i];
                let mismatched = matches!((*trit, bit), (Trit::Zero, true) | (Trit::One, false));
                if mismatched {
                    *trit = Trit::DontCare;
                }
            }
        }
    }

    fn mutate(&mut self, params: &Params, rng: &mut impl Rng) -> bool {
        let mut changed = false;
        for trit in self.trits.iter_mut() {
            if rng.gen::<f64>() >= params.p_mutation {
                continue;
            }
            let new_trit = match rng.gen_range(0..3) {
                0 => Trit::Zero,
                1 => Trit::One,
                _ => Trit::DontCare,
            };
            if new_trit != *trit {
                *trit = new_trit;
                changed = true;
            }
        }
        changed
    }

    fn crossover(a: &mut TernaryCondition, b: &mut TernaryCondition, rng: &mut impl Rng) {
        let len = a.trits.len().min(b.trits.len());
        if len == 0 {
            return;
        }
        let start = rng.gen_range(0..len);
        let end = rng.gen_range(start..len) + 1;
        for i in start..end {
            std::mem::swap(&mut a.trits[i], &mut b.trits[i]);
        }
    }

    fn save(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_i32(w, self.num_inputs as i32)?;
        write_i32(w, self.bits_per_dim as i32)?;
        write_i32(w, self.trits.len() as i32)?;
        for t in &self.trits {
            let tag = match t {
                Trit::Zero => 0,
                Trit::One => 1,
                Trit::DontCare => 2,
            };
            write_i32(w, tag)?;
        }
        Ok(())
    }

    fn load(r: &mut dyn Read) -> XcsfResult<Self> {
        let num_inputs = read_i32(r)? as usize;
        let bits_per_dim = read_i32(r)? as usize;
        let len = read_i32(r)? as usize;
        let mut trits = Vec::with_capacity(len);
        for _ in 0..len {
            trits.push(match read_i32(r)? {
                0 => Trit::Zero,
                1 => Trit::One,
                _ => Trit::DontCare,
            });
        }
        Ok(Self { num_inputs, bits_per_dim, trits })
    }
}

/// `RECTANGLE` and `ELLIPSOID` share a center/spread parameterization and
/// differ only in `compute`'s geometric test (spec §B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntervalShape {
    Rectangle,
    Ellipsoid,
}

#[derive(Debug, Clone)]
pub struct IntervalCondition {
    shape: IntervalShape,
    center: Vec<f64>,
    spread: Vec<f64>,
}

impl IntervalCondition {
    fn init(shape: IntervalShape, num_inputs: usize, params: &Params, rng: &mut impl Rng) -> Self {
        let range = (params.cond_max - params.cond_min).max(params.cond_smin);
        let center = (0..num_inputs).map(|_| rng.gen_range(params.cond_min..=params.cond_max)).collect();
        let spread = (0..num_inputs).map(|_| rng.gen_range(params.cond_smin..=range)).collect();
        Self { shape, center, spread }
    }

    fn compute(&self, input: &[f64]) -> bool {
        match self.shape {
            IntervalShape::Rectangle => input
                .iter()
                .zip(self.center.iter())
                .zip(self.spread.iter())
                .all(|((&x, &c), &s)| (x - c).abs() <= s),
            IntervalShape::Ellipsoid => {
                let sum: f64 = input
                    .iter()
                    .zip(self.center.iter())
                    .zip(self.spread.iter())
                    .map(|((&x, &c), &s)| {
                        let z = (x - c) / s.max(1e-12);
                        z * z
                    })
                    .sum();
                sum <= 1.0
            }
        }
    }

    /// Widens deterministically to enclose `input` (spec §B). For the
    /// rectangle this is per-dimension; for the ellipsoid, a single uniform
    /// rescale of every spread keeps the shape's axis ratios intact.
    fn cover(&mut self, params: &Params, input: &[f64]) {
        match self.shape {
            IntervalShape::Rectangle => {
                for ((&x, c), s) in input.iter().zip(self.center.iter()).zip(self.spread.iter_mut()) {
                    *s = s.max((x - c).abs()).max(params.cond_smin);
                }
            }
            IntervalShape::Ellipsoid => {
                let sum: f64 = input
                    .iter()
                    .zip(self.center.iter())
                    .zip(self.spread.iter())
                    .map(|((&x, &c), &s)| {
                        let z = (x - c) / s.max(1e-12);
                        z * z
                    })
                    .sum();
                if sum > 1.0 {
                    let scale = sum.sqrt() + 1e-9;
                    for s in self.spread.iter_mut() {
                        *s = (*s * scale).max(params.cond_smin);
                    }
                }
            }
        }
    }

    fn mutate(&mut self, params: &Params, rng: &mut impl Rng) -> bool {
        let mut changed = false;
        for c in self.center.iter_mut() {
            if rng.gen::<f64>() < params.p_mutation {
                let z: f64 = StandardNormal.sample(rng);
                *c += z * params.cond_eta;
                changed = true;
            }
        }
        for s in self.spread.iter_mut() {
            if rng.gen::<f64>() < params.p_mutation {
                let z: f64 = StandardNormal.sample(rng);
                let new_s = (*s + z * params.cond_eta).max(params.cond_smin);
                if new_s != *s {
                    *s = new_s;
                    changed = true;
                }
            }
        }
        changed
    }

    fn crossover(a: &mut IntervalCondition, b: &mut IntervalCondition, rng: &mut impl Rng) {
        let len = a.center.len().min(b.center.len());
        if len == 0 {
            return;
        }
        let start = rng.gen_range(0..len);
        let end = rng.gen_range(start..len) + 1;
        for i in start..end {
            std::mem::swap(&mut a.center[i], &mut b.center[i]);
            std::mem::swap(&mut a.spread[i], &mut b.spread[i]);
        }
    }

    fn save(&self, w: &mut dyn Write) -> XcsfResult<()> {
        let tag = match self.shape {
            IntervalShape::Rectangle => 0,
            IntervalShape::Ellipsoid => 1,
        };
        write_i32(w, tag)?;
        write_f64_vec(w, &self.center)?;
        write_f64_vec(w, &self.spread)
    }

    fn load(r: &mut dyn Read) -> XcsfResult<Self> {
        let shape = match read_i32(r)? {
            0 => IntervalShape::Rectangle,
            _ => IntervalShape::Ellipsoid,
        };
        let center = read_f64_vec(r)?;
        let spread = read_f64_vec(r)?;
        Ok(Self { shape, center, spread })
    }
}

#[derive(Debug, Clone)]
pub struct GpCondition {
    tree: GpTree,
    num_inputs: usize,
}

impl GpCondition {
    fn init(num_inputs: usize, params: &Params, rng: &mut impl Rng) -> XcsfResult<Self> {
        let tree = GpTree::grow(params, num_inputs, GP_COND_MAX_LEN, rng)?;
        Ok(Self { tree, num_inputs })
    }

    fn compute(&mut self, params: &Params, input: &[f64]) -> bool {
        self.tree.eval(params, input) >= CONTINUOUS_MATCH_THRESHOLD
    }

    fn cover(&mut self, params: &Params, input: &[f64], rng: &mut impl Rng) -> XcsfResult<()> {
        for attempt in 0..MAX_COVER_ATTEMPTS {
            let mut candidate = GpTree::grow(params, self.num_inputs, GP_COND_MAX_LEN, rng)?;
            if candidate.eval(params, input) >= CONTINUOUS_MATCH_THRESHOLD {
                self.tree = candidate;
                tracing::debug!(attempt, "gp condition covered");
                return Ok(());
            }
        }
        Err(XcsfError::CoveringExhausted { attempts: MAX_COVER_ATTEMPTS })
    }

    fn mutate(&mut self, params: &Params, rng: &mut impl Rng) -> bool {
        self.tree.mutate(params, self.num_inputs, rng)
    }

    fn crossover(a: &mut GpCondition, b: &mut GpCondition, rng: &mut impl Rng) {
        GpTree::crossover(&mut a.tree, &mut b.tree, GP_COND_MAX_LEN, rng);
    }

    fn save(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_i32(w, self.num_inputs as i32)?;
        self.tree.save(w)
    }

    fn load(params: &Params, r: &mut dyn Read, rng: &mut impl Rng) -> XcsfResult<Self> {
        let num_inputs = read_i32(r)? as usize;
        let mut tree = GpTree::empty_shell(params, rng);
        tree.load(r)?;
        Ok(Self { tree, num_inputs })
    }
}

#[derive(Debug, Clone)]
pub struct NeuralCondition {
    net: Net,
    num_inputs: usize,
}

impl NeuralCondition {
    fn build_args(num_inputs: usize, params: &Params) -> LayerArgs {
        let mut options = LayerOptions::SGD_WEIGHTS;
        if params.cond_evolve_weights {
            options |= LayerOptions::EVOLVE_WEIGHTS;
        }
        if params.cond_evolve_functions {
            options |= LayerOptions::EVOLVE_FUNCTIONS;
        }
        if params.cond_evolve_neurons {
            options |= LayerOptions::EVOLVE_NEURONS;
        }
        let mut hidden = LayerArgs::dense(num_inputs, params.cond_num_hidden_neurons, params.cond_hidden_neuron_activation);
        hidden.options = options;
        hidden.n_init = params.cond_num_hidden_neurons;
        hidden.n_max = params.cond_max_hidden_neurons;
        hidden.max_neuron_grow = if params.cond_evolve_neurons { 1 } else { 0 };
        hidden.eta = params.cond_eta;
        let output = LayerArgs::dense(params.cond_num_hidden_neurons, 1, Activation::Logistic);
        hidden.next = Some(Box::new(output));
        hidden
    }

    fn init(num_inputs: usize, params: &Params, rng: &mut impl Rng) -> XcsfResult<Self> {
        let net = Self::build_args(num_inputs, params).into_net(params, rng)?;
        Ok(Self { net, num_inputs })
    }

    fn compute(&mut self, input: &[f64]) -> XcsfResult<bool> {
        self.net.propagate(input)?;
        Ok(self.net.output()[0] >= NEURAL_MATCH_THRESHOLD)
    }

    fn cover(&mut self, params: &Params, input: &[f64], rng: &mut impl Rng) -> XcsfResult<()> {
        for attempt in 0..MAX_COVER_ATTEMPTS {
            let mut candidate = Self::init(self.num_inputs, params, rng)?;
            if candidate.compute(input)? {
                *self = candidate;
                tracing::debug!(attempt, "neural condition covered");
                return Ok(());
            }
        }
        Err(XcsfError::CoveringExhausted { attempts: MAX_COVER_ATTEMPTS })
    }

    fn mutate(&mut self, params: &Params, rng: &mut impl Rng) -> bool {
        self.net.mutate(params, rng)
    }

    fn save(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_i32(w, self.num_inputs as i32)?;
        self.net.save(w)
    }

    fn load(r: &mut dyn Read) -> XcsfResult<Self> {
        let num_inputs = read_i32(r)? as usize;
        let net = Net::load(r)?;
        Ok(Self { net, num_inputs })
    }
}

/// A small fixed-size directed graph of scalar nodes (spec §B "DGP
/// condition"): the first `num_inputs` nodes are clamped to the input
/// vector every cycle, the rest are each a weighted sum of every node's
/// previous-cycle output passed through that node's own activation. The
/// last node is the read-out.
#[derive(Debug, Clone)]
pub struct DgpCondition {
    num_inputs: usize,
    n_nodes: usize,
    weights: Vec<f64>,
    activations: Vec<Activation>,
}

impl DgpCondition {
    fn init(num_inputs: usize, params: &Params, rng: &mut impl Rng) -> Self {
        let n_nodes = num_inputs + DGP_HIDDEN_NODES;
        let weights = (0..n_nodes * n_nodes).map(|_| rng.gen_range(params.cond_min..=params.cond_max)).collect();
        let activations = (0..n_nodes).map(|_| Activation::random(rng)).collect();
        Self { num_inputs, n_nodes, weights, activations }
    }

    fn run(&self, input: &[f64]) -> f64 {
        let mut state = vec![0.0; self.n_nodes];
        state[..self.num_inputs].copy_from_slice(input);
        for _ in 0..DGP_CYCLES {
            let mut next = vec![0.0; self.n_nodes];
            for j in 0..self.n_nodes {
                if j < self.num_inputs {
                    next[j] = input[j];
                    continue;
                }
                let mut sum = 0.0;
                for k in 0..self.n_nodes {
                    sum += self.weights[j * self.n_nodes + k] * state[k];
                }
                next[j] = self.activations[j].apply(sum);
            }
            state = next;
        }
        state[self.n_nodes - 1]
    }

    fn compute(&self, input: &[f64]) -> bool {
        self.run(input) >= CONTINUOUS_MATCH_THRESHOLD
    }

    fn cover(&mut self, params: &Params, input: &[f64], rng: &mut impl Rng) -> XcsfResult<()> {
        for attempt in 0..MAX_COVER_ATTEMPTS {
            let candidate = Self::init(self.num_inputs, params, rng);
            if candidate.compute(input) {
                *self = candidate;
                tracing::debug!(attempt, "dgp condition covered");
                return Ok(());
            }
        }
        Err(XcsfError::CoveringExhausted { attempts: MAX_COVER_ATTEMPTS })
    }

    fn mutate(&mut self, params: &Params, rng: &mut impl Rng) -> bool {
        let mut changed = false;
        for w in self.weights.iter_mut() {
            if rng.gen::<f64>() < params.p_mutation {
                let z: f64 = StandardNormal.sample(rng);
                *w += z * params.cond_eta;
                changed = true;
            }
        }
        for a in self.activations.iter_mut() {
            if rng.gen::<f64>() < params.f_mutation {
                let new_a = Activation::random(rng);
                if new_a != *a {
                    *a = new_a;
                    changed = true;
                }
            }
        }
        changed
    }

    fn crossover(a: &mut DgpCondition, b: &mut DgpCondition, rng: &mut impl Rng) {
        let len = a.weights.len().min(b.weights.len());
        if len == 0 {
            return;
        }
        let start = rng.gen_range(0..len);
        let end = rng.gen_range(start..len) + 1;
        for i in start..end {
            std::mem::swap(&mut a.weights[i], &mut b.weights[i]);
        }
    }

    fn save(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_i32(w, self.num_inputs as i32)?;
        write_i32(w, self.n_nodes as i32)?;
        write_f64_vec(w, &self.weights)?;
        write_i32(w, self.activations.len() as i32)?;
        for &a in &self.activations {
            write_i32(w, activation_tag(a))?;
        }
        Ok(())
    }

    fn load(r: &mut dyn Read) -> XcsfResult<Self> {
        let num_inputs = read_i32(r)? as usize;
        let n_nodes = read_i32(r)? as usize;
        let weights = read_f64_vec(r)?;
        let n_act = read_i32(r)? as usize;
        let mut activations = Vec::with_capacity(n_act);
        for _ in 0..n_act {
            activations.push(activation_from_tag(read_i32(r)?));
        }
        Ok(Self { num_inputs, n_nodes, weights, activations })
    }
}

/// A condition substrate selected by `COND_TYPE` (spec §4.4).
#[derive(Debug, Clone)]
pub enum Condition {
    Ternary(TernaryCondition),
    Interval(IntervalCondition),
    GpTree(GpCondition),
    Neural(NeuralCondition),
    Dgp(DgpCondition),
}

impl Condition {
    /// `init` (spec §4.4 vtable): builds the substrate the `cond_type`
    /// hyperparameter selects.
    pub fn init(num_inputs: usize, params: &Params, rng: &mut impl Rng) -> XcsfResult<Self> {
        Ok(match params.cond_type {
            ConditionType::Ternary => Condition::Ternary(TernaryCondition::init(num_inputs, rng)),
            ConditionType::Rectangle => {
                Condition::Interval(IntervalCondition::init(IntervalShape::Rectangle, num_inputs, params, rng))
            }
            ConditionType::Ellipsoid => {
                Condition::Interval(IntervalCondition::init(IntervalShape::Ellipsoid, num_inputs, params, rng))
            }
            ConditionType::GpTree => Condition::GpTree(GpCondition::init(num_inputs, params, rng)?),
            ConditionType::Neural => Condition::Neural(NeuralCondition::init(num_inputs, params, rng)?),
            ConditionType::Dgp => Condition::Dgp(DgpCondition::init(num_inputs, params, rng)),
        })
    }

    /// `compute` (spec §4.4 vtable): whether this condition matches `input`.
    pub fn compute(&mut self, params: &Params, input: &[f64]) -> XcsfResult<bool> {
        Ok(match self {
            Condition::Ternary(c) => c.compute(params, input),
            Condition::Interval(c) => c.compute(input),
            Condition::GpTree(c) => c.compute(params, input),
            Condition::Neural(c) => c.compute(input)?,
            Condition::Dgp(c) => c.compute(input),
        })
    }

    /// `cover` (spec §4.4): mutates the substrate until it matches `input`.
    /// Interval-style and ternary conditions widen deterministically;
    /// GP/neural/DGP re-randomize, bounded by [`MAX_COVER_ATTEMPTS`].
    pub fn cover(&mut self, params: &Params, input: &[f64], rng: &mut impl Rng) -> XcsfResult<()> {
        match self {
            Condition::Ternary(c) => {
                c.cover(params, input);
                Ok(())
            }
            Condition::Interval(c) => {
                c.cover(params, input);
                Ok(())
            }
            Condition::GpTree(c) => c.cover(params, input, rng),
            Condition::Neural(c) => c.cover(params, input, rng),
            Condition::Dgp(c) => c.cover(params, input, rng),
        }
    }

    /// `mutate` (spec §4.4 vtable). Returns whether anything changed.
    pub fn mutate(&mut self, params: &Params, rng: &mut impl Rng) -> bool {
        match self {
            Condition::Ternary(c) => c.mutate(params, rng),
            Condition::Interval(c) => c.mutate(params, rng),
            Condition::GpTree(c) => c.mutate(params, rng),
            Condition::Neural(c) => c.mutate(params, rng),
            Condition::Dgp(c) => c.mutate(params, rng),
        }
    }

    /// `crossover` (spec §4.4 vtable). A no-op between mismatched variants
    /// — the outer evolutionary loop only ever crosses classifiers that
    /// share a `cond_type` (spec §4.4: "selection happens once per
    /// classifier... by reading the relevant `*_TYPE` hyperparameter").
    pub fn crossover(a: &mut Condition, b: &mut Condition, rng: &mut impl Rng) {
        match (a, b) {
            (Condition::Ternary(a), Condition::Ternary(b)) => TernaryCondition::crossover(a, b, rng),
            (Condition::Interval(a), Condition::Interval(b)) => IntervalCondition::crossover(a, b, rng),
            (Condition::GpTree(a), Condition::GpTree(b)) => GpCondition::crossover(a, b, rng),
            (Condition::Dgp(a), Condition::Dgp(b)) => DgpCondition::crossover(a, b, rng),
            _ => {}
        }
    }

    pub fn print(&self) -> String {
        match self {
            Condition::Ternary(c) => format!("ternary({} inputs)", c.num_inputs),
            Condition::Interval(c) => format!("{:?}({} dims)", c.shape, c.center.len()),
            Condition::GpTree(c) => format!("gp_tree(len={})", c.tree.len()),
            Condition::Neural(c) => format!("neural_condition({} -> 1)", c.num_inputs),
            Condition::Dgp(c) => format!("dgp({} nodes)", c.n_nodes),
        }
    }

    pub fn save(&self, w: &mut dyn Write) -> XcsfResult<()> {
        match self {
            Condition::Ternary(c) => c.save(w),
            Condition::Interval(c) => c.save(w),
            Condition::GpTree(c) => c.save(w),
            Condition::Neural(c) => c.save(w),
            Condition::Dgp(c) => c.save(w),
        }
    }

    pub fn load(cond_type: ConditionType, params: &Params, r: &mut dyn Read, rng: &mut impl Rng) -> XcsfResult<Self> {
        Ok(match cond_type {
            ConditionType::Ternary => Condition::Ternary(TernaryCondition::load(r)?),
            ConditionType::Rectangle | ConditionType::Ellipsoid => Condition::Interval(IntervalCondition::load(r)?),
            ConditionType::GpTree => Condition::GpTree(GpCondition::load(params, r, rng)?),
            ConditionType::Neural => Condition::Neural(NeuralCondition::load(r)?),
            ConditionType::Dgp => Condition::Dgp(DgpCondition::load(r)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::tests_support::sample;
    use rand::SeedableRng;

    fn params_for(cond_type: ConditionType) -> Params {
        let mut p = sample();
        p.cond_type = cond_type;
        p
    }

    #[test]
    fn ternary_cover_always_matches_its_own_input() {
        let params = params_for(ConditionType::Ternary);
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut cond = Condition::init(3, &params, &mut rng).unwrap();
        let input = [0.2, -0.5, 0.9];
        cond.cover(&params, &input, &mut rng).unwrap();
        assert!(cond.compute(&params, &input).unwrap());
    }

    #[test]
    fn rectangle_cover_always_matches_its_own_input() {
        let params = params_for(ConditionType::Rectangle);
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let mut cond = Condition::init(2, &params, &mut rng).unwrap();
        let input = [0.9, -0.9];
        cond.cover(&params, &input, &mut rng).unwrap();
        assert!(cond.compute(&params, &input).unwrap());
    }

    #[test]
    fn ellipsoid_cover_always_matches_its_own_input() {
        let params = params_for(ConditionType::Ellipsoid);
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let mut cond = Condition::init(2, &params, &mut rng).unwrap();
        let input = [0.9, -0.9];
        cond.cover(&params, &input, &mut rng).unwrap();
        assert!(cond.compute(&params, &input).unwrap());
    }

    #[test]
    fn gp_condition_cover_terminates_and_matches() {
        let params = params_for(ConditionType::GpTree);
        let mut rng = rand::rngs::StdRng::seed_from_u64(4);
        let mut cond = Condition::init(2, &params, &mut rng).unwrap();
        let input = [0.3, 0.4];
        cond.cover(&params, &input, &mut rng).unwrap();
        assert!(cond.compute(&params, &input).unwrap());
    }

    #[test]
    fn neural_condition_cover_terminates_within_bound_s6() {
        // spec S6: 4 inputs, bounded re-randomizations under a fixed seed.
        let params = params_for(ConditionType::Neural);
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        let mut cond = Condition::init(4, &params, &mut rng).unwrap();
        let input = [0.1, 0.2, 0.3, 0.4];
        assert!(cond.cover(&params, &input, &mut rng).is_ok());
        assert!(cond.compute(&params, &input).unwrap());
    }

    #[test]
    fn condition_save_load_round_trips_ternary_match_behavior() {
        let params = params_for(ConditionType::Ternary);
        let mut rng = rand::rngs::StdRng::seed_from_u64(6);
        let mut cond = Condition::init(3, &params, &mut rng).unwrap();
        let input = [0.1, 0.2, 0.3];
        cond.cover(&params, &input, &mut rng).unwrap();
        let mut buf = Vec::new();
        cond.save(&mut buf).unwrap();
        let mut reloaded = Condition::load(ConditionType::Ternary, &params, &mut &buf[..], &mut rng).unwrap();
        assert_eq!(cond.compute(&params, &input).unwrap(), reloaded.compute(&params, &input).unwrap());
    }

    #[test]
    fn mutate_returns_true_iff_something_changed_rectangle() {
        let mut params = params_for(ConditionType::Rectangle);
        params.p_mutation = 1.0;
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut cond = Condition::init(3, &params, &mut rng).unwrap();
        let before = format!("{cond:?}");
        let changed = cond.mutate(&params, &mut rng);
        assert_eq!(changed, before != format!("{cond:?}"));
    }
}
