//! L2 — action substrates (spec §4.4 catalogue: `INTEGER`, `NEURAL`).
//!
//! Unlike condition/prediction, spec §4.4 gives the action catalogue no
//! operational detail beyond the tag list. This rounds out both tags with
//! a minimal but complete operation set, grounded in the same pattern
//! `condition.rs`/`prediction.rs` already use for their own
//! under-specified catalogue entries (e.g. `DgpCondition`): every
//! substrate advertises a single discrete action id in `0..num_actions`,
//! `INTEGER` storing it directly and `NEURAL` deriving it from a one-output
//! net's activation.

use std::io::{Read, Write};

use rand::Rng;

use crate::errors::{XcsfError, XcsfResult};
use crate::io::*;
use crate::nn::layer::LayerOptions;
use crate::nn::layer_args::LayerArgs;
use crate::nn::net::Net;
use crate::params::{ActionType, Params};

/// Bounded retry count for `NeuralAction::cover`, mirroring
/// `condition.rs`'s `MAX_COVER_ATTEMPTS` for the same reason (spec §4.4
/// "Covering ... bounded only by the substrate's own convergence").
const MAX_COVER_ATTEMPTS: usize = 1000;

/// Topology for the neural action substrate. Spec §6 names no `ACT_*`
/// hidden-neuron keys (only `COND_*`/`PRED_*`), so this is a small fixed
/// shape rather than an invented config surface.
const ACTION_HIDDEN_NODES: usize = 4;

#[derive(Debug, Clone)]
pub struct IntegerAction {
    num_actions: usize,
    action: usize,
}

impl IntegerAction {
    fn init(num_actions: usize, rng: &mut impl Rng) -> Self {
        Self { num_actions, action: rng.gen_range(0..num_actions.max(1)) }
    }

    fn compute(&self) -> usize {
        self.action
    }

    /// `cover` (spec §4.4): the caller supplies the action id that needs
    /// covering (there is nothing to widen or re-randomize toward — the
    /// action set is unordered), so this just adopts it directly, the
    /// classic XCS covering rule for integer actions.
    fn cover(&mut self, target_action: usize) {
        self.action = target_action.min(self.num_actions.saturating_sub(1));
    }

    /// `mutate` (spec §4.4 vtable): uniform redraw to a *different* action
    /// id, gated by `p_mutation` — the same "uniform redraw" rule spec
    /// §4.1 gives for layer activation mutation, applied here to the
    /// action's discrete alphabet.
    fn mutate(&mut self, params: &Params, rng: &mut impl Rng) -> bool {
        if self.num_actions <= 1 || rng.gen::<f64>() >= params.p_mutation {
            return false;
        }
        let mut candidate = rng.gen_range(0..self.num_actions - 1);
        if candidate >= self.action {
            candidate += 1;
        }
        self.action = candidate;
        true
    }

    fn crossover(a: &mut Self, b: &mut Self, rng: &mut impl Rng) {
        if rng.gen_bool(0.5) {
            std::mem::swap(&mut a.action, &mut b.action);
        }
    }

    fn save(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_i32(w, self.num_actions as i32)?;
        write_i32(w, self.action as i32)
    }

    fn load(r: &mut dyn Read) -> XcsfResult<Self> {
        let num_actions = read_i32(r)? as usize;
        let action = read_i32(r)? as usize;
        Ok(Self { num_actions, action })
    }
}

#[derive(Debug, Clone)]
pub struct NeuralAction {
    net: Net,
    num_actions: usize,
}

impl NeuralAction {
    fn build_args(num_inputs: usize, params: &Params) -> LayerArgs {
        let mut options = LayerOptions::SGD_WEIGHTS;
        if params.cond_evolve_weights {
            options |= LayerOptions::EVOLVE_WEIGHTS;
        }
        let mut hidden =
            LayerArgs::dense(num_inputs, ACTION_HIDDEN_NODES, crate::activations::Activation::Tanh);
        hidden.options = options;
        hidden.n_init = ACTION_HIDDEN_NODES;
        hidden.n_max = ACTION_HIDDEN_NODES;
        hidden.eta = params.pred_eta;
        let output = LayerArgs::dense(ACTION_HIDDEN_NODES, 1, crate::activations::Activation::Logistic);
        hidden.next = Some(Box::new(output));
        hidden
    }

    fn init(num_inputs: usize, num_actions: usize, params: &Params, rng: &mut impl Rng) -> XcsfResult<Self> {
        let net = Self::build_args(num_inputs, params).into_net(params, rng)?;
        Ok(Self { net, num_actions })
    }

    /// Maps the net's single logistic output in `[0, 1)` onto an action id
    /// in `0..num_actions`.
    fn action_from_output(&self, out: f64) -> usize {
        let scaled = (out * self.num_actions as f64).floor();
        (scaled as usize).min(self.num_actions.saturating_sub(1))
    }

    fn compute(&mut self, input: &[f64]) -> XcsfResult<usize> {
        self.net.propagate(input)?;
        Ok(self.action_from_output(self.net.output()[0]))
    }

    fn cover(&mut self, num_inputs: usize, input: &[f64], target_action: usize, params: &Params, rng: &mut impl Rng) -> XcsfResult<()> {
        for attempt in 0..MAX_COVER_ATTEMPTS {
            let mut candidate = Self::init(num_inputs, self.num_actions, params, rng)?;
            if candidate.compute(input)? == target_action {
                *self = candidate;
                tracing::debug!(attempt, target_action, "neural action covered");
                return Ok(());
            }
        }
        Err(XcsfError::CoveringExhausted { attempts: MAX_COVER_ATTEMPTS })
    }

    fn mutate(&mut self, params: &Params, rng: &mut impl Rng) -> bool {
        self.net.mutate(params, rng)
    }

    fn save(&self, w: &mut dyn Write) -> XcsfResult<()> {
        write_i32(w, self.num_actions as i32)?;
        self.net.save(w)
    }

    fn load(r: &mut dyn Read) -> XcsfResult<Self> {
        let num_actions = read_i32(r)? as usize;
        let net = Net::load(r)?;
        Ok(Self { net, num_actions })
    }
}

/// An action substrate selected by `ACT_TYPE` (spec §4.4).
#[derive(Debug, Clone)]
pub enum Action {
    Integer(IntegerAction),
    Neural(NeuralAction),
}

impl Action {
    /// `init` (spec §4.4 vtable). `num_inputs`/`num_actions` come from the
    /// outer RL loop (spec §1: out of scope), not from a config key.
    pub fn init(num_inputs: usize, num_actions: usize, params: &Params, rng: &mut impl Rng) -> XcsfResult<Self> {
        Ok(match params.act_type {
            ActionType::Integer => Action::Integer(IntegerAction::init(num_actions, rng)),
            ActionType::Neural => Action::Neural(NeuralAction::init(num_inputs, num_actions, params, rng)?),
        })
    }

    /// `compute` (spec §4.4 vtable): the action id this classifier
    /// currently advocates.
    pub fn compute(&mut self, input: &[f64]) -> XcsfResult<usize> {
        Ok(match self {
            Action::Integer(a) => a.compute(),
            Action::Neural(a) => a.compute(input)?,
        })
    }

    /// `cover` (spec §4.4): mutates the substrate until `compute(input)`
    /// reports `target_action`.
    pub fn cover(
        &mut self,
        num_inputs: usize,
        input: &[f64],
        target_action: usize,
        params: &Params,
        rng: &mut impl Rng,
    ) -> XcsfResult<()> {
        match self {
            Action::Integer(a) => {
                a.cover(target_action);
                Ok(())
            }
            Action::Neural(a) => a.cover(num_inputs, input, target_action, params, rng),
        }
    }

    /// `mutate` (spec §4.4 vtable). Returns whether anything changed.
    pub fn mutate(&mut self, params: &Params, rng: &mut impl Rng) -> bool {
        match self {
            Action::Integer(a) => a.mutate(params, rng),
            Action::Neural(a) => a.mutate(params, rng),
        }
    }

    /// `crossover` (spec §4.4 vtable). A no-op between mismatched variants
    /// or for the neural substrate, mirroring `Condition::crossover`'s
    /// fallback for kinds that have no splice operation defined.
    pub fn crossover(a: &mut Action, b: &mut Action, rng: &mut impl Rng) {
        if let (Action::Integer(a), Action::Integer(b)) = (a, b) {
            IntegerAction::crossover(a, b, rng);
        }
    }

    pub fn print(&self) -> String {
        match self {
            Action::Integer(a) => format!("integer_action({})", a.action),
            Action::Neural(_) => "neural_action".to_string(),
        }
    }

    pub fn save(&self, w: &mut dyn Write) -> XcsfResult<()> {
        match self {
            Action::Integer(a) => a.save(w),
            Action::Neural(a) => a.save(w),
        }
    }

    pub fn load(act_type: ActionType, r: &mut dyn Read) -> XcsfResult<Self> {
        Ok(match act_type {
            ActionType::Integer => Action::Integer(IntegerAction::load(r)?),
            ActionType::Neural => Action::Neural(NeuralAction::load(r)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::tests_support::sample;
    use rand::SeedableRng;

    fn params_for(act_type: ActionType) -> Params {
        let mut p = sample();
        p.act_type = act_type;
        p
    }

    #[test]
    fn integer_action_cover_adopts_target_action() {
        let params = params_for(ActionType::Integer);
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut action = Action::init(3, 5, &params, &mut rng).unwrap();
        action.cover(3, &[0.0, 0.0, 0.0], 2, &params, &mut rng).unwrap();
        assert_eq!(action.compute(&[0.0, 0.0, 0.0]).unwrap(), 2);
    }

    #[test]
    fn integer_action_mutate_always_changes_to_a_different_action() {
        let mut params = params_for(ActionType::Integer);
        params.p_mutation = 1.0;
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let mut action = Action::init(1, 4, &params, &mut rng).unwrap();
        let before = action.compute(&[]).unwrap();
        let changed = action.mutate(&params, &mut rng);
        let after = action.compute(&[]).unwrap();
        assert!(changed);
        assert_ne!(before, after);
    }

    #[test]
    fn neural_action_cover_terminates_and_matches_target_s6_style() {
        let params = params_for(ActionType::Neural);
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let mut action = Action::init(4, 3, &params, &mut rng).unwrap();
        let input = [0.1, 0.2, 0.3, 0.4];
        action.cover(4, &input, 1, &params, &mut rng).unwrap();
        assert_eq!(action.compute(&input).unwrap(), 1);
    }

    #[test]
    fn action_save_load_round_trips_compute_behavior() {
        let params = params_for(ActionType::Integer);
        let mut rng = rand::rngs::StdRng::seed_from_u64(4);
        let mut action = Action::init(2, 6, &params, &mut rng).unwrap();
        action.cover(2, &[0.0, 0.0], 5, &params, &mut rng).unwrap();
        let mut buf = Vec::new();
        action.save(&mut buf).unwrap();
        let mut reloaded = Action::load(ActionType::Integer, &mut &buf[..]).unwrap();
        assert_eq!(action.compute(&[0.0, 0.0]).unwrap(), reloaded.compute(&[0.0, 0.0]).unwrap());
    }
}
