//! L2 — the polymorphic classifier parts (spec §2 L2, §4.4).
//!
//! `condition`/`prediction`/`action` each expose one tagged enum
//! (`Condition`/`Prediction`/`Action`) standing in for the upstream
//! `(type_tag, state, vtable)` triple, per design note "Vtable dispatch ->
//! sum types or trait objects". [`ClassifierParts`] is the thin object
//! that ties the three slots together the way a classifier's
//! representation does — it owns exactly the three substrate instances
//! and forwards each spec §4.4 operation to all three, or to the one slot
//! the operation names.
//!
//! Bookkeeping a full classifier also carries (fitness, error, experience,
//! numerosity, action-set size, ...) belongs to the outer evolutionary
//! loop (spec §1 "Deliberately out of scope") and has no home here.

pub mod action;
pub mod condition;
pub mod prediction;

pub use action::Action;
pub use condition::Condition;
pub use prediction::Prediction;

use std::io::{Read, Write};

use rand::Rng;

use crate::errors::XcsfResult;
use crate::params::Params;

/// The three representation slots of one classifier (spec §4.4: "Each
/// classifier holds three slots — condition, prediction, action").
#[derive(Debug, Clone)]
pub struct ClassifierParts {
    pub condition: Condition,
    pub prediction: Prediction,
    pub action: Action,
}

impl ClassifierParts {
    /// `init` (spec §4.4 vtable): installs the substrate each `*_TYPE`
    /// hyperparameter selects, once, at classifier creation.
    pub fn init(num_inputs: usize, num_actions: usize, params: &Params, rng: &mut impl Rng) -> XcsfResult<Self> {
        Ok(Self {
            condition: Condition::init(num_inputs, params, rng)?,
            prediction: Prediction::init(num_inputs, params, rng)?,
            action: Action::init(num_inputs, num_actions, params, rng)?,
        })
    }

    /// `cover` (spec §4.4): mutates the condition (and, if neural, the
    /// action) until both match/advocate `input`/`target_action`; the
    /// prediction substrate re-initializes the same way `init` does (it
    /// has no geometric notion of matching).
    pub fn cover(
        &mut self,
        num_inputs: usize,
        input: &[f64],
        target_action: usize,
        params: &Params,
        rng: &mut impl Rng,
    ) -> XcsfResult<()> {
        self.condition.cover(params, input, rng)?;
        self.prediction.cover(num_inputs, params, rng)?;
        self.action.cover(num_inputs, input, target_action, params, rng)?;
        Ok(())
    }

    /// `match`/`compute` (spec §4.4 vtable): whether this classifier's
    /// condition matches `input`. Callers only consult `prediction`/
    /// `action` for classifiers already known to match.
    pub fn matches(&mut self, params: &Params, input: &[f64]) -> XcsfResult<bool> {
        self.condition.compute(params, input)
    }

    /// `compute` on the prediction slot: this classifier's predicted
    /// scalar for `input`.
    pub fn predict(&mut self, input: &[f64]) -> XcsfResult<f64> {
        self.prediction.compute(input)
    }

    /// `compute` on the action slot: this classifier's advocated action
    /// id for `input`.
    pub fn act(&mut self, input: &[f64]) -> XcsfResult<usize> {
        self.action.compute(input)
    }

    /// `update` (spec §4.4 vtable): the prediction substrate's own online
    /// training step. Condition/action do not train from `(input, truth)`
    /// pairs — they are shaped exclusively by `mutate`/`cover`.
    pub fn update(&mut self, params: &Params, input: &[f64], truth: f64) -> XcsfResult<()> {
        self.prediction.update(params, input, truth)
    }

    /// `mutate` (spec §4.4 vtable): attempts a mutation on each slot,
    /// returning whether any of the three changed.
    pub fn mutate(&mut self, params: &Params, rng: &mut impl Rng) -> bool {
        let c = self.condition.mutate(params, rng);
        let p = self.prediction.mutate(params, rng);
        let a = self.action.mutate(params, rng);
        c || p || a
    }

    /// `crossover` (spec §4.4 vtable): splices each slot independently
    /// between two parents, gated by `P_CROSSOVER` at the caller's
    /// discretion (this crate exposes the unconditional per-slot splice;
    /// the outer GA decides whether/when to invoke it, spec §1).
    pub fn crossover(a: &mut ClassifierParts, b: &mut ClassifierParts, rng: &mut impl Rng) {
        Condition::crossover(&mut a.condition, &mut b.condition, rng);
        Action::crossover(&mut a.action, &mut b.action, rng);
    }

    pub fn print(&self) -> String {
        format!(
            "condition={} prediction={} action={}",
            self.condition.print(),
            self.prediction.print(),
            self.action.print()
        )
    }

    /// `save` (spec §4.4 vtable): each slot's own serialization, one after
    /// another. The `*_TYPE` tags themselves are assumed known to the
    /// caller (read from the shared `Params`) rather than re-written per
    /// classifier, mirroring how the net/GP persistence formats in spec §6
    /// never repeat information already fixed by configuration.
    pub fn save(&self, w: &mut dyn Write) -> XcsfResult<()> {
        self.condition.save(w)?;
        self.prediction.save(w)?;
        self.action.save(w)
    }

    pub fn load(params: &Params, r: &mut dyn Read, rng: &mut impl Rng) -> XcsfResult<Self> {
        let condition = Condition::load(params.cond_type, params, r, rng)?;
        let prediction = Prediction::load(params.pred_type, r)?;
        let action = Action::load(params.act_type, r)?;
        Ok(Self { condition, prediction, action })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::tests_support::sample;
    use rand::SeedableRng;

    #[test]
    fn cover_produces_a_classifier_that_matches_and_advocates() {
        let mut params = sample();
        params.cond_type = crate::params::ConditionType::Rectangle;
        params.act_type = crate::params::ActionType::Integer;
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut parts = ClassifierParts::init(3, 4, &params, &mut rng).unwrap();
        let input = [0.2, -0.4, 0.9];
        parts.cover(3, &input, 2, &params, &mut rng).unwrap();
        assert!(parts.matches(&params, &input).unwrap());
        assert_eq!(parts.act(&input).unwrap(), 2);
    }

    #[test]
    fn save_load_round_trips_matching_and_prediction_behavior() {
        let mut params = sample();
        params.cond_type = crate::params::ConditionType::Ternary;
        params.pred_type = crate::params::PredictionType::NlmsLinear;
        params.act_type = crate::params::ActionType::Integer;
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let mut parts = ClassifierParts::init(2, 3, &params, &mut rng).unwrap();
        let input = [0.3, -0.1];
        parts.cover(2, &input, 1, &params, &mut rng).unwrap();
        parts.update(&params, &input, 5.0).unwrap();

        let mut buf = Vec::new();
        parts.save(&mut buf).unwrap();
        let mut reloaded = ClassifierParts::load(&params, &mut &buf[..], &mut rng).unwrap();

        assert_eq!(parts.matches(&params, &input).unwrap(), reloaded.matches(&params, &input).unwrap());
        assert_eq!(parts.predict(&input).unwrap(), reloaded.predict(&input).unwrap());
        assert_eq!(parts.act(&input).unwrap(), reloaded.act(&input).unwrap());
    }

    #[test]
    fn mutate_returns_true_iff_some_slot_changed() {
        let mut params = sample();
        params.cond_type = crate::params::ConditionType::Rectangle;
        params.p_mutation = 1.0;
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let mut parts = ClassifierParts::init(3, 2, &params, &mut rng).unwrap();
        let before = parts.print();
        let changed = parts.mutate(&params, &mut rng);
        assert_eq!(changed, before != parts.print());
    }
}
