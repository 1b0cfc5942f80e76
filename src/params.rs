//! L0 — the immutable hyperparameter bundle (spec §3 "Hyperparameters",
//! §6 "Configuration").
//!
//! `Params` is built once by [`crate::config::load`] (or assembled directly
//! for tests) and then referenced read-only by every substrate. Nothing in
//! this crate mutates a `Params` after construction; that is what makes it
//! safe to share across classifiers evaluated in parallel by an outer loop
//! (spec §5).

use serde::{Deserialize, Serialize};

use crate::activations::Activation;

/// Selection operator for the (external) evolutionary loop. The core only
/// stores the tag; selection itself is outside this crate's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EaSelectType {
    Roulette,
    Tournament,
}

/// Condition substrate tags (spec §4.4 catalogue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    Ternary,
    Rectangle,
    Ellipsoid,
    GpTree,
    Neural,
    Dgp,
}

/// Prediction substrate tags (spec §4.4 catalogue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionType {
    Constant,
    NlmsLinear,
    NlmsQuadratic,
    RlsLinear,
    RlsQuadratic,
    Neural,
}

/// Action substrate tags (spec §4.4 catalogue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    Integer,
    Neural,
}

/// The self-adaptive mutation operator kind (spec §4.3 "SAM").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamType {
    /// Discrete ladder of candidate rates (`SAM_RATE_SELECT`).
    RateSelect,
    /// Continuous log-normal update.
    LogNormal,
}

/// The full tuning bundle. Field names track the config keys of spec §6
/// (snake_cased); every recognized key has a home here even when this core
/// only consumes a subset of them directly — the remainder (`POP_SIZE`,
/// `GAMMA`, ...) are read by the outer evolutionary/RL loop that is out of
/// this crate's scope, but the core is the thing that parses and stores
/// them, so they are specified here too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    // --- evolutionary-loop parameters (consumed by the outer GA) ---
    pub pop_size: usize,
    pub max_trials: u64,
    pub theta_ea: f64,
    pub theta_del: f64,
    pub theta_sub: f64,
    pub beta: f64,
    pub alpha: f64,
    pub nu: f64,
    pub delta: f64,
    pub eps_0: f64,
    pub err_reduc: f64,
    pub fit_reduc: f64,
    pub init_error: f64,
    pub init_fitness: f64,
    pub ea_select_type: EaSelectType,
    pub ea_select_size: f64,
    pub ea_subsumption: bool,
    pub set_subsumption: bool,
    pub p_crossover: f64,
    pub lambda: usize,

    // --- RL glue (consumed by the outer RL loop) ---
    pub gamma: f64,
    pub p_explore: f64,
    pub teletransportation: usize,
    pub max_t: usize,
    pub max_k: usize,
    pub perf_avg_trials: usize,

    // --- substrate selectors ---
    pub cond_type: ConditionType,
    pub pred_type: PredictionType,
    pub act_type: ActionType,

    // --- SAM controls ---
    pub sam_type: SamType,
    pub sam_num: usize,
    pub sam_min: f64,

    // --- GP controls ---
    pub gp_num_cons: usize,
    pub gp_init_depth: usize,

    // --- NN topology ---
    pub cond_num_hidden_neurons: usize,
    pub cond_max_hidden_neurons: usize,
    pub cond_hidden_neuron_activation: Activation,
    pub pred_num_hidden_neurons: usize,
    pub pred_max_hidden_neurons: usize,
    pub pred_hidden_neuron_activation: Activation,

    // --- training ---
    pub pred_eta: f64,
    pub pred_momentum: f64,
    pub pred_rls_lambda: f64,
    pub pred_rls_scale_factor: f64,
    pub pred_x0: f64,
    pub pred_sgd_weights: bool,
    pub pred_evolve_eta: bool,
    pub pred_reset: bool,

    // --- condition ranges ---
    pub cond_min: f64,
    pub cond_max: f64,
    pub cond_smin: f64,
    pub cond_eta: f64,

    // --- evolution flags ---
    pub cond_evolve_weights: bool,
    pub cond_evolve_neurons: bool,
    pub cond_evolve_functions: bool,
    pub pred_evolve_weights: bool,
    pub pred_evolve_neurons: bool,
    pub pred_evolve_functions: bool,

    // --- mutation probabilities ---
    pub p_mutation: f64,
    pub f_mutation: f64,
    pub s_mutation: f64,
    pub e_mutation: f64,

    // --- loss / parallelism (external collaborators, tag only) ---
    pub loss_func: String,
    pub omp_num_threads: usize,

    /// Shared GP terminal constants (spec §3 "Shared GP constants"):
    /// drawn once, uniformly, in `[cond_min, cond_max]`, length
    /// `gp_num_cons`. Stored on the bundle per design note "Global mutable
    /// state" rather than as a process-wide singleton.
    pub gp_constants: Vec<f64>,
}

impl Params {
    /// Draws the shared GP constants. Called once by [`crate::config::load`]
    /// after the rest of the bundle is populated.
    pub fn roll_gp_constants(&mut self, rng: &mut impl rand::Rng) {
        use rand::distributions::Uniform;
        let dist = Uniform::new_inclusive(self.cond_min, self.cond_max);
        self.gp_constants = (0..self.gp_num_cons).map(|_| rng.sample(dist)).collect();
    }
}

/// Builds a representative `Params` for use by other modules' unit tests,
/// so each substrate doesn't have to hand-roll a 60-field literal just to
/// exercise its own logic.
#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    pub fn sample() -> Params {
        Params {
            pop_size: 200,
            max_trials: 100_000,
            theta_ea: 25.0,
            theta_del: 20.0,
            theta_sub: 20.0,
            beta: 0.1,
            alpha: 0.1,
            nu: 5.0,
            delta: 0.1,
            eps_0: 0.01,
            err_reduc: 1.0,
            fit_reduc: 0.1,
            init_error: 0.0,
            init_fitness: 0.01,
            ea_select_type: EaSelectType::Roulette,
            ea_select_size: 0.4,
            ea_subsumption: false,
            set_subsumption: false,
            p_crossover: 0.8,
            lambda: 2,
            gamma: 0.95,
            p_explore: 0.0,
            teletransportation: 50,
            max_t: 100,
            max_k: 2,
            perf_avg_trials: 1000,
            cond_type: ConditionType::GpTree,
            pred_type: PredictionType::NlmsLinear,
            act_type: ActionType::Integer,
            sam_type: SamType::LogNormal,
            sam_num: 1,
            sam_min: 0.0001,
            gp_num_cons: 10,
            gp_init_depth: 5,
            cond_num_hidden_neurons: 5,
            cond_max_hidden_neurons: 20,
            cond_hidden_neuron_activation: Activation::Relu,
            pred_num_hidden_neurons: 5,
            pred_max_hidden_neurons: 20,
            pred_hidden_neuron_activation: Activation::Relu,
            pred_eta: 0.1,
            pred_momentum: 0.9,
            pred_rls_lambda: 1.0,
            pred_rls_scale_factor: 1000.0,
            pred_x0: 1.0,
            pred_sgd_weights: true,
            pred_evolve_eta: false,
            pred_reset: false,
            cond_min: -1.0,
            cond_max: 1.0,
            cond_smin: 0.1,
            cond_eta: 0.1,
            cond_evolve_weights: true,
            cond_evolve_neurons: false,
            cond_evolve_functions: false,
            pred_evolve_weights: true,
            pred_evolve_neurons: false,
            pred_evolve_functions: false,
            p_mutation: 0.1,
            f_mutation: 0.1,
            s_mutation: 0.1,
            e_mutation: 0.1,
            loss_func: "mae".to_string(),
            omp_num_threads: 1,
            gp_constants: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::sample;

    #[test]
    fn gp_constants_are_drawn_within_range_and_right_length() {
        use rand::SeedableRng;
        let mut params = sample();
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        params.roll_gp_constants(&mut rng);
        assert_eq!(params.gp_constants.len(), params.gp_num_cons);
        for &c in &params.gp_constants {
            assert!(c >= params.cond_min && c <= params.cond_max);
        }
    }
}
