//! Shared fixtures for the black-box scenario tests (spec §8).
//!
//! Builds a representative [`xcsf_core::Params`] by running the real
//! config-file parser (spec §6) over a literal config text, rather than
//! hand-rolling a struct literal per test file — this exercises the same
//! path a host embedding the crate would use.

use xcsf_core::config;
use xcsf_core::Params;

pub const SAMPLE_CONFIG: &str = r#"
POP_SIZE=200
MAX_TRIALS=100000
THETA_EA=25
THETA_DEL=20
THETA_SUB=20
BETA=0.1
ALPHA=0.1
NU=5
DELTA=0.1
EPS_0=0.01
ERR_REDUC=1.0
FIT_REDUC=0.1
INIT_ERROR=0
INIT_FITNESS=0.01
EA_SELECT_TYPE=roulette
EA_SELECT_SIZE=0.4
EA_SUBSUMPTION=false
SET_SUBSUMPTION=false
P_CROSSOVER=0.8
LAMBDA=2
GAMMA=0.95
P_EXPLORE=0
TELETRANSPORTATION=50
MAX_T=100
MAX_K=2
PERF_AVG_TRIALS=1000
COND_TYPE=gp_tree
PRED_TYPE=nlms_linear
ACT_TYPE=integer
SAM_TYPE=log_normal
SAM_NUM=1
SAM_MIN=0.0001
GP_NUM_CONS=10
GP_INIT_DEPTH=5
COND_NUM_HIDDEN_NEURONS=5
COND_MAX_HIDDEN_NEURONS=20
COND_HIDDEN_NEURON_ACTIVATION=relu
PRED_NUM_HIDDEN_NEURONS=5
PRED_MAX_HIDDEN_NEURONS=20
PRED_HIDDEN_NEURON_ACTIVATION=relu
PRED_ETA=0.1
PRED_MOMENTUM=0.9
PRED_RLS_LAMBDA=1.0
PRED_RLS_SCALE_FACTOR=1000
PRED_X0=1.0
PRED_SGD_WEIGHTS=true
PRED_EVOLVE_ETA=false
PRED_RESET=false
COND_MIN=-1
COND_MAX=1
COND_SMIN=0.1
COND_ETA=0.1
COND_EVOLVE_WEIGHTS=true
COND_EVOLVE_NEURONS=false
COND_EVOLVE_FUNCTIONS=false
PRED_EVOLVE_WEIGHTS=true
PRED_EVOLVE_NEURONS=false
PRED_EVOLVE_FUNCTIONS=false
P_MUTATION=0.1
F_MUTATION=0.1
S_MUTATION=1
E_MUTATION=0.1
LOSS_FUNC=mae
OMP_NUM_THREADS=1
"#;

pub fn sample_params() -> Params {
    let mut rng = rand::rngs::StdRng::from_seed(SEED);
    config::load(SAMPLE_CONFIG, &mut rng).expect("sample config should parse")
}

pub const SEED: [u8; 32] = [7u8; 32];

use rand::SeedableRng;
