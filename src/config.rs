//! L0 — the config-file parser (spec §6 "Configuration").
//!
//! Plain-text `key=value`, `#` comments, one pair per line, trimmed of
//! surrounding whitespace. Integers parse in base 10, reals in native
//! floating-point text, booleans as the literal string `true`/`false`
//! (anything else is `false`). Missing keys are fatal.
//!
//! Resolves spec §9 Open Question (a): an all-whitespace line is treated as
//! blank (skipped), not an error — trimming it yields an empty string,
//! which falls into the same "skip" branch as a truly empty line.

use std::collections::HashMap;

use rand::Rng;

use crate::activations::Activation;
use crate::errors::{XcsfError, XcsfResult};
use crate::params::{ActionType, ConditionType, EaSelectType, Params, PredictionType, SamType};

/// Parses the raw text of a config file into a key -> value map, applying
/// comment-stripping and whitespace trimming but no type interpretation.
fn tokenize(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    map
}

struct Reader<'a> {
    map: &'a HashMap<String, String>,
}

impl<'a> Reader<'a> {
    fn raw(&self, key: &str) -> XcsfResult<&'a str> {
        self.map
            .get(key)
            .map(|s| s.as_str())
            .ok_or_else(|| XcsfError::MissingConfigKey(key.to_string()))
    }

    fn string(&self, key: &str) -> XcsfResult<String> {
        self.raw(key).map(|s| s.to_string())
    }

    fn f64(&self, key: &str) -> XcsfResult<f64> {
        let raw = self.raw(key)?;
        raw.parse::<f64>()
            .map_err(|_| XcsfError::InvalidConfigValue { key: key.to_string(), value: raw.to_string() })
    }

    fn usize(&self, key: &str) -> XcsfResult<usize> {
        let raw = self.raw(key)?;
        raw.parse::<usize>()
            .map_err(|_| XcsfError::InvalidConfigValue { key: key.to_string(), value: raw.to_string() })
    }

    fn u64(&self, key: &str) -> XcsfResult<u64> {
        let raw = self.raw(key)?;
        raw.parse::<u64>()
            .map_err(|_| XcsfError::InvalidConfigValue { key: key.to_string(), value: raw.to_string() })
    }

    fn bool(&self, key: &str) -> XcsfResult<bool> {
        Ok(self.raw(key)? == "true")
    }
}

fn parse_ea_select_type(raw: &str) -> XcsfResult<EaSelectType> {
    match raw {
        "roulette" => Ok(EaSelectType::Roulette),
        "tournament" => Ok(EaSelectType::Tournament),
        _ => Err(XcsfError::InvalidConfigValue { key: "EA_SELECT_TYPE".to_string(), value: raw.to_string() }),
    }
}

fn parse_condition_type(raw: &str) -> XcsfResult<ConditionType> {
    match raw {
        "ternary" => Ok(ConditionType::Ternary),
        "rectangle" => Ok(ConditionType::Rectangle),
        "ellipsoid" => Ok(ConditionType::Ellipsoid),
        "gp_tree" => Ok(ConditionType::GpTree),
        "neural" => Ok(ConditionType::Neural),
        "dgp" => Ok(ConditionType::Dgp),
        _ => Err(XcsfError::InvalidConfigValue { key: "COND_TYPE".to_string(), value: raw.to_string() }),
    }
}

fn parse_prediction_type(raw: &str) -> XcsfResult<PredictionType> {
    match raw {
        "constant" => Ok(PredictionType::Constant),
        "nlms_linear" => Ok(PredictionType::NlmsLinear),
        "nlms_quadratic" => Ok(PredictionType::NlmsQuadratic),
        "rls_linear" => Ok(PredictionType::RlsLinear),
        "rls_quadratic" => Ok(PredictionType::RlsQuadratic),
        "neural" => Ok(PredictionType::Neural),
        _ => Err(XcsfError::InvalidConfigValue { key: "PRED_TYPE".to_string(), value: raw.to_string() }),
    }
}

fn parse_action_type(raw: &str) -> XcsfResult<ActionType> {
    match raw {
        "integer" => Ok(ActionType::Integer),
        "neural" => Ok(ActionType::Neural),
        _ => Err(XcsfError::InvalidConfigValue { key: "ACT_TYPE".to_string(), value: raw.to_string() }),
    }
}

fn parse_sam_type(raw: &str) -> XcsfResult<SamType> {
    match raw {
        "rate_select" => Ok(SamType::RateSelect),
        "log_normal" => Ok(SamType::LogNormal),
        _ => Err(XcsfError::InvalidConfigValue { key: "SAM_TYPE".to_string(), value: raw.to_string() }),
    }
}

fn parse_activation(key: &str, raw: &str) -> XcsfResult<Activation> {
    match raw {
        "logistic" => Ok(Activation::Logistic),
        "relu" => Ok(Activation::Relu),
        "tanh" => Ok(Activation::Tanh),
        "linear" => Ok(Activation::Linear),
        "gaussian" => Ok(Activation::Gaussian),
        "sin" => Ok(Activation::Sin),
        "soft_plus" => Ok(Activation::SoftPlus),
        "selu" => Ok(Activation::Selu),
        "leaky" => Ok(Activation::Leaky),
        "loggy" => Ok(Activation::Loggy),
        _ => Err(XcsfError::InvalidConfigValue { key: key.to_string(), value: raw.to_string() }),
    }
}

/// Parses `text` and builds a fully-populated [`Params`], including rolling
/// the shared GP constants. Any missing or malformed key is fatal per spec
/// §7 ("Configuration errors").
pub fn load(text: &str, rng: &mut impl Rng) -> XcsfResult<Params> {
    let map = tokenize(text);
    let r = Reader { map: &map };

    let mut params = Params {
        pop_size: r.usize("POP_SIZE")?,
        max_trials: r.u64("MAX_TRIALS")?,
        theta_ea: r.f64("THETA_EA")?,
        theta_del: r.f64("THETA_DEL")?,
        theta_sub: r.f64("THETA_SUB")?,
        beta: r.f64("BETA")?,
        alpha: r.f64("ALPHA")?,
        nu: r.f64("NU")?,
        delta: r.f64("DELTA")?,
        eps_0: r.f64("EPS_0")?,
        err_reduc: r.f64("ERR_REDUC")?,
        fit_reduc: r.f64("FIT_REDUC")?,
        init_error: r.f64("INIT_ERROR")?,
        init_fitness: r.f64("INIT_FITNESS")?,
        ea_select_type: parse_ea_select_type(&r.string("EA_SELECT_TYPE")?)?,
        ea_select_size: r.f64("EA_SELECT_SIZE")?,
        ea_subsumption: r.bool("EA_SUBSUMPTION")?,
        set_subsumption: r.bool("SET_SUBSUMPTION")?,
        p_crossover: r.f64("P_CROSSOVER")?,
        lambda: r.usize("LAMBDA")?,

        gamma: r.f64("GAMMA")?,
        p_explore: r.f64("P_EXPLORE")?,
        teletransportation: r.usize("TELETRANSPORTATION")?,
        max_t: r.usize("MAX_T")?,
        max_k: r.usize("MAX_K")?,
        perf_avg_trials: r.usize("PERF_AVG_TRIALS")?,

        cond_type: parse_condition_type(&r.string("COND_TYPE")?)?,
        pred_type: parse_prediction_type(&r.string("PRED_TYPE")?)?,
        act_type: parse_action_type(&r.string("ACT_TYPE")?)?,

        sam_type: parse_sam_type(&r.string("SAM_TYPE")?)?,
        sam_num: r.usize("SAM_NUM")?,
        sam_min: r.f64("SAM_MIN")?,

        gp_num_cons: r.usize("GP_NUM_CONS")?,
        gp_init_depth: r.usize("GP_INIT_DEPTH")?,

        cond_num_hidden_neurons: r.usize("COND_NUM_HIDDEN_NEURONS")?,
        cond_max_hidden_neurons: r.usize("COND_MAX_HIDDEN_NEURONS")?,
        cond_hidden_neuron_activation: parse_activation(
            "COND_HIDDEN_NEURON_ACTIVATION",
            &r.string("COND_HIDDEN_NEURON_ACTIVATION")?,
        )?,
        pred_num_hidden_neurons: r.usize("PRED_NUM_HIDDEN_NEURONS")?,
        pred_max_hidden_neurons: r.usize("PRED_MAX_HIDDEN_NEURONS")?,
        pred_hidden_neuron_activation: parse_activation(
            "PRED_HIDDEN_NEURON_ACTIVATION",
            &r.string("PRED_HIDDEN_NEURON_ACTIVATION")?,
        )?,

        pred_eta: r.f64("PRED_ETA")?,
        pred_momentum: r.f64("PRED_MOMENTUM")?,
        pred_rls_lambda: r.f64("PRED_RLS_LAMBDA")?,
        pred_rls_scale_factor: r.f64("PRED_RLS_SCALE_FACTOR")?,
        pred_x0: r.f64("PRED_X0")?,
        pred_sgd_weights: r.bool("PRED_SGD_WEIGHTS")?,
        pred_evolve_eta: r.bool("PRED_EVOLVE_ETA")?,
        pred_reset: r.bool("PRED_RESET")?,

        cond_min: r.f64("COND_MIN")?,
        cond_max: r.f64("COND_MAX")?,
        cond_smin: r.f64("COND_SMIN")?,
        cond_eta: r.f64("COND_ETA")?,

        cond_evolve_weights: r.bool("COND_EVOLVE_WEIGHTS")?,
        cond_evolve_neurons: r.bool("COND_EVOLVE_NEURONS")?,
        cond_evolve_functions: r.bool("COND_EVOLVE_FUNCTIONS")?,
        pred_evolve_weights: r.bool("PRED_EVOLVE_WEIGHTS")?,
        pred_evolve_neurons: r.bool("PRED_EVOLVE_NEURONS")?,
        pred_evolve_functions: r.bool("PRED_EVOLVE_FUNCTIONS")?,

        p_mutation: r.f64("P_MUTATION")?,
        f_mutation: r.f64("F_MUTATION")?,
        s_mutation: r.f64("S_MUTATION")?,
        e_mutation: r.f64("E_MUTATION")?,

        loss_func: r.string("LOSS_FUNC")?,
        omp_num_threads: r.usize("OMP_NUM_THREADS")?,

        gp_constants: Vec::new(),
    };

    params.roll_gp_constants(rng);
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# a representative config file
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

    #[test]
    fn parses_a_well_formed_file() {
        let mut rng = rand::thread_rng();
        let params = load(SAMPLE, &mut rng).expect("should parse");
        assert_eq!(params.pop_size, 200);
        assert_eq!(params.gp_constants.len(), 10);
        assert_eq!(params.cond_type, ConditionType::GpTree);
    }

    #[test]
    fn missing_key_is_fatal() {
        let mut rng = rand::thread_rng();
        let truncated = SAMPLE.replace("POP_SIZE=200\n", "");
        let err = load(&truncated, &mut rng).unwrap_err();
        assert!(matches!(err, XcsfError::MissingConfigKey(ref k) if k == "POP_SIZE"));
    }

    #[test]
    fn whitespace_only_lines_are_silently_skipped() {
        let mut rng = rand::thread_rng();
        let with_ws_line = SAMPLE.replace("GP_INIT_DEPTH=5\n", "GP_INIT_DEPTH=5\n   \t  \n");
        load(&with_ws_line, &mut rng).expect("whitespace-only line should not be fatal");
    }

    #[test]
    fn invalid_bool_literal_is_treated_as_false() {
        let mut rng = rand::thread_rng();
        let tweaked = SAMPLE.replace("EA_SUBSUMPTION=false", "EA_SUBSUMPTION=nope");
        let params = load(&tweaked, &mut rng).expect("should still parse");
        assert!(!params.ea_subsumption);
    }
}
