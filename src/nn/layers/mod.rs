//! The ten concrete layer kinds the core recognizes (spec §4.1 "Layer
//! kinds"), plus the kind-keyed construction/shell dispatch used by
//! [`crate::nn::layer_args::LayerArgs::into_net`] and
//! [`crate::nn::net::Net::load`].

mod connected;
mod convolutional;
mod lstm;
mod pooling;
mod recurrent;
mod shaping;

pub use connected::ConnectedLayer;
pub use convolutional::ConvolutionalLayer;
pub use lstm::LstmLayer;
pub use pooling::{AvgPoolLayer, MaxPoolLayer};
pub use recurrent::RecurrentLayer;
pub use shaping::{DropoutLayer, NoiseLayer, SoftmaxLayer, UpsampleLayer};

use rand::Rng;

use crate::errors::XcsfResult;
use crate::nn::layer::{Layer, LayerKind};
use crate::nn::layer_args::LayerArgs;
use crate::params::Params;

/// Instantiates the concrete layer a `LayerArgs` node describes.
pub fn build(args: &LayerArgs, params: &Params, rng: &mut impl Rng) -> XcsfResult<Box<dyn Layer>> {
    Ok(match args.kind {
        LayerKind::Connected => Box::new(ConnectedLayer::new(args, params, rng)),
        LayerKind::Convolutional => Box::new(ConvolutionalLayer::new(args, params, rng)),
        LayerKind::Recurrent => Box::new(RecurrentLayer::new(args, params, rng)),
        LayerKind::Lstm => Box::new(LstmLayer::new(args, params, rng)),
        LayerKind::Softmax => Box::new(SoftmaxLayer::new(args, params, rng)),
        LayerKind::Dropout => Box::new(DropoutLayer::new(args, params, rng)),
        LayerKind::Noise => Box::new(NoiseLayer::new(args, params, rng)),
        LayerKind::AvgPool => Box::new(AvgPoolLayer::new(args, params, rng)),
        LayerKind::MaxPool => Box::new(MaxPoolLayer::new(args, params, rng)),
        LayerKind::Upsample => Box::new(UpsampleLayer::new(args, params, rng)),
    })
}

/// A throwaway `Params` good for nothing but feeding the `rng`-seeded
/// constructors invoked by [`empty_shell`] — every field those
/// constructors read (`sam_min`, `sam_type`) gets a harmless placeholder;
/// [`crate::nn::net::Net::load`] overwrites all resulting layer state
/// immediately afterwards.
fn shell_params() -> Params {
    use crate::params::{ActionType, ConditionType, EaSelectType, PredictionType, SamType};
    Params {
        pop_size: 1,
        max_trials: 1,
        theta_ea: 1.0,
        theta_del: 1.0,
        theta_sub: 1.0,
        beta: 0.1,
        alpha: 0.1,
        nu: 1.0,
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
        lambda: 1,
        gamma: 0.95,
        p_explore: 0.0,
        teletransportation: 1,
        max_t: 1,
        max_k: 1,
        perf_avg_trials: 1,
        cond_type: ConditionType::GpTree,
        pred_type: PredictionType::Constant,
        act_type: ActionType::Integer,
        sam_type: SamType::LogNormal,
        sam_num: 1,
        sam_min: 0.0001,
        gp_num_cons: 0,
        gp_init_depth: 1,
        cond_num_hidden_neurons: 1,
        cond_max_hidden_neurons: 1,
        cond_hidden_neuron_activation: crate::activations::Activation::Relu,
        pred_num_hidden_neurons: 1,
        pred_max_hidden_neurons: 1,
        pred_hidden_neuron_activation: crate::activations::Activation::Relu,
        pred_eta: 0.1,
        pred_momentum: 0.0,
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

/// A minimal 1x1 placeholder of the given kind, suitable only as a
/// `load()` target: [`crate::nn::net::Net::load`] overwrites its
/// `LayerCore` and kind-specific payload immediately after construction.
pub fn empty_shell(kind: LayerKind) -> Box<dyn Layer> {
    let mut rng = rand::thread_rng();
    let params = shell_params();
    let args = LayerArgs::dense(1, 1, crate::activations::Activation::Linear);
    match kind {
        LayerKind::Connected => Box::new(ConnectedLayer::new(&args, &params, &mut rng)),
        LayerKind::Convolutional => {
            let mut a = args.clone();
            a.kind = LayerKind::Convolutional;
            a.channels = 1;
            a.kernel_size = 1;
            a.stride = 1;
            Box::new(ConvolutionalLayer::new(&a, &params, &mut rng))
        }
        LayerKind::Recurrent => Box::new(RecurrentLayer::new(&args, &params, &mut rng)),
        LayerKind::Lstm => Box::new(LstmLayer::new(&args, &params, &mut rng)),
        LayerKind::Softmax => Box::new(SoftmaxLayer::new(&args, &params, &mut rng)),
        LayerKind::Dropout => Box::new(DropoutLayer::new(&args, &params, &mut rng)),
        LayerKind::Noise => Box::new(NoiseLayer::new(&args, &params, &mut rng)),
        LayerKind::AvgPool => {
            let mut a = args.clone();
            a.pool_size = 1;
            Box::new(AvgPoolLayer::new(&a, &params, &mut rng))
        }
        LayerKind::MaxPool => {
            let mut a = args.clone();
            a.pool_size = 1;
            Box::new(MaxPoolLayer::new(&a, &params, &mut rng))
        }
        LayerKind::Upsample => {
            let mut a = args.clone();
            a.pool_size = 1;
            Box::new(UpsampleLayer::new(&a, &params, &mut rng))
        }
    }
}
