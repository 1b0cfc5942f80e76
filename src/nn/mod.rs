//! L1 — the neural-network engine (spec §2 L1, §4.1 layer contract, §4.2
//! net engine).
//!
//! [`layer::Layer`] is the uniform operation set every concrete layer kind
//! implements; [`layer_args::LayerArgs`] is the config-time template chain
//! that gets validated once and consumed into a [`net::Net`]; `layers::*`
//! holds the ten concrete kinds (spec §4.1 "Layer kinds").

pub mod layer;
pub mod layer_args;
pub mod layers;
pub mod net;

pub use layer::{Layer, LayerCore, LayerKind, LayerOptions};
pub use layer_args::LayerArgs;
pub use net::Net;
