//! L0 — activation functions shared by every neural layer (spec §2 L0,
//! §4.1 layer `mutate`'s "activations (uniform redraw, probability
//! `f_mutation`)").

use rand::Rng;
use serde::{Deserialize, Serialize};

/// One of the fixed set of activation functions a neuron-bearing layer may
/// use. `mutate`'s function-mutation draws uniformly from this set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    Logistic,
    Relu,
    Tanh,
    Linear,
    Gaussian,
    Sin,
    SoftPlus,
    Selu,
    Leaky,
    Loggy,
}

pub const NUM_ACTIVATIONS: usize = 10;

const ALL: [Activation; NUM_ACTIVATIONS] = [
    Activation::Logistic,
    Activation::Relu,
    Activation::Tanh,
    Activation::Linear,
    Activation::Gaussian,
    Activation::Sin,
    Activation::SoftPlus,
    Activation::Selu,
    Activation::Leaky,
    Activation::Loggy,
];

const SELU_ALPHA: f64 = 1.6732632423543772;
const SELU_SCALE: f64 = 1.0507009873554805;

impl Activation {
    /// Draws one activation uniformly at random — used by `f_mutation`.
    pub fn random(rng: &mut impl Rng) -> Self {
        ALL[rng.gen_range(0..NUM_ACTIVATIONS)]
    }

    /// Applies the activation to a pre-activation scalar.
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Logistic => 1.0 / (1.0 + (-x).exp()),
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Linear => x,
            Activation::Gaussian => (-x * x).exp(),
            Activation::Sin => x.sin(),
            Activation::SoftPlus => (1.0 + x.exp()).ln(),
            Activation::Selu => {
                if x > 0.0 {
                    SELU_SCALE * x
                } else {
                    SELU_SCALE * SELU_ALPHA * (x.exp() - 1.0)
                }
            }
            Activation::Leaky => {
                if x > 0.0 {
                    x
                } else {
                    0.1 * x
                }
            }
            Activation::Loggy => 2.0 / (1.0 + (-x).exp()) - 1.0,
        }
    }

    /// Derivative of the activation with respect to its pre-activation
    /// input, expressed in terms of the already-computed output `y =
    /// apply(x)` where that is cheaper (logistic/tanh family) and in terms
    /// of `x` otherwise.
    pub fn derivative(self, x: f64, y: f64) -> f64 {
        match self {
            Activation::Logistic => y * (1.0 - y),
            Activation::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Tanh => 1.0 - y * y,
            Activation::Linear => 1.0,
            Activation::Gaussian => -2.0 * x * y,
            Activation::Sin => x.cos(),
            Activation::SoftPlus => 1.0 / (1.0 + (-x).exp()),
            Activation::Selu => {
                if x > 0.0 {
                    SELU_SCALE
                } else {
                    y + SELU_SCALE * SELU_ALPHA
                }
            }
            Activation::Leaky => {
                if x > 0.0 {
                    1.0
                } else {
                    0.1
                }
            }
            Activation::Loggy => {
                let z = (y + 1.0) / 2.0;
                2.0 * z * (1.0 - z)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_zeros_negative_inputs_and_gradients() {
        assert_eq!(Activation::Relu.apply(-1.0), 0.0);
        assert_eq!(Activation::Relu.apply(2.0), 2.0);
        assert_eq!(Activation::Relu.derivative(-1.0, 0.0), 0.0);
        assert_eq!(Activation::Relu.derivative(2.0, 2.0), 1.0);
    }

    #[test]
    fn logistic_derivative_matches_closed_form() {
        let y = Activation::Logistic.apply(0.5);
        let d = Activation::Logistic.derivative(0.5, y);
        assert!((d - y * (1.0 - y)).abs() < 1e-12);
    }

    #[test]
    fn random_activation_is_one_of_the_known_set() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let a = Activation::random(&mut rng);
            assert!(ALL.contains(&a));
        }
    }
}
