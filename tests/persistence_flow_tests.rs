//! Black-box persistence round-trip tests (spec §8 invariant 5, scenario
//! S4), grounded in the teacher's `tests/persistence_flow_tests.rs`
//! pattern of building state, writing it out, reloading, and asserting
//! behavioral equality rather than peeking at internals.

mod common;

use std::io::Write;

use rand::SeedableRng;
use xcsf_core::activations::Activation;
use xcsf_core::nn::{LayerArgs, LayerKind, LayerOptions, Net};

/// S4: a 4-layer net (connected -> dropout -> connected -> softmax),
/// random-init, serialized to a buffer, reloaded; invariant 5 (bitwise
/// round trip) plus "propagate on the same input yields the same output".
#[test]
fn s4_four_layer_net_round_trips_through_a_buffer() {
    let params = common::sample_params();
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);

    let mut connected_1 = LayerArgs::dense(4, 6, Activation::Relu);
    connected_1.options = LayerOptions::SGD_WEIGHTS;

    let mut dropout = LayerArgs::dense(6, 6, Activation::Linear);
    dropout.kind = LayerKind::Dropout;
    dropout.probability = 0.3;

    let mut connected_2 = LayerArgs::dense(6, 3, Activation::Relu);
    connected_2.options = LayerOptions::SGD_WEIGHTS;

    let softmax = {
        let mut a = LayerArgs::dense(3, 3, Activation::Linear);
        a.kind = LayerKind::Softmax;
        a
    };

    connected_2.next = Some(Box::new(softmax));
    dropout.next = Some(Box::new(connected_2));
    connected_1.next = Some(Box::new(dropout));

    let mut net = connected_1.into_net(&params, &mut rng).expect("chain should validate and build");
    assert_eq!(net.n_layers(), 4);

    let input = [0.2, -0.1, 0.4, 0.05];
    net.propagate(&input).unwrap();
    let before = net.output().to_vec();

    let mut buf = Vec::new();
    net.save(&mut buf).unwrap();

    let mut reloaded = Net::load(&mut &buf[..]).unwrap();
    let mut rebuf = Vec::new();
    reloaded.save(&mut rebuf).unwrap();
    assert_eq!(buf, rebuf, "re-saving a reloaded net must produce byte-identical output (invariant 5)");

    reloaded.propagate(&input).unwrap();
    assert_eq!(reloaded.output(), before.as_slice());
}

/// Same scenario, but written through a real file via `tempfile`, matching
/// the ambient test-tooling note that persistence is exercised against a
/// real file rather than only an in-memory buffer.
#[test]
fn s4_net_round_trips_through_a_real_file() {
    let params = common::sample_params();
    let mut rng = rand::rngs::StdRng::seed_from_u64(43);

    let args = LayerArgs::dense(3, 2, Activation::Tanh);
    let mut net = args.into_net(&params, &mut rng).unwrap();
    net.propagate(&[0.1, -0.2, 0.3]).unwrap();
    let before = net.output().to_vec();

    let mut file = tempfile::NamedTempFile::new().expect("should create temp file");
    net.save(file.as_file_mut()).unwrap();
    file.flush().unwrap();

    let mut reader = std::fs::File::open(file.path()).unwrap();
    let mut reloaded = Net::load(&mut reader).unwrap();
    reloaded.propagate(&[0.1, -0.2, 0.3]).unwrap();
    assert_eq!(reloaded.output(), before.as_slice());
}

/// Invariant 6: mutating a copy never observably changes the original.
#[test]
fn net_copy_is_deep() {
    let mut params = common::sample_params();
    params.p_mutation = 1.0;
    let mut rng = rand::rngs::StdRng::seed_from_u64(44);

    let mut args = LayerArgs::dense(3, 2, Activation::Linear);
    args.options = LayerOptions::EVOLVE_WEIGHTS;
    let mut net = args.into_net(&params, &mut rng).unwrap();

    let input = [0.5, -0.25, 0.1];
    net.propagate(&input).unwrap();
    let baseline = net.output().to_vec();

    let mut copy = net.clone();
    let changed = copy.mutate(&params, &mut rng);
    assert!(changed, "p_mutation=1.0 with EVOLVE_WEIGHTS should always perturb something");

    net.propagate(&input).unwrap();
    assert_eq!(net.output(), baseline.as_slice(), "mutating the copy must not affect the original");

    copy.propagate(&input).unwrap();
    assert_ne!(copy.output(), baseline.as_slice(), "the copy itself should reflect the mutation");
}
