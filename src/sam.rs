//! L0 — self-adaptive mutation (spec §4.3 "SAM").
//!
//! Each individual (GP tree, NN layer) that has self-adapted rates carries
//! its own `Sam` vector. Before the rates are used for a mutation pass,
//! [`Sam::adapt`] perturbs every entry: [`crate::params::SamType::RateSelect`]
//! redraws from a fixed discrete ladder, [`crate::params::SamType::LogNormal`]
//! applies a log-normal update. Both clamp to `[SAM_MIN, 1]`.

use std::io::{Read, Write};

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::errors::XcsfResult;
use crate::io::{read_f64_vec, write_f64_vec};
use crate::params::SamType;

/// Discrete candidate rates `SAM_RATE_SELECT` draws from. Mirrors the
/// classic XCSF "rate ladder": a handful of magnitudes spanning several
/// orders, biased toward the middle of the range.
const RATE_LADDER: [f64; 10] = [
    0.0001, 0.001, 0.01, 0.05, 0.1, 0.2, 0.3, 0.4, 0.6, 1.0,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sam {
    rates: Vec<f64>,
    kind: SamType,
    min: f64,
}

impl Sam {
    pub fn new(num: usize, min: f64, kind: SamType, rng: &mut impl Rng) -> Self {
        let rates = match kind {
            SamType::RateSelect => (0..num)
                .map(|_| RATE_LADDER[rng.gen_range(0..RATE_LADDER.len())])
                .collect(),
            SamType::LogNormal => (0..num).map(|_| rng.gen_range(min..=1.0)).collect(),
        };
        Self { rates, kind, min }
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn get(&self, i: usize) -> f64 {
        self.rates[i]
    }

    /// Perturbs every rate in place, then clamps to `[SAM_MIN, 1]`. Must be
    /// called once before the rates are consumed by a mutation pass.
    pub fn adapt(&mut self, rng: &mut impl Rng) {
        for rate in self.rates.iter_mut() {
            *rate = match self.kind {
                SamType::RateSelect => RATE_LADDER[rng.gen_range(0..RATE_LADDER.len())],
                SamType::LogNormal => {
                    let z: f64 = StandardNormal.sample(rng);
                    *rate * z.exp()
                }
            }
            .clamp(self.min, 1.0);
        }
    }

    pub fn save<W: Write>(&self, w: &mut W) -> XcsfResult<()> {
        write_f64_vec(w, &self.rates)
    }

    pub fn load<R: Read>(&mut self, r: &mut R) -> XcsfResult<()> {
        self.rates = read_f64_vec(r)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn rates_stay_within_bounds_after_many_adapt_calls() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut sam = Sam::new(4, 0.001, SamType::LogNormal, &mut rng);
        for _ in 0..200 {
            sam.adapt(&mut rng);
            for i in 0..sam.len() {
                let r = sam.get(i);
                assert!(r >= 0.001 && r <= 1.0, "rate {r} out of bounds");
            }
        }
    }

    #[test]
    fn rate_select_only_ever_emits_ladder_values() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        let mut sam = Sam::new(3, 0.0001, SamType::RateSelect, &mut rng);
        for _ in 0..50 {
            sam.adapt(&mut rng);
            for i in 0..sam.len() {
                assert!(RATE_LADDER.contains(&sam.get(i)));
            }
        }
    }

    #[test]
    fn save_load_round_trips() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let sam = Sam::new(5, 0.0001, SamType::LogNormal, &mut rng);
        let mut buf = Vec::new();
        sam.save(&mut buf).unwrap();
        let mut reloaded = Sam::new(5, 0.0001, SamType::LogNormal, &mut rng);
        reloaded.load(&mut &buf[..]).unwrap();
        assert_eq!(sam.rates, reloaded.rates);
    }
}
