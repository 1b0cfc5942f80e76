//! L1 — the GP-tree engine (spec §4.3 "GP-tree engine").
//!
//! Trees are a flat prefix-encoded `Vec<i32>` of node codes (spec §3 "Node
//! encoding for GP trees"): `c < 4` is an arithmetic function
//! (`ADD/SUB/MUL/DIV`), `4 <= c < 4 + GP_NUM_CONS` is a shared constant,
//! anything higher is an input variable. Because every function has fixed
//! arity two, any sub-tree is a contiguous range locatable by [`traverse`]
//! in O(n), which is what makes [`GpTree::crossover`] a pure splice.
//!
//! Per design note "Recursive evaluator with cursor": evaluation is a pure
//! recursion that threads `(value, next_position)` rather than mutating a
//! cursor field mid-traversal. `cursor` is still a field on `GpTree` (the
//! persistence format in spec §6 includes it), but it is only ever written
//! *after* a traversal completes, never read to drive control flow.

use std::io::{Read, Write};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{XcsfError, XcsfResult};
use crate::io::{read_i32, write_i32};
use crate::params::{Params, SamType};
use crate::sam::Sam;

pub const FN_ADD: i32 = 0;
pub const FN_SUB: i32 = 1;
pub const FN_MUL: i32 = 2;
pub const FN_DIV: i32 = 3;
const NUM_FUNCTIONS: i32 = 4;

/// Growth/crossover attempts before giving up (spec §7: bounded retry, not
/// time, and absorbed internally rather than raised to the caller).
const MAX_GROWTH_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpTree {
    code: Vec<i32>,
    cursor: usize,
    mu: Sam,
}

fn is_function(code: i32) -> bool {
    code < NUM_FUNCTIONS
}

/// A pure structural walk: returns the index one past the sub-tree rooted
/// at `pos`. Terminals are a single node; functions recurse over both of
/// their two children. This never reads anything but `code` itself.
pub fn traverse(code: &[i32], pos: usize) -> usize {
    if is_function(code[pos]) {
        let after_left = traverse(code, pos + 1);
        traverse(code, after_left)
    } else {
        pos + 1
    }
}

impl GpTree {
    /// Grows a fresh random tree. The root is forced to be a function node
    /// (spec: "The root is forced to be a function"); growth below that is
    /// a biased coin between terminal and function, bottoming out at
    /// `max_depth`. If the result would exceed `max_len` the whole tree is
    /// discarded and regrown (spec §4.3 `grow`).
    pub fn grow(params: &Params, num_inputs: usize, max_len: usize, rng: &mut impl Rng) -> XcsfResult<Self> {
        for attempt in 0..MAX_GROWTH_ATTEMPTS {
            let mut code = Vec::new();
            grow_rec(&mut code, 0, params.gp_init_depth, params, num_inputs, rng, true);
            if code.len() <= max_len {
                tracing::debug!(attempt, len = code.len(), "gp tree grown");
                let mu = Sam::new(1, params.sam_min, params.sam_type, rng);
                return Ok(Self { code, cursor: 0, mu });
            }
            tracing::debug!(attempt, len = code.len(), max_len, "gp tree exceeded max_len, regrowing");
        }
        Err(XcsfError::GpGrowthExhausted { attempts: MAX_GROWTH_ATTEMPTS })
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn code(&self) -> &[i32] {
        &self.code
    }

    /// Evaluates the tree against input vector `x` (spec §4.3 `eval`),
    /// using protected division: a zero denominator yields the numerator
    /// rather than NaN/Inf (spec §3 "Protected division").
    pub fn eval(&mut self, params: &Params, x: &[f64]) -> f64 {
        let (value, next) = eval_at(&self.code, &params.gp_constants, x, 0);
        self.cursor = next;
        value
    }

    /// Point mutation (spec §4.3 `mutate`): each node is independently
    /// resampled with probability `mu[0]`, which is self-adapted via SAM
    /// before the scan. Functions are replaced by functions, terminals by
    /// terminals. Returns whether anything changed.
    pub fn mutate(&mut self, params: &Params, num_inputs: usize, rng: &mut impl Rng) -> bool {
        self.mu.adapt(rng);
        let p = self.mu.get(0);
        let mut changed = false;
        for i in 0..self.code.len() {
            if rng.gen::<f64>() >= p {
                continue;
            }
            let new_code = if is_function(self.code[i]) {
                rng.gen_range(0..NUM_FUNCTIONS)
            } else {
                random_terminal(params.gp_num_cons, num_inputs, rng)
            };
            if new_code != self.code[i] {
                self.code[i] = new_code;
                changed = true;
            }
        }
        changed
    }

    /// Sub-tree crossover (spec §4.3 `crossover`): picks a uniformly random
    /// position in each tree, splices the donor's sub-tree range into the
    /// other parent. Both trees are overwritten in place. If a resulting
    /// tree would exceed `max_len` that side is left unchanged instead
    /// (spec leaves the overflow behavior to the implementation; the
    /// invariant that both results stay within budget takes priority over
    /// forcing the swap).
    pub fn crossover(a: &mut GpTree, b: &mut GpTree, max_len: usize, rng: &mut impl Rng) {
        let pos_a = rng.gen_range(0..a.code.len());
        let pos_b = rng.gen_range(0..b.code.len());
        let end_a = traverse(&a.code, pos_a);
        let end_b = traverse(&b.code, pos_b);

        let new_a: Vec<i32> = a.code[..pos_a]
            .iter()
            .chain(b.code[pos_b..end_b].iter())
            .chain(a.code[end_a..].iter())
            .copied()
            .collect();
        let new_b: Vec<i32> = b.code[..pos_b]
            .iter()
            .chain(a.code[pos_a..end_a].iter())
            .chain(b.code[end_b..].iter())
            .copied()
            .collect();

        if new_a.len() <= max_len {
            a.code = new_a;
        }
        if new_b.len() <= max_len {
            b.code = new_b;
        }
    }

    pub fn save<W: Write>(&self, w: &mut W) -> XcsfResult<()> {
        write_i32(w, self.cursor as i32)?;
        write_i32(w, self.code.len() as i32)?;
        for &c in &self.code {
            write_i32(w, c)?;
        }
        self.mu.save(w)
    }

    pub fn load<R: Read>(&mut self, r: &mut R) -> XcsfResult<()> {
        self.cursor = read_i32(r)? as usize;
        let len = read_i32(r)? as usize;
        let mut code = Vec::with_capacity(len);
        for _ in 0..len {
            code.push(read_i32(r)?);
        }
        self.code = code;
        self.mu.load(r)
    }

    /// Constructs an empty shell suitable as a `load()` target, mirroring
    /// the pattern used by [`Sam::load`]'s callers: build with placeholder
    /// state, then overwrite from the byte stream.
    pub fn empty_shell(params: &Params, rng: &mut impl Rng) -> Self {
        Self {
            code: vec![FN_ADD, 4, 4],
            cursor: 0,
            mu: Sam::new(1, params.sam_min, params.sam_type, rng),
        }
    }
}

fn random_terminal(gp_num_cons: usize, num_inputs: usize, rng: &mut impl Rng) -> i32 {
    let total = gp_num_cons + num_inputs;
    NUM_FUNCTIONS + rng.gen_range(0..total as i32)
}

fn grow_rec(
    code: &mut Vec<i32>,
    depth: usize,
    max_depth: usize,
    params: &Params,
    num_inputs: usize,
    rng: &mut impl Rng,
    force_function: bool,
) {
    let emit_terminal = !force_function && (depth >= max_depth || rng.gen_bool(0.5));
    if emit_terminal {
        code.push(random_terminal(params.gp_num_cons, num_inputs, rng));
    } else {
        code.push(rng.gen_range(0..NUM_FUNCTIONS));
        grow_rec(code, depth + 1, max_depth, params, num_inputs, rng, false);
        grow_rec(code, depth + 1, max_depth, params, num_inputs, rng, false);
    }
}

fn eval_at(code: &[i32], gp_constants: &[f64], x: &[f64], pos: usize) -> (f64, usize) {
    let c = code[pos];
    if is_function(c) {
        let (a, next) = eval_at(code, gp_constants, x, pos + 1);
        let (b, next) = eval_at(code, gp_constants, x, next);
        let value = match c {
            FN_ADD => a + b,
            FN_SUB => a - b,
            FN_MUL => a * b,
            FN_DIV => {
                if b == 0.0 {
                    a
                } else {
                    a / b
                }
            }
            _ => unreachable!("node codes < NUM_FUNCTIONS are exhaustively matched above"),
        };
        (value, next)
    } else if (c as usize) < 4 + gp_constants.len() {
        (gp_constants[c as usize - 4], pos + 1)
    } else {
        let idx = c as usize - 4 - gp_constants.len();
        (x[idx], pos + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn test_params(num_cons: usize) -> Params {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let mut p = crate::params::tests_support::sample();
        p.gp_num_cons = num_cons;
        p.sam_type = SamType::LogNormal;
        p.roll_gp_constants(&mut rng);
        p
    }

    #[test]
    fn traverse_reaches_end_of_a_grown_tree() {
        let params = test_params(5);
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        let tree = GpTree::grow(&params, 3, 256, &mut rng).unwrap();
        assert_eq!(traverse(tree.code(), 0), tree.len());
    }

    #[test]
    fn protected_division_returns_numerator_on_zero_denominator() {
        // DIV(IN:0, SUB(IN:0, IN:0)) on x = [3.0] => 3.0  (spec S2)
        let params = test_params(0);
        let code = vec![FN_DIV, 4, FN_SUB, 4, 4];
        let mut tree = GpTree { code, cursor: 0, mu: Sam::new(1, params.sam_min, params.sam_type, &mut rand::thread_rng()) };
        let result = tree.eval(&params, &[3.0]);
        assert_eq!(result, 3.0);
    }

    #[test]
    fn crossover_preserves_validity_over_many_random_pairs() {
        let params = test_params(4);
        let mut rng = rand::rngs::StdRng::seed_from_u64(99);
        for _ in 0..1000 {
            let mut t1 = GpTree::grow(&params, 2, 512, &mut rng).unwrap();
            let mut t2 = GpTree::grow(&params, 2, 512, &mut rng).unwrap();
            GpTree::crossover(&mut t1, &mut t2, 512, &mut rng);
            assert_eq!(traverse(t1.code(), 0), t1.len());
            assert_eq!(traverse(t2.code(), 0), t2.len());
            assert!(t1.len() <= 512);
            assert!(t2.len() <= 512);
        }
    }

    #[test]
    fn save_load_round_trips_bitwise() {
        let params = test_params(6);
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        let mut tree = GpTree::grow(&params, 2, 256, &mut rng).unwrap();
        tree.eval(&params, &[0.1, 0.2]);
        let mut buf = Vec::new();
        tree.save(&mut buf).unwrap();

        let mut reloaded = GpTree::empty_shell(&params, &mut rng);
        reloaded.load(&mut &buf[..]).unwrap();

        assert_eq!(tree.code, reloaded.code);
        assert_eq!(tree.cursor, reloaded.cursor);
    }

    #[test]
    fn mutate_returns_true_iff_something_changed() {
        let mut params = test_params(4);
        params.p_mutation = 1.0; // not used by mu directly, but ensures a rich alphabet
        let mut rng = rand::rngs::StdRng::seed_from_u64(8);
        let mut tree = GpTree::grow(&params, 3, 512, &mut rng).unwrap();
        let before = tree.code.clone();
        let changed = tree.mutate(&params, 3, &mut rng);
        assert_eq!(changed, before != tree.code);
    }
}
