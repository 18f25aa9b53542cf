//! One round of the Poseidon permutation:
//!
//! - takes a state of up to `t` linear combinations,
//! - adds the round constant to each position,
//! - raises the leading `n_sbox` positions to the fifth power,
//! - mixes the state through the MDS matrix into `n_outputs` outputs.
//!
//! The matrix mixing is linear, so it is folded into the output linear
//! combinations at zero constraint cost; only the S-boxes allocate
//! variables and emit constraints. State positions that skip the S-box are
//! never pinned to intermediate variables either. A partial round therefore
//! costs `3c` constraints instead of `3t`.

use crate::{
    r1cs::{Assignment, LinearCombination, Protoboard, Variable},
    sbox::FifthPower,
};
use ark_ff::PrimeField;
use rayon::prelude::*;

/// A single round, usable as first, full, partial or last round depending
/// on its arities.
pub struct Round<F: PrimeField> {
    c_i: &'static F,
    n_inputs: usize,
    state: Vec<LinearCombination<F>>,
    sboxes: Vec<FifthPower>,
    outputs: Vec<LinearCombination<F>>,
}

impl<F: PrimeField> Round<F> {
    /// Allocates the S-box variables and computes the output combinations.
    /// `m` is the row-major `t·t` mixing matrix and `state` the previous
    /// round's outputs (or the circuit inputs for the first round).
    pub fn new(
        pb: &mut Protoboard<F>,
        c_i: &'static F,
        m: &'static [F],
        t: usize,
        n_sbox: usize,
        state: Vec<LinearCombination<F>>,
        n_outputs: usize,
    ) -> Self {
        let n_inputs = state.len();
        assert!(n_inputs <= t, "round has {n_inputs} inputs but width is only {t}");
        assert!(n_outputs <= t, "round has {n_outputs} outputs but width is only {t}");
        assert!(n_sbox <= t, "round applies {n_sbox} s-boxes but width is only {t}");

        let sboxes: Vec<FifthPower> = (0..n_sbox).map(|_| FifthPower::new(pb)).collect();
        let outputs = Self::make_outputs(c_i, m, t, &state, &sboxes, n_outputs);

        Self {
            c_i,
            n_inputs,
            state,
            sboxes,
            outputs,
        }
    }

    fn make_outputs(
        c_i: &F,
        m: &[F],
        t: usize,
        state: &[LinearCombination<F>],
        sboxes: &[FifthPower],
        n_outputs: usize,
    ) -> Vec<LinearCombination<F>> {
        let n_sbox = sboxes.len();
        let n_inputs = state.len();

        (0..n_outputs)
            .into_par_iter()
            .map(|i| {
                let row = &m[i * t..(i + 1) * t];
                let mut lc = LinearCombination::with_capacity(t);

                // Positions that skip the S-box all carry the same round
                // constant, so their share folds into a single term on the
                // constant-one variable.
                if n_sbox < t {
                    let mut constant_term = F::zero();
                    for coeff in &row[n_sbox..] {
                        constant_term += *c_i * coeff;
                    }
                    lc.add_term(Variable::ONE, constant_term);
                }

                for (s, sbox) in sboxes.iter().enumerate() {
                    lc.add_term(sbox.result(), row[s]);
                }

                for k in n_sbox..n_inputs {
                    lc = &lc + &(&state[k] * row[k]);
                }

                lc
            })
            .collect()
    }

    pub fn generate_constraints(&self, pb: &mut Protoboard<F>, annotation: &str) {
        for (h, sbox) in self.sboxes.iter().enumerate() {
            // S-boxes past the input arity run on the bare round constant;
            // the spent variables keep the positional alignment uniform
            // across rounds.
            let x = if h < self.n_inputs {
                &self.state[h] + *self.c_i
            } else {
                LinearCombination::constant(*self.c_i)
            };
            sbox.generate_constraints(pb, &x, &format!("{annotation}.sbox[{h}]"));
        }
    }

    pub fn generate_witness(&self, w: &mut Assignment<F>) {
        for (h, sbox) in self.sboxes.iter().enumerate() {
            let mut value = *self.c_i;
            if h < self.n_inputs {
                value += self.state[h].eval(w);
            }
            sbox.generate_witness(w, value);
        }
    }

    pub fn outputs(&self) -> &[LinearCombination<F>] {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::poseidon_params;
    use ark_bn254::Fr;
    use ark_ff::{Field, Zero};

    // Width-3 toy schedule; small enough to check outputs by hand.
    const T: usize = 3;

    #[test]
    fn full_round_matches_direct_evaluation() {
        let params = poseidon_params::<Fr>(T, 2, 1);
        let mut pb = Protoboard::<Fr>::new();
        let inputs = pb.allocate_variables(2);
        let state: Vec<_> = inputs
            .iter()
            .map(|v| LinearCombination::from_variable(*v))
            .collect();

        let round = Round::new(&mut pb, &params.c[0], &params.m, T, T, state, T);
        round.generate_constraints(&mut pb, "round[0]");
        assert_eq!(pb.num_constraints(), 3 * T);

        let vals = [Fr::from(3u64), Fr::from(8u64)];
        for (v, x) in inputs.iter().zip(vals) {
            pb.set_val(*v, x);
        }
        let mut w = pb.witness().clone();
        round.generate_witness(&mut w);

        // u_j = (state_j + c)^5 for every position of a full round, with the
        // missing third input reading as zero
        let c = params.c[0];
        let u = [
            (vals[0] + c).pow([5u64]),
            (vals[1] + c).pow([5u64]),
            c.pow([5u64]),
        ];
        for (i, lc) in round.outputs().iter().enumerate() {
            let expected = (0..T).fold(Fr::zero(), |acc, j| acc + params.m[i * T + j] * u[j]);
            assert_eq!(lc.eval(&w), expected);
        }
    }

    #[test]
    fn partial_round_folds_skipped_positions_into_a_constant_term() {
        let params = poseidon_params::<Fr>(T, 2, 1);
        let mut pb = Protoboard::<Fr>::new();
        let inputs = pb.allocate_variables(T);
        let state: Vec<_> = inputs
            .iter()
            .map(|v| LinearCombination::from_variable(*v))
            .collect();

        let round = Round::new(&mut pb, &params.c[1], &params.m, T, 1, state, T);
        round.generate_constraints(&mut pb, "round[1]");
        // one s-box, three constraints, regardless of width
        assert_eq!(pb.num_constraints(), 3);

        let vals = [Fr::from(2u64), Fr::from(4u64), Fr::from(6u64)];
        for (v, x) in inputs.iter().zip(vals) {
            pb.set_val(*v, x);
        }
        let mut w = pb.witness().clone();
        round.generate_witness(&mut w);

        let c = params.c[1];
        let u = [(vals[0] + c).pow([5u64]), vals[1] + c, vals[2] + c];
        for (i, lc) in round.outputs().iter().enumerate() {
            let expected = (0..T).fold(Fr::zero(), |acc, j| acc + params.m[i * T + j] * u[j]);
            assert_eq!(lc.eval(&w), expected);
        }
    }
}
