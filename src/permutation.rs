//! Out-of-circuit evaluation of the permutation, mirroring the constraint
//! layout round for round. Used by tests as the agreement oracle and by
//! hosts that need the hash without a circuit.

use crate::{
    constants::{poseidon_params, PoseidonConstants},
    gadget::PoseidonSpec,
    master::PoseidonParams,
};
use ark_ff::PrimeField;

fn apply_round<F: PrimeField>(c_i: F, m: &[F], t: usize, n_sbox: usize, state: &mut Vec<F>) {
    for x in state.iter_mut() {
        *x += c_i;
    }
    for x in state.iter_mut().take(n_sbox) {
        let mut square = *x;
        square.square_in_place();
        square.square_in_place();
        *x *= square;
    }
    let mixed: Vec<F> = (0..t)
        .map(|i| {
            state
                .iter()
                .zip(&m[i * t..(i + 1) * t])
                .fold(F::zero(), |acc, (x, coeff)| acc + *coeff * x)
        })
        .collect();
    *state = mixed;
}

/// Runs the round schedule of `params` over plain field elements. Inputs
/// shorter than the width read as zero; the first `n_outputs` positions of
/// the final state are returned.
pub fn permute<F: PrimeField>(
    params: &PoseidonParams,
    constants: &PoseidonConstants<F>,
    inputs: &[F],
) -> Vec<F> {
    let t = params.width;
    assert!(
        inputs.len() <= t,
        "{} inputs exceed the state width {t}",
        inputs.len()
    );

    let mut state = inputs.to_vec();
    state.resize(t, F::zero());

    let partial_begin = params.rounds_full / 2;
    let partial_end = partial_begin + params.rounds_partial;
    for (r, c_r) in constants.c.iter().enumerate() {
        let n_sbox = if r < partial_begin || r >= partial_end {
            t
        } else {
            params.capacity
        };
        apply_round(*c_r, &constants.m, t, n_sbox, &mut state);
    }

    state.truncate(params.n_outputs);
    state
}

/// Fixed-arity hash over the memoized constants of `S`.
pub fn poseidon_hash<F: PrimeField, S: PoseidonSpec>(inputs: &[F]) -> F {
    let params = PoseidonParams {
        width: S::WIDTH,
        capacity: S::CAPACITY,
        rounds_full: S::ROUNDS_FULL,
        rounds_partial: S::ROUNDS_PARTIAL,
        n_inputs: inputs.len(),
        n_outputs: 1,
        constrain_outputs: false,
    };
    let constants = poseidon_params::<F>(S::WIDTH, S::ROUNDS_FULL, S::ROUNDS_PARTIAL);
    permute(&params, constants, inputs)[0]
}
