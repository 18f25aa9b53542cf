//! The user-facing hash gadget.
//!
//! A circuit may invoke Poseidon thousands of times; re-emitting the rounds
//! each time would duplicate tens of thousands of identical constraints.
//! Instead each instance binds the caller's input variables and a fresh
//! block of auxiliary variables to the memoized master circuit through an
//! index translation, sharing the constraint bodies.

use crate::{
    master::{master, PoseidonMaster, PoseidonParams},
    r1cs::{Assignment, Protoboard, VarMap, Variable},
};
use ark_ff::PrimeField;
use log::trace;
use std::{marker::PhantomData, sync::Arc};

/// Fixed round structure of one Poseidon instantiation.
pub trait PoseidonSpec: 'static {
    /// State width `t`.
    const WIDTH: usize;
    /// S-boxes applied per partial round.
    const CAPACITY: usize;
    /// Full rounds, split evenly around the partial rounds.
    const ROUNDS_FULL: usize;
    /// Partial rounds.
    const ROUNDS_PARTIAL: usize;
}

/// The 128-bit-security instantiation: `t = 6`, one partial-round S-box,
/// 8 full and 57 partial rounds.
#[derive(Clone, Copy, Debug)]
pub struct Poseidon128Spec;

impl PoseidonSpec for Poseidon128Spec {
    const WIDTH: usize = 6;
    const CAPACITY: usize = 1;
    const ROUNDS_FULL: usize = 8;
    const ROUNDS_PARTIAL: usize = 57;
}

/// A stamped instance of the master circuit for
/// `(S, N_INPUTS, N_OUTPUTS, CONSTRAIN_OUTPUTS)` on a caller protoboard.
pub struct Poseidon<
    F: PrimeField,
    S: PoseidonSpec,
    const N_INPUTS: usize,
    const N_OUTPUTS: usize,
    const CONSTRAIN_OUTPUTS: bool = true,
> {
    master: &'static PoseidonMaster<F>,
    inputs: [Variable; N_INPUTS],
    aux_offset: usize,
    map: Arc<VarMap>,
    _spec: PhantomData<S>,
}

impl<
        F: PrimeField,
        S: PoseidonSpec,
        const N_INPUTS: usize,
        const N_OUTPUTS: usize,
        const CONSTRAIN_OUTPUTS: bool,
    > Poseidon<F, S, N_INPUTS, N_OUTPUTS, CONSTRAIN_OUTPUTS>
{
    /// The parameter tuple this instantiation stamps.
    pub const PARAMS: PoseidonParams = PoseidonParams {
        width: S::WIDTH,
        capacity: S::CAPACITY,
        rounds_full: S::ROUNDS_FULL,
        rounds_partial: S::ROUNDS_PARTIAL,
        n_inputs: N_INPUTS,
        n_outputs: N_OUTPUTS,
        constrain_outputs: CONSTRAIN_OUTPUTS,
    };

    /// Binds `inputs` and a freshly allocated auxiliary block on `pb` to a
    /// stamp of the master circuit.
    pub fn new(pb: &mut Protoboard<F>, inputs: [Variable; N_INPUTS], annotation: &str) -> Self {
        let master = master::<F>(Self::PARAMS);
        let aux_offset = pb.num_variables() + 1;
        pb.allocate_variables(master.num_variables() - N_INPUTS);
        let map = Arc::new(VarMap::new(
            inputs.iter().map(|v| v.index()).collect(),
            aux_offset,
        ));
        trace!(
            "{annotation}: stamped poseidon instance, aux block at {aux_offset}, {} variables",
            master.num_variables() - N_INPUTS
        );

        Self {
            master,
            inputs,
            aux_offset,
            map,
            _spec: PhantomData,
        }
    }

    /// Copies every master constraint into `pb` under this instance's index
    /// translation. The constraint bodies stay shared; no field arithmetic
    /// is redone.
    pub fn generate_constraints(&self, pb: &mut Protoboard<F>) {
        pb.stamp(self.master.shared_constraints(), Arc::clone(&self.map));
    }

    /// Computes the witness on the master's variable layout, then copies the
    /// auxiliary block into `pb`.
    pub fn generate_witness(&self, pb: &mut Protoboard<F>) {
        let mut w = Assignment::new(self.master.num_variables());
        for (i, input) in self.inputs.iter().enumerate() {
            w.set_val(Variable(1 + i), pb.val(*input));
        }
        self.master.generate_witness(&mut w);
        for i in 0..self.master.num_variables() - N_INPUTS {
            pb.set_val(
                Variable(self.aux_offset + i),
                w.val(Variable(1 + N_INPUTS + i)),
            );
        }
    }

    /// The caller-side variables pinned to the outputs; empty when outputs
    /// are unconstrained.
    pub fn output_variables(&self) -> Vec<Variable> {
        self.master
            .output_vars()
            .iter()
            .map(|v| Variable(self.map.translate(v.index())))
            .collect()
    }

    /// Exchanges A and B of every master constraint, at most once per
    /// process; the swap is observed by every stamped instance of this
    /// parameter tuple.
    pub fn swap_ab(&self) {
        self.master.swap_ab();
    }
}

impl<F: PrimeField, S: PoseidonSpec, const N_INPUTS: usize> Poseidon<F, S, N_INPUTS, 1, true> {
    /// The single constrained output variable.
    pub fn result(&self) -> Variable {
        self.output_variables()[0]
    }
}

/// Default instantiation over the BN254 scalar field.
pub type Poseidon128<const N_INPUTS: usize, const N_OUTPUTS: usize> =
    Poseidon<ark_bn254::Fr, Poseidon128Spec, N_INPUTS, N_OUTPUTS>;
