//! The full permutation: `F/2` full rounds, `P` partial rounds, `F/2` full
//! rounds, with a first round ingesting `n_inputs` elements and a last round
//! squeezing the state into `n_outputs`.
//!
//! A master is built once per parameter tuple on a private scratch
//! protoboard with placeholder inputs; user circuits replicate it through
//! the instance gadget instead of re-emitting the rounds.

use crate::{
    constants::{poseidon_params, PoseidonConstants},
    r1cs::{Assignment, LinearCombination, Protoboard, SharedConstraints, Variable},
    round::Round,
};
use ark_ff::PrimeField;
use log::debug;
use once_cell::sync::Lazy;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{Mutex, Once, RwLock},
};

/// The shape of one Poseidon instantiation, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoseidonParams {
    /// State width `t`.
    pub width: usize,
    /// S-boxes applied per partial round.
    pub capacity: usize,
    /// Number of full rounds; must be even.
    pub rounds_full: usize,
    /// Number of partial rounds.
    pub rounds_partial: usize,
    /// Elements ingested by the first round.
    pub n_inputs: usize,
    /// Elements squeezed by the last round.
    pub n_outputs: usize,
    /// Whether the final combinations are pinned to fresh output variables.
    pub constrain_outputs: bool,
}

impl PoseidonParams {
    pub fn total_rounds(&self) -> usize {
        self.rounds_full + self.rounds_partial
    }

    fn partial_begin(&self) -> usize {
        self.rounds_full / 2
    }

    fn partial_end(&self) -> usize {
        self.partial_begin() + self.rounds_partial
    }
}

/// The canonical circuit for one parameter tuple.
pub struct PoseidonMaster<F: PrimeField> {
    params: PoseidonParams,
    constants: &'static PoseidonConstants<F>,
    first_round: Round<F>,
    prefix_full_rounds: Vec<Round<F>>,
    partial_rounds: Vec<Round<F>>,
    suffix_full_rounds: Vec<Round<F>>,
    last_round: Round<F>,
    output_vars: Vec<Variable>,
    num_variables: usize,
    shared: SharedConstraints<F>,
    swap_latch: Once,
}

impl<F: PrimeField> PoseidonMaster<F> {
    /// Builds the circuit on a private scratch protoboard; the placeholder
    /// input variables occupy indices `1..=n_inputs`.
    pub fn build(params: PoseidonParams) -> Self {
        let PoseidonParams {
            width: t,
            capacity,
            rounds_full,
            rounds_partial,
            n_inputs,
            n_outputs,
            constrain_outputs,
        } = params;
        assert!(
            rounds_full % 2 == 0,
            "the number of full rounds must be even, got {rounds_full}"
        );
        assert!(n_inputs <= t, "{n_inputs} inputs exceed the state width {t}");
        assert!(n_outputs <= t, "{n_outputs} outputs exceed the state width {t}");
        assert!(capacity >= 1, "at least one s-box per partial round is required");
        assert!(
            capacity <= t,
            "partial-round s-box count {capacity} exceeds the state width {t}"
        );

        let constants = poseidon_params::<F>(t, rounds_full, rounds_partial);
        let total = params.total_rounds();

        let mut pb = Protoboard::new();
        let inputs: Vec<LinearCombination<F>> = pb
            .allocate_variables(n_inputs)
            .into_iter()
            .map(LinearCombination::from_variable)
            .collect();

        let first_round = Round::new(&mut pb, &constants.c[0], &constants.m, t, t, inputs, t);
        let mut state = first_round.outputs().to_vec();

        let make_rounds = |pb: &mut Protoboard<F>,
                               state: &mut Vec<LinearCombination<F>>,
                               n_sbox: usize,
                               begin: usize,
                               end: usize| {
            let mut rounds = Vec::with_capacity(end.saturating_sub(begin));
            for i in begin..end {
                let round = Round::new(
                    pb,
                    &constants.c[i],
                    &constants.m,
                    t,
                    n_sbox,
                    std::mem::take(state),
                    t,
                );
                *state = round.outputs().to_vec();
                rounds.push(round);
            }
            rounds
        };

        let prefix_full_rounds =
            make_rounds(&mut pb, &mut state, t, 1, params.partial_begin());
        let partial_rounds = make_rounds(
            &mut pb,
            &mut state,
            capacity,
            params.partial_begin(),
            params.partial_end(),
        );
        let suffix_full_rounds =
            make_rounds(&mut pb, &mut state, t, params.partial_end(), total - 1);

        let last_round = Round::new(
            &mut pb,
            &constants.c[total - 1],
            &constants.m,
            t,
            t,
            state,
            n_outputs,
        );

        let output_vars = if constrain_outputs {
            pb.allocate_variables(n_outputs)
        } else {
            Vec::new()
        };

        first_round.generate_constraints(&mut pb, ".round[0]");
        let mut index = 1;
        for rounds in [&prefix_full_rounds, &partial_rounds, &suffix_full_rounds] {
            for round in rounds.iter() {
                round.generate_constraints(&mut pb, &format!(".round[{index}]"));
                index += 1;
            }
        }
        last_round.generate_constraints(&mut pb, &format!(".round[{}]", total - 1));

        for (i, (lc, var)) in last_round.outputs().iter().zip(&output_vars).enumerate() {
            pb.add_constraint(
                lc.clone(),
                LinearCombination::constant(F::one()),
                LinearCombination::from_variable(*var),
                format!(".output[{i}] = round[{}].output[{i}]", total - 1),
            );
        }

        let num_variables = pb.num_variables();
        let constraints = pb.into_constraints();
        debug!(
            "poseidon master built: t={t} rounds={total} variables={num_variables} constraints={}",
            constraints.len()
        );

        Self {
            params,
            constants,
            first_round,
            prefix_full_rounds,
            partial_rounds,
            suffix_full_rounds,
            last_round,
            output_vars,
            num_variables,
            shared: RwLock::new(constraints),
            swap_latch: Once::new(),
        }
    }

    /// Propagates the witness through every round. `w` must already carry
    /// the input values in slots `1..=n_inputs`.
    pub fn generate_witness(&self, w: &mut Assignment<F>) {
        self.first_round.generate_witness(w);
        for round in &self.prefix_full_rounds {
            round.generate_witness(w);
        }
        for round in &self.partial_rounds {
            round.generate_witness(w);
        }
        for round in &self.suffix_full_rounds {
            round.generate_witness(w);
        }
        self.last_round.generate_witness(w);

        for (lc, var) in self.last_round.outputs().iter().zip(&self.output_vars) {
            let value = lc.eval(w);
            w.set_val(*var, value);
        }
    }

    pub fn params(&self) -> &PoseidonParams {
        &self.params
    }

    pub fn constants(&self) -> &'static PoseidonConstants<F> {
        self.constants
    }

    /// Number of variables on the scratch board, placeholders included.
    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    /// The variables pinned to the outputs; empty when outputs are
    /// unconstrained.
    pub fn output_vars(&self) -> &[Variable] {
        &self.output_vars
    }

    /// The last round's output combinations over master variable indices.
    pub fn last_outputs(&self) -> &[LinearCombination<F>] {
        self.last_round.outputs()
    }

    /// The constraint bodies shared with every stamped instance.
    pub fn shared_constraints(&self) -> &SharedConstraints<F> {
        &self.shared
    }

    /// Exchanges the A and B sides of every constraint, at most once per
    /// process; every stamped instance observes the swap.
    pub fn swap_ab(&self) {
        self.swap_latch.call_once(|| {
            let mut bodies = self.shared.write().expect("master constraints poisoned");
            for constraint in bodies.iter_mut() {
                constraint.swap_ab();
            }
        });
    }
}

type MasterKey = (TypeId, PoseidonParams);

static MASTERS: Lazy<Mutex<HashMap<MasterKey, &'static (dyn Any + Send + Sync)>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// The process-wide master for `params`, built on first use; later callers
/// block on the table lock until the build completes, then share it.
pub fn master<F: PrimeField>(params: PoseidonParams) -> &'static PoseidonMaster<F> {
    let key = (TypeId::of::<F>(), params);
    let mut cache = MASTERS.lock().expect("master cache poisoned");
    let cached: &'static (dyn Any + Send + Sync) = *cache.entry(key).or_insert_with(|| {
        let leaked: &'static PoseidonMaster<F> = Box::leak(Box::new(PoseidonMaster::build(params)));
        leaked
    });
    cached
        .downcast_ref::<PoseidonMaster<F>>()
        .expect("master cache holds a foreign type under this key")
}
