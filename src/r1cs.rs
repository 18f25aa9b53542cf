//! A minimal rank-1 constraint system host: variables, linear combinations,
//! constraints and the witness table.
//!
//! Besides constraints it owns outright, a [`Protoboard`] can hold *stamped*
//! constraints: references into another circuit's shared constraint bodies,
//! read through an index translation at evaluation time. This is how the
//! master Poseidon circuit is replicated into caller circuits without
//! copying any field arithmetic.

use ark_ff::PrimeField;
use std::{
    ops::{Add, Mul},
    sync::{Arc, RwLock},
};

/// A slot in the constraint system's witness vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(pub usize);

impl Variable {
    /// The conventional constant-one variable at index 0.
    pub const ONE: Variable = Variable(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

/// A formal affine expression `Σᵢ αᵢ·vᵢ`; constant terms ride on
/// [`Variable::ONE`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinearCombination<F: PrimeField> {
    pub terms: Vec<(Variable, F)>,
}

impl<F: PrimeField> LinearCombination<F> {
    pub fn zero() -> Self {
        Self { terms: vec![] }
    }

    /// An empty combination with room for `n` terms. Rows of width `t` are
    /// built term by term; reserving up front avoids repeated regrowth.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            terms: Vec::with_capacity(n),
        }
    }

    pub fn from_variable(v: Variable) -> Self {
        Self {
            terms: vec![(v, F::one())],
        }
    }

    /// The constant `c` as a combination over [`Variable::ONE`].
    pub fn constant(c: F) -> Self {
        Self {
            terms: vec![(Variable::ONE, c)],
        }
    }

    pub fn add_term(&mut self, v: Variable, coeff: F) {
        self.terms.push((v, coeff));
    }

    /// Evaluates the combination under a witness assignment.
    pub fn eval(&self, w: &Assignment<F>) -> F {
        self.terms
            .iter()
            .fold(F::zero(), |acc, (v, coeff)| acc + *coeff * w.val(*v))
    }

    fn translated(&self, map: &VarMap) -> LinearCombination<F> {
        LinearCombination {
            terms: self
                .terms
                .iter()
                .map(|(v, coeff)| (Variable(map.translate(v.0)), *coeff))
                .collect(),
        }
    }
}

impl<F: PrimeField> Add<&LinearCombination<F>> for &LinearCombination<F> {
    type Output = LinearCombination<F>;

    fn add(self, other: &LinearCombination<F>) -> LinearCombination<F> {
        let mut terms = Vec::with_capacity(self.terms.len() + other.terms.len());
        terms.extend_from_slice(&self.terms);
        terms.extend_from_slice(&other.terms);
        LinearCombination { terms }
    }
}

impl<F: PrimeField> Add<F> for &LinearCombination<F> {
    type Output = LinearCombination<F>;

    fn add(self, constant: F) -> LinearCombination<F> {
        let mut out = self.clone();
        out.add_term(Variable::ONE, constant);
        out
    }
}

impl<F: PrimeField> Mul<F> for &LinearCombination<F> {
    type Output = LinearCombination<F>;

    fn mul(self, scalar: F) -> LinearCombination<F> {
        LinearCombination {
            terms: self
                .terms
                .iter()
                .map(|(v, coeff)| (*v, *coeff * scalar))
                .collect(),
        }
    }
}

/// A witness table indexed by variable id. Index 0 is pre-assigned to 1.
#[derive(Clone, Debug)]
pub struct Assignment<F: PrimeField> {
    values: Vec<Option<F>>,
}

impl<F: PrimeField> Assignment<F> {
    /// A table covering `num_variables` variables plus the constant one.
    pub fn new(num_variables: usize) -> Self {
        let mut values = vec![None; num_variables + 1];
        values[0] = Some(F::one());
        Self { values }
    }

    /// Reads a witness value. Reading a slot that was never assigned is a
    /// caller contract violation and aborts.
    pub fn val(&self, v: Variable) -> F {
        self.values
            .get(v.0)
            .copied()
            .flatten()
            .unwrap_or_else(|| panic!("witness for variable {} read before assignment", v.0))
    }

    pub fn set_val(&mut self, v: Variable, x: F) {
        self.values[v.0] = Some(x);
    }

    fn grow(&mut self, num_variables: usize) {
        self.values.resize(num_variables + 1, None);
    }
}

/// One R1CS constraint `a · b = c`.
#[derive(Clone, Debug)]
pub struct Constraint<F: PrimeField> {
    pub a: LinearCombination<F>,
    pub b: LinearCombination<F>,
    pub c: LinearCombination<F>,
    pub annotation: String,
}

impl<F: PrimeField> Constraint<F> {
    /// Exchanges the A and B sides; R1CS is symmetric in them.
    pub fn swap_ab(&mut self) {
        std::mem::swap(&mut self.a, &mut self.b);
    }

    pub fn is_satisfied(&self, w: &Assignment<F>) -> bool {
        self.a.eval(w) * self.b.eval(w) == self.c.eval(w)
    }
}

/// Constraint bodies shared between a master circuit and its stamped
/// instances. The lock is written exactly once, by [`swap_ab`]
/// canonicalization; everything else only reads.
///
/// [`swap_ab`]: Constraint::swap_ab
pub type SharedConstraints<F> = RwLock<Vec<Constraint<F>>>;

/// Index translation from a master circuit's variable space into a caller
/// protoboard's variable space.
///
/// Index 0 (the constant one) is universal; indices `1..=n` bind to the
/// caller's `n` input variables; everything above lands in the instance's
/// auxiliary block.
#[derive(Debug)]
pub struct VarMap {
    inputs: Vec<usize>,
    aux_offset: usize,
}

impl VarMap {
    pub fn new(inputs: Vec<usize>, aux_offset: usize) -> Self {
        Self { inputs, aux_offset }
    }

    pub fn translate(&self, index: usize) -> usize {
        if index == 0 {
            0
        } else if index <= self.inputs.len() {
            self.inputs[index - 1]
        } else {
            self.aux_offset + (index - 1 - self.inputs.len())
        }
    }
}

enum ConstraintEntry<F: PrimeField> {
    Own(Constraint<F>),
    Stamped {
        shared: &'static SharedConstraints<F>,
        index: usize,
        map: Arc<VarMap>,
    },
}

/// The host object aggregating variables, constraints and witness values.
pub struct Protoboard<F: PrimeField> {
    witness: Assignment<F>,
    num_variables: usize,
    entries: Vec<ConstraintEntry<F>>,
}

impl<F: PrimeField> Protoboard<F> {
    pub fn new() -> Self {
        Self {
            witness: Assignment::new(0),
            num_variables: 0,
            entries: vec![],
        }
    }

    /// Appends a fresh variable slot.
    pub fn allocate_variable(&mut self) -> Variable {
        self.num_variables += 1;
        self.witness.grow(self.num_variables);
        Variable(self.num_variables)
    }

    pub fn allocate_variables(&mut self, n: usize) -> Vec<Variable> {
        (0..n).map(|_| self.allocate_variable()).collect()
    }

    /// Number of allocated variables, the constant one excluded.
    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    pub fn val(&self, v: Variable) -> F {
        self.witness.val(v)
    }

    pub fn set_val(&mut self, v: Variable, x: F) {
        assert!(
            v.0 <= self.num_variables,
            "variable {} was never allocated on this protoboard",
            v.0
        );
        self.witness.set_val(v, x);
    }

    pub fn witness(&self) -> &Assignment<F> {
        &self.witness
    }

    pub fn add_constraint(
        &mut self,
        a: LinearCombination<F>,
        b: LinearCombination<F>,
        c: LinearCombination<F>,
        annotation: impl Into<String>,
    ) {
        self.entries.push(ConstraintEntry::Own(Constraint {
            a,
            b,
            c,
            annotation: annotation.into(),
        }));
    }

    /// Appends one entry per shared constraint, each interpreted through
    /// `map` when read back.
    pub(crate) fn stamp(&mut self, shared: &'static SharedConstraints<F>, map: Arc<VarMap>) {
        let n = shared.read().expect("shared constraints poisoned").len();
        self.entries.reserve(n);
        for index in 0..n {
            self.entries.push(ConstraintEntry::Stamped {
                shared,
                index,
                map: Arc::clone(&map),
            });
        }
    }

    pub fn num_constraints(&self) -> usize {
        self.entries.len()
    }

    /// A materialized view of constraint `i`, stamped entries resolved
    /// through their translation.
    pub fn constraint(&self, i: usize) -> Constraint<F> {
        match &self.entries[i] {
            ConstraintEntry::Own(c) => c.clone(),
            ConstraintEntry::Stamped { shared, index, map } => {
                let bodies = shared.read().expect("shared constraints poisoned");
                let c = &bodies[*index];
                Constraint {
                    a: c.a.translated(map),
                    b: c.b.translated(map),
                    c: c.c.translated(map),
                    annotation: c.annotation.clone(),
                }
            }
        }
    }

    pub fn constraints(&self) -> impl Iterator<Item = Constraint<F>> + '_ {
        (0..self.entries.len()).map(move |i| self.constraint(i))
    }

    /// Checks `a · b = c` for every constraint under the current witness.
    pub fn is_satisfied(&self) -> bool {
        self.constraints().all(|c| c.is_satisfied(&self.witness))
    }

    /// Extracts the owned constraints; used when a scratch board becomes a
    /// master circuit. Boards holding stamped entries cannot be extracted.
    pub(crate) fn into_constraints(self) -> Vec<Constraint<F>> {
        self.entries
            .into_iter()
            .map(|entry| match entry {
                ConstraintEntry::Own(c) => c,
                ConstraintEntry::Stamped { .. } => {
                    panic!("cannot extract constraints from a board holding stamped entries")
                }
            })
            .collect()
    }
}

impl<F: PrimeField> Default for Protoboard<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use ark_ff::One;

    #[test]
    fn var_map_translates_per_contract() {
        // inputs bound to caller variables 7 and 9, aux block at 12
        let map = VarMap::new(vec![7, 9], 12);
        assert_eq!(map.translate(0), 0);
        assert_eq!(map.translate(1), 7);
        assert_eq!(map.translate(2), 9);
        assert_eq!(map.translate(3), 12);
        assert_eq!(map.translate(5), 14);
    }

    #[test]
    fn linear_combination_eval() {
        let mut pb = Protoboard::<Fr>::new();
        let x = pb.allocate_variable();
        let y = pb.allocate_variable();
        pb.set_val(x, Fr::from(3u64));
        pb.set_val(y, Fr::from(5u64));

        let lc = &(&LinearCombination::from_variable(x) * Fr::from(2u64))
            + &LinearCombination::from_variable(y);
        let lc = &lc + Fr::one();
        assert_eq!(lc.eval(pb.witness()), Fr::from(12u64));
    }

    #[test]
    fn constraint_swap_preserves_satisfaction() {
        let mut pb = Protoboard::<Fr>::new();
        let x = pb.allocate_variable();
        let y = pb.allocate_variable();
        pb.set_val(x, Fr::from(4u64));
        pb.set_val(y, Fr::from(16u64));

        let mut c = Constraint {
            a: LinearCombination::from_variable(x),
            b: LinearCombination::from_variable(x),
            c: LinearCombination::from_variable(y),
            annotation: "x * x = y".into(),
        };
        assert!(c.is_satisfied(pb.witness()));
        c.swap_ab();
        assert!(c.is_satisfied(pb.witness()));
    }

    #[test]
    #[should_panic(expected = "read before assignment")]
    fn unassigned_witness_read_aborts() {
        let mut pb = Protoboard::<Fr>::new();
        let x = pb.allocate_variable();
        pb.val(x);
    }
}
