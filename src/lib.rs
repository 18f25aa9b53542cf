//! Poseidon permutation and hash as a rank-1 constraint system gadget.
//!
//! The permutation state is carried as linear combinations over already
//! existing circuit variables, so adding round constants and mixing through
//! the MDS matrix are free; only the `x⁵` S-boxes allocate variables and emit
//! constraints. A full round costs `3t` constraints and a partial round `3c`,
//! for a total of `3·(t·F + c·P)` plus one identity constraint per pinned
//! output.
//!
//! A master circuit is built once per parameter tuple on a private scratch
//! protoboard and stamped into caller circuits by index translation, so a
//! circuit invoking the hash thousands of times shares a single set of
//! constraint bodies.

pub mod constants;
pub mod field;
pub mod gadget;
pub mod master;
pub mod permutation;
pub mod r1cs;
pub mod round;
pub mod sbox;

pub use gadget::{Poseidon, Poseidon128, Poseidon128Spec, PoseidonSpec};
pub use master::{PoseidonMaster, PoseidonParams};
pub use permutation::poseidon_hash;
pub use r1cs::{LinearCombination, Protoboard, Variable};
