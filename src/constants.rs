//! Deterministic derivation of the Poseidon round constants and MDS matrix
//! from seed strings.
//!
//! The derived bytes are part of a circuit's public identity: proving and
//! verification keys built from them stay valid only as long as the stream
//! is reproduced bit for bit.

use crate::field::FieldHelpers;
use ark_ff::PrimeField;
use blake2::{
    digest::{Update, VariableOutput},
    Blake2bVar,
};
use once_cell::sync::Lazy;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Mutex,
};
use thiserror::Error;

/// Seed of the round-constant stream.
pub const ROUND_CONSTANTS_SEED: &str = "poseidon_constants";

/// Seed of the MDS matrix stream.
pub const MATRIX_SEED: &str = "poseidon_matrix_0000";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstantsError {
    #[error("blake2b rejected output size {0}")]
    OutputSize(usize),
}

/// Bytes consumed from the constant stream per field element: the modulus
/// bit length rounded up to the *next* byte boundary. A bit length already
/// sitting on a byte boundary still gains a full byte; existing circuit
/// identities depend on this width, so it must not be "fixed".
pub fn stream_bytes<F: PrimeField>() -> usize {
    bytes_for_bit_len(F::MODULUS_BIT_SIZE as usize)
}

fn bytes_for_bit_len(bits: usize) -> usize {
    (bits + (8 - bits % 8)) / 8
}

fn blake2b(out_len: usize, data: &[u8]) -> Result<Vec<u8>, ConstantsError> {
    let mut hasher =
        Blake2bVar::new(out_len).map_err(|_| ConstantsError::OutputSize(out_len))?;
    hasher.update(data);
    let mut out = vec![0u8; out_len];
    hasher
        .finalize_variable(&mut out)
        .map_err(|_| ConstantsError::OutputSize(out_len))?;
    Ok(out)
}

/// Derives `n` field elements from `seed` by chaining keyless BLAKE2b over
/// its own output, decoding each block little-endian modulo the field order.
pub fn poseidon_constants<F: PrimeField>(seed: &str, n: usize) -> Result<Vec<F>, ConstantsError> {
    let width = stream_bytes::<F>();
    let mut result = Vec::with_capacity(n);
    if n == 0 {
        return Ok(result);
    }

    let mut block = blake2b(width, seed.as_bytes())?;
    result.push(F::from_bytes_le_mod_order(&block));
    for _ in 1..n {
        block = blake2b(width, &block)?;
        result.push(F::from_bytes_le_mod_order(&block));
    }
    Ok(result)
}

/// The `t×t` Cauchy matrix `m[i·t + j] = (c[i] − c[t+j])⁻¹` over `2t` stream
/// elements, row-major. MDS by construction.
pub fn poseidon_matrix<F: PrimeField>(seed: &str, t: usize) -> Result<Vec<F>, ConstantsError> {
    let c = poseidon_constants::<F>(seed, 2 * t)?;

    let mut result = Vec::with_capacity(t * t);
    for i in 0..t {
        for j in 0..t {
            let inv = (c[i] - c[t + j])
                .inverse()
                .expect("matrix seed produced a colliding Cauchy pair");
            result.push(inv);
        }
    }
    Ok(result)
}

/// Round constants and MDS matrix shared by every gadget of one `(t, F, P)`
/// parameterization. Immutable once built.
#[derive(Clone, Debug)]
pub struct PoseidonConstants<F: PrimeField> {
    /// One constant per round, `F + P` in total.
    pub c: Vec<F>,
    /// Row-major `t·t` matrix.
    pub m: Vec<F>,
}

type CacheKey = (TypeId, usize, usize, usize);

static CONSTANTS: Lazy<Mutex<HashMap<CacheKey, &'static (dyn Any + Send + Sync)>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// The process-wide constants for `(t, rf, rp)` over `F`. The first caller
/// builds them while later callers block on the table lock; afterwards every
/// gadget borrows the same leaked value.
pub fn poseidon_params<F: PrimeField>(
    t: usize,
    rf: usize,
    rp: usize,
) -> &'static PoseidonConstants<F> {
    let key = (TypeId::of::<F>(), t, rf, rp);
    let mut cache = CONSTANTS.lock().expect("constants cache poisoned");
    let cached: &'static (dyn Any + Send + Sync) = *cache.entry(key).or_insert_with(|| {
        let built = PoseidonConstants::<F> {
            c: poseidon_constants(ROUND_CONSTANTS_SEED, rf + rp)
                .expect("round constant derivation failed"),
            m: poseidon_matrix(MATRIX_SEED, t).expect("matrix derivation failed"),
        };
        let leaked: &'static PoseidonConstants<F> = Box::leak(Box::new(built));
        leaked
    });
    cached
        .downcast_ref::<PoseidonConstants<F>>()
        .expect("constants cache holds a foreign type under this key")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;

    #[test]
    fn stream_width_always_gains_a_partial_or_full_byte() {
        assert_eq!(bytes_for_bit_len(254), 32);
        assert_eq!(bytes_for_bit_len(255), 32);
        // a bit length on a byte boundary still rounds up to the next byte
        assert_eq!(bytes_for_bit_len(256), 33);
        assert_eq!(bytes_for_bit_len(8), 2);
    }

    #[test]
    fn chained_stream_is_deterministic() {
        let a = poseidon_constants::<Fr>(ROUND_CONSTANTS_SEED, 4).unwrap();
        let b = poseidon_constants::<Fr>(ROUND_CONSTANTS_SEED, 4).unwrap();
        assert_eq!(a, b);
        // each element feeds the next; a longer request extends the prefix
        let longer = poseidon_constants::<Fr>(ROUND_CONSTANTS_SEED, 6).unwrap();
        assert_eq!(&longer[..4], &a[..]);
    }

    #[test]
    fn params_are_shared_by_reference() {
        let a = poseidon_params::<Fr>(6, 8, 57);
        let b = poseidon_params::<Fr>(6, 8, 57);
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.c.len(), 65);
        assert_eq!(a.m.len(), 36);
    }

    #[test]
    fn empty_request_yields_no_constants() {
        let none = poseidon_constants::<Fr>(ROUND_CONSTANTS_SEED, 0).unwrap();
        assert!(none.is_empty());
    }
}
