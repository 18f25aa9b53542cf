//! Helper methods over [`ark_ff::PrimeField`].
//!
//! Unless otherwise stated everything is in little-endian byte order.

use ark_ff::{BigInteger, PrimeField};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use num_bigint::BigUint;
use thiserror::Error;

/// Field helpers error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldHelpersError {
    #[error("failed to deserialize field bytes")]
    DeserializeBytes,
    #[error("failed to decode hex")]
    DecodeHex,
}

/// Result alias using [FieldHelpersError]
pub type Result<T> = core::result::Result<T, FieldHelpersError>;

/// Field element helpers
pub trait FieldHelpers<F> {
    /// Deserialize from canonical bytes; fails on non-canonical encodings
    fn from_bytes(bytes: &[u8]) -> Result<F>;

    /// Deserialize from little-endian bytes of any length, reducing modulo
    /// the field order
    fn from_bytes_le_mod_order(bytes: &[u8]) -> F;

    /// Deserialize from little-endian hex
    fn from_hex(hex: &str) -> Result<F>;

    /// Serialize to canonical bytes
    fn to_bytes(&self) -> Vec<u8>;

    /// Serialize to little-endian hex
    fn to_hex(&self) -> String;

    /// Serialize to a [BigUint]
    fn to_biguint(&self) -> BigUint;

    /// Field size in bytes
    fn size_in_bytes() -> usize
    where
        F: PrimeField,
    {
        (F::MODULUS_BIT_SIZE as usize + 7) / 8
    }
}

impl<F: PrimeField> FieldHelpers<F> for F {
    fn from_bytes(bytes: &[u8]) -> Result<F> {
        F::deserialize_compressed(bytes).map_err(|_| FieldHelpersError::DeserializeBytes)
    }

    fn from_bytes_le_mod_order(bytes: &[u8]) -> F {
        F::from_le_bytes_mod_order(bytes)
    }

    fn from_hex(hex: &str) -> Result<F> {
        let bytes: Vec<u8> = hex::decode(hex).map_err(|_| FieldHelpersError::DecodeHex)?;
        F::deserialize_compressed(&bytes[..]).map_err(|_| FieldHelpersError::DeserializeBytes)
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = vec![];
        self.serialize_compressed(&mut bytes)
            .expect("failed to serialize field element");
        bytes
    }

    fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_le(&self.into_bigint().to_bytes_le())
    }
}
