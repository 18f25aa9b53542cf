//! The `x → x⁵` S-box, the only constraint-consuming step of the
//! permutation.

use crate::r1cs::{Assignment, LinearCombination, Protoboard, Variable};
use ark_ff::PrimeField;

/// Raises a linear combination to the fifth power through three fresh
/// variables and three constraints:
///
/// ```text
/// x  · x  = x₂
/// x₂ · x₂ = x₄
/// x  · x₄ = x₅
/// ```
#[derive(Clone, Debug)]
pub struct FifthPower {
    x2: Variable,
    x4: Variable,
    x5: Variable,
}

impl FifthPower {
    pub fn new<F: PrimeField>(pb: &mut Protoboard<F>) -> Self {
        Self {
            x2: pb.allocate_variable(),
            x4: pb.allocate_variable(),
            x5: pb.allocate_variable(),
        }
    }

    pub fn generate_constraints<F: PrimeField>(
        &self,
        pb: &mut Protoboard<F>,
        x: &LinearCombination<F>,
        annotation: &str,
    ) {
        let x2 = LinearCombination::from_variable(self.x2);
        let x4 = LinearCombination::from_variable(self.x4);
        let x5 = LinearCombination::from_variable(self.x5);
        pb.add_constraint(x.clone(), x.clone(), x2.clone(), format!("{annotation}.x^2"));
        pb.add_constraint(x2.clone(), x2, x4.clone(), format!("{annotation}.x^4"));
        pb.add_constraint(x.clone(), x4, x5, format!("{annotation}.x^5"));
    }

    pub fn generate_witness<F: PrimeField>(&self, w: &mut Assignment<F>, val_x: F) {
        let val_x2 = val_x * val_x;
        let val_x4 = val_x2 * val_x2;
        w.set_val(self.x2, val_x2);
        w.set_val(self.x4, val_x4);
        w.set_val(self.x5, val_x4 * val_x);
    }

    /// The `x⁵` variable, reusable as a single-term combination downstream.
    pub fn result(&self) -> Variable {
        self.x5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use ark_ff::Field;

    #[test]
    fn fifth_power_constraints_and_witness() {
        let mut pb = Protoboard::<Fr>::new();
        let x = pb.allocate_variable();
        let sbox = FifthPower::new(&mut pb);
        let x_lc = LinearCombination::from_variable(x);
        sbox.generate_constraints(&mut pb, &x_lc, "sbox");
        assert_eq!(pb.num_constraints(), 3);

        let val = Fr::from(7u64);
        pb.set_val(x, val);
        let mut w = pb.witness().clone();
        sbox.generate_witness(&mut w, val);
        assert_eq!(w.val(sbox.result()), val.pow([5u64]));

        pb.set_val(sbox.x2, w.val(sbox.x2));
        pb.set_val(sbox.x4, w.val(sbox.x4));
        pb.set_val(sbox.x5, w.val(sbox.x5));
        assert!(pb.is_satisfied());
    }
}
