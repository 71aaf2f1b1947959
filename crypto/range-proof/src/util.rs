// Copyright (c) 2024 Botho Foundation

use curve25519_dalek::scalar::Scalar;

/// `1, x, x², ...`
pub struct ScalarExp {
    x: Scalar,
    next_exp_x: Scalar,
}

impl Iterator for ScalarExp {
    type Item = Scalar;

    fn next(&mut self) -> Option<Scalar> {
        let exp_x = self.next_exp_x;
        self.next_exp_x *= self.x;
        Some(exp_x)
    }

    // Unbounded, so zipping with a slice keeps the slice's exact length.
    // Multiscalar multiplication checks scalar and point hints agree.
    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

pub fn exp_iter(x: Scalar) -> ScalarExp {
    ScalarExp {
        x,
        next_exp_x: Scalar::ONE,
    }
}

/// `Σ_{i<n} x^i`
pub fn sum_of_powers(x: &Scalar, n: usize) -> Scalar {
    exp_iter(*x).take(n).sum()
}

pub fn inner_product(a: &[Scalar], b: &[Scalar]) -> Scalar {
    a.iter().zip(b).map(|(a, b)| a * b).sum()
}

/// Evaluate `v0 + v1·x` coefficient-wise.
pub fn vec_poly_eval(v0: &[Scalar], v1: &[Scalar], x: &Scalar) -> Vec<Scalar> {
    v0.iter().zip(v1).map(|(a, b)| a + b * x).collect()
}

/// Little-endian bits of `value` as scalars.
pub fn bits(value: u64, n: usize) -> Vec<Scalar> {
    (0..n).map(|i| Scalar::from((value >> i) & 1)).collect()
}
