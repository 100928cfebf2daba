//! Polynomial coefficients and VSS commitments, grounded on
//! `topos-network-ice-frost`'s `src/dkg/secret_share.rs` types of the same
//! name (referenced from its `participant.rs`), concretized to secp256k1.

use zeroize::Zeroize;

use crate::curve::{point_compress, point_decompress, Point, Scalar, SecretScalar};
use crate::error::CoreResult;

/// A participant's secret polynomial `f_i(x) = a_0 + a_1 x + ... + a_{t-1} x^{t-1}`.
/// `a_0` is this participant's secret contribution to the group key (§3).
#[derive(Clone)]
pub struct Coefficients(pub Vec<SecretScalar>);

impl Coefficients {
    pub fn sample(t: usize, rng: &mut (impl rand::RngCore + rand::CryptoRng)) -> Self {
        Self(
            (0..t)
                .map(|_| SecretScalar::new(crate::curve::rand_scalar_nonzero(rng)))
                .collect(),
        )
    }

    /// A polynomial with `g(0) = 0`, used by key-share refresh (§4.B
    /// "Refresh"): the constant term is fixed to zero so the group public
    /// key is unchanged, and the remaining `t-1` coefficients are random.
    pub fn sample_zero_constant(
        t: usize,
        rng: &mut (impl rand::RngCore + rand::CryptoRng),
    ) -> Self {
        let mut coeffs = Vec::with_capacity(t);
        coeffs.push(SecretScalar::new(Scalar::from(0u64)));
        for _ in 1..t {
            coeffs.push(SecretScalar::new(crate::curve::rand_scalar_nonzero(rng)));
        }
        Self(coeffs)
    }

    pub fn evaluate(&self, x: u32) -> Scalar {
        let x = Scalar::from(x);
        let mut acc = Scalar::from(0u64);
        for coeff in self.0.iter().rev() {
            acc = acc * x + coeff.expose();
        }
        acc
    }

    pub fn commit(&self) -> Vec<Point> {
        self.0
            .iter()
            .map(|c| crate::curve::generator() * c.expose())
            .collect()
    }
}

/// The public commitments `[A_0, ..., A_{t-1}]` a participant publishes for
/// their polynomial, plus the index they belong to so peers can tell whose
/// commitment set they are looking at once packages start arriving out of
/// order (§5 "the engines are reorder-tolerant within a round").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiableSecretSharingCommitment {
    pub index: u32,
    pub points: Vec<Point>,
}

impl VerifiableSecretSharingCommitment {
    /// `A_0`, this participant's contribution to the group public key.
    pub fn constant_term(&self) -> Option<&Point> {
        self.points.first()
    }

    /// Checks `f_i(index) * G == Sum_k A_{i,k} * index^k`, i.e. that a
    /// received share is consistent with the sender's published commitments.
    pub fn verify_share(&self, index: u32, share: &Scalar) -> bool {
        let lhs = crate::curve::generator() * share;
        let rhs = crate::curve::evaluate_commitment_at(&self.points, index);
        lhs == rhs
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.points.len() * 33);
        out.extend_from_slice(&self.index.to_be_bytes());
        for p in &self.points {
            out.extend_from_slice(&point_compress(p));
        }
        out
    }

    pub fn from_bytes(bytes: &[u8], expected_len: usize) -> CoreResult<Self> {
        if bytes.len() < 4 || (bytes.len() - 4) % 33 != 0 {
            return Err(crate::error::CoreError::invalid(
                "malformed VSS commitment encoding",
            ));
        }
        let index = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        let rest = &bytes[4..];
        if rest.len() / 33 != expected_len {
            return Err(crate::error::CoreError::invalid(
                "VSS commitment length mismatch",
            ));
        }
        let mut points = Vec::with_capacity(expected_len);
        for chunk in rest.chunks_exact(33) {
            points.push(point_decompress(chunk)?);
        }
        Ok(Self { index, points })
    }
}

impl Zeroize for Coefficients {
    fn zeroize(&mut self) {
        // Each `SecretScalar` zeroizes itself on drop; this impl exists so
        // `Coefficients` can be dropped inside a larger zeroizing struct.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn share_matches_own_commitment() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let coeffs = Coefficients::sample(3, &mut rng);
        let points = coeffs.commit();
        let commitment = VerifiableSecretSharingCommitment { index: 1, points };

        for idx in 1..=5u32 {
            let share = coeffs.evaluate(idx);
            assert!(commitment.verify_share(idx, &share));
        }
    }

    #[test]
    fn tampered_share_is_rejected() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(43);
        let coeffs = Coefficients::sample(2, &mut rng);
        let points = coeffs.commit();
        let commitment = VerifiableSecretSharingCommitment { index: 1, points };

        let mut share = coeffs.evaluate(2);
        share += Scalar::from(1u64);
        assert!(!commitment.verify_share(2, &share));
    }

    #[test]
    fn zero_constant_polynomial_evaluates_to_zero_at_origin() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(44);
        let coeffs = Coefficients::sample_zero_constant(4, &mut rng);
        assert_eq!(coeffs.evaluate(0), Scalar::from(0u64));
    }
}
