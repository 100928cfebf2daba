//! Long-lived key material: Diffie-Hellman keys used for share-distribution
//! encryption, individual signing/verifying shares, the group public key,
//! and the `KeyPackage` that Component B hands off to persistent storage.
//!
//! Grounded on `topos-network-ice-frost`'s `src/keys.rs`, concretized from
//! its generic `CipherSuite` parameter down to the single secp256k1 instance
//! this crate targets.

use core::ops::Deref;

use zeroize::Zeroize;

use crate::curve::{
    evaluate_commitment_at, generator, lagrange_coefficient, point_compress, point_decompress,
    scalar_from_bytes, scalar_to_bytes, Point, Scalar, SecretScalar,
};
use crate::error::CoreResult;

/// A Diffie-Hellman private key, used only to derive the conversation key
/// for encrypting shares to a specific peer (§4.B, §9 "Encryption for share
/// distribution"). Zeroized on drop.
#[derive(Clone)]
pub struct DiffieHellmanPrivateKey(SecretScalar);

impl DiffieHellmanPrivateKey {
    pub fn new(scalar: Scalar) -> Self {
        Self(SecretScalar::new(scalar))
    }

    pub fn to_public(&self) -> DiffieHellmanPublicKey {
        DiffieHellmanPublicKey(generator() * self.0.expose())
    }

    pub(crate) fn scalar(&self) -> &Scalar {
        self.0.expose()
    }
}

/// A Diffie-Hellman public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffieHellmanPublicKey(pub(crate) Point);

impl DiffieHellmanPublicKey {
    pub fn to_bytes(&self) -> [u8; 33] {
        point_compress(&self.0)
    }

    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        Ok(Self(point_decompress(bytes)?))
    }
}

impl Deref for DiffieHellmanPublicKey {
    type Target = Point;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// This participant's long-lived secret share of the group signing key,
/// `s_i` in §3/§4.B. Zeroized on drop.
#[derive(Clone)]
pub struct IndividualSigningKey {
    pub index: u32,
    secret: SecretScalar,
}

impl IndividualSigningKey {
    pub fn new(index: u32, secret: Scalar) -> Self {
        Self {
            index,
            secret: SecretScalar::new(secret),
        }
    }

    pub fn secret_scalar(&self) -> &Scalar {
        self.secret.expose()
    }

    pub fn to_public(&self) -> IndividualVerifyingKey {
        IndividualVerifyingKey {
            index: self.index,
            share: generator() * self.secret.expose(),
        }
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        scalar_to_bytes(self.secret.expose())
    }

    pub fn from_bytes(index: u32, bytes: &[u8]) -> CoreResult<Self> {
        Ok(Self::new(index, scalar_from_bytes(bytes, false)?))
    }
}

/// A public verification share for a participant: `P_i = s_i * G`. Any
/// participant can recompute any other's share from the aggregated VSS
/// commitments alone, without learning `s_i` (§4.C "self-verifies").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndividualVerifyingKey {
    pub index: u32,
    pub share: Point,
}

impl IndividualVerifyingKey {
    /// Recomputes `P_i` from the aggregated VSS commitments `[Y_0, ..., Y_{t-1}]`
    /// (the per-coefficient point sums across all peers' polynomials), i.e.
    /// the public polynomial evaluated at `index`.
    pub fn from_commitments(index: u32, aggregated_commitments: &[Point]) -> Self {
        Self {
            index,
            share: evaluate_commitment_at(aggregated_commitments, index),
        }
    }

    pub fn to_bytes(&self) -> [u8; 33] {
        point_compress(&self.share)
    }
}

/// The group public key `Y`, the root identity this entire system exists to
/// protect. Identical across every `KeyPackage` produced by a given DKG run,
/// and preserved bit-for-bit across refreshes (§4.B "Refresh").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupKey(pub Point);

impl GroupKey {
    pub fn to_bytes(&self) -> [u8; 33] {
        point_compress(&self.0)
    }

    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        Ok(Self(point_decompress(bytes)?))
    }
}

/// The output of DKG (§3 "KeyPackage"): a participant's share plus the
/// public material needed to use it in signing. Owned by the participant
/// for as long as they remain a group admin (§3 "Ownership and lifecycle").
#[derive(Clone)]
pub struct KeyPackage {
    pub share: IndividualSigningKey,
    pub group_public_key: GroupKey,
    /// Aggregated VSS commitments `[Y_0, ..., Y_{t-1}]`, one point per
    /// polynomial coefficient, summed across every participant's polynomial.
    pub vss_commitments: Vec<Point>,
    pub threshold: u32,
    pub max_signers: u32,
}

impl KeyPackage {
    pub fn verifying_key(&self) -> IndividualVerifyingKey {
        IndividualVerifyingKey::from_commitments(self.share.index, &self.vss_commitments)
    }

    /// Every participant's public verification share, recomputed from the
    /// aggregated commitments. Used by the signing engine to self-verify
    /// partial signatures from peers without asking them for anything extra.
    pub fn verifying_key_for(&self, index: u32) -> IndividualVerifyingKey {
        IndividualVerifyingKey::from_commitments(index, &self.vss_commitments)
    }
}

impl Zeroize for KeyPackage {
    fn zeroize(&mut self) {
        // `IndividualSigningKey`'s own `Drop` zeroizes the secret scalar;
        // nothing else in a `KeyPackage` is secret material.
    }
}

/// Recomputes the Lagrange-weighted secret implied by a set of shares,
/// `Sigma_{i in S} lambda_i * s_i`. Exposed only for the quantified-invariant
/// tests in §8 ("DKG correctness") — normal operation never reconstructs the
/// group secret.
#[cfg(test)]
pub(crate) fn reconstruct_group_secret(shares: &[(u32, Scalar)]) -> CoreResult<Scalar> {
    let indices: Vec<u32> = shares.iter().map(|(i, _)| *i).collect();
    let mut acc = Scalar::from(0u64);
    for (index, secret) in shares {
        let lambda = lagrange_coefficient(*index, &indices)?;
        acc += lambda * secret;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn verifying_key_matches_signing_key() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let secret = crate::curve::rand_scalar_nonzero(&mut rng);
        let key = IndividualSigningKey::new(1, secret);
        let expected = generator() * secret;
        assert_eq!(key.to_public().share, expected);
    }

    #[test]
    fn group_key_roundtrip() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(8);
        let secret = crate::curve::rand_scalar_nonzero(&mut rng);
        let gk = GroupKey(generator() * secret);
        let bytes = gk.to_bytes();
        assert_eq!(GroupKey::from_bytes(&bytes).unwrap(), gk);
    }
}
