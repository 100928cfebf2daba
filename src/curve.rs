//! Component A — scalar/curve primitives.
//!
//! The curve is fixed to secp256k1 (`ark-secp256k1`); this crate is not a
//! multi-curve library, so unlike the teacher's generic `CipherSuite` seam
//! this module exposes concrete types directly. All arithmetic below is
//! whatever `ark-ff`/`ark-ec` do for this curve (constant-time field and
//! group operations); the only thing this module adds is the encoding,
//! sampling, and tagged-hashing conventions the rest of the crate depends on.

use ark_ec::{CurveGroup, Group};
use ark_ff::{BigInteger, Field, PrimeField, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{CoreError, CoreResult};

/// A secp256k1 scalar, i.e. an element of the field mod the curve order `n`.
pub type Scalar = ark_secp256k1::Fr;
/// A secp256k1 curve point in projective coordinates.
pub type Point = ark_secp256k1::Projective;
/// A secp256k1 curve point in affine coordinates (needed to read the y-parity).
pub type Affine = ark_secp256k1::Affine;

pub const SCALAR_SIZE: usize = 32;
pub const POINT_SIZE: usize = 33;

/// Samples a scalar uniformly at random, resampling on the (astronomically
/// unlikely) chance of a zero, since zero is never a valid secret.
pub fn rand_scalar_nonzero(rng: &mut (impl RngCore + CryptoRng)) -> Scalar {
    loop {
        let s = Scalar::rand(rng);
        if !s.is_zero() {
            return s;
        }
    }
}

pub fn scalar_to_bytes(s: &Scalar) -> [u8; SCALAR_SIZE] {
    let mut bytes = [0u8; SCALAR_SIZE];
    let mut buf = Vec::with_capacity(SCALAR_SIZE);
    s.serialize_compressed(&mut buf)
        .expect("scalar serialization is infallible");
    bytes.copy_from_slice(&buf);
    bytes
}

/// Decodes a scalar, rejecting the non-canonical encodings (value `>= n`)
/// that `CanonicalDeserialize` itself rejects, and additionally rejecting
/// zero when `allow_zero` is false.
pub fn scalar_from_bytes(bytes: &[u8], allow_zero: bool) -> CoreResult<Scalar> {
    if bytes.len() != SCALAR_SIZE {
        return Err(CoreError::invalid("scalar must be 32 bytes"));
    }
    let scalar = Scalar::deserialize_compressed(bytes)
        .map_err(|_| CoreError::invalid("scalar is not canonically encoded mod n"))?;
    if !allow_zero && scalar.is_zero() {
        return Err(CoreError::invalid("scalar must be nonzero"));
    }
    Ok(scalar)
}

pub fn point_compress(p: &Point) -> [u8; POINT_SIZE] {
    let mut bytes = [0u8; POINT_SIZE];
    let mut buf = Vec::with_capacity(POINT_SIZE);
    p.into_affine()
        .serialize_compressed(&mut buf)
        .expect("point serialization is infallible");
    bytes.copy_from_slice(&buf);
    bytes
}

pub fn point_decompress(bytes: &[u8]) -> CoreResult<Point> {
    if bytes.len() != POINT_SIZE {
        return Err(CoreError::invalid("point must be 33 bytes"));
    }
    let affine = Affine::deserialize_compressed(bytes)
        .map_err(|_| CoreError::invalid("point is not a valid secp256k1 point"))?;
    Ok(affine.into())
}

pub fn generator() -> Point {
    Point::generator()
}

/// `true` if the affine point's y-coordinate is even, in BIP340's sense.
/// Used to normalize the group commitment `R` into an x-only, 32-byte form
/// so the final signature can be encoded in 64 bytes rather than 65.
pub fn has_even_y(p: &Affine) -> bool {
    !p.y.into_bigint().is_odd()
}

/// Negates a point so that its affine y-coordinate is even, returning the
/// (possibly unchanged) point and whether a negation happened.
pub fn normalize_even_y(p: Point) -> (Point, bool) {
    let affine = p.into_affine();
    if has_even_y(&affine) {
        (p, false)
    } else {
        (-p, true)
    }
}

/// The x-only, 32-byte encoding of a point used in the final 64-byte signature.
pub fn point_x_only(p: &Point) -> [u8; 32] {
    let affine = p.into_affine();
    let mut bytes = [0u8; 32];
    let mut buf = Vec::with_capacity(32);
    affine
        .x
        .serialize_compressed(&mut buf)
        .expect("base field serialization is infallible");
    bytes.copy_from_slice(&buf);
    bytes
}

/// BIP340-style tagged hash: `SHA256(SHA256(tag) || SHA256(tag) || data...)`.
/// Keeps every hash used by this crate domain-separated by construction,
/// rather than relying on callers to prefix a literal tag string themselves.
pub fn tagged_hash(tag: &str, chunks: &[&[u8]]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    for chunk in chunks {
        hasher.update(chunk);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// `H_tag(data...) -> Scalar`, reducing the tagged hash output mod the curve
/// order. This is the `H_tag` primitive Component A exposes to the rest of
/// the crate (binding factors, Schnorr challenges, NIZK challenges, the DKG
/// KDF context, ...).
pub fn hash_to_scalar(tag: &str, chunks: &[&[u8]]) -> Scalar {
    let digest = tagged_hash(tag, chunks);
    Scalar::from_le_bytes_mod_order(&digest)
}

/// Evaluates the public polynomial described by `commitments` (the VSS
/// commitments `[A_0, ..., A_{t-1}]`) at `index`, giving `P_i = s_i * G`
/// without ever learning `s_i`. Used both to self-verify partial signatures
/// (§4.C) and to recompute any peer's public verification share (§4.B).
pub fn evaluate_commitment_at(commitments: &[Point], index: u32) -> Point {
    let x = Scalar::from(index);
    let mut acc = Point::zero();
    for coeff_commitment in commitments.iter().rev() {
        acc = acc * x + coeff_commitment;
    }
    acc
}

/// Lagrange coefficient `lambda_i` for `my_index` within `all_indices`,
/// evaluated at x = 0 (i.e. the standard secret-reconstruction weighting).
pub fn lagrange_coefficient(my_index: u32, all_indices: &[u32]) -> CoreResult<Scalar> {
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;
    let my_index_field = Scalar::from(my_index);

    for &j in all_indices {
        if j == my_index {
            continue;
        }
        let j_field = Scalar::from(j);
        numerator *= j_field;
        denominator *= j_field - my_index_field;
    }

    if denominator.is_zero() {
        return Err(CoreError::invalid("duplicate participant indices"));
    }

    Ok(numerator * denominator.inverse().expect("checked nonzero above"))
}

/// A secret scalar that zeroizes its bytes on drop. Used for polynomial
/// coefficients, DH private keys, and signing nonces (§5 "Secret hygiene").
#[derive(Clone)]
pub struct SecretScalar(pub(crate) Scalar);

impl SecretScalar {
    pub fn new(s: Scalar) -> Self {
        Self(s)
    }

    pub fn expose(&self) -> &Scalar {
        &self.0
    }
}

impl Drop for SecretScalar {
    fn drop(&mut self) {
        // `Scalar` does not implement `Zeroize` directly (it is not a byte
        // buffer), so we zero the backing limbs through its bytes instead.
        let mut bytes = scalar_to_bytes(&self.0);
        bytes.zeroize();
        self.0 = Scalar::zero();
    }
}

impl core::fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SecretScalar(..)")
    }
}
