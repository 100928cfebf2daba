//! The two-round, coordinator-less threshold signing protocol (§4.C).
//!
//! One `SigningSession` is owned by each participating signer. Unlike
//! Component B's `DkgSession`, there is no separate `Failed` state: a
//! self-verification or partial-signature failure here is defined by the
//! design as fatal and unrecoverable (§4.C "A self-verification failure is
//! fatal"), so it is surfaced as an ordinary `Err` and the caller is
//! expected to discard the session.

use std::collections::BTreeMap;

use ark_ec::CurveGroup;
use ark_ff::Zero;
use rand::{CryptoRng, RngCore};
use tracing::{debug, debug_span, info, warn};

use crate::curve::{
    generator, hash_to_scalar, lagrange_coefficient, normalize_even_y, point_compress,
    point_x_only, scalar_from_bytes, scalar_to_bytes, Point, Scalar,
};
use crate::error::{CoreError, CoreResult, SigningErrorKind};
use crate::keys::{GroupKey, KeyPackage};

use super::precomputation::CommitmentShare;

const RHO_CONTEXT: &str = "quorum-root/sign/rho";
const CHALLENGE_CONTEXT: &str = "quorum-root/sign/challenge";

/// Cached once `sign` first runs, so every subsequent `ingest_partial` call
/// verifies against the exact same `(R, c, sign_factor, rho_i)` the signer
/// itself used — these values depend only on data already fixed at that
/// point (the full set of public nonces, the message, and the group key).
struct SigningContext {
    group_commitment: Point,
    challenge: Scalar,
    /// `-1` if the raw group commitment had to be negated to land on an
    /// even-y point for the 64-byte x-only encoding, `+1` otherwise.
    sign_factor: Scalar,
    rhos: BTreeMap<u32, Scalar>,
}

pub struct SigningSession {
    message: [u8; 32],
    group_public_key: GroupKey,
    signer_indices: Vec<u32>,
    key_package: KeyPackage,
    my_commitment: Option<CommitmentShare>,
    public_nonces: BTreeMap<u32, (Point, Point)>,
    partial_signatures: BTreeMap<u32, Scalar>,
    final_signature: Option<[u8; 64]>,
    context: Option<SigningContext>,
}

impl SigningSession {
    /// `create_session` (§4.C "Operations"). Rejects `|signerIndices| < t`
    /// and rejects `myIndex ∉ signerIndices`.
    pub fn create_session(
        message: [u8; 32],
        group_public_key: GroupKey,
        mut signer_indices: Vec<u32>,
        key_package: KeyPackage,
    ) -> CoreResult<Self> {
        signer_indices.sort_unstable();
        signer_indices.dedup();

        if signer_indices.len() < key_package.threshold as usize {
            return Err(CoreError::signing(
                key_package.share.index,
                SigningErrorKind::TooFewShares,
            ));
        }
        if !signer_indices.contains(&key_package.share.index) {
            return Err(CoreError::signing(
                key_package.share.index,
                SigningErrorKind::NotInSignerSet,
            ));
        }

        Ok(Self {
            message,
            group_public_key,
            signer_indices,
            key_package,
            my_commitment: None,
            public_nonces: BTreeMap::new(),
            partial_signatures: BTreeMap::new(),
            final_signature: None,
            context: None,
        })
    }

    pub fn my_index(&self) -> u32 {
        self.key_package.share.index
    }

    /// A span carrying the fields every signing log line is tagged with
    /// (§3a "a span per DKG/signing session").
    fn span(&self) -> tracing::Span {
        debug_span!("signing_session", message = %hex::encode(self.message), my_index = self.my_index())
    }

    pub fn signer_indices(&self) -> &[u32] {
        &self.signer_indices
    }

    pub fn final_signature(&self) -> Option<[u8; 64]> {
        self.final_signature
    }

    /// `commit` — draws this signer's nonce pair and publishes `(D_i, E_i)`.
    /// Rejects a double-commit (§4.C "rejects double-commit").
    pub fn commit(&mut self, rng: &mut (impl RngCore + CryptoRng)) -> CoreResult<(Point, Point)> {
        if self.my_commitment.is_some() {
            return Err(CoreError::signing(self.my_index(), SigningErrorKind::DoubleCommit));
        }
        let share = CommitmentShare::new(rng);
        let published = share.publish();
        self.my_commitment = Some(share);
        self.public_nonces.insert(self.my_index(), published);
        debug!(parent: &self.span(), "nonce commitment published");
        Ok(published)
    }

    /// `ingest_nonce` — rejects an index outside the signer set and a
    /// duplicate entry that disagrees with the one already on file.
    pub fn ingest_nonce(&mut self, index: u32, hiding: Point, binding: Point) -> CoreResult<()> {
        if !self.signer_indices.contains(&index) {
            return Err(CoreError::signing(index, SigningErrorKind::NotInSignerSet));
        }
        if let Some(existing) = self.public_nonces.get(&index) {
            if *existing != (hiding, binding) {
                return Err(CoreError::signing(index, SigningErrorKind::NonceMismatch));
            }
            return Ok(());
        }
        self.public_nonces.insert(index, (hiding, binding));
        Ok(())
    }

    fn ensure_context(&mut self) -> CoreResult<&SigningContext> {
        if self.context.is_none() {
            if self.public_nonces.len() != self.signer_indices.len() {
                return Err(CoreError::signing(
                    self.my_index(),
                    SigningErrorKind::MissingNonces,
                ));
            }

            let binding_input: Vec<u8> = self
                .signer_indices
                .iter()
                .flat_map(|i| {
                    let (hiding, binding) = self.public_nonces[i];
                    let mut buf = Vec::with_capacity(4 + 33 + 33);
                    buf.extend_from_slice(&i.to_be_bytes());
                    buf.extend_from_slice(&point_compress(&hiding));
                    buf.extend_from_slice(&point_compress(&binding));
                    buf
                })
                .collect();

            let mut rhos = BTreeMap::new();
            let mut group_commitment = Point::zero();
            for &i in &self.signer_indices {
                let rho_i = hash_to_scalar(
                    RHO_CONTEXT,
                    &[&i.to_be_bytes(), &binding_input, &self.message],
                );
                let (hiding, binding) = self.public_nonces[&i];
                group_commitment = group_commitment + hiding + binding * rho_i;
                rhos.insert(i, rho_i);
            }

            let (group_commitment, negated) = normalize_even_y(group_commitment);
            let sign_factor = if negated { -Scalar::from(1u64) } else { Scalar::from(1u64) };

            let challenge = hash_to_scalar(
                CHALLENGE_CONTEXT,
                &[
                    &point_x_only(&group_commitment),
                    &point_compress(&self.group_public_key.0),
                    &self.message,
                ],
            );

            self.context = Some(SigningContext {
                group_commitment,
                challenge,
                sign_factor,
                rhos,
            });
        }
        Ok(self.context.as_ref().expect("just populated"))
    }

    /// `sign` — requires all public nonces to be present, computes this
    /// signer's partial signature, and self-verifies it before returning
    /// (§4.C "Round 2 — Partial signature").
    pub fn sign(&mut self) -> CoreResult<Scalar> {
        self.ensure_context()?;
        let my_index = self.my_index();

        let commitment = self
            .my_commitment
            .as_ref()
            .ok_or_else(|| CoreError::signing(my_index, SigningErrorKind::MissingNonces))?;
        let d_i = *commitment.hiding.secret.expose();
        let e_i = *commitment.binding.secret.expose();

        let ctx = self.context.as_ref().expect("ensure_context populated it");
        let rho_i = ctx.rhos[&my_index];
        let lambda_i = lagrange_coefficient(my_index, &self.signer_indices)?;
        let c = ctx.challenge;
        let sign_factor = ctx.sign_factor;

        let s_i = *self.key_package.share.secret_scalar();
        let z_i = sign_factor * (d_i + rho_i * e_i) + lambda_i * s_i * c;

        let p_i = self.key_package.verifying_key_for(my_index).share;
        let (hiding_pub, binding_pub) = self.public_nonces[&my_index];
        let lhs = generator() * z_i;
        let rhs = (hiding_pub + binding_pub * rho_i) * sign_factor + p_i * (lambda_i * c);
        if lhs != rhs {
            return Err(CoreError::Internal(
                "partial signature failed self-verification".into(),
            ));
        }

        self.partial_signatures.insert(my_index, z_i);
        debug!(parent: &self.span(), "partial signature computed and self-verified");
        Ok(z_i)
    }

    /// `ingest_partial` — verifies a peer's partial signature against its
    /// recomputed public verification share before accepting it; never
    /// trusts a transmitted `P_i` (§4.C, Component B note on derivability).
    pub fn ingest_partial(&mut self, index: u32, z_i: Scalar) -> CoreResult<()> {
        if !self.signer_indices.contains(&index) {
            return Err(CoreError::signing(index, SigningErrorKind::NotInSignerSet));
        }
        if let Some(existing) = self.partial_signatures.get(&index) {
            if *existing != z_i {
                return Err(CoreError::signing(index, SigningErrorKind::InvalidPartial));
            }
            return Ok(());
        }

        let ctx = self
            .context
            .as_ref()
            .ok_or_else(|| CoreError::signing(index, SigningErrorKind::MissingNonces))?;
        let rho_i = *ctx
            .rhos
            .get(&index)
            .ok_or_else(|| CoreError::signing(index, SigningErrorKind::MissingNonces))?;
        let c = ctx.challenge;
        let sign_factor = ctx.sign_factor;

        let (hiding_pub, binding_pub) = *self
            .public_nonces
            .get(&index)
            .ok_or_else(|| CoreError::signing(index, SigningErrorKind::MissingNonces))?;
        let lambda_i = lagrange_coefficient(index, &self.signer_indices)?;
        let p_i = self.key_package.verifying_key_for(index).share;

        let lhs = generator() * z_i;
        let rhs = (hiding_pub + binding_pub * rho_i) * sign_factor + p_i * (lambda_i * c);
        if lhs != rhs {
            warn!(parent: &self.span(), blamed_peer = index, "partial signature failed verification");
            return Err(CoreError::signing(index, SigningErrorKind::InvalidPartial));
        }

        self.partial_signatures.insert(index, z_i);
        Ok(())
    }

    /// `aggregate` — requires all partials, verifies the final signature
    /// before returning it (§4.C "Aggregation").
    pub fn aggregate(&mut self) -> CoreResult<[u8; 64]> {
        if self.partial_signatures.len() != self.signer_indices.len() {
            return Err(CoreError::signing(
                self.my_index(),
                SigningErrorKind::MissingPartials,
            ));
        }
        let ctx = self
            .context
            .as_ref()
            .ok_or_else(|| CoreError::signing(self.my_index(), SigningErrorKind::MissingNonces))?;

        let mut sigma = Scalar::from(0u64);
        for z_i in self.partial_signatures.values() {
            sigma += z_i;
        }

        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(&point_x_only(&ctx.group_commitment));
        signature[32..].copy_from_slice(&scalar_to_bytes(&sigma));

        verify(&self.group_public_key, &self.message, &signature).map_err(|_| {
            CoreError::signing(self.my_index(), SigningErrorKind::InvalidAggregate)
        })?;

        self.final_signature = Some(signature);
        info!(parent: &self.span(), "signing session aggregated and verified");
        Ok(signature)
    }
}

/// `verify_final(Y, message, R, sigma)` (§4.C), exposed standalone so a
/// verifier that never ran the protocol (e.g. the relay checking a grant
/// event's signature) can check a 64-byte signature against a group key.
pub fn verify(group_public_key: &GroupKey, message: &[u8; 32], signature: &[u8; 64]) -> CoreResult<()> {
    let r_bytes: [u8; 32] = signature[..32].try_into().unwrap();
    let sigma = scalar_from_bytes(&signature[32..], false)?;

    let challenge = hash_to_scalar(
        CHALLENGE_CONTEXT,
        &[&r_bytes, &point_compress(&group_public_key.0), message],
    );

    let r_check = generator() * sigma - group_public_key.0 * challenge;
    let affine = r_check.into_affine();
    if !crate::curve::has_even_y(&affine) {
        return Err(CoreError::invalid("signature R has odd y"));
    }
    if point_x_only(&r_check) != r_bytes {
        return Err(CoreError::invalid("signature does not verify"));
    }
    Ok(())
}
