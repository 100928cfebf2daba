//! Round 1 nonce commitments for threshold signing (§4.C "Round 1 — Nonce
//! commitment"). Grounded on `topos-network-ice-frost`'s
//! `src/sign/precomputation.rs` `NoncePair`/`Commitment`/`CommitmentShare`
//! trio, concretized to secp256k1. The teacher's `PublicCommitmentShareList`/
//! `SecretCommitmentShareList`/`generate_commitment_share_lists` batched
//! many precomputed pairs for a one-round signing variant; this crate's
//! protocol is two-round and draws exactly one nonce pair per session, so
//! that batching layer has no counterpart here.

use ark_ff::Zero;
use rand::{CryptoRng, RngCore};

use crate::curve::{generator, rand_scalar_nonzero, Point, SecretScalar};

/// A secret scalar and its public commitment, e.g. `(d_i, D_i)`.
pub(crate) struct Commitment {
    pub(crate) secret: SecretScalar,
    pub(crate) commit: Point,
}

impl Drop for Commitment {
    fn drop(&mut self) {
        // `secret`'s own `Drop` zeroizes the scalar; the commitment itself
        // isn't secret, but clearing it avoids leaving a stale public point
        // behind a dropped nonce.
        self.commit = Point::zero();
    }
}

/// A signer's round-1 nonce commitment: hiding `(d_i, D_i)` and binding
/// `(e_i, E_i)` pairs. Single-use — a session must draw a fresh one per
/// signing attempt (§4.C "Nonces are single-use").
pub(crate) struct CommitmentShare {
    pub(crate) hiding: Commitment,
    pub(crate) binding: Commitment,
}

impl CommitmentShare {
    pub fn new(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let d = rand_scalar_nonzero(rng);
        let e = rand_scalar_nonzero(rng);
        Self {
            hiding: Commitment {
                commit: generator() * d,
                secret: SecretScalar::new(d),
            },
            binding: Commitment {
                commit: generator() * e,
                secret: SecretScalar::new(e),
            },
        }
    }

    /// The public `(D_i, E_i)` pair to broadcast to the other signers.
    pub fn publish(&self) -> (Point, Point) {
        (self.hiding.commit, self.binding.commit)
    }
}
