//! Zero-knowledge proof of knowledge of a discrete log, used during DKG so a
//! participant cannot publish a commitment or a DH public key without
//! holding the corresponding secret scalar. Grounded on
//! `topos-network-ice-frost`'s `NizkPokOfSecretKey`, referenced throughout
//! its `src/dkg/participant.rs` (`proof_of_secret_key`, `proof_of_dh_private_key`).

use rand::{CryptoRng, RngCore};

use crate::curve::{generator, hash_to_scalar, point_compress, rand_scalar_nonzero, Point, Scalar};
use crate::error::{CoreError, CoreResult, DkgErrorKind};

/// A Schnorr signature over the participant's own index and public key,
/// using the secret scalar as the signing key: `(commitment, response)`
/// such that `response * G == commitment + challenge * public_key`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NizkPokOfSecretKey {
    commitment: Point,
    response: Scalar,
}

const CONTEXT: &str = "quorum-root/dkg/nizk-pok-v1";

impl NizkPokOfSecretKey {
    pub fn prove(
        index: u32,
        secret: &Scalar,
        public_key: &Point,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Self {
        let nonce = rand_scalar_nonzero(rng);
        let commitment = generator() * nonce;
        let challenge = Self::challenge(index, public_key, &commitment);
        let response = nonce + challenge * secret;
        Self {
            commitment,
            response,
        }
    }

    pub fn verify(&self, index: u32, public_key: &Point) -> CoreResult<()> {
        let challenge = Self::challenge(index, public_key, &self.commitment);
        let lhs = generator() * self.response;
        let rhs = self.commitment + *public_key * challenge;
        if lhs == rhs {
            Ok(())
        } else {
            Err(CoreError::dkg(index, DkgErrorKind::ProofOfKnowledgeInvalid))
        }
    }

    fn challenge(index: u32, public_key: &Point, commitment: &Point) -> Scalar {
        hash_to_scalar(
            CONTEXT,
            &[
                &index.to_be_bytes(),
                &point_compress(public_key),
                &point_compress(commitment),
            ],
        )
    }
}
