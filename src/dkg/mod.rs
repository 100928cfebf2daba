//! Component B — the DKG engine (§4.B).
//!
//! A per-participant state machine, grounded on
//! `topos-network-ice-frost`'s `Participant`/`DistributedKeyGeneration`
//! split (`src/dkg/participant.rs`), but collapsed into a single struct that
//! tracks its own `state` field rather than the teacher's phantom-typed
//! `RoundOne`/`RoundTwo` markers — the spec describes one `DKGSession` value
//! with an explicit `state` enum (§3), so that is what this models directly.

pub mod encryption;
pub mod nizk;
pub mod secret_share;

use std::collections::BTreeMap;

use rand::{CryptoRng, RngCore};

use ark_ff::Zero;

use tracing::{debug, debug_span, info, trace, warn};

use crate::curve::{scalar_from_bytes, scalar_to_bytes, Point, Scalar};
use crate::error::{CoreError, CoreResult, DkgErrorKind, PeerIndex};
use crate::keys::{DiffieHellmanPrivateKey, DiffieHellmanPublicKey, GroupKey, IndividualSigningKey, KeyPackage};

use nizk::NizkPokOfSecretKey;
use secret_share::{Coefficients, VerifiableSecretSharingCommitment};

/// `ParticipantIndex` in the design doc: an integer in `[1, maxSigners]`.
/// Index 0 is reserved and never assigned.
pub type ParticipantIndex = u32;

/// §3 "DKGConfig".
#[derive(Clone)]
pub struct DkgConfig {
    pub session_id: [u8; 32],
    pub threshold: u32,
    pub max_signers: u32,
    /// DH public keys of every participant, in the canonical lexicographic
    /// order that assigns `ParticipantIndex`es (§3, §9 "Deterministic indexing").
    pub participants: Vec<DiffieHellmanPublicKey>,
    pub my_index: ParticipantIndex,
    pub my_secret_key: Scalar,
}

impl DkgConfig {
    fn validate(&self) -> CoreResult<()> {
        if self.threshold < 2 {
            return Err(CoreError::invalid("threshold must be >= 2"));
        }
        if self.threshold > self.max_signers {
            return Err(CoreError::invalid("threshold must be <= max_signers"));
        }
        if self.participants.len() != self.max_signers as usize {
            return Err(CoreError::invalid(
                "participants list must have exactly max_signers entries",
            ));
        }
        if self.my_index == 0 || self.my_index > self.max_signers {
            return Err(CoreError::invalid("my_index out of range"));
        }
        let mut sorted = self.participants.clone();
        sorted.sort_by(|a, b| a.to_bytes().cmp(&b.to_bytes()));
        if sorted
            .iter()
            .zip(self.participants.iter())
            .any(|(a, b)| a.to_bytes() != b.to_bytes())
        {
            return Err(CoreError::invalid(
                "participants must be sorted lexicographically by pubkey",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DkgState {
    Initialized,
    Round1Complete,
    Round2Complete,
    Finalized,
    Failed,
}

/// Round 1: commitments to a participant's polynomial, plus proofs of
/// knowledge of the DH private key and the polynomial's constant term
/// (SPEC_FULL.md §4.B enrichment over the distilled spec).
#[derive(Clone)]
pub struct Round1Package {
    pub index: ParticipantIndex,
    pub dh_public_key: DiffieHellmanPublicKey,
    pub commitment: VerifiableSecretSharingCommitment,
    pub proof_of_secret_key: NizkPokOfSecretKey,
    pub proof_of_dh_private_key: NizkPokOfSecretKey,
}

/// Round 2: an encrypted share sent from `from` to `to`.
#[derive(Clone)]
pub struct Round2Package {
    pub from: ParticipantIndex,
    pub to: ParticipantIndex,
    pub ciphertext: Vec<u8>,
}

/// Distinguishes a fresh key generation from a proactive refresh (§4.B
/// "Refresh"): the only behavioral difference is whether the sampled
/// polynomial has a random or a zero constant term.
#[derive(Clone, Copy, PartialEq, Eq)]
enum SessionKind {
    Dkg,
    Refresh,
}

/// §3 "DKGSession". Owned by the participant driving it; dropping it
/// zeroizes `coefficients` and `dh_private_key` via their own `Drop` impls
/// (§5 "Secret hygiene").
pub struct DkgSession {
    config: DkgConfig,
    kind: SessionKind,
    state: DkgState,
    dh_private_key: DiffieHellmanPrivateKey,
    coefficients: Option<Coefficients>,
    round1_packages: BTreeMap<ParticipantIndex, Round1Package>,
    /// Decrypted (or, for `my_index`, directly-evaluated) shares. Contains
    /// a self-entry once `round1`/`round2` have run locally, per §9
    /// "Self-edges" — this unifies the "have all n" check with peer entries.
    round2_shares: BTreeMap<ParticipantIndex, Scalar>,
    failed_peer: Option<PeerIndex>,
}

impl DkgSession {
    fn new(config: DkgConfig, kind: SessionKind) -> CoreResult<Self> {
        config.validate()?;
        let dh_private_key = DiffieHellmanPrivateKey::new(config.my_secret_key);
        Ok(Self {
            config,
            kind,
            state: DkgState::Initialized,
            dh_private_key,
            coefficients: None,
            round1_packages: BTreeMap::new(),
            round2_shares: BTreeMap::new(),
            failed_peer: None,
        })
    }

    /// `create_session(config) -> Session`.
    pub fn create_session(config: DkgConfig) -> CoreResult<Self> {
        Self::new(config, SessionKind::Dkg)
    }

    /// A DKG session whose polynomial has a zero constant term, used to
    /// produce the "delta" key package that [`apply_refresh`] folds into an
    /// existing [`KeyPackage`] (§4.B "Refresh").
    pub fn create_refresh_session(config: DkgConfig) -> CoreResult<Self> {
        Self::new(config, SessionKind::Refresh)
    }

    pub fn state(&self) -> DkgState {
        self.state
    }

    pub fn my_index(&self) -> ParticipantIndex {
        self.config.my_index
    }

    /// The peer index blamed for the most recent verification failure, if
    /// this session is `failed`.
    pub fn failed_peer(&self) -> Option<PeerIndex> {
        self.failed_peer
    }

    /// A span carrying the fields every DKG log line is tagged with (§3a
    /// "a span per DKG/signing session").
    fn span(&self) -> tracing::Span {
        debug_span!("dkg_session", session_id = %hex::encode(self.config.session_id), my_index = self.my_index())
    }

    fn fail(&mut self, peer: PeerIndex, err: CoreError) -> CoreError {
        let _enter = self.span().entered();
        warn!(blamed_peer = peer, %err, "dkg session failed");
        self.state = DkgState::Failed;
        self.failed_peer = Some(peer);
        err
    }

    fn sample_coefficients(&self, rng: &mut (impl RngCore + CryptoRng)) -> Coefficients {
        let t = self.config.threshold as usize;
        match self.kind {
            SessionKind::Dkg => Coefficients::sample(t, rng),
            SessionKind::Refresh => Coefficients::sample_zero_constant(t, rng),
        }
    }

    /// `round1(session) -> (Round1Package, session')`.
    pub fn round1(&mut self, rng: &mut (impl RngCore + CryptoRng)) -> CoreResult<Round1Package> {
        if self.coefficients.is_some() {
            return Err(CoreError::dkg(self.my_index(), DkgErrorKind::WrongState));
        }

        let coeffs = self.sample_coefficients(rng);
        let points = coeffs.commit();
        let commitment = VerifiableSecretSharingCommitment {
            index: self.config.my_index,
            points,
        };

        let constant_term = *commitment
            .constant_term()
            .expect("threshold >= 2 guarantees at least one coefficient");
        let proof_of_secret_key = NizkPokOfSecretKey::prove(
            self.config.my_index,
            coeffs.0[0].expose(),
            &constant_term,
            rng,
        );

        let dh_public_key = self.dh_private_key.to_public();
        let proof_of_dh_private_key = NizkPokOfSecretKey::prove(
            self.config.my_index,
            self.dh_private_key.scalar(),
            &dh_public_key.0,
            rng,
        );

        let package = Round1Package {
            index: self.config.my_index,
            dh_public_key,
            commitment: commitment.clone(),
            proof_of_secret_key,
            proof_of_dh_private_key,
        };

        self.round1_packages.insert(self.config.my_index, package.clone());
        self.coefficients = Some(coeffs);

        debug!(parent: &self.span(), "round 1 package generated");
        Ok(package)
    }

    /// `ingest_round1(session, pkg) -> session'`.
    pub fn ingest_round1(&mut self, pkg: Round1Package) -> CoreResult<()> {
        if pkg.index == self.config.my_index {
            return Err(CoreError::dkg(pkg.index, DkgErrorKind::OwnIndex));
        }
        if pkg.index == 0 || pkg.index > self.config.max_signers {
            return Err(CoreError::dkg(pkg.index, DkgErrorKind::IndexOutOfRange));
        }
        if pkg.commitment.points.len() != self.config.threshold as usize {
            return Err(self.fail(
                pkg.index,
                CoreError::dkg(pkg.index, DkgErrorKind::CommitmentLengthMismatch),
            ));
        }

        if let Some(existing) = self.round1_packages.get(&pkg.index) {
            if existing.commitment != pkg.commitment {
                return Err(self.fail(
                    pkg.index,
                    CoreError::dkg(pkg.index, DkgErrorKind::DuplicateIndexMismatch),
                ));
            }
            return Ok(());
        }

        let constant_term = *pkg
            .commitment
            .constant_term()
            .expect("length already checked above");
        if pkg
            .proof_of_secret_key
            .verify(pkg.index, &constant_term)
            .is_err()
        {
            return Err(self.fail(
                pkg.index,
                CoreError::dkg(pkg.index, DkgErrorKind::ProofOfKnowledgeInvalid),
            ));
        }
        if pkg
            .proof_of_dh_private_key
            .verify(pkg.index, &pkg.dh_public_key.0)
            .is_err()
        {
            return Err(self.fail(
                pkg.index,
                CoreError::dkg(pkg.index, DkgErrorKind::ProofOfKnowledgeInvalid),
            ));
        }

        trace!(parent: &self.span(), from = pkg.index, "round 1 package ingested");
        self.round1_packages.insert(pkg.index, pkg);

        if self.round1_packages.len() == self.config.max_signers as usize {
            self.state = DkgState::Round1Complete;
            debug!(parent: &self.span(), "round 1 complete");
        }

        Ok(())
    }

    /// `round2(session) -> (outgoing packages, session')`. Iterates
    /// `toIdx` in ascending order (§4.B "Deterministic iteration").
    pub fn round2(&mut self) -> CoreResult<Vec<Round2Package>> {
        if self.state != DkgState::Round1Complete {
            return Err(CoreError::dkg(self.my_index(), DkgErrorKind::WrongState));
        }
        let coeffs = self
            .coefficients
            .as_ref()
            .expect("round1 must have run to reach Round1Complete");

        let my_share = coeffs.evaluate(self.config.my_index);
        self.round2_shares.insert(self.config.my_index, my_share);

        let mut outgoing = Vec::with_capacity(self.config.max_signers as usize - 1);
        for to_idx in 1..=self.config.max_signers {
            if to_idx == self.config.my_index {
                continue;
            }
            let peer_pkg = self
                .round1_packages
                .get(&to_idx)
                .ok_or_else(|| CoreError::dkg(to_idx, DkgErrorKind::IndexOutOfRange))?;
            let share = coeffs.evaluate(to_idx);
            let ciphertext = encryption::encrypt_share(
                &self.dh_private_key,
                &peer_pkg.dh_public_key.0,
                &self.config.session_id,
                2,
                &scalar_to_bytes(&share),
            );
            outgoing.push(Round2Package {
                from: self.config.my_index,
                to: to_idx,
                ciphertext,
            });
        }

        Ok(outgoing)
    }

    /// `ingest_round2(session, pkg) -> session'`.
    pub fn ingest_round2(&mut self, pkg: Round2Package) -> CoreResult<()> {
        if pkg.to != self.config.my_index {
            return Err(CoreError::dkg(pkg.from, DkgErrorKind::WrongRecipient));
        }
        if self.state != DkgState::Round1Complete && self.state != DkgState::Round2Complete {
            return Err(CoreError::dkg(pkg.from, DkgErrorKind::WrongState));
        }
        if self.round2_shares.contains_key(&pkg.from) {
            return Ok(());
        }

        let sender_pkg = self
            .round1_packages
            .get(&pkg.from)
            .ok_or_else(|| CoreError::dkg(pkg.from, DkgErrorKind::IndexOutOfRange))?
            .clone();

        let plaintext = encryption::decrypt_share(
            &self.dh_private_key,
            &sender_pkg.dh_public_key.0,
            &self.config.session_id,
            2,
            &pkg.ciphertext,
            pkg.from,
        )
        .map_err(|e| self.fail(pkg.from, e))?;

        let share = scalar_from_bytes(&plaintext, true).map_err(|e| self.fail(pkg.from, e))?;

        if !sender_pkg
            .commitment
            .verify_share(self.config.my_index, &share)
        {
            return Err(self.fail(
                pkg.from,
                CoreError::dkg(pkg.from, DkgErrorKind::VssVerificationFailed),
            ));
        }

        trace!(parent: &self.span(), from = pkg.from, "round 2 share verified and ingested");
        self.round2_shares.insert(pkg.from, share);

        if self.round2_shares.len() == self.config.max_signers as usize {
            self.state = DkgState::Round2Complete;
            debug!(parent: &self.span(), "round 2 complete");
        }

        Ok(())
    }

    /// `finalize(session) -> (KeyPackage, session')`.
    pub fn finalize(&mut self) -> CoreResult<KeyPackage> {
        if self.state != DkgState::Round2Complete {
            return Err(CoreError::dkg(self.my_index(), DkgErrorKind::WrongState));
        }

        let mut secret = Scalar::from(0u64);
        for share in self.round2_shares.values() {
            secret += share;
        }

        let t = self.config.threshold as usize;
        let mut aggregated: Vec<Point> = vec![Point::zero(); t];
        for idx in 1..=self.config.max_signers {
            let pkg = self
                .round1_packages
                .get(&idx)
                .expect("round2_complete implies every round1 package was collected");
            for (k, point) in pkg.commitment.points.iter().enumerate() {
                aggregated[k] = aggregated[k] + point;
            }
        }

        let key_package = KeyPackage {
            share: IndividualSigningKey::new(self.config.my_index, secret),
            group_public_key: GroupKey(aggregated[0]),
            vss_commitments: aggregated,
            threshold: self.config.threshold,
            max_signers: self.config.max_signers,
        };

        self.state = DkgState::Finalized;
        self.coefficients = None;

        info!(parent: &self.span(), group_public_key = %hex::encode(key_package.group_public_key.to_bytes()), "dkg session finalized");
        Ok(key_package)
    }
}

/// Folds a refresh session's "delta" [`KeyPackage`] into an existing one
/// (§4.B "Refresh"). Because every refresh polynomial has `g(0) = 0`, the
/// delta's aggregated constant-term commitment is the identity point, so
/// the resulting group public key is bit-identical to `old`'s (§8 "Refresh
/// invariance") — checked here rather than assumed.
pub fn apply_refresh(old: &KeyPackage, delta: &KeyPackage) -> CoreResult<KeyPackage> {
    if old.share.index != delta.share.index
        || old.threshold != delta.threshold
        || old.max_signers != delta.max_signers
        || old.vss_commitments.len() != delta.vss_commitments.len()
    {
        return Err(CoreError::Internal(
            "refresh delta does not match the key package it refreshes".into(),
        ));
    }

    let new_secret = old.share.secret_scalar() + delta.share.secret_scalar();
    let new_commitments: Vec<Point> = old
        .vss_commitments
        .iter()
        .zip(delta.vss_commitments.iter())
        .map(|(a, b)| *a + b)
        .collect();

    if new_commitments[0] != old.group_public_key.0 {
        return Err(CoreError::Internal(
            "refresh changed the group public key".into(),
        ));
    }

    Ok(KeyPackage {
        share: IndividualSigningKey::new(old.share.index, new_secret),
        group_public_key: old.group_public_key,
        vss_commitments: new_commitments,
        threshold: old.threshold,
        max_signers: old.max_signers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{generator, rand_scalar_nonzero};
    use rand::SeedableRng;

    fn configs(t: u32, n: u32, seed: u64) -> Vec<DkgConfig> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let secrets: Vec<Scalar> = (0..n).map(|_| rand_scalar_nonzero(&mut rng)).collect();
        let mut participants: Vec<(u32, DiffieHellmanPublicKey)> = secrets
            .iter()
            .enumerate()
            .map(|(i, s)| ((i + 1) as u32, DiffieHellmanPrivateKey::new(*s).to_public()))
            .collect();
        participants.sort_by(|a, b| a.1.to_bytes().cmp(&b.1.to_bytes()));
        let sorted_keys: Vec<DiffieHellmanPublicKey> =
            participants.iter().map(|(_, k)| *k).collect();

        let session_id = [42u8; 32];
        (1..=n)
            .map(|my_index| {
                let my_secret_index = participants
                    .iter()
                    .position(|(_, k)| *k == sorted_keys[(my_index - 1) as usize])
                    .unwrap();
                DkgConfig {
                    session_id,
                    threshold: t,
                    max_signers: n,
                    participants: sorted_keys.clone(),
                    my_index,
                    my_secret_key: secrets[participants[my_secret_index].0 as usize - 1],
                }
            })
            .collect()
    }

    fn run_full_dkg(t: u32, n: u32, seed: u64) -> Vec<KeyPackage> {
        let mut sessions: Vec<DkgSession> = configs(t, n, seed)
            .into_iter()
            .map(|c| DkgSession::create_session(c).unwrap())
            .collect();

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed + 1000);
        let round1: Vec<Round1Package> = sessions
            .iter_mut()
            .map(|s| s.round1(&mut rng).unwrap())
            .collect();

        for session in sessions.iter_mut() {
            for pkg in &round1 {
                if pkg.index != session.my_index() {
                    session.ingest_round1(pkg.clone()).unwrap();
                }
            }
            assert_eq!(session.state(), DkgState::Round1Complete);
        }

        let mut all_round2: Vec<Round2Package> = Vec::new();
        for session in sessions.iter_mut() {
            all_round2.extend(session.round2().unwrap());
        }

        for session in sessions.iter_mut() {
            for pkg in &all_round2 {
                if pkg.to == session.my_index() {
                    session.ingest_round2(pkg.clone()).unwrap();
                }
            }
            assert_eq!(session.state(), DkgState::Round2Complete);
        }

        sessions.iter_mut().map(|s| s.finalize().unwrap()).collect()
    }

    #[test]
    fn dkg_2_of_3_produces_consistent_group_key() {
        let packages = run_full_dkg(2, 3, 100);
        let y0 = packages[0].group_public_key;
        for kp in &packages {
            assert_eq!(kp.group_public_key, y0);
        }
    }

    #[test]
    fn dkg_shares_reconstruct_group_secret() {
        let packages = run_full_dkg(2, 4, 200);
        let shares: Vec<(u32, Scalar)> = packages
            .iter()
            .map(|kp| (kp.share.index, *kp.share.secret_scalar()))
            .collect();

        // Any two distinct subsets of size t should reconstruct the same secret.
        let secret_a =
            crate::keys::reconstruct_group_secret(&[shares[0], shares[1]]).unwrap();
        let secret_b =
            crate::keys::reconstruct_group_secret(&[shares[2], shares[3]]).unwrap();
        assert_eq!(secret_a, secret_b);
        assert_eq!(generator() * secret_a, packages[0].group_public_key.0);
    }

    #[test]
    fn tampered_round2_ciphertext_fails_dkg() {
        let mut sessions: Vec<DkgSession> = configs(2, 3, 300)
            .into_iter()
            .map(|c| DkgSession::create_session(c).unwrap())
            .collect();
        let mut rng = rand::rngs::StdRng::seed_from_u64(301);
        let round1: Vec<Round1Package> = sessions
            .iter_mut()
            .map(|s| s.round1(&mut rng).unwrap())
            .collect();
        for session in sessions.iter_mut() {
            for pkg in &round1 {
                if pkg.index != session.my_index() {
                    session.ingest_round1(pkg.clone()).unwrap();
                }
            }
        }
        let mut all_round2: Vec<Round2Package> = Vec::new();
        for session in sessions.iter_mut() {
            all_round2.extend(session.round2().unwrap());
        }
        // Tamper with the first package destined for participant 2.
        if let Some(pkg) = all_round2
            .iter_mut()
            .find(|p| p.to == 2 && p.from == 1)
        {
            pkg.ciphertext[0] ^= 0xff;
        }

        let victim = sessions.iter_mut().find(|s| s.my_index() == 2).unwrap();
        let mut failed = false;
        for pkg in &all_round2 {
            if pkg.to == 2 {
                if victim.ingest_round2(pkg.clone()).is_err() {
                    failed = true;
                }
            }
        }
        assert!(failed);
        assert_eq!(victim.state(), DkgState::Failed);
        assert_eq!(victim.failed_peer(), Some(1));
    }

    #[test]
    fn refresh_preserves_group_public_key() {
        let packages = run_full_dkg(2, 3, 400);

        let refresh_configs = configs(2, 3, 400);
        let mut refresh_sessions: Vec<DkgSession> = refresh_configs
            .into_iter()
            .map(|c| DkgSession::create_refresh_session(c).unwrap())
            .collect();

        let mut rng = rand::rngs::StdRng::seed_from_u64(401);
        let round1: Vec<Round1Package> = refresh_sessions
            .iter_mut()
            .map(|s| s.round1(&mut rng).unwrap())
            .collect();
        for session in refresh_sessions.iter_mut() {
            for pkg in &round1 {
                if pkg.index != session.my_index() {
                    session.ingest_round1(pkg.clone()).unwrap();
                }
            }
        }
        let mut all_round2: Vec<Round2Package> = Vec::new();
        for session in refresh_sessions.iter_mut() {
            all_round2.extend(session.round2().unwrap());
        }
        for session in refresh_sessions.iter_mut() {
            for pkg in &all_round2 {
                if pkg.to == session.my_index() {
                    session.ingest_round2(pkg.clone()).unwrap();
                }
            }
        }
        let deltas: Vec<KeyPackage> =
            refresh_sessions.iter_mut().map(|s| s.finalize().unwrap()).collect();

        let refreshed: Vec<KeyPackage> = packages
            .iter()
            .zip(deltas.iter())
            .map(|(old, delta)| apply_refresh(old, delta).unwrap())
            .collect();

        for kp in &refreshed {
            assert_eq!(kp.group_public_key, packages[0].group_public_key);
        }

        let old_secret = crate::keys::reconstruct_group_secret(&[
            (packages[0].share.index, *packages[0].share.secret_scalar()),
            (packages[1].share.index, *packages[1].share.secret_scalar()),
        ])
        .unwrap();
        let new_secret = crate::keys::reconstruct_group_secret(&[
            (refreshed[0].share.index, *refreshed[0].share.secret_scalar()),
            (refreshed[1].share.index, *refreshed[1].share.secret_scalar()),
        ])
        .unwrap();
        assert_eq!(generator() * old_secret, packages[0].group_public_key.0);
        assert_eq!(generator() * new_secret, refreshed[0].group_public_key.0);

        // Mixing an un-refreshed share with a refreshed one must not
        // reconstruct the (now-stale) original secret relation.
        let mixed = crate::keys::reconstruct_group_secret(&[
            (packages[0].share.index, *packages[0].share.secret_scalar()),
            (refreshed[1].share.index, *refreshed[1].share.secret_scalar()),
        ])
        .unwrap();
        assert_ne!(generator() * mixed, packages[0].group_public_key.0);
    }
}
