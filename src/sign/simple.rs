//! Synchronous, single-process convenience path for threshold signing
//! (§4.C "Simplified single-shot API"). Executes both rounds locally using
//! every given participant's full `KeyPackage` — whichever process calls
//! this function holds `t` raw secret shares in memory simultaneously,
//! which is exactly the concentration of trust this crate exists to avoid.
//! Gated behind the `insecure-single-party` feature so it can never be
//! reached without an explicit, opt-in build flag; see DESIGN.md for Open
//! Question (a).

use rand::{CryptoRng, RngCore};

use crate::curve::{Point, Scalar};
use crate::error::{CoreError, CoreResult, SigningErrorKind};
use crate::keys::{GroupKey, KeyPackage};

use super::session::SigningSession;

/// Signs `message` using `shares` (testing only — see module docs). Rejects
/// fewer than `t` shares with `signing:<idx>:not enough shares`, matching
/// the distributed session's own rejection (§8 "Insufficient shares").
pub fn sign_with_shares(
    message: [u8; 32],
    group_public_key: GroupKey,
    shares: &[KeyPackage],
    rng: &mut (impl RngCore + CryptoRng),
) -> CoreResult<[u8; 64]> {
    if shares.is_empty() {
        return Err(CoreError::signing(0, SigningErrorKind::TooFewShares));
    }
    let threshold = shares[0].threshold as usize;
    if shares.len() < threshold {
        return Err(CoreError::signing(
            shares[0].share.index,
            SigningErrorKind::TooFewShares,
        ));
    }

    let signer_indices: Vec<u32> = shares.iter().map(|kp| kp.share.index).collect();

    let mut sessions: Vec<SigningSession> = shares
        .iter()
        .map(|kp| {
            SigningSession::create_session(
                message,
                group_public_key,
                signer_indices.clone(),
                kp.clone(),
            )
        })
        .collect::<CoreResult<Vec<_>>>()?;

    let nonces: Vec<(u32, Point, Point)> = sessions
        .iter_mut()
        .map(|s| {
            let (hiding, binding) = s.commit(rng)?;
            Ok((s.my_index(), hiding, binding))
        })
        .collect::<CoreResult<Vec<_>>>()?;

    for s in sessions.iter_mut() {
        for (idx, hiding, binding) in &nonces {
            if *idx != s.my_index() {
                s.ingest_nonce(*idx, *hiding, *binding)?;
            }
        }
    }

    let partials: Vec<(u32, Scalar)> = sessions
        .iter_mut()
        .map(|s| Ok((s.my_index(), s.sign()?)))
        .collect::<CoreResult<Vec<_>>>()?;

    for s in sessions.iter_mut() {
        for (idx, z) in &partials {
            if *idx != s.my_index() {
                s.ingest_partial(*idx, *z)?;
            }
        }
    }

    sessions[0].aggregate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dkg::{DkgConfig, DkgSession};
    use crate::keys::DiffieHellmanPrivateKey;
    use rand::SeedableRng;

    fn run_dkg(t: u32, n: u32, seed: u64) -> Vec<KeyPackage> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let secrets: Vec<Scalar> = (0..n)
            .map(|_| crate::curve::rand_scalar_nonzero(&mut rng))
            .collect();
        let mut keyed: Vec<(u32, crate::keys::DiffieHellmanPublicKey)> = secrets
            .iter()
            .enumerate()
            .map(|(i, s)| ((i + 1) as u32, DiffieHellmanPrivateKey::new(*s).to_public()))
            .collect();
        keyed.sort_by(|a, b| a.1.to_bytes().cmp(&b.1.to_bytes()));
        let sorted_keys: Vec<_> = keyed.iter().map(|(_, k)| *k).collect();
        let session_id = [5u8; 32];

        let mut sessions: Vec<DkgSession> = (1..=n)
            .map(|my_index| {
                let original_pos = keyed
                    .iter()
                    .position(|(_, k)| *k == sorted_keys[(my_index - 1) as usize])
                    .unwrap();
                DkgSession::create_session(DkgConfig {
                    session_id,
                    threshold: t,
                    max_signers: n,
                    participants: sorted_keys.clone(),
                    my_index,
                    my_secret_key: secrets[keyed[original_pos].0 as usize - 1],
                })
                .unwrap()
            })
            .collect();

        let mut rng2 = rand::rngs::StdRng::seed_from_u64(seed + 1);
        let round1: Vec<_> = sessions.iter_mut().map(|s| s.round1(&mut rng2).unwrap()).collect();
        for s in sessions.iter_mut() {
            for pkg in &round1 {
                if pkg.index != s.my_index() {
                    s.ingest_round1(pkg.clone()).unwrap();
                }
            }
        }
        let mut round2 = Vec::new();
        for s in sessions.iter_mut() {
            round2.extend(s.round2().unwrap());
        }
        for s in sessions.iter_mut() {
            for pkg in &round2 {
                if pkg.to == s.my_index() {
                    s.ingest_round2(pkg.clone()).unwrap();
                }
            }
        }
        sessions.iter_mut().map(|s| s.finalize().unwrap()).collect()
    }

    #[test]
    fn single_shot_matches_distributed_output_shape() {
        let packages = run_dkg(2, 3, 3000);
        let group_pubkey = packages[0].group_public_key;
        let shares = vec![packages[0].clone(), packages[1].clone()];

        let mut rng = rand::rngs::StdRng::seed_from_u64(3001);
        let sig = sign_with_shares([0xab; 32], group_pubkey, &shares, &mut rng).unwrap();
        assert!(super::super::verify(&group_pubkey, &[0xab; 32], &sig).is_ok());
    }

    #[test]
    fn insufficient_shares_rejected() {
        let packages = run_dkg(3, 5, 4000);
        let shares = vec![packages[0].clone(), packages[1].clone()];
        let mut rng = rand::rngs::StdRng::seed_from_u64(4001);
        let err = sign_with_shares(
            [0x11; 32],
            packages[0].group_public_key,
            &shares,
            &mut rng,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "signing:1:not enough shares");
    }
}
