//! The stable, user-visible error taxonomy (§7 of the design).
//!
//! Every fallible public operation in this crate returns [`CoreError`]. The
//! `Display` impl renders exactly the `prefix:detail` string forms a caller
//! can drop straight into an OK-frame `message` field or a log line, so
//! callers never have to pattern-match just to produce user-facing text.

use core::fmt;

pub type CoreResult<T> = Result<T, CoreError>;

/// A participant or signer index, used to blame a specific peer in DKG and
/// signing failures without ever naming the secret material involved.
pub type PeerIndex = u32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// `invalid:<reason>` — malformed event, bad signature, missing tag, bad size.
    #[error("invalid: {0}")]
    Invalid(String),

    /// `restricted:<reason>` — authorization failure.
    #[error("restricted: {0}")]
    Restricted(String),

    /// `blocked:<reason>` — relay policy rejection.
    #[error("blocked: {0}")]
    Blocked(String),

    /// `auth-required:<reason>` — AUTH not yet completed.
    #[error("auth-required: {0}")]
    AuthRequired(String),

    /// `dkg:<peer_idx>:<kind>` — VSS/decryption/commitment failure, blaming `peer_idx`.
    #[error("dkg:{peer_idx}:{kind}")]
    Dkg { peer_idx: PeerIndex, kind: DkgErrorKind },

    /// `signing:<peer_idx>:<kind>` — invalid partial signature or nonce mismatch.
    #[error("signing:{peer_idx}:{kind}")]
    Signing { peer_idx: PeerIndex, kind: SigningErrorKind },

    /// `capability:<kind>` — parse failure, subset violation, chain mismatch.
    #[error("capability: {0}")]
    Capability(CapabilityErrorKind),

    /// A condition that should be unreachable given the crate's own invariants.
    /// Distinct from every caller-facing kind above so it can never be mistaken
    /// for an ordinary authorization denial.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DkgErrorKind {
    OwnIndex,
    IndexOutOfRange,
    DuplicateIndexMismatch,
    CommitmentLengthMismatch,
    WrongState,
    WrongRecipient,
    VssVerificationFailed,
    ProofOfKnowledgeInvalid,
    DecryptionFailed,
}

impl fmt::Display for DkgErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DkgErrorKind::OwnIndex => "own-index",
            DkgErrorKind::IndexOutOfRange => "index-out-of-range",
            DkgErrorKind::DuplicateIndexMismatch => "duplicate-index-mismatch",
            DkgErrorKind::CommitmentLengthMismatch => "commitment-length-mismatch",
            DkgErrorKind::WrongState => "wrong-state",
            DkgErrorKind::WrongRecipient => "wrong-recipient",
            DkgErrorKind::VssVerificationFailed => "vss-verification-failed",
            DkgErrorKind::ProofOfKnowledgeInvalid => "proof-of-knowledge-invalid",
            DkgErrorKind::DecryptionFailed => "decryption-failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningErrorKind {
    NotInSignerSet,
    DoubleCommit,
    NonceMismatch,
    MissingNonces,
    MissingPartials,
    InvalidPartial,
    InvalidAggregate,
    TooFewShares,
    NonceReuse,
}

impl fmt::Display for SigningErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SigningErrorKind::NotInSignerSet => "not-in-signer-set",
            SigningErrorKind::DoubleCommit => "double-commit",
            SigningErrorKind::NonceMismatch => "nonce-mismatch",
            SigningErrorKind::MissingNonces => "missing-nonces",
            SigningErrorKind::MissingPartials => "missing-partials",
            SigningErrorKind::InvalidPartial => "invalid-partial",
            SigningErrorKind::InvalidAggregate => "invalid-aggregate",
            SigningErrorKind::TooFewShares => "not enough shares",
            SigningErrorKind::NonceReuse => "nonce-reuse",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityErrorKind {
    UnknownType(String),
    MissingHolder,
    InvalidRateLimit,
    NotDelegateType,
    SignerMismatch,
    ReferenceMismatch,
    KindsNotSubset,
    ExpiryExceedsParent,
}

impl fmt::Display for CapabilityErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityErrorKind::UnknownType(t) => write!(f, "unknown capability type '{t}'"),
            CapabilityErrorKind::MissingHolder => write!(f, "missing holder"),
            CapabilityErrorKind::InvalidRateLimit => write!(f, "invalid rate limit"),
            CapabilityErrorKind::NotDelegateType => {
                write!(f, "original grant is not of type delegate")
            }
            CapabilityErrorKind::SignerMismatch => write!(f, "delegation signer mismatch"),
            CapabilityErrorKind::ReferenceMismatch => {
                write!(f, "delegation does not reference original grant")
            }
            CapabilityErrorKind::KindsNotSubset => write!(f, "delegation exceeds parent kinds"),
            CapabilityErrorKind::ExpiryExceedsParent => {
                write!(f, "delegation expiry exceeds parent expiry")
            }
        }
    }
}

impl CoreError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        CoreError::Invalid(reason.into())
    }

    pub fn restricted(reason: impl Into<String>) -> Self {
        CoreError::Restricted(reason.into())
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        CoreError::Blocked(reason.into())
    }

    pub fn auth_required(reason: impl Into<String>) -> Self {
        CoreError::AuthRequired(reason.into())
    }

    pub fn dkg(peer_idx: PeerIndex, kind: DkgErrorKind) -> Self {
        CoreError::Dkg { peer_idx, kind }
    }

    pub fn signing(peer_idx: PeerIndex, kind: SigningErrorKind) -> Self {
        CoreError::Signing { peer_idx, kind }
    }

    pub fn capability(kind: CapabilityErrorKind) -> Self {
        CoreError::Capability(kind)
    }
}
