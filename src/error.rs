//! Error types surfaced by the authorization core.

use crate::authority::{AccountId, Authority, RejectedAuthorityMap};
use crate::operation::OperationError;
use crate::pubkey::Pubkey;
use std::collections::BTreeSet;
use thiserror::Error;

/// Reasons an authority-verification pass can fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorityError {
    /// A required active authority could not be satisfied by the provided
    /// signatures, nor by the account's owner authority.
    #[error("missing required active authority of account {0}")]
    MissingActiveAuth(AccountId),

    /// A required owner authority could not be satisfied.
    #[error("missing required owner authority of account {0}")]
    MissingOwnerAuth(AccountId),

    /// A loose authority demanded by an operation could not be satisfied.
    #[error("missing required authority: {0:?}")]
    MissingOtherAuth(Box<Authority>),

    /// At least one provided signature was not consumed by any authority.
    #[error("irrelevant signature(s) provided by {0:?}")]
    IrrelevantSignature(Vec<Pubkey>),

    /// The committee account appeared in the required-active set without the
    /// caller opting in.
    #[error("committee account may only propose transactions")]
    InvalidCommitteeApproval,
}

/// An authority-verification failure together with the context captured at
/// the failure site: the signature keys under evaluation and every
/// custom-authority predicate that was considered and rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{error}")]
pub struct VerificationFailure {
    pub error: AuthorityError,
    pub signature_keys: BTreeSet<Pubkey>,
    pub rejected_custom_auths: RejectedAuthorityMap,
}

impl VerificationFailure {
    /// The three failure kinds the signature minimizer treats as "this
    /// subset is insufficient" rather than as fatal errors.
    pub fn is_missing_auth(&self) -> bool {
        matches!(
            self.error,
            AuthorityError::MissingActiveAuth(_)
                | AuthorityError::MissingOwnerAuth(_)
                | AuthorityError::MissingOtherAuth(_)
        )
    }
}

/// Reasons a transaction is rejected before or during authorization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// The operations sequence is empty.
    #[error("transaction must contain at least one operation")]
    EmptyTransaction,

    /// An operation failed its structural validation. The first element is
    /// the operation's index within the transaction.
    #[error("operation {0} is invalid: {1}")]
    OperationInvalid(u16, OperationError),

    /// Two signatures recovered to the same public key.
    #[error("duplicate signature by {0}")]
    DuplicateSignature(Pubkey),

    /// A compact signature is malformed or does not recover to a point.
    #[error("malformed compact signature")]
    BadSignature,

    /// Authority verification failed.
    #[error(transparent)]
    Authority(#[from] VerificationFailure),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimizer_swallowed_kinds() {
        let failure = |error| VerificationFailure {
            error,
            signature_keys: BTreeSet::new(),
            rejected_custom_auths: RejectedAuthorityMap::new(),
        };
        assert!(failure(AuthorityError::MissingActiveAuth(AccountId(1))).is_missing_auth());
        assert!(failure(AuthorityError::MissingOwnerAuth(AccountId(1))).is_missing_auth());
        assert!(
            failure(AuthorityError::MissingOtherAuth(Box::new(Authority::default())))
                .is_missing_auth()
        );
        assert!(!failure(AuthorityError::IrrelevantSignature(vec![])).is_missing_auth());
        assert!(!failure(AuthorityError::InvalidCommitteeApproval).is_missing_auth());
    }
}
