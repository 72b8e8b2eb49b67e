//! The `verify` module composes the required-authority extractor, the
//! sign-state, and the authority evaluator into transaction verification.

use crate::authority::{AccountId, Authority, RejectedAuthorityMap};
use crate::config::COMMITTEE_ACCOUNT;
use crate::error::{AuthorityError, VerificationFailure};
use crate::operation::Operation;
use crate::pubkey::Pubkey;
use crate::sign_state::{AuthorityGetter, SignState};
use log::debug;
use std::collections::BTreeSet;

fn failure(
    error: AuthorityError,
    sigs: &BTreeSet<Pubkey>,
    rejected: &RejectedAuthorityMap,
) -> VerificationFailure {
    debug!(
        "authority verification failed: {}; rejected custom authorities: {:?}",
        error, rejected
    );
    VerificationFailure {
        error,
        signature_keys: sigs.clone(),
        rejected_custom_auths: rejected.clone(),
    }
}

/// Verify that `sigs` authorizes `operations` against the supplied authority
/// view.
///
/// Every operation's demands are gathered through the [`Operation`]
/// extractor. Accounts whose required-active demand is covered by a
/// satisfied custom authority are excused per operation. The committee
/// account may only appear in the remaining required-active set when
/// `allow_committee` is set. Owner authority always satisfies an active
/// requirement. Every provided signature must be consumed; leftovers fail
/// the pass.
#[allow(clippy::too_many_arguments)]
pub fn verify_authority<'auth, Op, Custom>(
    operations: &[Op],
    sigs: &BTreeSet<Pubkey>,
    get_active: &AuthorityGetter<'auth>,
    get_owner: &AuthorityGetter<'auth>,
    mut get_custom: Custom,
    allow_non_immediate_owner: bool,
    ignore_custom_required_auths: bool,
    max_recursion: u32,
    allow_committee: bool,
    active_approvals: &BTreeSet<AccountId>,
    owner_approvals: &BTreeSet<AccountId>,
) -> Result<(), VerificationFailure>
where
    Op: Operation,
    Custom: FnMut(AccountId, &Op, &mut RejectedAuthorityMap) -> Vec<Authority>,
{
    let mut rejected_custom_auths = RejectedAuthorityMap::new();
    let mut state = SignState::new(
        sigs,
        get_active,
        get_owner,
        allow_non_immediate_owner,
        max_recursion,
    );
    state.approved_by.extend(active_approvals.iter().copied());
    state.approved_by.extend(owner_approvals.iter().copied());

    let mut required_active: BTreeSet<AccountId> = BTreeSet::new();
    let mut required_owner: BTreeSet<AccountId> = BTreeSet::new();
    let mut other: Vec<Authority> = Vec::new();

    for op in operations {
        let mut op_required_active = BTreeSet::new();
        op.get_required_authorities(
            &mut op_required_active,
            &mut required_owner,
            &mut other,
            ignore_custom_required_auths,
        );

        // A satisfied custom authority excuses the account from this
        // operation's active requirement only.
        for account in op_required_active {
            let viable = get_custom(account, op, &mut rejected_custom_auths);
            let excused = viable.iter().any(|auth| state.check_authority(auth));
            if !excused {
                required_active.insert(account);
            }
        }
    }

    if !allow_committee && required_active.contains(&COMMITTEE_ACCOUNT) {
        return Err(failure(
            AuthorityError::InvalidCommitteeApproval,
            sigs,
            &rejected_custom_auths,
        ));
    }

    for auth in &other {
        if !state.check_authority(auth) {
            return Err(failure(
                AuthorityError::MissingOtherAuth(Box::new(auth.clone())),
                sigs,
                &rejected_custom_auths,
            ));
        }
    }

    for id in &required_owner {
        if owner_approvals.contains(id) {
            continue;
        }
        let satisfied = match get_owner(*id) {
            Some(auth) => state.check_authority(auth),
            None => false,
        };
        if !satisfied {
            return Err(failure(
                AuthorityError::MissingOwnerAuth(*id),
                sigs,
                &rejected_custom_auths,
            ));
        }
    }

    for id in &required_active {
        // Owner satisfies active.
        let satisfied = state.check_account_authority(*id)
            || match get_owner(*id) {
                Some(auth) => state.check_authority(auth),
                None => false,
            };
        if !satisfied {
            return Err(failure(
                AuthorityError::MissingActiveAuth(*id),
                sigs,
                &rejected_custom_auths,
            ));
        }
    }

    let unused = state.unused_signatures();
    if state.remove_unused_signatures() {
        return Err(failure(
            AuthorityError::IrrelevantSignature(unused),
            sigs,
            &rejected_custom_auths,
        ));
    }

    Ok(())
}
