//! The `sign_state` module holds the mutable working set of one
//! authorization evaluation and the bounded recursive authority evaluator.

use crate::address::{Address, LegacyAddress};
use crate::authority::{AccountId, Authority};
use crate::config::{LEGACY_ADDRESS_VERSIONS, TEMP_ACCOUNT};
use crate::pubkey::Pubkey;
use log::trace;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, BTreeSet};

/// Caller-supplied authority lookup. `None` means the account exposes no
/// authority for the requested role; the evaluator treats that branch as
/// unsatisfied.
pub type AuthorityGetter<'auth> = dyn Fn(AccountId) -> Option<&'auth Authority> + 'auth;

static EMPTY_KEYSET: Lazy<BTreeSet<Pubkey>> = Lazy::new(BTreeSet::new);

/// The shared empty available-key pool used by pure verification passes.
pub fn empty_keyset() -> &'static BTreeSet<Pubkey> {
    &EMPTY_KEYSET
}

/// Working memory of one verification or minimization pass.
///
/// `provided_signatures` maps every key a signature was recovered from to a
/// used flag; the flag flips the first time the evaluator consumes the key.
/// Keys drawn from `available_keys` join the map already marked used.
pub struct SignState<'a, 'auth> {
    get_active: &'a AuthorityGetter<'auth>,
    get_owner: &'a AuthorityGetter<'auth>,
    allow_non_immediate_owner: bool,
    max_recursion: u32,
    available_keys: &'a BTreeSet<Pubkey>,
    pub provided_signatures: BTreeMap<Pubkey, bool>,
    pub approved_by: BTreeSet<AccountId>,
    available_address_sigs: Option<BTreeMap<Address, Pubkey>>,
    provided_address_sigs: Option<BTreeMap<Address, Pubkey>>,
}

impl<'a, 'auth> SignState<'a, 'auth> {
    pub fn new(
        sigs: &BTreeSet<Pubkey>,
        get_active: &'a AuthorityGetter<'auth>,
        get_owner: &'a AuthorityGetter<'auth>,
        allow_non_immediate_owner: bool,
        max_recursion: u32,
    ) -> Self {
        Self::with_keys(
            sigs,
            get_active,
            get_owner,
            allow_non_immediate_owner,
            max_recursion,
            empty_keyset(),
        )
    }

    pub fn with_keys(
        sigs: &BTreeSet<Pubkey>,
        get_active: &'a AuthorityGetter<'auth>,
        get_owner: &'a AuthorityGetter<'auth>,
        allow_non_immediate_owner: bool,
        max_recursion: u32,
        available_keys: &'a BTreeSet<Pubkey>,
    ) -> Self {
        let provided_signatures = sigs.iter().map(|key| (*key, false)).collect();
        let mut approved_by = BTreeSet::new();
        approved_by.insert(TEMP_ACCOUNT);
        SignState {
            get_active,
            get_owner,
            allow_non_immediate_owner,
            max_recursion,
            available_keys,
            provided_signatures,
            approved_by,
            available_address_sigs: None,
            provided_address_sigs: None,
        }
    }

    /// True if a signature by `key` was provided or can be produced from the
    /// available pool. Marks the key used either way.
    pub fn signed_by(&mut self, key: &Pubkey) -> bool {
        if let Some(used) = self.provided_signatures.get_mut(key) {
            *used = true;
            return true;
        }
        if self.available_keys.contains(key) {
            self.provided_signatures.insert(*key, true);
            return true;
        }
        false
    }

    /// Address-form variant of [`signed_by`](Self::signed_by). Resolves the
    /// address to the key that produces it, then consumes that key.
    pub fn signed_by_address(&mut self, address: &Address) -> bool {
        self.build_address_maps();
        let provided = self
            .provided_address_sigs
            .as_ref()
            .and_then(|sigs| sigs.get(address))
            .copied();
        if let Some(key) = provided {
            self.provided_signatures.insert(key, true);
            return true;
        }
        let available = self
            .available_address_sigs
            .as_ref()
            .and_then(|sigs| sigs.get(address))
            .copied();
        if let Some(key) = available {
            if self.available_keys.contains(&key) {
                self.provided_signatures.insert(key, true);
                return true;
            }
        }
        false
    }

    // Built on the first address query. Every key aliases to five address
    // forms: the four legacy version/compression combinations plus the
    // direct short form.
    fn build_address_maps(&mut self) {
        if self.available_address_sigs.is_some() {
            return;
        }
        let mut available = BTreeMap::new();
        for key in self.available_keys.iter() {
            for form in address_forms(key) {
                available.insert(form, *key);
            }
        }
        let mut provided = BTreeMap::new();
        for key in self.provided_signatures.keys() {
            for form in address_forms(key) {
                provided.insert(form, *key);
            }
        }
        self.available_address_sigs = Some(available);
        self.provided_address_sigs = Some(provided);
    }

    /// Check an account's authority at the top level: a prior approval
    /// satisfies it outright, then the active authority, then (only when
    /// non-immediate owner satisfaction is allowed) the owner authority.
    pub fn check_account_authority(&mut self, id: AccountId) -> bool {
        if self.approved_by.contains(&id) {
            return true;
        }
        let get_active = self.get_active;
        let get_owner = self.get_owner;
        if self.check_authority_opt(get_active(id), 0) {
            return true;
        }
        self.allow_non_immediate_owner && self.check_authority_opt(get_owner(id), 0)
    }

    /// True iff the provided and available keys satisfy `auth`.
    pub fn check_authority(&mut self, auth: &Authority) -> bool {
        self.check_authority_at(auth, 0)
    }

    fn check_authority_opt(&mut self, auth: Option<&Authority>, depth: u32) -> bool {
        match auth {
            Some(auth) => self.check_authority_at(auth, depth),
            None => false,
        }
    }

    // Evaluation order is consensus-observable: key entries, then address
    // entries, then account entries, each in ascending order, returning as
    // soon as the threshold is reached.
    fn check_authority_at(&mut self, auth: &Authority, depth: u32) -> bool {
        let threshold = u64::from(auth.weight_threshold);
        let mut total_weight: u64 = 0;

        for (key, weight) in &auth.key_auths {
            if self.signed_by(key) {
                total_weight += u64::from(*weight);
                if total_weight >= threshold {
                    return true;
                }
            }
        }

        for (address, weight) in &auth.address_auths {
            if self.signed_by_address(address) {
                total_weight += u64::from(*weight);
                if total_weight >= threshold {
                    return true;
                }
            }
        }

        for (account, weight) in &auth.account_auths {
            if self.approved_by.contains(account) {
                total_weight += u64::from(*weight);
                if total_weight >= threshold {
                    return true;
                }
                continue;
            }
            if depth == self.max_recursion {
                trace!("recursion bound reached at account {}", account);
                continue;
            }
            let get_active = self.get_active;
            let get_owner = self.get_owner;
            let satisfied = self.check_authority_opt(get_active(*account), depth + 1)
                || (self.allow_non_immediate_owner
                    && self.check_authority_opt(get_owner(*account), depth + 1));
            if satisfied {
                self.approved_by.insert(*account);
                total_weight += u64::from(*weight);
                if total_weight >= threshold {
                    return true;
                }
            }
        }

        total_weight >= threshold
    }

    /// Keys whose signatures were provided but never consumed.
    pub fn unused_signatures(&self) -> Vec<Pubkey> {
        self.provided_signatures
            .iter()
            .filter(|(_, used)| !**used)
            .map(|(key, _)| *key)
            .collect()
    }

    /// Drop every provided signature still flagged unused. Returns whether
    /// any was removed.
    pub fn remove_unused_signatures(&mut self) -> bool {
        let unused = self.unused_signatures();
        for key in &unused {
            self.provided_signatures.remove(key);
        }
        !unused.is_empty()
    }
}

fn address_forms(key: &Pubkey) -> Vec<Address> {
    let mut forms = Vec::with_capacity(5);
    if let Some(point) = key.decompress() {
        for &version in LEGACY_ADDRESS_VERSIONS.iter() {
            forms.push(Address::from(&LegacyAddress::new(&point, false, version)));
            forms.push(Address::from(&LegacyAddress::new(&point, true, version)));
        }
    }
    forms.push(Address::from(key));
    forms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Keypair;

    fn key(seed: u8) -> Pubkey {
        Keypair::from_seed(&[seed; 32]).unwrap().pubkey()
    }

    fn keyset(keys: &[Pubkey]) -> BTreeSet<Pubkey> {
        keys.iter().copied().collect()
    }

    macro_rules! no_auth {
        () => {
            |_id: AccountId| -> Option<&Authority> { None }
        };
    }

    #[test]
    fn test_signed_by_provided_and_available() {
        let provided = keyset(&[key(1)]);
        let available = keyset(&[key(2)]);
        let no_auth = no_auth!();
        let mut state = SignState::with_keys(&provided, &no_auth, &no_auth, false, 2, &available);

        assert!(state.signed_by(&key(1)));
        assert!(state.signed_by(&key(2)));
        assert!(!state.signed_by(&key(3)));
        assert_eq!(state.provided_signatures.get(&key(1)), Some(&true));
        assert_eq!(state.provided_signatures.get(&key(2)), Some(&true));
    }

    #[test]
    fn test_temp_account_is_pre_approved() {
        let provided = BTreeSet::new();
        let no_auth = no_auth!();
        let state = SignState::new(&provided, &no_auth, &no_auth, false, 2);
        assert!(state.approved_by.contains(&TEMP_ACCOUNT));
    }

    #[test]
    fn test_signed_by_address_resolves_all_forms() {
        let signer = key(4);
        let provided = keyset(&[signer]);
        let no_auth = no_auth!();
        let mut state = SignState::new(&provided, &no_auth, &no_auth, false, 2);

        let mut forms = vec![Address::from(&signer)];
        let point = signer.decompress().unwrap();
        for &version in LEGACY_ADDRESS_VERSIONS.iter() {
            for &compressed in &[false, true] {
                forms.push(Address::from(&LegacyAddress::new(
                    &point, compressed, version,
                )));
            }
        }
        for form in &forms {
            assert!(state.signed_by_address(form));
        }
        assert!(!state.signed_by_address(&Address::new_from_array([9; 20])));
    }

    #[test]
    fn test_address_auth_consumes_underlying_key() {
        let signer = key(5);
        let provided = keyset(&[signer]);
        let no_auth = no_auth!();
        let mut state = SignState::new(&provided, &no_auth, &no_auth, false, 2);

        let mut auth = Authority::with_threshold(1);
        auth.add_address_auth(Address::from(&signer), 1);
        assert!(state.check_authority(&auth));
        assert!(state.unused_signatures().is_empty());
    }

    #[test]
    fn test_threshold_short_circuit_and_shortfall() {
        let provided = keyset(&[key(1), key(2)]);
        let no_auth = no_auth!();
        let mut state = SignState::new(&provided, &no_auth, &no_auth, false, 2);

        let mut auth = Authority::with_threshold(3);
        auth.add_key_auth(key(1), 2);
        auth.add_key_auth(key(2), 2);
        assert!(state.check_authority(&auth));

        let mut short = Authority::with_threshold(5);
        short.add_key_auth(key(1), 2);
        short.add_key_auth(key(2), 2);
        let no_auth = no_auth!();
        let mut state = SignState::new(&provided, &no_auth, &no_auth, false, 2);
        assert!(!state.check_authority(&short));
    }

    #[test]
    fn test_remove_unused_signatures() {
        let provided = keyset(&[key(1), key(2)]);
        let no_auth = no_auth!();
        let mut state = SignState::new(&provided, &no_auth, &no_auth, false, 2);

        let auth = Authority::from_key(key(1));
        assert!(state.check_authority(&auth));
        assert_eq!(state.unused_signatures(), vec![key(2)]);
        assert!(state.remove_unused_signatures());
        assert!(!state.remove_unused_signatures());
        assert_eq!(state.provided_signatures.len(), 1);
    }

    #[test]
    fn test_recursion_depth_boundary() {
        // a1 -> a2 -> a3 -> key; entering a3's authority needs depth 2
        let mut auths = BTreeMap::new();
        let mut a1 = Authority::with_threshold(1);
        a1.add_account_auth(AccountId(2), 1);
        let mut a2 = Authority::with_threshold(1);
        a2.add_account_auth(AccountId(3), 1);
        let a3 = Authority::from_key(key(6));
        auths.insert(AccountId(1), a1);
        auths.insert(AccountId(2), a2);
        auths.insert(AccountId(3), a3);

        let get_active = |id: AccountId| -> Option<&Authority> { auths.get(&id) };
        let provided = keyset(&[key(6)]);

        let no_auth = no_auth!();
        let mut state = SignState::new(&provided, &get_active, &no_auth, false, 2);
        assert!(state.check_account_authority(AccountId(1)));

        let no_auth = no_auth!();
        let mut state = SignState::new(&provided, &get_active, &no_auth, false, 1);
        assert!(!state.check_account_authority(AccountId(1)));
    }

    #[test]
    fn test_approval_memoized_on_recursive_success() {
        let mut auths = BTreeMap::new();
        let mut a1 = Authority::with_threshold(1);
        a1.add_account_auth(AccountId(2), 1);
        auths.insert(AccountId(1), a1);
        auths.insert(AccountId(2), Authority::from_key(key(7)));

        let get_active = |id: AccountId| -> Option<&Authority> { auths.get(&id) };
        let provided = keyset(&[key(7)]);
        let no_auth = no_auth!();
        let mut state = SignState::new(&provided, &get_active, &no_auth, false, 2);

        assert!(state.check_account_authority(AccountId(1)));
        assert!(state.approved_by.contains(&AccountId(2)));
    }

    #[test]
    fn test_monotonicity_of_approvals() {
        let mut auth = Authority::with_threshold(1);
        auth.add_account_auth(AccountId(8), 1);

        let provided = BTreeSet::new();
        let no_auth = no_auth!();
        let mut state = SignState::new(&provided, &no_auth, &no_auth, false, 2);
        assert!(!state.check_authority(&auth));

        state.approved_by.insert(AccountId(8));
        assert!(state.check_authority(&auth));
    }

    #[test]
    fn test_owner_fallback_requires_opt_in() {
        let mut active = BTreeMap::new();
        active.insert(AccountId(1), Authority::with_threshold(1));
        let mut owner = BTreeMap::new();
        owner.insert(AccountId(1), Authority::from_key(key(8)));

        let get_active = |id: AccountId| -> Option<&Authority> { active.get(&id) };
        let get_owner = |id: AccountId| -> Option<&Authority> { owner.get(&id) };

        let mut outer = Authority::with_threshold(1);
        outer.add_account_auth(AccountId(1), 1);
        let provided = keyset(&[key(8)]);

        let mut state = SignState::new(&provided, &get_active, &get_owner, false, 2);
        assert!(!state.check_authority(&outer));

        let mut state = SignState::new(&provided, &get_active, &get_owner, true, 2);
        assert!(state.check_authority(&outer));
    }
}
