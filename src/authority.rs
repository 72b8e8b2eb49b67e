//! The `authority` module defines weighted threshold authorities over keys,
//! addresses, and other accounts.

use crate::address::Address;
use crate::encode::{self, Pack, Unpack};
use crate::pubkey::Pubkey;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

/// Weight contributed by a single satisfied authority entry.
pub type Weight = u16;

/// Chain-level account identifier.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(AccountId(s.parse()?))
    }
}

impl serde::Serialize for AccountId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct AccountIdVisitor;

impl<'a> serde::de::Visitor<'a> for AccountIdVisitor {
    type Value = AccountId;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an account identifier")
    }

    fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<AccountId, E> {
        value.parse().map_err(E::custom)
    }
}

impl<'de> serde::Deserialize<'de> for AccountId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(AccountIdVisitor)
    }
}

impl Pack for AccountId {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        encode::encode_len(writer, self.0)
    }
}

impl Unpack for AccountId {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(AccountId(encode::decode_len(reader)?))
    }
}

/// Identifier of a custom (operation-scoped) authority attached to an account.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CustomAuthorityId(pub u64);

impl fmt::Display for CustomAuthorityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Custom-authority predicates evaluated but rejected during one verification
/// pass, keyed by the predicate's identifier, with the rejection reason.
pub type RejectedAuthorityMap = BTreeMap<CustomAuthorityId, String>;

/// A weighted, threshold-based predicate over keys, addresses, and
/// sub-accounts. Satisfied once the accumulated weight of satisfied entries
/// reaches `weight_threshold`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Authority {
    pub weight_threshold: u32,
    pub key_auths: BTreeMap<Pubkey, Weight>,
    pub address_auths: BTreeMap<Address, Weight>,
    pub account_auths: BTreeMap<AccountId, Weight>,
}

impl Authority {
    pub fn with_threshold(weight_threshold: u32) -> Self {
        Authority {
            weight_threshold,
            ..Authority::default()
        }
    }

    /// The common single-key authority: threshold 1, one key of weight 1.
    pub fn from_key(key: Pubkey) -> Self {
        let mut auth = Authority::with_threshold(1);
        auth.add_key_auth(key, 1);
        auth
    }

    /// An authority no set of signatures can ever satisfy: a nonzero
    /// threshold with no entries.
    pub fn null() -> Self {
        Authority::with_threshold(1)
    }

    pub fn add_key_auth(&mut self, key: Pubkey, weight: Weight) {
        self.key_auths.insert(key, weight);
    }

    pub fn add_address_auth(&mut self, address: Address, weight: Weight) {
        self.address_auths.insert(address, weight);
    }

    pub fn add_account_auth(&mut self, account: AccountId, weight: Weight) {
        self.account_auths.insert(account, weight);
    }

    pub fn num_auths(&self) -> usize {
        self.key_auths.len() + self.address_auths.len() + self.account_auths.len()
    }

    fn weight_sum(&self) -> u64 {
        self.key_auths
            .values()
            .chain(self.address_auths.values())
            .chain(self.account_auths.values())
            .map(|weight| u64::from(*weight))
            .sum()
    }

    /// An impossible authority can never be satisfied: the combined weight of
    /// every entry falls short of the threshold. The zero-threshold authority
    /// is trivially satisfiable and not impossible.
    pub fn is_impossible(&self) -> bool {
        self.weight_sum() < u64::from(self.weight_threshold)
    }

    /// Structural soundness of an authority stored on chain: the threshold
    /// is nonzero and reachable from the listed weights, and no entry
    /// carries zero weight.
    pub fn validate(&self) -> bool {
        if self.weight_threshold == 0 {
            return false;
        }
        let no_zero_weights = self
            .key_auths
            .values()
            .chain(self.address_auths.values())
            .chain(self.account_auths.values())
            .all(|weight| *weight > 0);
        no_zero_weights && !self.is_impossible()
    }
}

impl Pack for Authority {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.weight_threshold.pack(writer)?;
        self.key_auths.pack(writer)?;
        self.address_auths.pack(writer)?;
        self.account_auths.pack(writer)
    }
}

impl Unpack for Authority {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Authority {
            weight_threshold: u32::unpack(reader)?,
            key_auths: BTreeMap::unpack(reader)?,
            address_auths: BTreeMap::unpack(reader)?,
            account_auths: BTreeMap::unpack(reader)?,
        })
    }
}
