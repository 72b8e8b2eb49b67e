//! The `hash` module provides SHA-256 hashing for protocol values.

use crate::encode::{Pack, Unpack};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;
use thiserror::Error;

pub const HASH_BYTES: usize = 32;

/// A 256-bit digest of a canonically encoded value.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Hash(pub [u8; HASH_BYTES]);

/// Identifier of the network a transaction is bound to. Prefixed to every
/// signing digest so a signature cannot be replayed on another chain.
pub type ChainId = Hash;

#[derive(Clone, Default)]
pub struct Hasher {
    hasher: Sha256,
}

impl Hasher {
    pub fn hash(&mut self, val: &[u8]) {
        self.hasher.update(val);
    }
    pub fn hashv(&mut self, vals: &[&[u8]]) {
        for val in vals {
            self.hash(val);
        }
    }
    pub fn result(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

impl Hash {
    pub const fn new_from_array(hash_array: [u8; HASH_BYTES]) -> Self {
        Self(hash_array)
    }

    pub fn to_bytes(self) -> [u8; HASH_BYTES] {
        self.0
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseHashError {
    #[error("string decoded to wrong size for hash")]
    WrongSize,
    #[error("failed to decode string to hash")]
    Invalid,
}

impl FromStr for Hash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| ParseHashError::Invalid)?;
        if bytes.len() != HASH_BYTES {
            return Err(ParseHashError::WrongSize);
        }
        let mut hash_array = [0u8; HASH_BYTES];
        hash_array.copy_from_slice(&bytes);
        Ok(Hash(hash_array))
    }
}

impl serde::Serialize for Hash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct HashVisitor;

impl<'a> serde::de::Visitor<'a> for HashVisitor {
    type Value = Hash;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a hex encoded hash")
    }

    fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Hash, E> {
        value.parse().map_err(E::custom)
    }
}

impl<'de> serde::Deserialize<'de> for Hash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(HashVisitor)
    }
}

impl Pack for Hash {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0)
    }
}

impl Unpack for Hash {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; HASH_BYTES];
        reader.read_exact(&mut buf)?;
        Ok(Hash(buf))
    }
}

/// Return a SHA-256 hash for the given data.
pub fn hashv(vals: &[&[u8]]) -> Hash {
    let mut hasher = Hasher::default();
    hasher.hashv(vals);
    hasher.result()
}

/// Return a SHA-256 hash for the given data.
pub fn hash(val: &[u8]) -> Hash {
    hashv(&[val])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_empty() {
        assert_eq!(
            hash(b"").to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hashv_matches_concatenation() {
        assert_eq!(hashv(&[b"foo", b"bar"]), hash(b"foobar"));
    }

    #[test]
    fn test_parse() {
        let h = hash(b"meridian");
        assert_eq!(h.to_string().parse::<Hash>().unwrap(), h);
        assert_eq!("deadbeef".parse::<Hash>(), Err(ParseHashError::WrongSize));
        assert_eq!(
            "not hex at all".parse::<Hash>(),
            Err(ParseHashError::Invalid)
        );
    }

    #[test]
    fn test_pack_round_trip() {
        let h = hash(b"pack me");
        assert_eq!(h.packed_bytes().len(), HASH_BYTES);
        assert_eq!(Hash::unpack_from_slice(&h.packed_bytes()).unwrap(), h);
    }
}
