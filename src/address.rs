//! The `address` module derives account addresses from public keys.
//!
//! Two forms exist on chain. The short [`Address`] is RIPEMD-160 over
//! SHA-512 of the compressed key. The 25-byte [`LegacyAddress`] is the
//! versioned wallet form inherited from older clients: a version byte,
//! RIPEMD-160 over SHA-256 of the serialized key, and a 4-byte double-SHA
//! checksum. Authority records reference the short form only; legacy
//! addresses fold into it by hashing their full 25 bytes.

use crate::encode::{Pack, Unpack};
use crate::pubkey::Pubkey;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;
use thiserror::Error;

pub const ADDRESS_BYTES: usize = 20;
pub const LEGACY_ADDRESS_BYTES: usize = 25;

/// A 160-bit account address.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Address([u8; ADDRESS_BYTES]);

impl Address {
    pub const fn new_from_array(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Address(bytes)
    }

    pub fn to_bytes(self) -> [u8; ADDRESS_BYTES] {
        self.0
    }
}

impl From<&Pubkey> for Address {
    fn from(key: &Pubkey) -> Self {
        let digest = Sha512::digest(key.as_ref());
        Address(Ripemd160::digest(digest).into())
    }
}

impl From<&LegacyAddress> for Address {
    fn from(legacy: &LegacyAddress) -> Self {
        Address(Ripemd160::digest(legacy.as_ref()).into())
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseAddressError {
    #[error("string decoded to wrong size for address")]
    WrongSize,
    #[error("failed to decode string to address")]
    Invalid,
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| ParseAddressError::Invalid)?;
        if bytes.len() != ADDRESS_BYTES {
            return Err(ParseAddressError::WrongSize);
        }
        let mut address = [0u8; ADDRESS_BYTES];
        address.copy_from_slice(&bytes);
        Ok(Address(address))
    }
}

impl serde::Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct AddressVisitor;

impl<'a> serde::de::Visitor<'a> for AddressVisitor {
    type Value = Address;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a base58 encoded address")
    }

    fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Address, E> {
        value.parse().map_err(E::custom)
    }
}

impl<'de> serde::Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(AddressVisitor)
    }
}

impl Pack for Address {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0)
    }
}

impl Unpack for Address {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; ADDRESS_BYTES];
        reader.read_exact(&mut buf)?;
        Ok(Address(buf))
    }
}

/// The versioned 25-byte wallet address form.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct LegacyAddress([u8; LEGACY_ADDRESS_BYTES]);

impl LegacyAddress {
    /// Derive the legacy form of `point` in the requested serialization
    /// (compressed or uncompressed) under the given version byte.
    pub fn new(point: &secp256k1::PublicKey, compressed: bool, version: u8) -> Self {
        let sha = if compressed {
            Sha256::digest(point.serialize_compressed())
        } else {
            Sha256::digest(point.serialize())
        };
        let rep = Ripemd160::digest(sha);
        let mut bytes = [0u8; LEGACY_ADDRESS_BYTES];
        bytes[0] = version;
        bytes[1..21].copy_from_slice(&rep);
        let check = Sha256::digest(Sha256::digest(&bytes[..21]));
        bytes[21..].copy_from_slice(&check[..4]);
        LegacyAddress(bytes)
    }

    pub fn version(&self) -> u8 {
        self.0[0]
    }

    /// Whether the trailing 4 checksum bytes match the payload.
    pub fn is_valid(&self) -> bool {
        let check = Sha256::digest(Sha256::digest(&self.0[..21]));
        self.0[21..] == check[..4]
    }
}

impl AsRef<[u8]> for LegacyAddress {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for LegacyAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Display for LegacyAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}
