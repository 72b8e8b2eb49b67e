//! The `pubkey` module defines the compressed secp256k1 public key type.

use crate::encode::{Pack, Unpack};
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;
use thiserror::Error;

pub const PUBKEY_BYTES: usize = 33;

/// A compressed secp256k1 public key.
///
/// Ordering is lexicographic on the compressed bytes; this is the canonical
/// key order observed by authority evaluation and signature minimization.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Pubkey([u8; PUBKEY_BYTES]);

impl Pubkey {
    pub fn new(pubkey_slice: &[u8]) -> Self {
        let mut bytes = [0u8; PUBKEY_BYTES];
        bytes.copy_from_slice(pubkey_slice);
        Pubkey(bytes)
    }

    pub const fn new_from_array(bytes: [u8; PUBKEY_BYTES]) -> Self {
        Pubkey(bytes)
    }

    pub fn to_bytes(self) -> [u8; PUBKEY_BYTES] {
        self.0
    }

    /// Recover the full curve point, if these bytes encode a valid one.
    pub fn decompress(&self) -> Option<secp256k1::PublicKey> {
        secp256k1::PublicKey::parse_compressed(&self.0).ok()
    }
}

impl From<&secp256k1::PublicKey> for Pubkey {
    fn from(point: &secp256k1::PublicKey) -> Self {
        Pubkey(point.serialize_compressed())
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsePubkeyError {
    #[error("string decoded to wrong size for pubkey")]
    WrongSize,
    #[error("failed to decode string to pubkey")]
    Invalid,
}

impl FromStr for Pubkey {
    type Err = ParsePubkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| ParsePubkeyError::Invalid)?;
        if bytes.len() != PUBKEY_BYTES {
            return Err(ParsePubkeyError::WrongSize);
        }
        Ok(Pubkey::new(&bytes))
    }
}

impl serde::Serialize for Pubkey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct PubkeyVisitor;

impl<'a> serde::de::Visitor<'a> for PubkeyVisitor {
    type Value = Pubkey;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a base58 encoded public key")
    }

    fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Pubkey, E> {
        value.parse().map_err(E::custom)
    }
}

impl<'de> serde::Deserialize<'de> for Pubkey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(PubkeyVisitor)
    }
}

impl Pack for Pubkey {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0)
    }
}

impl Unpack for Pubkey {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; PUBKEY_BYTES];
        reader.read_exact(&mut buf)?;
        Ok(Pubkey(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_round_trip() {
        let key = Pubkey::new(&[7u8; PUBKEY_BYTES]);
        assert_eq!(key.to_string().parse::<Pubkey>().unwrap(), key);
        assert_eq!(
            "shorter".parse::<Pubkey>(),
            Err(ParsePubkeyError::WrongSize)
        );
        assert_eq!("0OIl".parse::<Pubkey>(), Err(ParsePubkeyError::Invalid));
    }

    #[test]
    fn test_canonical_order_is_byte_order() {
        let mut low = [2u8; PUBKEY_BYTES];
        let mut high = [2u8; PUBKEY_BYTES];
        low[1] = 0x01;
        high[1] = 0xff;
        assert!(Pubkey::new_from_array(low) < Pubkey::new_from_array(high));
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(Pubkey::new(&[0u8; PUBKEY_BYTES]).decompress().is_none());
    }
}
