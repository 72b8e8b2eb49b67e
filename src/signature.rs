//! The `signature` module provides compact recoverable secp256k1 signatures
//! and the keypairs that produce them.

use crate::encode::{Pack, Unpack};
use crate::error::TransactionError;
use crate::hash::Hash;
use crate::pubkey::Pubkey;
use rand::rngs::OsRng;
use std::fmt;
use std::io::{self, Read, Write};

pub const SIGNATURE_BYTES: usize = 65;

/// Recovery header of a compact signature over a compressed public key.
/// The first byte is `27 + 4 + recovery_id`.
const COMPACT_HEADER_BASE: u8 = 31;

/// A 65-byte compact recoverable ECDSA signature: one recovery header byte
/// followed by the 64-byte r‖s pair.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Signature([u8; SIGNATURE_BYTES]);

impl Signature {
    pub fn new(signature_slice: &[u8]) -> Self {
        let mut bytes = [0u8; SIGNATURE_BYTES];
        bytes.copy_from_slice(signature_slice);
        Signature(bytes)
    }

    pub fn to_bytes(self) -> [u8; SIGNATURE_BYTES] {
        self.0
    }

    /// Recover the public key that produced this signature over `digest`.
    pub fn recover(&self, digest: &Hash) -> Result<Pubkey, TransactionError> {
        let header = self.0[0];
        if !(COMPACT_HEADER_BASE..COMPACT_HEADER_BASE + 4).contains(&header) {
            return Err(TransactionError::BadSignature);
        }
        let recovery_id = secp256k1::RecoveryId::parse(header - COMPACT_HEADER_BASE)
            .map_err(|_| TransactionError::BadSignature)?;
        let mut rs = [0u8; 64];
        rs.copy_from_slice(&self.0[1..]);
        let signature = secp256k1::Signature::parse_standard(&rs)
            .map_err(|_| TransactionError::BadSignature)?;
        let message = secp256k1::Message::parse(&digest.to_bytes());
        let point = secp256k1::recover(&message, &signature, &recovery_id)
            .map_err(|_| TransactionError::BadSignature)?;
        Ok(Pubkey::from(&point))
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0[..]).into_string())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0[..]).into_string())
    }
}

impl serde::Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct SignatureVisitor;

impl<'a> serde::de::Visitor<'a> for SignatureVisitor {
    type Value = Signature;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a base58 encoded compact signature")
    }

    fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Signature, E> {
        let bytes = bs58::decode(value)
            .into_vec()
            .map_err(|_| E::custom("failed to decode string to signature"))?;
        if bytes.len() != SIGNATURE_BYTES {
            return Err(E::custom("string decoded to wrong size for signature"));
        }
        Ok(Signature::new(&bytes))
    }
}

impl<'de> serde::Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(SignatureVisitor)
    }
}

impl Pack for Signature {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0)
    }
}

impl Unpack for Signature {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; SIGNATURE_BYTES];
        reader.read_exact(&mut buf)?;
        Ok(Signature(buf))
    }
}

/// A secp256k1 signing key.
pub struct Keypair {
    secret: secp256k1::SecretKey,
}

impl Keypair {
    /// Generate a fresh random keypair.
    pub fn new() -> Self {
        Keypair {
            secret: secp256k1::SecretKey::random(&mut OsRng),
        }
    }

    /// Build a keypair from 32 seed bytes. Fails if the seed is not a valid
    /// scalar on the curve.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, secp256k1::Error> {
        Ok(Keypair {
            secret: secp256k1::SecretKey::parse(seed)?,
        })
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey::from(&secp256k1::PublicKey::from_secret_key(&self.secret))
    }

    /// Produce a compact recoverable signature over `digest`.
    pub fn sign_digest(&self, digest: &Hash) -> Signature {
        let message = secp256k1::Message::parse(&digest.to_bytes());
        let (signature, recovery_id) = secp256k1::sign(&message, &self.secret);
        let mut bytes = [0u8; SIGNATURE_BYTES];
        bytes[0] = COMPACT_HEADER_BASE + recovery_id.serialize();
        bytes[1..].copy_from_slice(&signature.serialize());
        Signature(bytes)
    }
}

impl Default for Keypair {
    fn default() -> Self {
        Self::new()
    }
}
