//! The `transaction` module provides canonical transaction identity,
//! signing, and the authorization entry points.

use crate::authority::{AccountId, Authority, RejectedAuthorityMap};
use crate::config::TRANSACTION_ID_BYTES;
use crate::encode::{self, Pack, Unpack};
use crate::error::TransactionError;
use crate::hash::{self, ChainId, Hash};
use crate::operation::Operation;
use crate::pubkey::Pubkey;
use crate::sign_state::{AuthorityGetter, SignState};
use crate::signature::{Keypair, Signature};
use crate::verify;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use once_cell::unsync::OnceCell;
use serde_derive::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Read, Write};

pub const BLOCK_ID_BYTES: usize = 20;

/// A transaction id: the leading bytes of the transaction digest. Displayed
/// as lowercase hexadecimal; equality is byte equality of the truncated
/// form.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TransactionId([u8; TRANSACTION_ID_BYTES]);

impl TransactionId {
    pub const fn new_from_array(bytes: [u8; TRANSACTION_ID_BYTES]) -> Self {
        TransactionId(bytes)
    }

    pub fn from_digest(digest: &Hash) -> Self {
        let mut bytes = [0u8; TRANSACTION_ID_BYTES];
        bytes.copy_from_slice(&digest.as_ref()[..TRANSACTION_ID_BYTES]);
        TransactionId(bytes)
    }

    pub fn to_bytes(self) -> [u8; TRANSACTION_ID_BYTES] {
        self.0
    }
}

impl AsRef<[u8]> for TransactionId {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A block id. The first word carries the block number in byte-reversed
/// form, the second word is the compact fork identifier.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlockId(pub [u8; BLOCK_ID_BYTES]);

impl AsRef<[u8]> for BlockId {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A tagged future-compatibility value. Extensions are kept in ascending
/// tag order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Extension {
    pub tag: u64,
    pub data: Vec<u8>,
}

impl Pack for Extension {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        encode::encode_len(writer, self.tag)?;
        self.data.pack(writer)
    }
}

impl Unpack for Extension {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Extension {
            tag: encode::decode_len(reader)?,
            data: Vec::unpack(reader)?,
        })
    }
}

/// The opaque result of applying one operation. Produced outside this crate.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct OperationResult(pub Vec<u8>);

impl Pack for OperationResult {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.0.pack(writer)
    }
}

impl Unpack for OperationResult {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(OperationResult(Vec::unpack(reader)?))
    }
}

/// An unsigned transaction.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "Op: serde::Serialize",
    deserialize = "Op: serde::de::DeserializeOwned"
))]
pub struct Transaction<Op> {
    /// Low 16 bits of the reference block number, stored byte-reversed.
    pub ref_block_num: u16,
    /// Second word of the reference block id.
    pub ref_block_prefix: u32,
    /// Absolute expiration deadline, seconds since epoch.
    pub expiration: u32,
    pub operations: Vec<Op>,
    pub extensions: Vec<Extension>,
}

impl<Op: Operation> Transaction<Op> {
    pub fn new(operations: Vec<Op>) -> Self {
        Transaction {
            ref_block_num: 0,
            ref_block_prefix: 0,
            expiration: 0,
            operations,
            extensions: Vec::new(),
        }
    }

    /// Digest of the canonical encoding. Two transactions share a digest iff
    /// their encodings are byte-identical.
    pub fn digest(&self) -> Hash {
        hash::hash(&self.packed_bytes())
    }

    /// The digest that is signed: the chain id precedes the transaction so a
    /// signature cannot be replayed on another chain.
    pub fn sig_digest(&self, chain_id: &ChainId) -> Hash {
        let mut hasher = hash::Hasher::default();
        hasher.hash(chain_id.as_ref());
        hasher.hash(&self.packed_bytes());
        hasher.result()
    }

    pub fn id(&self) -> TransactionId {
        TransactionId::from_digest(&self.digest())
    }

    pub fn get_packed_size(&self) -> u64 {
        self.packed_size()
    }

    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.operations.is_empty() {
            return Err(TransactionError::EmptyTransaction);
        }
        for (index, op) in self.operations.iter().enumerate() {
            op.validate()
                .map_err(|err| TransactionError::OperationInvalid(index as u16, err))?;
        }
        Ok(())
    }

    pub fn set_expiration(&mut self, expiration: u32) {
        self.expiration = expiration;
    }

    /// Bind this transaction to a reference block. The byte reversal of the
    /// first word is a consensus quirk and must stay bit-exact.
    pub fn set_reference_block(&mut self, block_id: &BlockId) {
        let bytes = block_id.0;
        let word0 = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        self.ref_block_num = word0.swap_bytes() as u16;
        self.ref_block_prefix = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    }

    /// Gather the authorities every operation demands, then drop from the
    /// active set any account whose owner authority is already required.
    pub fn get_required_authorities(
        &self,
        active: &mut BTreeSet<AccountId>,
        owner: &mut BTreeSet<AccountId>,
        other: &mut Vec<Authority>,
        ignore_custom_required_auths: bool,
    ) {
        for op in &self.operations {
            op.get_required_authorities(active, owner, other, ignore_custom_required_auths);
        }
        for id in owner.iter() {
            active.remove(id);
        }
    }
}

impl<Op: Operation> Pack for Transaction<Op> {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u16::<LittleEndian>(self.ref_block_num)?;
        writer.write_u32::<LittleEndian>(self.ref_block_prefix)?;
        writer.write_u32::<LittleEndian>(self.expiration)?;
        self.operations.pack(writer)?;
        self.extensions.pack(writer)
    }
}

impl<Op: Operation + Unpack> Unpack for Transaction<Op> {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Transaction {
            ref_block_num: reader.read_u16::<LittleEndian>()?,
            ref_block_prefix: reader.read_u32::<LittleEndian>()?,
            expiration: reader.read_u32::<LittleEndian>()?,
            operations: Vec::unpack(reader)?,
            extensions: Vec::unpack(reader)?,
        })
    }
}

/// A transaction carrying compact recoverable signatures over its signing
/// digest.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "Op: serde::Serialize",
    deserialize = "Op: serde::de::DeserializeOwned"
))]
pub struct SignedTransaction<Op> {
    pub transaction: Transaction<Op>,
    pub signatures: Vec<Signature>,
}

impl<Op: Operation> SignedTransaction<Op> {
    pub fn new(transaction: Transaction<Op>) -> Self {
        SignedTransaction {
            transaction,
            signatures: Vec::new(),
        }
    }

    /// Sign and append the signature.
    pub fn sign(&mut self, keypair: &Keypair, chain_id: &ChainId) -> Signature {
        let signature = self.create_signature(keypair, chain_id);
        self.signatures.push(signature);
        signature
    }

    /// Produce the signature without appending it: a dry run of
    /// [`sign`](Self::sign).
    pub fn create_signature(&self, keypair: &Keypair, chain_id: &ChainId) -> Signature {
        keypair.sign_digest(&self.transaction.sig_digest(chain_id))
    }

    /// Recover the public key behind every signature. Two signatures
    /// recovering to the same key are a protocol error.
    pub fn get_signature_keys(
        &self,
        chain_id: &ChainId,
    ) -> Result<BTreeSet<Pubkey>, TransactionError> {
        let digest = self.transaction.sig_digest(chain_id);
        let mut keys = BTreeSet::new();
        for signature in &self.signatures {
            let key = signature.recover(&digest)?;
            if !keys.insert(key) {
                return Err(TransactionError::DuplicateSignature(key));
            }
        }
        Ok(keys)
    }

    /// Strict verification of this transaction's signatures against the
    /// supplied authority view. Committee involvement is disallowed and no
    /// prior approvals are assumed; callers holding either go through
    /// [`verify::verify_authority`] directly.
    #[allow(clippy::too_many_arguments)]
    pub fn verify_authority<'auth, Custom>(
        &self,
        chain_id: &ChainId,
        get_active: &AuthorityGetter<'auth>,
        get_owner: &AuthorityGetter<'auth>,
        get_custom: Custom,
        allow_non_immediate_owner: bool,
        ignore_custom_required_auths: bool,
        max_recursion: u32,
    ) -> Result<(), TransactionError>
    where
        Custom: FnMut(AccountId, &Op, &mut RejectedAuthorityMap) -> Vec<Authority>,
    {
        verify::verify_authority(
            &self.transaction.operations,
            &self.get_signature_keys(chain_id)?,
            get_active,
            get_owner,
            get_custom,
            allow_non_immediate_owner,
            ignore_custom_required_auths,
            max_recursion,
            false,
            &BTreeSet::new(),
            &BTreeSet::new(),
        )?;
        Ok(())
    }

    /// Of `available_keys`, the keys that would contribute to authorizing
    /// this transaction on top of the signatures already present.
    #[allow(clippy::too_many_arguments)]
    pub fn get_required_signatures<'auth>(
        &self,
        chain_id: &ChainId,
        available_keys: &BTreeSet<Pubkey>,
        get_active: &AuthorityGetter<'auth>,
        get_owner: &AuthorityGetter<'auth>,
        allow_non_immediate_owner: bool,
        ignore_custom_required_auths: bool,
        max_recursion: u32,
    ) -> Result<BTreeSet<Pubkey>, TransactionError> {
        let mut required_active = BTreeSet::new();
        let mut required_owner = BTreeSet::new();
        let mut other = Vec::new();
        self.transaction.get_required_authorities(
            &mut required_active,
            &mut required_owner,
            &mut other,
            ignore_custom_required_auths,
        );

        let signature_keys = self.get_signature_keys(chain_id)?;
        let mut state = SignState::with_keys(
            &signature_keys,
            get_active,
            get_owner,
            allow_non_immediate_owner,
            max_recursion,
            available_keys,
        );

        for auth in &other {
            state.check_authority(auth);
        }
        for id in &required_owner {
            if let Some(auth) = get_owner(*id) {
                state.check_authority(auth);
            }
        }
        for id in &required_active {
            if !state.check_account_authority(*id) {
                if let Some(auth) = get_owner(*id) {
                    state.check_authority(auth);
                }
            }
        }
        state.remove_unused_signatures();

        Ok(state
            .provided_signatures
            .keys()
            .filter(|key| available_keys.contains(key) && !signature_keys.contains(key))
            .copied()
            .collect())
    }

    /// Greedily shrink the candidate signing set: drop each key in canonical
    /// order and keep the removal whenever strict verification still passes.
    /// The result is sufficient and locally minimal, though not necessarily
    /// globally minimal.
    #[allow(clippy::too_many_arguments)]
    pub fn minimize_required_signatures<'auth, Custom>(
        &self,
        chain_id: &ChainId,
        available_keys: &BTreeSet<Pubkey>,
        get_active: &AuthorityGetter<'auth>,
        get_owner: &AuthorityGetter<'auth>,
        mut get_custom: Custom,
        allow_non_immediate_owner: bool,
        ignore_custom_required_auths: bool,
        max_recursion: u32,
    ) -> Result<BTreeSet<Pubkey>, TransactionError>
    where
        Custom: FnMut(AccountId, &Op, &mut RejectedAuthorityMap) -> Vec<Authority>,
    {
        let candidates = self.get_required_signatures(
            chain_id,
            available_keys,
            get_active,
            get_owner,
            allow_non_immediate_owner,
            ignore_custom_required_auths,
            max_recursion,
        )?;
        let mut result = candidates.clone();

        for key in &candidates {
            result.remove(key);
            match verify::verify_authority(
                &self.transaction.operations,
                &result,
                get_active,
                get_owner,
                &mut get_custom,
                allow_non_immediate_owner,
                ignore_custom_required_auths,
                max_recursion,
                false,
                &BTreeSet::new(),
                &BTreeSet::new(),
            ) {
                Ok(()) => {}
                Err(failure) if failure.is_missing_auth() => {
                    result.insert(*key);
                }
                Err(failure) => return Err(failure.into()),
            }
        }
        Ok(result)
    }
}

impl<Op: Operation> Pack for SignedTransaction<Op> {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.transaction.pack(writer)?;
        self.signatures.pack(writer)
    }
}

impl<Op: Operation + Unpack> Unpack for SignedTransaction<Op> {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(SignedTransaction {
            transaction: Transaction::unpack(reader)?,
            signatures: Vec::unpack(reader)?,
        })
    }
}

/// A transaction that has been applied, together with the result of each
/// operation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "Op: serde::Serialize",
    deserialize = "Op: serde::de::DeserializeOwned"
))]
pub struct ProcessedTransaction<Op> {
    pub transaction: SignedTransaction<Op>,
    pub operation_results: Vec<OperationResult>,
}

impl<Op: Operation> ProcessedTransaction<Op> {
    pub fn new(transaction: SignedTransaction<Op>, operation_results: Vec<OperationResult>) -> Self {
        ProcessedTransaction {
            transaction,
            operation_results,
        }
    }

    /// Digest of the processed form, as folded into a block's merkle root.
    pub fn merkle_digest(&self) -> Hash {
        hash::hash(&self.packed_bytes())
    }
}

impl<Op: Operation> Pack for ProcessedTransaction<Op> {
    fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.transaction.pack(writer)?;
        self.operation_results.pack(writer)
    }
}

impl<Op: Operation + Unpack> Unpack for ProcessedTransaction<Op> {
    fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(ProcessedTransaction {
            transaction: SignedTransaction::unpack(reader)?,
            operation_results: Vec::unpack(reader)?,
        })
    }
}

/// A signed transaction with one-shot caches for its id, packed size, and
/// recovered signer set.
///
/// Caches initialize on first access and are never re-derived; in
/// particular the signer cache is keyed implicitly by the chain id of the
/// first [`get_signature_keys`](Self::get_signature_keys) call. Call
/// [`invalidate`](Self::invalidate) to force recomputation. The cache cells
/// are single-threaded; this type is deliberately not `Sync`.
#[derive(Clone, Debug)]
pub struct PrecomputableTransaction<Op> {
    transaction: SignedTransaction<Op>,
    tx_id: OnceCell<TransactionId>,
    packed_size: OnceCell<u64>,
    signees: OnceCell<BTreeSet<Pubkey>>,
    validated: Cell<bool>,
}

impl<Op: Operation> PrecomputableTransaction<Op> {
    pub fn new(transaction: SignedTransaction<Op>) -> Self {
        PrecomputableTransaction {
            transaction,
            tx_id: OnceCell::new(),
            packed_size: OnceCell::new(),
            signees: OnceCell::new(),
            validated: Cell::new(false),
        }
    }

    pub fn transaction(&self) -> &SignedTransaction<Op> {
        &self.transaction
    }

    pub fn into_inner(self) -> SignedTransaction<Op> {
        self.transaction
    }

    pub fn id(&self) -> TransactionId {
        *self.tx_id.get_or_init(|| self.transaction.transaction.id())
    }

    pub fn get_packed_size(&self) -> u64 {
        *self
            .packed_size
            .get_or_init(|| self.transaction.packed_size())
    }

    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.validated.get() {
            return Ok(());
        }
        self.transaction.transaction.validate()?;
        self.validated.set(true);
        Ok(())
    }

    pub fn get_signature_keys(
        &self,
        chain_id: &ChainId,
    ) -> Result<BTreeSet<Pubkey>, TransactionError> {
        self.signees
            .get_or_try_init(|| self.transaction.get_signature_keys(chain_id))
            .map(|keys| keys.clone())
    }

    /// Verify using the cached signer set where available.
    #[allow(clippy::too_many_arguments)]
    pub fn verify_authority<'auth, Custom>(
        &self,
        chain_id: &ChainId,
        get_active: &AuthorityGetter<'auth>,
        get_owner: &AuthorityGetter<'auth>,
        get_custom: Custom,
        allow_non_immediate_owner: bool,
        ignore_custom_required_auths: bool,
        max_recursion: u32,
    ) -> Result<(), TransactionError>
    where
        Custom: FnMut(AccountId, &Op, &mut RejectedAuthorityMap) -> Vec<Authority>,
    {
        verify::verify_authority(
            &self.transaction.transaction.operations,
            &self.get_signature_keys(chain_id)?,
            get_active,
            get_owner,
            get_custom,
            allow_non_immediate_owner,
            ignore_custom_required_auths,
            max_recursion,
            false,
            &BTreeSet::new(),
            &BTreeSet::new(),
        )?;
        Ok(())
    }

    /// Clear every cache, forcing recomputation on next access.
    pub fn invalidate(&mut self) {
        self.tx_id.take();
        self.packed_size.take();
        self.signees.take();
        self.validated.set(false);
    }
}

impl<Op: Operation> From<SignedTransaction<Op>> for PrecomputableTransaction<Op> {
    fn from(transaction: SignedTransaction<Op>) -> Self {
        Self::new(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationError;

    /// Minimal operation used to exercise the wire format.
    #[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
    struct PingOp {
        nonce: u32,
    }

    const PING_TAG: u64 = 5;

    impl Pack for PingOp {
        fn pack<W: Write>(&self, writer: &mut W) -> io::Result<()> {
            encode::encode_len(writer, PING_TAG)?;
            self.nonce.pack(writer)
        }
    }

    impl Unpack for PingOp {
        fn unpack<R: Read>(reader: &mut R) -> io::Result<Self> {
            let tag = encode::decode_len(reader)?;
            if tag != PING_TAG {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "unknown operation tag",
                ));
            }
            Ok(PingOp {
                nonce: u32::unpack(reader)?,
            })
        }
    }

    impl Operation for PingOp {
        fn validate(&self) -> Result<(), OperationError> {
            if self.nonce == u32::MAX {
                return Err(OperationError::Malformed("nonce out of range".to_string()));
            }
            Ok(())
        }

        fn get_required_authorities(
            &self,
            _active: &mut BTreeSet<AccountId>,
            _owner: &mut BTreeSet<AccountId>,
            _other: &mut Vec<Authority>,
            _ignore_custom_required_auths: bool,
        ) {
        }
    }

    fn test_transaction() -> Transaction<PingOp> {
        Transaction {
            ref_block_num: 0x1234,
            ref_block_prefix: 0xdead_beef,
            expiration: 0x5f5e_1000,
            operations: vec![PingOp { nonce: 7 }],
            extensions: vec![],
        }
    }

    fn keypair(seed: u8) -> Keypair {
        Keypair::from_seed(&[seed; 32]).unwrap()
    }

    fn chain_id() -> ChainId {
        hash::hash(b"test chain")
    }

    /// Detect changes to the serialized layout; the encoding is part of the
    /// consensus surface.
    #[test]
    fn test_wire_layout() {
        assert_eq!(
            test_transaction().packed_bytes(),
            vec![
                0x34, 0x12, // ref_block_num
                0xef, 0xbe, 0xad, 0xde, // ref_block_prefix
                0x00, 0x10, 0x5e, 0x5f, // expiration
                0x01, 0x05, 0x07, 0x00, 0x00, 0x00, // operations
                0x00, // extensions
            ],
        );
    }

    #[test]
    fn test_pack_round_trip() {
        let tx = test_transaction();
        let bytes = tx.packed_bytes();
        let back = Transaction::<PingOp>::unpack_from_slice(&bytes).unwrap();
        assert_eq!(back, tx);
        assert_eq!(back.packed_bytes(), bytes);
    }

    #[test]
    fn test_id_is_digest_prefix() {
        let tx = test_transaction();
        let digest = tx.digest();
        assert_eq!(
            tx.id().as_ref(),
            &digest.as_ref()[..TRANSACTION_ID_BYTES]
        );
        assert_eq!(tx.id().to_string(), hex::encode(&digest.as_ref()[..20]));
    }

    #[test]
    fn test_sig_digest_prefixes_chain_id() {
        let tx = test_transaction();
        let chain = chain_id();
        let mut preimage = chain.as_ref().to_vec();
        preimage.extend_from_slice(&tx.packed_bytes());
        assert_eq!(tx.sig_digest(&chain), hash::hash(&preimage));
        assert_ne!(tx.sig_digest(&chain), tx.digest());
    }

    #[test]
    fn test_set_reference_block() {
        let mut tx = test_transaction();
        let mut id_bytes = [0u8; BLOCK_ID_BYTES];
        id_bytes[..8].copy_from_slice(&[0x00, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd]);
        tx.set_reference_block(&BlockId(id_bytes));
        assert_eq!(tx.ref_block_num, 0x2345);
        assert_eq!(tx.ref_block_prefix, 0xcdab_8967);
    }

    #[test]
    fn test_validate() {
        let mut tx = test_transaction();
        assert_eq!(tx.validate(), Ok(()));

        tx.operations.clear();
        assert_eq!(tx.validate(), Err(TransactionError::EmptyTransaction));

        tx.operations = vec![PingOp { nonce: 1 }, PingOp { nonce: u32::MAX }];
        assert_eq!(
            tx.validate(),
            Err(TransactionError::OperationInvalid(
                1,
                OperationError::Malformed("nonce out of range".to_string())
            ))
        );
    }

    #[test]
    fn test_sign_appends_and_dry_run_does_not() {
        let mut stx = SignedTransaction::new(test_transaction());
        let chain = chain_id();
        let dry = stx.create_signature(&keypair(1), &chain);
        assert!(stx.signatures.is_empty());

        let appended = stx.sign(&keypair(1), &chain);
        assert_eq!(appended, dry);
        assert_eq!(stx.signatures, vec![appended]);
    }

    #[test]
    fn test_get_signature_keys() {
        let mut stx = SignedTransaction::new(test_transaction());
        let chain = chain_id();
        stx.sign(&keypair(1), &chain);
        stx.sign(&keypair(2), &chain);

        let keys = stx.get_signature_keys(&chain).unwrap();
        let expected: BTreeSet<Pubkey> =
            [keypair(1).pubkey(), keypair(2).pubkey()].iter().copied().collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_duplicate_signature_keys() {
        let mut stx = SignedTransaction::new(test_transaction());
        let chain = chain_id();
        stx.sign(&keypair(1), &chain);
        stx.sign(&keypair(1), &chain);
        assert_eq!(
            stx.get_signature_keys(&chain),
            Err(TransactionError::DuplicateSignature(keypair(1).pubkey()))
        );
    }

    #[test]
    fn test_merkle_digest_is_processed_packing() {
        let mut stx = SignedTransaction::new(test_transaction());
        stx.sign(&keypair(1), &chain_id());
        let ptx = ProcessedTransaction::new(stx, vec![OperationResult(vec![1, 2, 3])]);
        assert_eq!(ptx.merkle_digest(), hash::hash(&ptx.packed_bytes()));
    }

    #[test]
    fn test_precomputed_caches_match_recomputation() {
        let mut stx = SignedTransaction::new(test_transaction());
        let chain = chain_id();
        stx.sign(&keypair(3), &chain);

        let ptx = PrecomputableTransaction::new(stx.clone());
        assert_eq!(ptx.id(), stx.transaction.id());
        assert_eq!(ptx.get_packed_size(), stx.packed_size());
        assert_eq!(
            ptx.get_signature_keys(&chain).unwrap(),
            stx.get_signature_keys(&chain).unwrap()
        );
        assert_eq!(ptx.validate(), Ok(()));
        assert_eq!(ptx.validate(), Ok(()));
    }

    #[test]
    fn test_signee_cache_ignores_later_chain_id() {
        let mut stx = SignedTransaction::new(test_transaction());
        let chain = chain_id();
        stx.sign(&keypair(4), &chain);

        let mut ptx = PrecomputableTransaction::new(stx);
        let first = ptx.get_signature_keys(&chain).unwrap();

        // The cache is keyed by the first chain id used; a different chain
        // id does not re-derive.
        let other_chain = hash::hash(b"other chain");
        assert_eq!(ptx.get_signature_keys(&other_chain).unwrap(), first);

        ptx.invalidate();
        match ptx.get_signature_keys(&other_chain) {
            Ok(rederived) => assert_ne!(rederived, first),
            Err(err) => assert_eq!(err, TransactionError::BadSignature),
        }
    }
}
