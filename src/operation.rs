//! The `operation` module defines the interface the authorization core
//! requires of an operation taxonomy.
//!
//! The taxonomy itself lives outside this crate. Each operation variant
//! encodes as a varint tag followed by its body, validates its own fields,
//! and reports which authorities it demands.

use crate::authority::{AccountId, Authority};
use crate::encode::Pack;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// The operation body is structurally malformed.
    #[error("malformed operation: {0}")]
    Malformed(String),

    /// Taxonomy-specific failure code.
    #[error("operation failed validation with code {0}")]
    Custom(u32),
}

/// One tagged operation variant of a transaction.
pub trait Operation: Pack + Clone + fmt::Debug {
    /// Structural validation, independent of chain state.
    fn validate(&self) -> Result<(), OperationError>;

    /// Report the authorities this operation demands: accounts whose active
    /// or owner authority must sign, plus any loose authorities that must be
    /// satisfied directly. When `ignore_custom_required_auths` is set,
    /// demands that exist only to feed custom-authority predicates are
    /// suppressed.
    fn get_required_authorities(
        &self,
        active: &mut BTreeSet<AccountId>,
        owner: &mut BTreeSet<AccountId>,
        other: &mut Vec<Authority>,
        ignore_custom_required_auths: bool,
    );
}
