//! The Meridian protocol layer: canonical transaction identity, compact
//! recoverable signatures, and the weighted-authority authorization engine.
//!
//! The crate answers three questions about a candidate transaction: what is
//! its canonical identity (digest, id, packed size); which public keys
//! produced its signatures; and whether those signatures, combined with a
//! live view of on-chain authority records, properly authorize it. The
//! operation taxonomy and chain state live outside this crate and plug in
//! through the [`operation::Operation`] trait and authority-lookup closures.

pub mod address;
pub mod authority;
pub mod config;
pub mod encode;
pub mod error;
pub mod hash;
pub mod operation;
pub mod pubkey;
pub mod sign_state;
pub mod signature;
pub mod transaction;
pub mod verify;
