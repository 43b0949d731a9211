//! Core types for the chain crate.
//!
//! Addresses and hash ids are shared with the capability layer; they are
//! re-exported here so chain modules have a single import path.

pub use dpon_common::types::{Address, HashId};
