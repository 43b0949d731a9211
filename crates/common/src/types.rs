use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use hex::{encode as hex_encode, decode as hex_decode};
use sha3::{Digest, Sha3_256};
use anyhow::Result;

/// Account / validator address: 20 bytes, displayed as hex
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn from_bytes(b: [u8; 20]) -> Self { Address(b) }
    pub fn as_bytes(&self) -> &[u8; 20] { &self.0 }
    pub fn to_hex(&self) -> String { hex_encode(self.0) }
    pub fn from_hex(s: &str) -> Result<Self, anyhow::Error> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex_decode(s)?;
        if bytes.len() != 20 { anyhow::bail!("invalid address length: {}", bytes.len()); }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Address(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Address").field(&self.to_hex()).finish()
    }
}
impl FromStr for Address {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_hex(s)
    }
}

/* --- serde serialize/deserialize for Address as hex string --- */
impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&self.to_hex())
    }
}
impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Address, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Opaque dispute/escrow identifier: sha3-256 digest wrapper (32 bytes).
///
/// Every fee tracker and disputed-stake snapshot is keyed by one of these.
/// Derived from the dispute parameters by the dispute subsystem; this crate
/// only treats it as an opaque key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HashId(pub [u8; 32]);

impl HashId {
    pub fn from_bytes(b: [u8; 32]) -> Self { HashId(b) }
    pub fn as_bytes(&self) -> &[u8; 32] { &self.0 }
    pub fn to_hex(&self) -> String { hex_encode(self.0) }
    pub fn from_hex(s: &str) -> Result<Self, anyhow::Error> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let v = hex_decode(s)?;
        if v.len() != 32 { anyhow::bail!("invalid hash id length: {}", v.len()); }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&v);
        Ok(HashId(arr))
    }

    /// Derive a hash id from arbitrary bytes (sha3-256).
    pub fn derive(bytes: &[u8]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&digest);
        HashId(arr)
    }
}

impl fmt::Display for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
impl fmt::Debug for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HashId").field(&self.to_hex()).finish()
    }
}
impl FromStr for HashId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HashId::from_hex(s)
    }
}

/* serde impls for HashId as hex string */
impl Serialize for HashId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&self.to_hex())
    }
}
impl<'de> Deserialize<'de> for HashId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<HashId, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        HashId::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
