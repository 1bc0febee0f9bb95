//! Ledger object model: blocks, transactions, receipts, and the hex
//! quantity encoding used on the wire.

use serde::{Deserialize, Serialize};

/// Parse a `0x…` hex quantity into a `u64`.
pub fn parse_hex_u64(s: &str) -> Result<u64, std::num::ParseIntError> {
    u64::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16)
}

/// Serde adapter for `u64` fields encoded as `0x…` quantities.
pub mod hex_u64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let s = String::deserialize(d)?;
        super::parse_hex_u64(&s).map_err(serde::de::Error::custom)
    }

    pub fn serialize<S: Serializer>(v: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{v:#x}"))
    }
}

/// Serde adapter for optional `0x…` quantities (pending fields come as null).
pub mod hex_u64_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        let s = Option::<String>::deserialize(d)?;
        s.map(|s| super::parse_hex_u64(&s).map_err(serde::de::Error::custom))
            .transpose()
    }

    pub fn serialize<S: Serializer>(v: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(v) => s.serialize_str(&format!("{v:#x}")),
            None => s.serialize_none(),
        }
    }
}

/// Compact summary of a new block, as delivered to block subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub height: u64,
    pub hash: String,
    pub timestamp: u64,
}

/// A transaction as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    /// Absent for contract-creation transactions.
    #[serde(default)]
    pub to: Option<String>,
    /// Transferred amount as a raw hex quantity (may exceed 64 bits).
    pub value: String,
    #[serde(default, with = "hex_u64_opt")]
    pub block_number: Option<u64>,
}

/// A transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    #[serde(default, with = "hex_u64_opt")]
    pub block_number: Option<u64>,
    /// `0x1` success, `0x0` failure; absent on pre-Byzantium chains.
    #[serde(default, with = "hex_u64_opt")]
    pub status: Option<u64>,
    /// Gas consumed, raw hex quantity.
    #[serde(default)]
    pub gas_used: Option<String>,
}

/// A full block including its transaction list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(with = "hex_u64")]
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    #[serde(with = "hex_u64")]
    pub timestamp: u64,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Summary view of this block.
    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            height: self.number,
            hash: self.hash.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Returns `true` for a well-formed 32-byte hex hash (`0x` + 64 hex digits).
pub fn is_hex_hash(s: &str) -> bool {
    s.len() == 66
        && s.starts_with("0x")
        && s[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// Normalize a 20-byte hex address to lower case, or `None` if malformed.
pub fn normalize_address(s: &str) -> Option<String> {
    let ok = s.len() == 42
        && s.starts_with("0x")
        && s[2..].bytes().all(|b| b.is_ascii_hexdigit());
    ok.then(|| s.to_ascii_lowercase())
}
