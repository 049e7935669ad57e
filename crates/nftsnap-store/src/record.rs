//! Record shapes held by a [`crate::Snapshot`].
//!
//! Addresses are stored as raw 20-byte values, so two textual spellings that
//! differ only in hex casing compare equal once parsed.

use std::fmt;

use alloy_primitives::{Address, U256};

use crate::codec::FormatError;

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Parse a `0x`-prefixed (or bare) 40-digit hex address, any casing.
pub fn parse_address(raw: &str) -> Option<Address> {
    let t = raw.trim();
    let digits = t
        .strip_prefix("0x")
        .or_else(|| t.strip_prefix("0X"))
        .unwrap_or(t);
    if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let bytes = hex::decode(digits).ok()?;
    Some(Address::from_slice(&bytes))
}

/// Lowercase `0x` hex rendering used in every persisted file.
pub fn format_address(addr: &Address) -> String {
    format!("0x{}", hex::encode(addr.as_slice()))
}

/// Parse an unsigned base-10 integer of up to 256 bits.
///
/// Signs, whitespace inside the number, hex prefixes and empty input are all
/// rejected; values above 2^256-1 fail rather than wrap.
pub fn parse_u256(raw: &str) -> Option<U256> {
    let t = raw.trim();
    if t.is_empty() || !t.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(t, 10).ok()
}

// ---------------------------------------------------------------------------
// Record trait
// ---------------------------------------------------------------------------

/// A record kind that can live in a [`crate::Snapshot`] and round-trip
/// through the flat file format.
pub trait SnapshotRecord: Clone + PartialEq + Eq + fmt::Debug {
    /// Upsert key. Ordering of the key is the serialization order.
    type Key: Ord + Clone + fmt::Debug + fmt::Display;

    /// Exact header row of the flat file.
    const HEADER: &'static [&'static str];

    fn key(&self) -> Self::Key;

    /// `false` when the record represents "no holding" and must not be kept.
    fn is_persistable(&self) -> bool {
        true
    }

    fn to_fields(&self) -> Vec<String>;

    /// Decode one data row. `line` is the 1-based line number in the file.
    fn from_fields(line: u64, fields: &[&str]) -> Result<Self, FormatError>;
}

fn field_address(line: u64, raw: &str) -> Result<Address, FormatError> {
    parse_address(raw).ok_or_else(|| FormatError::BadAddress {
        line,
        raw: raw.to_string(),
    })
}

fn field_u256(line: u64, field: &'static str, raw: &str) -> Result<U256, FormatError> {
    parse_u256(raw).ok_or_else(|| FormatError::BadNumber {
        line,
        field,
        raw: raw.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Ownership (non-fungible)
// ---------------------------------------------------------------------------

/// Single-owner record: at most one live holder per token id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OwnershipRecord {
    pub holder: Address,
    pub token_id: U256,
}

impl OwnershipRecord {
    pub fn new(holder: Address, token_id: U256) -> Self {
        Self { holder, token_id }
    }
}

impl SnapshotRecord for OwnershipRecord {
    type Key = U256;

    const HEADER: &'static [&'static str] = &["address", "tokenId"];

    fn key(&self) -> U256 {
        self.token_id
    }

    fn to_fields(&self) -> Vec<String> {
        vec![format_address(&self.holder), self.token_id.to_string()]
    }

    fn from_fields(line: u64, fields: &[&str]) -> Result<Self, FormatError> {
        Ok(Self {
            holder: field_address(line, fields[0])?,
            token_id: field_u256(line, "tokenId", fields[1])?,
        })
    }
}

// ---------------------------------------------------------------------------
// Balance (fungible / semi-fungible)
// ---------------------------------------------------------------------------

/// `(tokenId, holder)` key; sorts by token id first, then holder bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BalanceKey {
    pub token_id: U256,
    pub holder: Address,
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.token_id, format_address(&self.holder))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BalanceRecord {
    pub holder: Address,
    pub token_id: U256,
    pub amount: U256,
}

impl BalanceRecord {
    pub fn new(holder: Address, token_id: U256, amount: U256) -> Self {
        Self {
            holder,
            token_id,
            amount,
        }
    }
}

impl SnapshotRecord for BalanceRecord {
    type Key = BalanceKey;

    const HEADER: &'static [&'static str] = &["address", "tokenId", "balance"];

    fn key(&self) -> BalanceKey {
        BalanceKey {
            token_id: self.token_id,
            holder: self.holder,
        }
    }

    /// A zero balance is the same as not holding the token at all.
    fn is_persistable(&self) -> bool {
        !self.amount.is_zero()
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            format_address(&self.holder),
            self.token_id.to_string(),
            self.amount.to_string(),
        ]
    }

    fn from_fields(line: u64, fields: &[&str]) -> Result<Self, FormatError> {
        let rec = Self {
            holder: field_address(line, fields[0])?,
            token_id: field_u256(line, "tokenId", fields[1])?,
            amount: field_u256(line, "balance", fields[2])?,
        };
        if !rec.is_persistable() {
            return Err(FormatError::ZeroBalance { line });
        }
        Ok(rec)
    }
}

// ---------------------------------------------------------------------------
// Metadata (ownership annotated with the token's metadata number)
// ---------------------------------------------------------------------------

/// Metadata number of a token URI: the last path segment with a trailing
/// `.json` removed. `ipfs://cid/42.json` gives `42`.
pub fn metadata_id_from_uri(uri: &str) -> &str {
    let trimmed = uri.trim();
    let stem = trimmed.strip_suffix(".json").unwrap_or(trimmed);
    stem.rsplit('/').next().unwrap_or(stem)
}

fn is_metadata_id(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

/// Ownership row plus the metadata number its `tokenURI` points at.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MetadataRecord {
    pub holder: Address,
    pub token_id: U256,
    /// Decimal digits, kept as text so leading zeros survive.
    pub metadata_id: String,
}

impl MetadataRecord {
    /// `None` when `metadata_id` is not a plain decimal number.
    pub fn new(holder: Address, token_id: U256, metadata_id: impl Into<String>) -> Option<Self> {
        let metadata_id = metadata_id.into();
        is_metadata_id(&metadata_id).then_some(Self {
            holder,
            token_id,
            metadata_id,
        })
    }
}

impl SnapshotRecord for MetadataRecord {
    type Key = U256;

    const HEADER: &'static [&'static str] = &["address", "tokenId", "tokenNumber"];

    fn key(&self) -> U256 {
        self.token_id
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            format_address(&self.holder),
            self.token_id.to_string(),
            self.metadata_id.clone(),
        ]
    }

    fn from_fields(line: u64, fields: &[&str]) -> Result<Self, FormatError> {
        let raw = fields[2].trim();
        if !is_metadata_id(raw) {
            return Err(FormatError::BadNumber {
                line,
                field: "tokenNumber",
                raw: raw.to_string(),
            });
        }
        Ok(Self {
            holder: field_address(line, fields[0])?,
            token_id: field_u256(line, "tokenId", fields[1])?,
            metadata_id: raw.to_string(),
        })
    }
}
