//! In-memory stand-ins for the remote ledgers, plus fixture helpers.
//!
//! Nothing here touches the network. Fakes are deterministic: failures are
//! scripted per call, never random.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use nftsnap_store::{parse_address, Address, OwnershipRecord, OwnershipSnapshot, U256};

mod ledger;
mod pages;

pub use ledger::{FakeLedger, Scripted};
pub use pages::VecPageSource;

/// Deterministic address from a small integer (`0x00..00NN`).
pub fn addr(n: u64) -> Address {
    let mut bytes = [0u8; 20];
    bytes[12..].copy_from_slice(&n.to_be_bytes());
    Address::from(bytes)
}

/// Parse a hex address literal; panics on malformed input (fixtures only).
pub fn addr_hex(s: &str) -> Address {
    parse_address(s).unwrap_or_else(|| panic!("bad fixture address {s}"))
}

pub fn id(n: u64) -> U256 {
    U256::from(n)
}

/// Ownership snapshot from `(token_id, owner)` pairs.
pub fn ownership(pairs: &[(u64, Address)]) -> OwnershipSnapshot {
    pairs
        .iter()
        .map(|(t, a)| OwnershipRecord::new(*a, id(*t)))
        .collect()
}

/// Write `contents` to `dir/name` and return the full path.
pub fn write_fixture(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents).with_context(|| format!("write fixture: {}", path.display()))?;
    Ok(path)
}

/// Fresh temporary directory, removed on drop.
pub fn scratch_dir() -> Result<tempfile::TempDir> {
    tempfile::tempdir().context("create scratch dir")
}
