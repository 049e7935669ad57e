use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use alloy_primitives::{Address, U256};

use crate::codec::{read_records, write_records, FormatError};
use crate::record::{BalanceKey, BalanceRecord, MetadataRecord, OwnershipRecord, SnapshotRecord};

/// In-memory authoritative map of one ledger slice, keyed by the record's key.
///
/// - [`Snapshot::put`] upserts; the last write for a key wins. For ownership
///   built from a transfer history the caller must feed events in chronological
///   order (see [`crate::transfer`]); the store does not check ordering.
/// - Records that are not persistable (zero balances) remove the key instead of
///   being stored.
/// - [`Snapshot::records`] always yields ascending key order, so the serialized
///   file is deterministic and diffable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot<R: SnapshotRecord> {
    records: BTreeMap<R::Key, R>,
}

pub type OwnershipSnapshot = Snapshot<OwnershipRecord>;
pub type BalanceSnapshot = Snapshot<BalanceRecord>;
pub type MetadataSnapshot = Snapshot<MetadataRecord>;

impl<R: SnapshotRecord> Default for Snapshot<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SnapshotRecord> Snapshot<R> {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Upsert by key. Returns the record previously stored under the key.
    pub fn put(&mut self, record: R) -> Option<R> {
        let key = record.key();
        if record.is_persistable() {
            self.records.insert(key, record)
        } else {
            self.records.remove(&key)
        }
    }

    pub fn get(&self, key: &R::Key) -> Option<&R> {
        self.records.get(key)
    }

    pub fn remove(&mut self, key: &R::Key) -> Option<R> {
        self.records.remove(key)
    }

    pub fn contains(&self, key: &R::Key) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ascending-key view of every record. Each call starts from the first key.
    pub fn records(&self) -> btree_map::Values<'_, R::Key, R> {
        self.records.values()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, R::Key, R> {
        self.records.keys()
    }

    // -----------------------------------------------------------------------
    // Flat file
    // -----------------------------------------------------------------------

    pub fn write_csv<W: Write>(&self, out: W) -> Result<(), FormatError> {
        write_records(out, self.records())
    }

    pub fn to_csv_string(&self) -> Result<String, FormatError> {
        let mut buf: Vec<u8> = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| FormatError::Io(e.to_string()))
    }

    pub fn read_csv<In: Read>(input: In) -> Result<Self, FormatError> {
        Ok(Self {
            records: read_records::<R, In>(input)?,
        })
    }

    pub fn from_csv_str(src: &str) -> Result<Self, FormatError> {
        Self::read_csv(src.as_bytes())
    }

    /// Write the snapshot to `path`, replacing any previous file in one rename.
    pub fn save(&self, path: &Path) -> Result<(), FormatError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    FormatError::Io(format!("create dir '{}': {e}", parent.display()))
                })?;
            }
        }

        let tmp = path.with_extension("csv.tmp");
        let file = fs::File::create(&tmp)
            .map_err(|e| FormatError::Io(format!("create '{}': {e}", tmp.display())))?;
        self.write_csv(file)?;
        fs::rename(&tmp, path).map_err(|e| {
            FormatError::Io(format!(
                "rename '{}' -> '{}': {e}",
                tmp.display(),
                path.display()
            ))
        })?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, FormatError> {
        let file = fs::File::open(path)
            .map_err(|e| FormatError::Io(format!("open '{}': {e}", path.display())))?;
        Self::read_csv(file)
    }
}

impl<R: SnapshotRecord> Extend<R> for Snapshot<R> {
    fn extend<T: IntoIterator<Item = R>>(&mut self, iter: T) {
        for r in iter {
            self.put(r);
        }
    }
}

impl<R: SnapshotRecord> FromIterator<R> for Snapshot<R> {
    fn from_iter<T: IntoIterator<Item = R>>(iter: T) -> Self {
        let mut s = Self::new();
        s.extend(iter);
        s
    }
}

impl Snapshot<OwnershipRecord> {
    pub fn owner_of(&self, token_id: U256) -> Option<Address> {
        self.records.get(&token_id).map(|r| r.holder)
    }
}

impl Snapshot<BalanceRecord> {
    /// Amount held; zero when no record exists.
    pub fn amount_of(&self, token_id: U256, holder: Address) -> U256 {
        self.records
            .get(&BalanceKey { token_id, holder })
            .map(|r| r.amount)
            .unwrap_or(U256::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_address;

    fn addr(s: &str) -> Address {
        parse_address(s).unwrap()
    }

    const A: &str = "0xaa000000000000000000000000000000000000aa";
    const B: &str = "0xbb000000000000000000000000000000000000bb";

    #[test]
    fn put_last_write_wins_for_ownership() {
        let mut s = OwnershipSnapshot::new();
        s.put(OwnershipRecord::new(addr(A), U256::from(7u8)));
        let prev = s.put(OwnershipRecord::new(addr(B), U256::from(7u8)));
        assert_eq!(prev.map(|r| r.holder), Some(addr(A)));
        assert_eq!(s.len(), 1);
        assert_eq!(s.owner_of(U256::from(7u8)), Some(addr(B)));
    }

    #[test]
    fn zero_balance_is_never_stored() {
        let mut s = BalanceSnapshot::new();
        s.put(BalanceRecord::new(addr(A), U256::from(1u8), U256::ZERO));
        assert!(s.is_empty());
    }

    #[test]
    fn zero_balance_removes_existing_holding() {
        let mut s = BalanceSnapshot::new();
        s.put(BalanceRecord::new(addr(A), U256::from(1u8), U256::from(5u8)));
        s.put(BalanceRecord::new(addr(A), U256::from(1u8), U256::ZERO));
        assert!(s.is_empty());
        assert_eq!(s.amount_of(U256::from(1u8), addr(A)), U256::ZERO);
    }

    #[test]
    fn records_are_sorted_and_restartable() {
        let s: OwnershipSnapshot = [9u64, 2, 5]
            .into_iter()
            .map(|i| OwnershipRecord::new(addr(A), U256::from(i)))
            .collect();

        let first: Vec<U256> = s.records().map(|r| r.token_id).collect();
        let second: Vec<U256> = s.records().map(|r| r.token_id).collect();
        assert_eq!(
            first,
            vec![U256::from(2u8), U256::from(5u8), U256::from(9u8)]
        );
        assert_eq!(first, second);
    }

    #[test]
    fn csv_output_is_sorted_with_header() {
        let mut s = BalanceSnapshot::new();
        s.put(BalanceRecord::new(addr(B), U256::from(2u8), U256::from(3u8)));
        s.put(BalanceRecord::new(addr(A), U256::from(2u8), U256::from(4u8)));
        s.put(BalanceRecord::new(addr(B), U256::from(1u8), U256::from(1u8)));

        let text = s.to_csv_string().unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "address,tokenId,balance");
        assert_eq!(lines[1], format!("{B},1,1"));
        assert_eq!(lines[2], format!("{A},2,4"));
        assert_eq!(lines[3], format!("{B},2,3"));
    }
}
