//! nftsnap-store
//!
//! Snapshot Store for token ownership / balance ledgers.
//!
//! A snapshot is built fresh for every fetch run, filled completely, then
//! written to a flat CSV file. The next run replaces that file wholesale;
//! nothing here patches a previously persisted snapshot.
//!
//! No network IO. Filesystem IO only in [`Snapshot::save`] / [`Snapshot::load`].

mod codec;
mod record;
mod snapshot;
pub mod transfer;

pub use alloy_primitives::{Address, U256};
pub use codec::FormatError;
pub use record::{
    format_address, metadata_id_from_uri, parse_address, parse_u256, BalanceKey, BalanceRecord,
    MetadataRecord, OwnershipRecord, SnapshotRecord,
};
pub use snapshot::{BalanceSnapshot, MetadataSnapshot, OwnershipSnapshot, Snapshot};
pub use transfer::{replay_in_order, replay_sorted, HoldingsLedger, ReplayError, TransferEvent};
