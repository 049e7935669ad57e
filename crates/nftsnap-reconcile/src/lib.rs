//! nftsnap-reconcile
//!
//! Compares a stored snapshot against a live ledger (or against another
//! snapshot) and reports every discrepancy.
//!
//! - Never stops on the first mismatch.
//! - A failed live read is a `ReadError`, counted apart from mismatches.
//! - Never mutates the reference snapshot.
//! - Cancellation yields a partial report flagged as not completed.

mod diff;
mod engine;
mod sample;
mod types;

pub use diff::{diff_snapshots, SnapshotDiff};
pub use engine::{
    verify_balances, verify_metadata, verify_ownership, verify_records, VerifyOptions,
};
pub use sample::{SampleError, SamplePlan};
pub use types::*;
