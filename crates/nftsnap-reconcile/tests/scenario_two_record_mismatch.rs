//! Scenario: one verified holder and one moved token.
//!
//! # Invariants under test
//!
//! 1. Stored `{1: 0xAA, 2: 0xBB}` against live `{1: 0xaa, 2: 0xCC}` yields
//!    `total_checked=2, verified_count=1, mismatch_count=1, error_count=0`.
//! 2. The single finding is `{ tokenId: 2, expected: 0xBB, actual: 0xCC }`.
//! 3. Upper-case hex in the snapshot file and lower-case hex from the live
//!    side compare equal.
//! 4. The reference snapshot is unchanged afterwards.

use nftsnap_reconcile::{verify_ownership, Completion, Outcome, SamplePlan, VerifyOptions};
use nftsnap_source::RetryPolicy;
use nftsnap_store::OwnershipSnapshot;
use nftsnap_testkit::{addr_hex, id, FakeLedger};
use std::time::Duration;

const SNAPSHOT_CSV: &str = "address,tokenId\n\
0x00000000000000000000000000000000000000AA,1\n\
0x00000000000000000000000000000000000000BB,2\n";

fn opts() -> VerifyOptions {
    VerifyOptions {
        plan: SamplePlan::Full,
        retry: RetryPolicy::immediate(3),
        read_delay: Duration::ZERO,
        progress_every: 1,
        cancel: None,
    }
}

#[tokio::test]
async fn scenario_one_verified_one_mismatch() {
    let snapshot = OwnershipSnapshot::from_csv_str(SNAPSHOT_CSV).unwrap();
    let before = snapshot.clone();

    let live = FakeLedger::new()
        .with_owner(id(1), addr_hex("0x00000000000000000000000000000000000000aa"))
        .with_owner(id(2), addr_hex("0x00000000000000000000000000000000000000cc"));

    let report = verify_ownership(&snapshot, &live, &opts()).await;

    assert_eq!(report.total_checked, 2);
    assert_eq!(report.verified_count, 1);
    assert_eq!(report.mismatch_count, 1);
    assert_eq!(report.error_count, 0);
    assert_eq!(report.completion, Completion::Completed);

    assert_eq!(report.findings.len(), 1);
    let f = &report.findings[0];
    assert_eq!(f.key, id(2));
    assert_eq!(
        f.outcome,
        Outcome::Mismatch {
            expected: addr_hex("0x00000000000000000000000000000000000000bb"),
            actual: addr_hex("0x00000000000000000000000000000000000000cc"),
        }
    );
    assert_eq!(
        f.to_string(),
        "mismatch key=2 expected=0x00000000000000000000000000000000000000bb \
         actual=0x00000000000000000000000000000000000000cc"
    );

    assert_eq!(snapshot, before);
}

#[tokio::test]
async fn mixed_case_addresses_verify() {
    let snapshot = OwnershipSnapshot::from_csv_str(
        "address,tokenId\n0xABCDEF0000000000000000000000000000ABCDEF,7\n",
    )
    .unwrap();
    let live = FakeLedger::new().with_owner(
        id(7),
        addr_hex("0xabcdef0000000000000000000000000000abcdef"),
    );

    let report = verify_ownership(&snapshot, &live, &opts()).await;
    assert_eq!(report.verified_count, 1);
    assert!(report.is_clean());
}
