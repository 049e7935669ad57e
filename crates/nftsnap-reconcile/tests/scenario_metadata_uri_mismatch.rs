//! Scenario: stored metadata numbers against live `tokenURI` answers.
//!
//! # Invariants under test
//!
//! 1. `ipfs://cid/5.json` verifies against a stored `5`; the `.json` suffix and
//!    the path prefix do not take part in the comparison.
//! 2. A token whose URI now points at another number is one mismatch carrying
//!    both numbers.
//! 3. A token whose `tokenURI` reverts is a read error, not a mismatch.

use std::time::Duration;

use nftsnap_reconcile::{verify_metadata, Outcome, SamplePlan, VerifyOptions};
use nftsnap_source::RetryPolicy;
use nftsnap_store::MetadataSnapshot;
use nftsnap_testkit::{id, FakeLedger};

const SNAPSHOT_CSV: &str = "address,tokenId,tokenNumber\n\
0x00000000000000000000000000000000000000aa,1,5\n\
0x00000000000000000000000000000000000000bb,2,7\n\
0x00000000000000000000000000000000000000bb,3,9\n";

fn opts() -> VerifyOptions {
    VerifyOptions {
        plan: SamplePlan::Full,
        retry: RetryPolicy::immediate(3),
        read_delay: Duration::ZERO,
        progress_every: 0,
        cancel: None,
    }
}

#[tokio::test]
async fn scenario_moved_metadata_is_one_mismatch() {
    let snapshot = MetadataSnapshot::from_csv_str(SNAPSHOT_CSV).unwrap();
    let live = FakeLedger::new()
        .with_uri(id(1), "ipfs://bafycid/5.json")
        .with_uri(id(2), "ipfs://bafycid/8.json");

    let report = verify_metadata(&snapshot, &live, &opts()).await;

    assert_eq!(report.total_checked, 3);
    assert_eq!(report.verified_count, 1);
    assert_eq!(report.mismatch_count, 1);
    assert_eq!(report.error_count, 1);

    let mismatch: Vec<_> = report.mismatches().collect();
    assert_eq!(mismatch.len(), 1);
    assert_eq!(mismatch[0].key, id(2));
    assert_eq!(
        mismatch[0].outcome,
        Outcome::Mismatch {
            expected: "7".to_string(),
            actual: "8".to_string(),
        }
    );
    assert_eq!(mismatch[0].to_string(), "mismatch key=2 expected=7 actual=8");

    let errors: Vec<_> = report.errors().collect();
    assert_eq!(errors[0].key, id(3));
    assert!(matches!(
        &errors[0].outcome,
        Outcome::ReadError { reason } if reason.contains("URIQueryForNonexistentToken")
    ));
}
