use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use nftsnap_source::{
    retry_fixed_or_cancel, BalanceLookup, CallResult, CancelToken, OwnerLookup, RetryPolicy,
    SourceError, UriLookup,
};
use nftsnap_store::{
    metadata_id_from_uri, Address, BalanceKey, BalanceSnapshot, MetadataSnapshot,
    OwnershipSnapshot, U256,
};

use crate::sample::SamplePlan;
use crate::types::{Completion, Outcome, Rendered, VerifyReport};

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub plan: SamplePlan,
    /// Per-record retry budget; transport failures only.
    pub retry: RetryPolicy,
    /// Sleep between consecutive point reads.
    pub read_delay: Duration,
    /// Log a progress line every this many records (0 = never).
    pub progress_every: usize,
    pub cancel: Option<CancelToken>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            plan: SamplePlan::Full,
            retry: RetryPolicy::default(),
            read_delay: Duration::from_millis(50),
            progress_every: 500,
            cancel: None,
        }
    }
}

/// Check `reference` entries against `read`, one at a time, in the given
/// order after sampling.
///
/// A revert (`CallResult::Failed`) is definitive and not retried. A transport
/// failure is retried per `opts.retry`; once exhausted the record is a
/// `ReadError` and the pass moves on.
pub async fn verify_records<K, V, F, Fut>(
    label: &str,
    reference: Vec<(K, V)>,
    opts: &VerifyOptions,
    mut read: F,
) -> VerifyReport<K, V>
where
    K: Clone + fmt::Display,
    V: PartialEq + Rendered,
    F: FnMut(K) -> Fut,
    Fut: Future<Output = Result<CallResult<V>, SourceError>>,
{
    let reference_size = reference.len();
    let picked = opts.plan.select(reference_size);
    let selected = picked.len();
    let mut report = VerifyReport::new(label, reference_size, selected);

    info!(
        label,
        reference_size,
        selected,
        "verification started"
    );

    // `picked` is ascending; walk the reference once.
    let mut picked_iter = picked.into_iter().peekable();
    let chosen = reference.into_iter().enumerate().filter_map(|(i, kv)| {
        if picked_iter.peek() == Some(&i) {
            picked_iter.next();
            Some(kv)
        } else {
            None
        }
    });

    for (n, (key, expected)) in chosen.enumerate() {
        if opts.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            let unchecked = selected - n;
            warn!(label, checked = n, unchecked, "verification cancelled");
            report.completion = Completion::Cancelled { unchecked };
            break;
        }
        if n > 0 && !opts.read_delay.is_zero() {
            tokio::time::sleep(opts.read_delay).await;
        }

        let what = format!("{label} {key}");
        let live =
            retry_fixed_or_cancel(&opts.retry, &what, opts.cancel.as_ref(), |_| read(key.clone()))
                .await;

        let outcome = match live {
            Err(e) if e.is_cancelled() => {
                let unchecked = selected - n;
                warn!(label, checked = n, unchecked, "verification cancelled mid-record");
                report.completion = Completion::Cancelled { unchecked };
                break;
            }
            Ok(CallResult::Value(actual)) if actual == expected => Outcome::Verified,
            Ok(CallResult::Value(actual)) => {
                warn!(label, key = %key, expected = %expected.rendered(), actual = %actual.rendered(), "mismatch");
                Outcome::Mismatch { expected, actual }
            }
            Ok(CallResult::Failed { reason }) => {
                warn!(label, key = %key, reason = %reason, "live read reverted");
                Outcome::ReadError {
                    reason: format!("reverted: {reason}"),
                }
            }
            Err(e) => {
                warn!(label, key = %key, error = %e, "live read failed");
                Outcome::ReadError {
                    reason: e.to_string(),
                }
            }
        };
        report.record(key, outcome);

        if opts.progress_every > 0 && report.total_checked % opts.progress_every == 0 {
            info!(
                label,
                checked = report.total_checked,
                selected,
                verified = report.verified_count,
                mismatched = report.mismatch_count,
                errored = report.error_count,
                "verification progress"
            );
        }
    }

    info!(
        label,
        checked = report.total_checked,
        verified = report.verified_count,
        mismatched = report.mismatch_count,
        errored = report.error_count,
        completed = report.is_complete(),
        "verification finished"
    );
    report
}

/// Compare each token's stored holder with the live owner.
pub async fn verify_ownership<L>(
    snapshot: &OwnershipSnapshot,
    live: &L,
    opts: &VerifyOptions,
) -> VerifyReport<U256, Address>
where
    L: OwnerLookup + ?Sized,
{
    let reference: Vec<(U256, Address)> =
        snapshot.records().map(|r| (r.token_id, r.holder)).collect();
    verify_records("ownerOf", reference, opts, |token_id| live.owner_of(token_id)).await
}

/// Compare each stored `(token, holder)` amount with the live balance.
pub async fn verify_balances<L>(
    snapshot: &BalanceSnapshot,
    live: &L,
    opts: &VerifyOptions,
) -> VerifyReport<BalanceKey, U256>
where
    L: BalanceLookup + ?Sized,
{
    let reference: Vec<(BalanceKey, U256)> = snapshot
        .records()
        .map(|r| {
            (
                BalanceKey {
                    token_id: r.token_id,
                    holder: r.holder,
                },
                r.amount,
            )
        })
        .collect();
    verify_records("balanceOf", reference, opts, |k: BalanceKey| {
        live.balance_of(k.holder, k.token_id)
    })
    .await
}

/// Compare each token's stored metadata number with the one its live
/// `tokenURI` points at.
pub async fn verify_metadata<L>(
    snapshot: &MetadataSnapshot,
    live: &L,
    opts: &VerifyOptions,
) -> VerifyReport<U256, String>
where
    L: UriLookup + ?Sized,
{
    let reference: Vec<(U256, String)> = snapshot
        .records()
        .map(|r| (r.token_id, r.metadata_id.clone()))
        .collect();
    verify_records("tokenURI", reference, opts, |token_id| async move {
        live.token_uri(token_id)
            .await
            .map(|uri| uri.map(|u| metadata_id_from_uri(&u).to_string()))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use nftsnap_store::parse_address;

    fn quick(plan: SamplePlan) -> VerifyOptions {
        VerifyOptions {
            plan,
            retry: RetryPolicy::immediate(2),
            read_delay: Duration::ZERO,
            progress_every: 0,
            cancel: None,
        }
    }

    #[tokio::test]
    async fn plain_values_classify() {
        let reference = vec![(1u32, U256::from(5u8)), (2, U256::from(6u8))];
        let report = verify_records("n", reference, &quick(SamplePlan::Full), |k| async move {
            Ok(CallResult::Value(U256::from(if k == 1 { 5u8 } else { 9u8 })))
        })
        .await;
        assert_eq!(report.verified_count, 1);
        assert_eq!(report.mismatch_count, 1);
        assert_eq!(
            report.findings[0].outcome,
            Outcome::Mismatch {
                expected: U256::from(6u8),
                actual: U256::from(9u8)
            }
        );
    }

    #[tokio::test]
    async fn revert_is_not_retried() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let reference = vec![(1u32, U256::from(1u8))];
        let report = verify_records("n", reference, &quick(SamplePlan::Full), |_| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Ok(CallResult::<U256>::failed("nonexistent")) }
        })
        .await;
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(report.error_count, 1);
        assert!(matches!(
            &report.findings[0].outcome,
            Outcome::ReadError { reason } if reason == "reverted: nonexistent"
        ));
    }

    #[tokio::test]
    async fn sampled_pass_checks_only_selection_in_key_order() {
        let holder = parse_address("0x00000000000000000000000000000000000000aa").unwrap();
        let reference: Vec<(u32, Address)> = (0..50).map(|i| (i, holder)).collect();
        let seen = std::sync::Mutex::new(Vec::new());
        let plan = SamplePlan::fraction(0.2, 11).unwrap();
        let report = verify_records("owners", reference, &quick(plan), |k| {
            seen.lock().unwrap().push(k);
            async move { Ok(CallResult::Value(holder)) }
        })
        .await;

        let seen = seen.into_inner().unwrap();
        assert_eq!(report.selected, 10);
        assert_eq!(report.total_checked, 10);
        assert_eq!(report.reference_size, 50);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        let expected: Vec<u32> = plan.select(50).into_iter().map(|i| i as u32).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn cancel_during_retries_marks_pass_partial() {
        let cancel = CancelToken::new();
        let opts = VerifyOptions {
            retry: RetryPolicy::immediate(3),
            cancel: Some(cancel.clone()),
            ..quick(SamplePlan::Full)
        };
        let reference = vec![(1u32, U256::from(1u8)), (2, U256::from(2u8))];
        let report = verify_records("n", reference, &opts, |_| {
            cancel.cancel();
            async { Err::<CallResult<U256>, _>(SourceError::Transport("reset".to_string())) }
        })
        .await;
        assert_eq!(report.completion, Completion::Cancelled { unchecked: 2 });
        assert_eq!(report.total_checked, 0);
        assert_eq!(report.error_count, 0);
    }
}
