//! Read-only commands: registry status probe and offline snapshot diff.

use std::path::Path;

use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};

use nftsnap_reconcile::{diff_snapshots, SnapshotDiff};
use nftsnap_source::ContractProbe;
use nftsnap_store::{
    format_address, BalanceSnapshot, OwnershipSnapshot, Snapshot, SnapshotRecord, U256,
};

use super::{RunClock, RunContext};

/// Probe every registry contract with bounded fan-out. Each contract's own
/// reads stay sequential; only independent contracts overlap.
pub async fn status(ctx: &RunContext) -> Result<()> {
    let client = ctx.chain().await?;
    let policy = ctx.retry_policy();
    let concurrency = ctx.settings.settings.status.concurrency.max(1);
    let clock = RunClock::start();

    let mut rows: Vec<(String, ContractProbe)> = stream::iter(ctx.registry.iter())
        .map(|p| {
            let client = &client;
            let policy = &policy;
            let cancel = &ctx.cancel;
            async move {
                let probe = client
                    .contract(p.address)
                    .probe(U256::from(p.first_token_id()), policy, Some(cancel))
                    .await;
                (p.name.clone(), probe)
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;
    rows.sort_by(|a, b| a.0.cmp(&b.0));

    let mut supply_sum = U256::ZERO;
    for (name, probe) in &rows {
        if let Some(s) = probe.total_supply.value() {
            supply_sum = supply_sum.saturating_add(*s);
        }
        println!(
            "project={name} address={} name={} paused={} total_supply={} first_token_uri={}",
            format_address(&probe.address),
            probe.name,
            probe.paused,
            probe.total_supply,
            probe.first_token_uri
        );
    }
    println!("projects={}", rows.len());
    println!("total_supply_sum={supply_sum}");
    clock.print();
    Ok(())
}

pub fn diff(old: &Path, new: &Path, balances: bool) -> Result<()> {
    if balances {
        let a: BalanceSnapshot = load(old)?;
        let b: BalanceSnapshot = load(new)?;
        print_diff(&diff_snapshots(&a, &b));
    } else {
        let a: OwnershipSnapshot = load(old)?;
        let b: OwnershipSnapshot = load(new)?;
        print_diff(&diff_snapshots(&a, &b));
    }
    Ok(())
}

fn load<R: SnapshotRecord>(path: &Path) -> Result<Snapshot<R>> {
    Snapshot::load(path).with_context(|| format!("load snapshot failed: {}", path.display()))
}

fn print_diff<R: SnapshotRecord>(d: &SnapshotDiff<R>) {
    for r in &d.removed {
        println!("removed {}", r.to_fields().join(","));
    }
    for r in &d.added {
        println!("added {}", r.to_fields().join(","));
    }
    for (before, after) in &d.changed {
        println!(
            "changed {} -> {}",
            before.to_fields().join(","),
            after.to_fields().join(",")
        );
    }
    println!("added_count={}", d.added.len());
    println!("removed_count={}", d.removed.len());
    println!("changed_count={}", d.changed.len());
    println!("identical={}", d.is_empty());
}
