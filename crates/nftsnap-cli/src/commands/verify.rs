//! Verification commands: a persisted snapshot against live contract reads.
//!
//! Mismatches and read errors are findings, not failures: the command exits
//! 0 whenever the pass ran, including a pass cut short by Ctrl-C.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use nftsnap_reconcile::{
    verify_balances, verify_metadata, verify_ownership, Rendered, VerifyReport,
};
use nftsnap_store::{BalanceSnapshot, MetadataSnapshot, OwnershipSnapshot};

use super::build::METADATA_KIND;
use super::{RunClock, RunContext};
use crate::VerifyArgs;

pub async fn owners(ctx: &RunContext, args: &VerifyArgs) -> Result<()> {
    let project = ctx.current_project()?;
    let path = snapshot_path(ctx, &project.name, "instances", args.snapshot.as_ref());
    let snapshot = OwnershipSnapshot::load(&path)
        .with_context(|| format!("load ownership snapshot failed: {}", path.display()))?;

    let opts = ctx.verify_options(args.sample, args.seed)?;
    let client = ctx.chain().await?;
    let reader = client.contract(project.address);

    let clock = RunClock::start();
    let report = verify_ownership(&snapshot, &reader, &opts).await;
    print_report(&project.name, &path, &report);
    clock.print();
    Ok(())
}

pub async fn balances(ctx: &RunContext, args: &VerifyArgs) -> Result<()> {
    let project = ctx.current_project()?;
    let path = snapshot_path(ctx, &project.name, "balances", args.snapshot.as_ref());
    let snapshot = BalanceSnapshot::load(&path)
        .with_context(|| format!("load balance snapshot failed: {}", path.display()))?;

    let opts = ctx.verify_options(args.sample, args.seed)?;
    let client = ctx.chain().await?;
    let reader = client.contract(project.address);

    let clock = RunClock::start();
    let report = verify_balances(&snapshot, &reader, &opts).await;
    print_report(&project.name, &path, &report);
    clock.print();
    Ok(())
}

/// Stored metadata numbers against the number each live `tokenURI` ends in.
pub async fn uris(ctx: &RunContext, args: &VerifyArgs) -> Result<()> {
    let project = ctx.current_project()?;
    let path = snapshot_path(ctx, &project.name, METADATA_KIND, args.snapshot.as_ref());
    let snapshot = MetadataSnapshot::load(&path)
        .with_context(|| format!("load metadata snapshot failed: {}", path.display()))?;

    let opts = ctx.verify_options(args.sample, args.seed)?;
    let client = ctx.chain().await?;
    let reader = client.contract(project.address);

    let clock = RunClock::start();
    let report = verify_metadata(&snapshot, &reader, &opts).await;
    print_report(&project.name, &path, &report);
    clock.print();
    Ok(())
}

fn snapshot_path(ctx: &RunContext, project: &str, kind: &str, explicit: Option<&PathBuf>) -> PathBuf {
    explicit
        .cloned()
        .unwrap_or_else(|| ctx.target.snapshot_path(project, kind))
}

fn print_report<K, V>(project: &str, path: &Path, report: &VerifyReport<K, V>)
where
    K: fmt::Display,
    V: Rendered,
{
    println!("project={project}");
    println!("snapshot={}", path.display());
    for line in report.summary_lines() {
        println!("{line}");
    }
    for f in report.mismatches() {
        println!("{f}");
    }
    for f in report.errors() {
        println!("{f}");
    }
}
