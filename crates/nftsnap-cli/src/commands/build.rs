//! Snapshot build commands: drain a remote source, fill a fresh snapshot,
//! replace the file on disk.
//!
//! A drain that aborts never writes. The previous file stays as it was.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use nftsnap_config::ProjectConfig;
use nftsnap_source::{
    drain_cursor, drain_indexed, retry_fixed_or_cancel, CallResult, DrainOptions, ExplorerClient,
    IndexBound, OwnerIndexSource, TokenHolder,
};
use nftsnap_store::{
    metadata_id_from_uri, replay_sorted, Address, BalanceRecord, BalanceSnapshot, MetadataRecord,
    MetadataSnapshot, OwnershipRecord, OwnershipSnapshot, U256,
};

use super::{RunClock, RunContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Instances,
    /// `per_instance` skips the token-wide holder listing.
    Holders { per_instance: bool },
    Transfers,
}

impl Kind {
    fn as_str(&self) -> &'static str {
        match self {
            Kind::Instances => "instances",
            Kind::Holders { .. } => "balances",
            Kind::Transfers => "transfers",
        }
    }
}

/// Ownership snapshot annotated with metadata numbers.
pub const METADATA_KIND: &str = "instances_with_uri";

/// Run one explorer build for the current project, or for every registry
/// project in name order with a pause in between. A failed project is
/// reported and the run continues; the exit status reflects any failure.
pub async fn per_project(ctx: &RunContext, all: bool, kind: Kind) -> Result<()> {
    let projects = ctx.projects(all)?;
    let explorer = ctx.explorer()?;
    let clock = RunClock::start();
    let mut failed: Vec<String> = Vec::new();

    for (i, project) in projects.iter().enumerate() {
        if ctx.cancel.is_cancelled() {
            warn!(remaining = projects.len() - i, "cancelled before next project");
            failed.extend(projects[i..].iter().map(|p| p.name.clone()));
            break;
        }
        if i > 0 && !ctx.project_pause().is_zero() {
            tokio::time::sleep(ctx.project_pause()).await;
        }

        info!(project = %project.name, kind = kind.as_str(), "build start");
        let res = match kind {
            Kind::Instances => instances(ctx, &explorer, project).await,
            Kind::Holders { per_instance } => holders(ctx, &explorer, project, per_instance).await,
            Kind::Transfers => transfers(ctx, &explorer, project).await,
        };
        if let Err(e) = res {
            error!(project = %project.name, error = %format!("{e:#}"), "build aborted");
            println!("project={} aborted=true error={e:#}", project.name);
            failed.push(project.name.clone());
        }
    }

    println!("kind={}", kind.as_str());
    println!("projects={} failed={}", projects.len(), failed.len());
    clock.print();

    if !failed.is_empty() {
        bail!(
            "{} project(s) aborted: {}",
            failed.len(),
            failed.join(", ")
        );
    }
    Ok(())
}

/// Counters are informational; a failure here never stops the build.
async fn log_counters(explorer: &ExplorerClient, token: Address) {
    match explorer.counters(token).await {
        Ok(c) => info!(holders = c.holders, transfers = c.transfers, "token counters"),
        Err(e) => warn!(error = %e, "token counters unavailable"),
    }
}

async fn instances(ctx: &RunContext, explorer: &ExplorerClient, project: &ProjectConfig) -> Result<()> {
    let token = project.address;
    log_counters(explorer, token).await;

    let policy = ctx.retry_policy();
    let info = retry_fixed_or_cancel(&policy, "token info", Some(&ctx.cancel), |_| {
        explorer.token_info(token)
    })
    .await
    .context("token info failed")?;

    let items = drain_cursor(&explorer.instances(token), &ctx.drain_options()).await?;
    let fetched = items.len();
    let ownerless = items.iter().filter(|i| i.owner.is_none()).count();
    let snapshot: OwnershipSnapshot = items
        .into_iter()
        .filter_map(|i| i.owner.map(|owner| OwnershipRecord::new(owner, i.token_id)))
        .collect();
    if ownerless > 0 {
        warn!(ownerless, "instances without an owner were skipped");
    }

    check_supply(info.total_supply, snapshot.len())?;

    let path = ctx.target.snapshot_path(&project.name, Kind::Instances.as_str());
    snapshot.save(&path)?;
    println!(
        "project={} fetched={} records={} path={}",
        project.name,
        fetched,
        snapshot.len(),
        path.display()
    );
    Ok(())
}

/// The explorer's own total supply must match the number of owned tokens
/// drained; otherwise the listing is stale or incomplete.
fn check_supply(total_supply: Option<U256>, records: usize) -> Result<()> {
    match total_supply {
        None => {
            warn!("explorer reports no total_supply; completeness not cross-checked");
            Ok(())
        }
        Some(s) if s == U256::from(records) => Ok(()),
        Some(s) => bail!(
            "completeness check failed: explorer total_supply={s} drained records={records}; snapshot not written"
        ),
    }
}

/// Balance snapshot from the token-wide holder listing. Rows there that do
/// not name a token id cannot be keyed; the build then falls back to one
/// holder drain per instance, as it does when `per_instance` is set.
async fn holders(
    ctx: &RunContext,
    explorer: &ExplorerClient,
    project: &ProjectConfig,
    per_instance: bool,
) -> Result<()> {
    let token = project.address;
    log_counters(explorer, token).await;

    let opts = ctx.drain_options();
    let (mode, rows) = if per_instance {
        ("per_instance", instance_holder_rows(explorer, token, &opts).await?)
    } else {
        let wide = drain_cursor(&explorer.holders(token), &opts).await?;
        if wide.iter().all(|h| h.token_id.is_some()) {
            ("token", wide)
        } else {
            warn!(
                rows = wide.len(),
                "token-wide holders carry no token id; draining per instance"
            );
            ("per_instance", instance_holder_rows(explorer, token, &opts).await?)
        }
    };

    let token_ids: BTreeSet<U256> = rows.iter().filter_map(|h| h.token_id).collect();
    let mut snapshot = BalanceSnapshot::new();
    for h in &rows {
        if let Some(token_id) = h.token_id {
            snapshot.put(BalanceRecord::new(h.holder, token_id, h.amount));
        }
    }

    let path = ctx.target.snapshot_path(&project.name, "balances");
    snapshot.save(&path)?;
    println!(
        "project={} mode={mode} token_ids={} holder_rows={} records={} path={}",
        project.name,
        token_ids.len(),
        rows.len(),
        snapshot.len(),
        path.display()
    );
    Ok(())
}

/// Instance list, then the holders of each instance. Every row carries the
/// instance's id.
async fn instance_holder_rows(
    explorer: &ExplorerClient,
    token: Address,
    opts: &DrainOptions,
) -> Result<Vec<TokenHolder>> {
    let instances = drain_cursor(&explorer.instances(token), opts).await?;
    let mut rows = Vec::new();
    for (n, inst) in instances.iter().enumerate() {
        if n > 0 && !opts.page_delay.is_zero() {
            tokio::time::sleep(opts.page_delay).await;
        }
        rows.extend(drain_cursor(&explorer.instance_holders(token, inst.token_id), opts).await?);
    }
    Ok(rows)
}

async fn transfers(ctx: &RunContext, explorer: &ExplorerClient, project: &ProjectConfig) -> Result<()> {
    let token = project.address;
    log_counters(explorer, token).await;

    let events = drain_cursor(&explorer.transfers(token), &ctx.drain_options()).await?;
    let count = events.len();
    let snapshot = replay_sorted(events);

    let path = ctx.target.snapshot_path(&project.name, Kind::Transfers.as_str());
    snapshot.save(&path)?;
    println!(
        "project={} events={} records={} path={}",
        project.name,
        count,
        snapshot.len(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// On-chain index walk
// ---------------------------------------------------------------------------

/// `ownerOf(i)` walk. With a readable `totalSupply` the walk runs until that
/// many owned tokens were found, so burned ids below the highest live one
/// are skipped rather than cutting the walk short.
pub async fn onchain(ctx: &RunContext, until_not_found: bool) -> Result<()> {
    let project = ctx.current_project()?;
    let client = ctx.chain().await?;
    let reader = client.contract(project.address);
    let start = U256::from(project.first_token_id());
    let clock = RunClock::start();

    let supply = if until_not_found {
        None
    } else {
        match retry_fixed_or_cancel(&ctx.retry_policy(), "totalSupply", Some(&ctx.cancel), |_| {
            reader.total_supply()
        })
        .await
        .context("totalSupply read failed")?
        {
            CallResult::Value(supply) => Some(supply),
            CallResult::Failed { reason } => {
                warn!(reason = %reason, "totalSupply reverted; walking until the first missing token");
                None
            }
        }
    };
    let bound = supply.map_or(IndexBound::UntilNotFound, IndexBound::Count);

    let source = OwnerIndexSource::new(client.contract(project.address));
    let drained = drain_indexed(&source, start, bound, &ctx.index_drain_options()).await?;

    let shortfall = index_shortfall(supply, drained.items.len());
    if let Some(supply) = supply.filter(|_| !shortfall.is_zero()) {
        if ctx.settings.settings.onchain.strict_index_bound {
            bail!(
                "ownerOf walk found {} of totalSupply {supply} tokens (stopped at {}); snapshot not written",
                drained.items.len(),
                drained.next_index
            );
        }
        warn!(
            found = drained.items.len(),
            supply = %supply,
            next_index = %drained.next_index,
            "ownerOf walk found fewer tokens than totalSupply"
        );
    }
    if let Some(first) = drained.missing.first() {
        info!(missing = drained.missing.len(), first = %first, "token ids without an owner skipped");
    }

    let snapshot: OwnershipSnapshot = drained.items.into_iter().collect();
    let path = ctx.target.snapshot_path(&project.name, "onchain");
    snapshot.save(&path)?;

    println!("project={}", project.name);
    println!("records={}", snapshot.len());
    println!("missing={}", drained.missing.len());
    println!("shortfall={shortfall}");
    println!("next_index={}", drained.next_index);
    println!("path={}", path.display());
    clock.print();
    Ok(())
}

fn index_shortfall(supply: Option<U256>, found: usize) -> U256 {
    supply.map_or(U256::ZERO, |s| s.saturating_sub(U256::from(found)))
}

// ---------------------------------------------------------------------------
// tokenURI annotation
// ---------------------------------------------------------------------------

/// Read `tokenURI` for every token of the project's ownership snapshot and
/// write the metadata-annotated snapshot. Any token without a readable
/// metadata number aborts the write.
pub async fn uris(ctx: &RunContext) -> Result<()> {
    let project = ctx.current_project()?;
    let source_path = ctx.target.snapshot_path(&project.name, Kind::Instances.as_str());
    let owners = OwnershipSnapshot::load(&source_path)
        .with_context(|| format!("load ownership snapshot failed: {}", source_path.display()))?;

    let client = ctx.chain().await?;
    let reader = client.contract(project.address);
    let policy = ctx.retry_policy();
    let s = &ctx.settings.settings;
    let delay = Duration::from_millis(s.pacing.point_read_ms);
    let every = s.verify.progress_every as usize;
    let clock = RunClock::start();

    let mut snapshot = MetadataSnapshot::new();
    for (n, rec) in owners.records().enumerate() {
        if ctx.cancel.is_cancelled() {
            bail!("cancelled after {n} of {} tokens; snapshot not written", owners.len());
        }
        if n > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let token_id = rec.token_id;
        let uri = match retry_fixed_or_cancel(&policy, "tokenURI", Some(&ctx.cancel), |_| {
            reader.token_uri(token_id)
        })
        .await
        .with_context(|| format!("tokenURI({token_id}) failed; snapshot not written"))?
        {
            CallResult::Value(uri) => uri,
            CallResult::Failed { reason } => {
                bail!("tokenURI({token_id}) reverted: {reason}; snapshot not written")
            }
        };
        let row = MetadataRecord::new(rec.holder, token_id, metadata_id_from_uri(&uri))
            .with_context(|| {
                format!("tokenURI({token_id}) = '{uri}' has no metadata number; snapshot not written")
            })?;
        snapshot.put(row);

        if every > 0 && (n + 1) % every == 0 {
            info!(read = n + 1, total = owners.len(), "tokenURI progress");
        }
    }

    let path = ctx.target.snapshot_path(&project.name, METADATA_KIND);
    snapshot.save(&path)?;
    println!("project={}", project.name);
    println!("tokens={}", owners.len());
    println!("records={}", snapshot.len());
    println!("path={}", path.display());
    clock.print();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supply_check() {
        assert!(check_supply(None, 3).is_ok());
        assert!(check_supply(Some(U256::from(3u8)), 3).is_ok());
        let err = check_supply(Some(U256::from(4u8)), 3).unwrap_err();
        assert!(err.to_string().contains("total_supply=4 drained records=3"));
    }

    #[test]
    fn shortfall_only_with_a_supply() {
        assert_eq!(index_shortfall(None, 3), U256::ZERO);
        assert_eq!(index_shortfall(Some(U256::from(9u8)), 9), U256::ZERO);
        assert_eq!(index_shortfall(Some(U256::from(9u8)), 7), U256::from(2u8));
    }
}
