//! Command handlers for the `nftsnap` binary.
//!
//! Shared wiring (settings -> engine options, clients, cancellation, run
//! timing) lives here. Command-specific logic lives in the submodules.

pub mod build;
pub mod inspect;
pub mod verify;

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use nftsnap_config::{
    load_settings, LoadedSettings, ProjectConfig, ProjectRegistry, RunTarget, UnusedKeyPolicy,
    ENV_CHAIN, ENV_PROJECT,
};
use nftsnap_reconcile::{SamplePlan, VerifyOptions};
use nftsnap_source::{
    retry_fixed_or_cancel, CancelToken, ChainClient, DrainOptions, ExplorerClient, RetryPolicy,
};

// ---------------------------------------------------------------------------
// Settings / target
// ---------------------------------------------------------------------------

pub fn load_engine_settings(paths: &[String], strict: bool) -> Result<LoadedSettings> {
    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = load_settings(&refs, policy).context("load settings failed")?;
    Ok(loaded)
}

/// Everything a network command needs, resolved once.
pub struct RunContext {
    pub target: RunTarget,
    pub registry: ProjectRegistry,
    pub settings: LoadedSettings,
    pub cancel: CancelToken,
}

impl RunContext {
    /// `--project` / `--chain` already carry their env fallback from clap.
    pub fn resolve(
        require_project: bool,
        project: Option<String>,
        chain: Option<String>,
        settings: LoadedSettings,
    ) -> Result<Self> {
        let target = RunTarget::from_lookup(require_project, |k| match k {
            ENV_PROJECT => project.clone(),
            ENV_CHAIN => chain.clone(),
            other => std::env::var(other).ok(),
        })?;
        let registry = target.load_registry()?;
        info!(
            chain = %target.chain.name,
            chain_id = target.chain.chain_id,
            projects = registry.len(),
            settings_hash = %settings.settings_hash,
            "run target resolved"
        );

        Ok(Self {
            target,
            registry,
            settings,
            cancel: install_ctrl_c(),
        })
    }

    pub fn current_project(&self) -> Result<&ProjectConfig> {
        Ok(self.target.current_project(&self.registry)?)
    }

    /// The current project, or every project when `all` is set.
    pub fn projects(&self, all: bool) -> Result<Vec<&ProjectConfig>> {
        if all {
            Ok(self.registry.iter().collect())
        } else {
            Ok(vec![self.current_project()?])
        }
    }

    // -----------------------------------------------------------------------
    // Engine options
    // -----------------------------------------------------------------------

    pub fn retry_policy(&self) -> RetryPolicy {
        let r = &self.settings.settings.retry;
        RetryPolicy {
            max_attempts: r.max_attempts,
            delay: Duration::from_millis(r.delay_ms),
            call_timeout: Duration::from_millis(r.call_timeout_ms),
        }
    }

    pub fn drain_options(&self) -> DrainOptions {
        let s = &self.settings.settings;
        DrainOptions {
            retry: self.retry_policy(),
            page_delay: Duration::from_millis(s.pacing.page_ms),
            size_hint: None,
            progress_every: s.verify.progress_every,
            cancel: Some(self.cancel.clone()),
        }
    }

    /// Point-read drains pace like verification reads, not like page fetches.
    pub fn index_drain_options(&self) -> DrainOptions {
        DrainOptions {
            page_delay: Duration::from_millis(self.settings.settings.pacing.point_read_ms),
            ..self.drain_options()
        }
    }

    /// Flags win over settings for the sample plan.
    pub fn verify_options(&self, sample: Option<f64>, seed: Option<u64>) -> Result<VerifyOptions> {
        let s = &self.settings.settings;
        let fraction = sample.or(s.verify.sample_fraction);
        let seed = seed.unwrap_or(s.verify.sample_seed);
        let plan = match fraction {
            Some(f) => SamplePlan::fraction(f, seed).context("invalid --sample")?,
            None => SamplePlan::Full,
        };
        Ok(VerifyOptions {
            plan,
            retry: self.retry_policy(),
            read_delay: Duration::from_millis(s.pacing.point_read_ms),
            progress_every: s.verify.progress_every as usize,
            cancel: Some(self.cancel.clone()),
        })
    }

    pub fn project_pause(&self) -> Duration {
        Duration::from_millis(self.settings.settings.pacing.project_ms)
    }

    // -----------------------------------------------------------------------
    // Clients
    // -----------------------------------------------------------------------

    pub fn explorer(&self) -> Result<ExplorerClient> {
        let c = ExplorerClient::new_with_timeout(
            self.target.chain.explorer_api_url.clone(),
            self.retry_policy().call_timeout,
        )
        .context("build explorer client failed")?;
        Ok(c)
    }

    /// Chain client after confirming the endpoint serves the configured chain.
    pub async fn chain(&self) -> Result<ChainClient> {
        let spec = &self.target.chain;
        let client =
            ChainClient::new(spec.rpc_url.clone(), spec.chain_id).context("build rpc client failed")?;

        let remote = retry_fixed_or_cancel(
            &self.retry_policy(),
            "eth_chainId",
            Some(&self.cancel),
            |_| client.remote_chain_id(),
        )
        .await
        .context("chain id check failed")?;
        spec.check_chain_id(remote)?;
        Ok(client)
    }
}

fn install_ctrl_c() -> CancelToken {
    let token = CancelToken::new();
    let t = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current read");
            t.cancel();
        }
    });
    token
}

// ---------------------------------------------------------------------------
// Run timing
// ---------------------------------------------------------------------------

pub struct RunClock {
    started: DateTime<Utc>,
}

impl RunClock {
    pub fn start() -> Self {
        Self {
            started: Utc::now(),
        }
    }

    pub fn print(&self) {
        let finished = Utc::now();
        println!("started_at_utc={}", self.started.to_rfc3339());
        println!("finished_at_utc={}", finished.to_rfc3339());
        println!(
            "duration_ms={}",
            (finished - self.started).num_milliseconds()
        );
    }
}
