//! Run target resolved from the environment.
//!
//! Built once at startup and passed down. Nothing else in the workspace reads
//! these variables.

use std::path::PathBuf;

use crate::chain::{ChainName, ChainSpec};
use crate::error::ConfigError;
use crate::registry::{ProjectConfig, ProjectRegistry};

pub const ENV_PROJECT: &str = "CURRENT_PROJECT";
pub const ENV_CHAIN: &str = "CHAIN_NAME";
pub const ENV_PROJECTS_FILE: &str = "PROJECTS_FILE";
pub const ENV_RPC_URL: &str = "RPC_URL";
pub const ENV_EXPLORER_URL: &str = "EXPLORER_API_URL";
pub const ENV_SNAPSHOT_DIR: &str = "NFTSNAP_SNAPSHOT_DIR";

const DEFAULT_SNAPSHOT_DIR: &str = "snapshots";

#[derive(Debug, Clone, PartialEq)]
pub struct RunTarget {
    /// `None` when the command runs over the whole registry.
    pub project: Option<String>,
    pub chain: ChainSpec,
    pub projects_file: PathBuf,
    pub snapshot_dir: PathBuf,
}

impl RunTarget {
    /// Resolve from the process environment. `require_project` is false for
    /// registry-wide commands (`--all`, `status`).
    pub fn from_env(require_project: bool) -> Result<Self, ConfigError> {
        Self::from_lookup(require_project, |k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(require_project: bool, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let project = get(ENV_PROJECT);
        if require_project && project.is_none() {
            return Err(ConfigError::MissingEnv { var: ENV_PROJECT });
        }

        let chain_name: ChainName = get(ENV_CHAIN)
            .ok_or(ConfigError::MissingEnv { var: ENV_CHAIN })?
            .parse()?;
        let chain = chain_name
            .spec()
            .with_overrides(get(ENV_RPC_URL), get(ENV_EXPLORER_URL));

        let projects_file = get(ENV_PROJECTS_FILE)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("data/{chain_name}Contracts.json")));
        let snapshot_dir = PathBuf::from(
            get(ENV_SNAPSHOT_DIR).unwrap_or_else(|| DEFAULT_SNAPSHOT_DIR.to_string()),
        );

        Ok(Self {
            project,
            chain,
            projects_file,
            snapshot_dir,
        })
    }

    pub fn load_registry(&self) -> Result<ProjectRegistry, ConfigError> {
        ProjectRegistry::load(&self.projects_file)
    }

    /// The single project named by `CURRENT_PROJECT`.
    pub fn current_project<'r>(
        &self,
        registry: &'r ProjectRegistry,
    ) -> Result<&'r ProjectConfig, ConfigError> {
        let name = self
            .project
            .as_deref()
            .ok_or(ConfigError::MissingEnv { var: ENV_PROJECT })?;
        registry.get(name)
    }

    /// `<snapshot_dir>/<project>_<kind>.csv`
    pub fn snapshot_path(&self, project: &str, kind: &str) -> PathBuf {
        self.snapshot_dir.join(format!("{project}_{kind}.csv"))
    }
}
