//! nftsnap-config
//!
//! Everything a run needs to know before touching the network:
//! - which chain and which endpoints ([`ChainSpec`]),
//! - which project contracts exist ([`ProjectRegistry`]),
//! - which project this run targets ([`RunTarget`], from the environment),
//! - how patient the engine is ([`EngineSettings`], layered YAML + hash).
//!
//! All failures are [`ConfigError`] and fatal for the run.

mod chain;
mod error;
mod registry;
mod settings;
mod target;

pub use chain::{ChainName, ChainSpec};
pub use error::ConfigError;
pub use registry::{ProjectConfig, ProjectRegistry};
pub use settings::{
    load_settings, load_settings_from_strings, report_unused_keys, EngineSettings,
    LoadedSettings, OnchainSettings, PacingSettings, RetrySettings, StatusSettings,
    UnusedKeyPolicy, VerifySettings, CONSUMED_POINTERS,
};
pub use target::{
    RunTarget, ENV_CHAIN, ENV_EXPLORER_URL, ENV_PROJECT, ENV_PROJECTS_FILE, ENV_RPC_URL,
    ENV_SNAPSHOT_DIR,
};
