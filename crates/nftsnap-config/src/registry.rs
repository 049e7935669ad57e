//! Project registry: a JSON object mapping project name to contract metadata.
//!
//! ```json
//! { "yoki": { "address": "0x..", "startsWithToken0": true, "baseURI": "ipfs://.." } }
//! ```
//!
//! Only `address` and `startsWithToken0` are interpreted. Everything else is
//! kept verbatim in [`ProjectConfig::extras`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use nftsnap_store::{parse_address, Address};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
struct RawProject {
    address: Option<String>,
    #[serde(rename = "startsWithToken0", default)]
    starts_with_token0: bool,
    #[serde(flatten)]
    extras: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConfig {
    pub name: String,
    pub address: Address,
    pub starts_with_token0: bool,
    pub extras: BTreeMap<String, Value>,
}

impl ProjectConfig {
    /// First token id of the collection: 0 or 1.
    pub fn first_token_id(&self) -> u64 {
        if self.starts_with_token0 {
            0
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectRegistry {
    source: String,
    projects: BTreeMap<String, ProjectConfig>,
}

impl ProjectRegistry {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: display.clone(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&raw, &display)
    }

    /// `source` names the origin in error messages.
    pub fn from_json_str(raw: &str, source: &str) -> Result<Self, ConfigError> {
        let parsed: BTreeMap<String, RawProject> =
            serde_json::from_str(raw).map_err(|e| ConfigError::Registry {
                path: source.to_string(),
                message: e.to_string(),
            })?;

        let mut projects = BTreeMap::new();
        for (name, p) in parsed {
            let raw_addr = p.address.unwrap_or_default();
            let address = parse_address(&raw_addr).ok_or_else(|| ConfigError::BadAddress {
                project: name.clone(),
                raw: raw_addr.clone(),
            })?;
            projects.insert(
                name.clone(),
                ProjectConfig {
                    name,
                    address,
                    starts_with_token0: p.starts_with_token0,
                    extras: p.extras,
                },
            );
        }

        Ok(Self {
            source: source.to_string(),
            projects,
        })
    }

    pub fn get(&self, project: &str) -> Result<&ProjectConfig, ConfigError> {
        self.projects
            .get(project)
            .ok_or_else(|| ConfigError::UnknownProject {
                project: project.to_string(),
                available: self.names(),
            })
    }

    pub fn names(&self) -> Vec<String> {
        self.projects.keys().cloned().collect()
    }

    /// Projects in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = &ProjectConfig> {
        self.projects.values()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}
