use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Chains with a built-in RPC and explorer endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChainName {
    Soneium,
    Sepolia,
    AstarZkEvm,
}

impl ChainName {
    pub const ALL: [ChainName; 3] = [ChainName::Soneium, ChainName::Sepolia, ChainName::AstarZkEvm];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainName::Soneium => "Soneium",
            ChainName::Sepolia => "Sepolia",
            ChainName::AstarZkEvm => "AstarZkEvm",
        }
    }

    /// Built-in endpoints. `RPC_URL` / `EXPLORER_API_URL` override them at
    /// resolution time.
    pub fn spec(&self) -> ChainSpec {
        let (chain_id, rpc_url, explorer_api_url) = match self {
            ChainName::Soneium => (
                1868,
                "https://rpc.soneium.org/",
                "https://soneium.blockscout.com/api/v2",
            ),
            ChainName::Sepolia => (
                11_155_111,
                "https://ethereum-sepolia-rpc.publicnode.com",
                "https://eth-sepolia.blockscout.com/api/v2",
            ),
            ChainName::AstarZkEvm => (
                3776,
                "https://rpc.startale.com/astar-zkevm",
                "https://astar-zkevm.explorer.startale.com/api/v2",
            ),
        };
        ChainSpec {
            name: *self,
            chain_id,
            rpc_url: rpc_url.to_string(),
            explorer_api_url: explorer_api_url.to_string(),
        }
    }
}

impl fmt::Display for ChainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        ChainName::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(t))
            .ok_or_else(|| ConfigError::UnknownChain {
                name: t.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSpec {
    pub name: ChainName,
    pub chain_id: u64,
    pub rpc_url: String,
    pub explorer_api_url: String,
}

impl ChainSpec {
    pub fn with_overrides(mut self, rpc_url: Option<String>, explorer_api_url: Option<String>) -> Self {
        if let Some(u) = rpc_url.filter(|u| !u.trim().is_empty()) {
            self.rpc_url = u;
        }
        if let Some(u) = explorer_api_url.filter(|u| !u.trim().is_empty()) {
            self.explorer_api_url = u;
        }
        self
    }

    /// Compare the node's `eth_chainId` with the configured id.
    pub fn check_chain_id(&self, remote: u64) -> Result<(), ConfigError> {
        if remote == self.chain_id {
            Ok(())
        } else {
            Err(ConfigError::ChainIdMismatch {
                expected: self.chain_id,
                actual: remote,
            })
        }
    }
}
