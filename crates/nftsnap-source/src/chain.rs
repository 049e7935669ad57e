//! Chain JSON-RPC client and typed contract reads.
//!
//! Point reads return `Result<CallResult<T>, SourceError>`:
//! - `Ok(Value(v))`: the contract answered.
//! - `Ok(Failed { reason })`: the contract reverted (nonexistent token, etc.)
//!   or answered with undecodable data. Definitive; retrying will not help.
//! - `Err(_)`: transport or node trouble. Transient; callers retry.

use std::fmt;

use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::transports::{RpcError, TransportError, TransportErrorKind};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use nftsnap_store::{format_address, OwnershipRecord};

use crate::error::SourceError;
use crate::paginate::{IndexRead, IndexedSource};
use crate::cancel::CancelToken;
use crate::retry::{retry_fixed_or_cancel, RetryPolicy};

sol! {
    function ownerOf(uint256 tokenId) external view returns (address);
    function balanceOf(address account, uint256 id) external view returns (uint256);
    function tokenURI(uint256 tokenId) external view returns (string);
    function totalSupply() external view returns (uint256);
    function name() external view returns (string);
    function paused() external view returns (bool);
}

// ---------------------------------------------------------------------------
// Call results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResult<T> {
    Value(T),
    Failed { reason: String },
}

pub type OwnerResult = CallResult<Address>;
pub type BalanceResult = CallResult<U256>;
pub type UriResult = CallResult<String>;
pub type SupplyResult = CallResult<U256>;

impl<T> CallResult<T> {
    pub fn failed(reason: impl Into<String>) -> Self {
        CallResult::Failed {
            reason: reason.into(),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            CallResult::Value(v) => Some(v),
            CallResult::Failed { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            CallResult::Value(v) => Some(v),
            CallResult::Failed { .. } => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallResult<U> {
        match self {
            CallResult::Value(v) => CallResult::Value(f(v)),
            CallResult::Failed { reason } => CallResult::Failed { reason },
        }
    }
}

impl<T: fmt::Display> fmt::Display for CallResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallResult::Value(v) => write!(f, "{v}"),
            CallResult::Failed { reason } => write!(f, "error: {reason}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Lookup seams used by the verifier
// ---------------------------------------------------------------------------

#[async_trait]
pub trait OwnerLookup: Send + Sync {
    async fn owner_of(&self, token_id: U256) -> Result<OwnerResult, SourceError>;
}

#[async_trait]
pub trait BalanceLookup: Send + Sync {
    async fn balance_of(&self, holder: Address, token_id: U256)
        -> Result<BalanceResult, SourceError>;
}

#[async_trait]
pub trait UriLookup: Send + Sync {
    async fn token_uri(&self, token_id: U256) -> Result<UriResult, SourceError>;
}

// ---------------------------------------------------------------------------
// JSON-RPC
// ---------------------------------------------------------------------------

/// Node error codes/messages that mean "the contract reverted" rather than
/// "the node could not answer".
fn is_revert(code: i64, message: &str) -> bool {
    code == 3 || message.to_ascii_lowercase().contains("revert")
}

fn rpc_error(method: &str, e: TransportError) -> SourceError {
    match e {
        RpcError::ErrorResp(p) => SourceError::Rpc {
            code: p.code,
            message: p.message.to_string(),
        },
        RpcError::Transport(TransportErrorKind::HttpError(h)) => SourceError::HttpStatus {
            status: h.status,
            body: h.body,
        },
        RpcError::DeserError { err, .. } => SourceError::Decode(format!("{method}: {err}")),
        RpcError::NullResp => SourceError::Decode(format!("{method}: null response")),
        other => SourceError::Transport(format!("{method}: {other}")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EthCallOutcome {
    Returned(Vec<u8>),
    Reverted(String),
}

/// One RPC endpoint for one chain.
///
/// There is no client-side timeout here; the per-call limit comes from
/// [`RetryPolicy::call_timeout`] in [`crate::retry::retry_fixed`].
#[derive(Debug)]
pub struct ChainClient {
    provider: RootProvider,
    rpc_url: String,
    chain_id: u64,
}

impl ChainClient {
    pub fn new(rpc_url: impl Into<String>, chain_id: u64) -> Result<Self, SourceError> {
        let rpc_url = rpc_url.into();
        let url: Url = rpc_url
            .parse()
            .map_err(|e| SourceError::Transport(format!("invalid rpc url '{rpc_url}': {e}")))?;
        Ok(Self {
            provider: RootProvider::new_http(url),
            rpc_url,
            chain_id,
        })
    }

    /// Chain id this client was configured for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// `eth_chainId` as reported by the node.
    pub async fn remote_chain_id(&self) -> Result<u64, SourceError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| rpc_error("eth_chainId", e))
    }

    pub async fn eth_call(&self, to: Address, data: &[u8]) -> Result<EthCallOutcome, SourceError> {
        let tx = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(Bytes::copy_from_slice(data)));
        match self.provider.call(tx).await {
            Ok(bytes) => Ok(EthCallOutcome::Returned(bytes.to_vec())),
            Err(RpcError::ErrorResp(p)) if is_revert(p.code, &p.message) => {
                Ok(EthCallOutcome::Reverted(p.message.to_string()))
            }
            Err(e) => Err(rpc_error("eth_call", e)),
        }
    }

    pub fn contract(&self, address: Address) -> ContractReader<'_> {
        ContractReader {
            client: self,
            address,
        }
    }
}

// ---------------------------------------------------------------------------
// Typed reads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct ContractReader<'a> {
    client: &'a ChainClient,
    address: Address,
}

impl ContractReader<'_> {
    pub fn address(&self) -> Address {
        self.address
    }

    async fn call<C: SolCall>(&self, call: C) -> Result<CallResult<C::Return>, SourceError> {
        let data = call.abi_encode();
        match self.client.eth_call(self.address, &data).await? {
            EthCallOutcome::Returned(bytes) => Ok(match C::abi_decode_returns(&bytes) {
                Ok(v) => CallResult::Value(v),
                Err(e) => CallResult::failed(format!("undecodable return data: {e}")),
            }),
            EthCallOutcome::Reverted(reason) => {
                debug!(contract = %format_address(&self.address), fn_sig = C::SIGNATURE, reason = %reason, "call reverted");
                Ok(CallResult::failed(reason))
            }
        }
    }

    pub async fn owner_of(&self, token_id: U256) -> Result<OwnerResult, SourceError> {
        self.call(ownerOfCall { tokenId: token_id }).await
    }

    pub async fn balance_of(
        &self,
        holder: Address,
        token_id: U256,
    ) -> Result<BalanceResult, SourceError> {
        self.call(balanceOfCall {
            account: holder,
            id: token_id,
        })
        .await
    }

    pub async fn token_uri(&self, token_id: U256) -> Result<UriResult, SourceError> {
        self.call(tokenURICall { tokenId: token_id }).await
    }

    pub async fn total_supply(&self) -> Result<SupplyResult, SourceError> {
        self.call(totalSupplyCall {}).await
    }

    pub async fn name(&self) -> Result<CallResult<String>, SourceError> {
        self.call(nameCall {}).await
    }

    pub async fn paused(&self) -> Result<CallResult<bool>, SourceError> {
        self.call(pausedCall {}).await
    }

    /// Read the status fields one after another. Transport failures that
    /// survive `retry` are folded into `Failed` so one bad field does not hide
    /// the others. Once `cancel` is set the remaining fields read as cancelled.
    pub async fn probe(
        &self,
        first_token: U256,
        retry: &RetryPolicy,
        cancel: Option<&CancelToken>,
    ) -> ContractProbe {
        let label = format_address(&self.address);
        ContractProbe {
            address: self.address,
            name: settle(retry_fixed_or_cancel(retry, &label, cancel, |_| self.name()).await),
            total_supply: settle(
                retry_fixed_or_cancel(retry, &label, cancel, |_| self.total_supply()).await,
            ),
            paused: settle(retry_fixed_or_cancel(retry, &label, cancel, |_| self.paused()).await),
            first_token_uri: settle(
                retry_fixed_or_cancel(retry, &label, cancel, |_| self.token_uri(first_token))
                    .await,
            ),
        }
    }
}

fn settle<T, E: fmt::Display>(r: Result<CallResult<T>, E>) -> CallResult<T> {
    r.unwrap_or_else(|e| CallResult::failed(e.to_string()))
}

#[async_trait]
impl OwnerLookup for ContractReader<'_> {
    async fn owner_of(&self, token_id: U256) -> Result<OwnerResult, SourceError> {
        ContractReader::owner_of(self, token_id).await
    }
}

#[async_trait]
impl BalanceLookup for ContractReader<'_> {
    async fn balance_of(
        &self,
        holder: Address,
        token_id: U256,
    ) -> Result<BalanceResult, SourceError> {
        ContractReader::balance_of(self, holder, token_id).await
    }
}

#[async_trait]
impl UriLookup for ContractReader<'_> {
    async fn token_uri(&self, token_id: U256) -> Result<UriResult, SourceError> {
        ContractReader::token_uri(self, token_id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractProbe {
    pub address: Address,
    pub name: CallResult<String>,
    pub total_supply: SupplyResult,
    pub paused: CallResult<bool>,
    pub first_token_uri: UriResult,
}

// ---------------------------------------------------------------------------
// ownerOf index walk
// ---------------------------------------------------------------------------

/// Sequential `ownerOf(i)` reads as an [`IndexedSource`]. A revert or a zero
/// owner means the token does not exist.
pub struct OwnerIndexSource<'a> {
    reader: ContractReader<'a>,
    label: String,
}

impl<'a> OwnerIndexSource<'a> {
    pub fn new(reader: ContractReader<'a>) -> Self {
        let label = format!("ownerOf@{}", format_address(&reader.address));
        Self { reader, label }
    }
}

#[async_trait]
impl IndexedSource for OwnerIndexSource<'_> {
    type Item = OwnershipRecord;

    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch_index(&self, index: U256) -> Result<IndexRead<OwnershipRecord>, SourceError> {
        Ok(match self.reader.owner_of(index).await? {
            CallResult::Value(owner) if !owner.is_zero() => {
                IndexRead::Found(OwnershipRecord::new(owner, index))
            }
            CallResult::Value(_) => IndexRead::NotFound("zero owner".to_string()),
            CallResult::Failed { reason } => IndexRead::NotFound(reason),
        })
    }
}
