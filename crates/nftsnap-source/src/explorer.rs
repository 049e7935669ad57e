//! Blockscout-style explorer REST client (`/api/v2`).
//!
//! Paginated listings return `{ "items": [...], "next_page_params": {...} | null }`.
//! `next_page_params` is sent back verbatim as query parameters to get the
//! following page; its contents are never interpreted here.
//!
//! Numbers arrive as either JSON numbers or decimal strings depending on the
//! endpoint and explorer version; both are accepted.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::warn;

use nftsnap_store::{parse_address, parse_u256, TransferEvent};

use crate::error::SourceError;
use crate::paginate::{Cursor, Page, PageSource};

/// Explorer handle; cheap to clone, holds one connection pool.
#[derive(Debug, Clone)]
pub struct ExplorerClient {
    http: reqwest::Client,
    base_url: String,
}

impl ExplorerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SourceError> {
        Self::new_with_timeout(base_url, Duration::from_secs(15))
    }

    pub fn new_with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let mut builder = reqwest::Client::builder();
        // zero disables the client-side timeout
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| SourceError::Transport(format!("build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, SourceError> {
        let resp = self.http.get(self.url(path)).query(query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| SourceError::Decode(format!("{path}: {e}")))
    }

    async fn get_page<W: DeserializeOwned>(
        &self,
        path: &str,
        cursor: Option<&Cursor>,
    ) -> Result<(Vec<W>, Option<Cursor>), SourceError> {
        let query = cursor.map(cursor_query).unwrap_or_default();
        let env: PageEnvelope<W> = self.get_json(path, &query).await?;
        let next = env
            .next_page_params
            .filter(|m| !m.is_empty())
            .map(Cursor::new);
        Ok((env.items, next))
    }

    // -----------------------------------------------------------------------
    // Point reads
    // -----------------------------------------------------------------------

    pub async fn token_info(&self, token: Address) -> Result<TokenInfo, SourceError> {
        let w: WireTokenInfo = self.get_json(&token_path(token, ""), &[]).await?;
        let total_supply = match w.total_supply.as_ref().and_then(value_text) {
            Some(t) => Some(
                parse_u256(&t)
                    .ok_or_else(|| SourceError::Decode(format!("total_supply '{t}'")))?,
            ),
            None => None,
        };
        Ok(TokenInfo {
            name: w.name,
            symbol: w.symbol,
            token_type: w.token_type,
            total_supply,
        })
    }

    pub async fn counters(&self, token: Address) -> Result<TokenCounters, SourceError> {
        let w: WireCounters = self.get_json(&token_path(token, "/counters"), &[]).await?;
        Ok(TokenCounters {
            holders: value_u64(&w.token_holders_count, "token_holders_count")?,
            transfers: value_u64(&w.transfers_count, "transfers_count")?,
        })
    }

    // -----------------------------------------------------------------------
    // Paginated listings
    // -----------------------------------------------------------------------

    /// Every minted token and its current owner.
    pub fn instances(&self, token: Address) -> InstancePages<'_> {
        InstancePages {
            client: self,
            path: token_path(token, "/instances"),
        }
    }

    /// Holders of a multi-token contract, one entry per (holder, token id).
    pub fn holders(&self, token: Address) -> HolderPages<'_> {
        HolderPages {
            client: self,
            path: token_path(token, "/holders"),
            token_id: None,
        }
    }

    /// Holders of a single token id.
    pub fn instance_holders(&self, token: Address, token_id: U256) -> HolderPages<'_> {
        HolderPages {
            client: self,
            path: token_path(token, &format!("/instances/{token_id}/holders")),
            token_id: Some(token_id),
        }
    }

    /// Transfer log, newest first as served by the explorer.
    pub fn transfers(&self, token: Address) -> TransferPages<'_> {
        TransferPages {
            client: self,
            path: token_path(token, "/transfers"),
        }
    }
}

fn token_path(token: Address, suffix: &str) -> String {
    format!("tokens/{}{suffix}", nftsnap_store::format_address(&token))
}

fn cursor_query(c: &Cursor) -> Vec<(String, String)> {
    c.params()
        .iter()
        .filter_map(|(k, v)| match v {
            Value::Null => None,
            Value::String(s) => Some((k.clone(), s.clone())),
            other => Some((k.clone(), other.to_string())),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Domain items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub token_type: Option<String>,
    pub total_supply: Option<U256>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCounters {
    pub holders: u64,
    pub transfers: u64,
}

/// `owner == None` when the explorer has no current owner (burned token).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInstance {
    pub token_id: U256,
    pub owner: Option<Address>,
}

/// `token_id` is set for multi-token holders, `None` for plain fungible ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHolder {
    pub holder: Address,
    pub token_id: Option<U256>,
    pub amount: U256,
}

// ---------------------------------------------------------------------------
// Page sources
// ---------------------------------------------------------------------------

pub struct InstancePages<'a> {
    client: &'a ExplorerClient,
    path: String,
}

#[async_trait]
impl PageSource for InstancePages<'_> {
    type Item = TokenInstance;

    fn name(&self) -> &str {
        &self.path
    }

    async fn fetch_page(
        &self,
        cursor: Option<&Cursor>,
        _size_hint: Option<usize>,
    ) -> Result<Page<TokenInstance>, SourceError> {
        let (items, next) = self
            .client
            .get_page::<WireInstance>(&self.path, cursor)
            .await?;
        let items = items
            .into_iter()
            .map(WireInstance::into_domain)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page { items, next })
    }
}

pub struct HolderPages<'a> {
    client: &'a ExplorerClient,
    path: String,
    token_id: Option<U256>,
}

#[async_trait]
impl PageSource for HolderPages<'_> {
    type Item = TokenHolder;

    fn name(&self) -> &str {
        &self.path
    }

    async fn fetch_page(
        &self,
        cursor: Option<&Cursor>,
        _size_hint: Option<usize>,
    ) -> Result<Page<TokenHolder>, SourceError> {
        let (items, next) = self
            .client
            .get_page::<WireHolder>(&self.path, cursor)
            .await?;
        let items = items
            .into_iter()
            .map(|w| w.into_domain(self.token_id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page { items, next })
    }
}

pub struct TransferPages<'a> {
    client: &'a ExplorerClient,
    path: String,
}

#[async_trait]
impl PageSource for TransferPages<'_> {
    type Item = TransferEvent;

    fn name(&self) -> &str {
        &self.path
    }

    async fn fetch_page(
        &self,
        cursor: Option<&Cursor>,
        _size_hint: Option<usize>,
    ) -> Result<Page<TransferEvent>, SourceError> {
        let (items, next) = self
            .client
            .get_page::<WireTransfer>(&self.path, cursor)
            .await?;
        let mut out = Vec::with_capacity(items.len());
        for w in items {
            if let Some(ev) = w.into_domain()? {
                out.push(ev);
            }
        }
        Ok(Page { items: out, next })
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PageEnvelope<T> {
    items: Vec<T>,
    #[serde(default)]
    next_page_params: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct WireAddress {
    hash: String,
}

impl WireAddress {
    fn parse(&self) -> Result<Address, SourceError> {
        parse_address(&self.hash)
            .ok_or_else(|| SourceError::Decode(format!("invalid address '{}'", self.hash)))
    }
}

#[derive(Debug, Deserialize)]
struct WireInstance {
    id: Value,
    #[serde(default)]
    owner: Option<WireAddress>,
}

impl WireInstance {
    fn into_domain(self) -> Result<TokenInstance, SourceError> {
        Ok(TokenInstance {
            token_id: value_u256(&self.id, "id")?,
            owner: self.owner.as_ref().map(WireAddress::parse).transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireHolder {
    address: WireAddress,
    value: Value,
    #[serde(default)]
    token_id: Option<Value>,
}

impl WireHolder {
    fn into_domain(self, fixed_id: Option<U256>) -> Result<TokenHolder, SourceError> {
        let token_id = match self.token_id.as_ref().filter(|v| !v.is_null()) {
            Some(v) => Some(value_u256(v, "token_id")?),
            None => fixed_id,
        };
        Ok(TokenHolder {
            holder: self.address.parse()?,
            token_id,
            amount: value_u256(&self.value, "value")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireTransferTotal {
    #[serde(default)]
    token_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireTransfer {
    #[serde(default)]
    total: Option<WireTransferTotal>,
    from: WireAddress,
    to: WireAddress,
    #[serde(default)]
    tx_hash: Option<String>,
    block_number: Value,
    #[serde(default)]
    log_index: Option<Value>,
}

impl WireTransfer {
    /// `None` for transfers without a token id (fungible movements on a mixed
    /// contract); those do not affect ownership.
    fn into_domain(self) -> Result<Option<TransferEvent>, SourceError> {
        let token_id = match self
            .total
            .as_ref()
            .and_then(|t| t.token_id.as_ref())
            .filter(|v| !v.is_null())
        {
            Some(v) => value_u256(v, "total.token_id")?,
            None => {
                warn!(tx = ?self.tx_hash, "transfer without token id skipped");
                return Ok(None);
            }
        };
        let block_number = value_u64(&self.block_number, "block_number")?;
        let log_index = match self.log_index.as_ref().filter(|v| !v.is_null()) {
            Some(v) => value_u64(v, "log_index")?,
            None => 0,
        };
        let mut ev = TransferEvent::from_parties(
            token_id,
            self.from.parse()?,
            self.to.parse()?,
            block_number,
            log_index,
        );
        ev.tx_hash = self.tx_hash;
        Ok(Some(ev))
    }
}

#[derive(Debug, Deserialize)]
struct WireTokenInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default, rename = "type")]
    token_type: Option<String>,
    #[serde(default)]
    total_supply: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireCounters {
    token_holders_count: Value,
    transfers_count: Value,
}

fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_u256(v: &Value, field: &str) -> Result<U256, SourceError> {
    value_text(v)
        .as_deref()
        .and_then(parse_u256)
        .ok_or_else(|| SourceError::Decode(format!("field '{field}': not an integer: {v}")))
}

fn value_u64(v: &Value, field: &str) -> Result<u64, SourceError> {
    value_text(v)
        .and_then(|t| t.parse::<u64>().ok())
        .ok_or_else(|| SourceError::Decode(format!("field '{field}': not an integer: {v}")))
}
