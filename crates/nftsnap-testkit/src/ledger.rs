use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use nftsnap_source::{
    BalanceLookup, BalanceResult, CallResult, CancelToken, OwnerLookup, OwnerResult, SourceError,
    UriLookup, UriResult,
};
use nftsnap_store::{Address, U256};

/// Per-token behaviour override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    /// The next `n` reads fail with a transport error, then reads succeed.
    Fail(u32),
    /// Every read fails with a transport error.
    AlwaysFail,
    /// Every read reverts with the given reason.
    Revert(String),
}

/// Deterministic live ledger. Tokens with no owner revert like a real
/// contract; holdings with no entry read as zero.
#[derive(Debug, Default)]
pub struct FakeLedger {
    owners: BTreeMap<U256, Address>,
    balances: BTreeMap<(U256, Address), U256>,
    uris: BTreeMap<U256, String>,
    scripts: Mutex<BTreeMap<U256, Scripted>>,
    calls: AtomicUsize,
    cancel_after: Option<(usize, CancelToken)>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, token_id: U256, owner: Address) -> Self {
        self.owners.insert(token_id, owner);
        self
    }

    pub fn with_balance(mut self, token_id: U256, holder: Address, amount: U256) -> Self {
        self.balances.insert((token_id, holder), amount);
        self
    }

    pub fn with_uri(mut self, token_id: U256, uri: impl Into<String>) -> Self {
        self.uris.insert(token_id, uri.into());
        self
    }

    pub fn script(self, token_id: U256, behaviour: Scripted) -> Self {
        if let Ok(mut s) = self.scripts.lock() {
            s.insert(token_id, behaviour);
        }
        self
    }

    /// Trip `token` once `n` reads have been served.
    pub fn cancel_after(mut self, n: usize, token: CancelToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    /// Reads served so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Count the call and apply any script for `token_id`. `Some` short-circuits
    /// the read.
    fn intercept<T>(&self, token_id: U256) -> Option<Result<CallResult<T>, SourceError>> {
        let served = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((n, token)) = &self.cancel_after {
            if served >= *n {
                token.cancel();
            }
        }

        let mut scripts = match self.scripts.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        match scripts.get_mut(&token_id) {
            Some(Scripted::Fail(0)) | None => None,
            Some(Scripted::Fail(n)) => {
                *n -= 1;
                Some(Err(SourceError::Transport(format!(
                    "scripted failure for token {token_id}"
                ))))
            }
            Some(Scripted::AlwaysFail) => Some(Err(SourceError::Transport(format!(
                "scripted failure for token {token_id}"
            )))),
            Some(Scripted::Revert(reason)) => Some(Ok(CallResult::failed(reason.clone()))),
        }
    }
}

#[async_trait]
impl OwnerLookup for FakeLedger {
    async fn owner_of(&self, token_id: U256) -> Result<OwnerResult, SourceError> {
        if let Some(short) = self.intercept(token_id) {
            return short;
        }
        Ok(match self.owners.get(&token_id) {
            Some(owner) => CallResult::Value(*owner),
            None => CallResult::failed("ERC721NonexistentToken"),
        })
    }
}

#[async_trait]
impl BalanceLookup for FakeLedger {
    async fn balance_of(
        &self,
        holder: Address,
        token_id: U256,
    ) -> Result<BalanceResult, SourceError> {
        if let Some(short) = self.intercept(token_id) {
            return short;
        }
        Ok(CallResult::Value(
            self.balances
                .get(&(token_id, holder))
                .copied()
                .unwrap_or(U256::ZERO),
        ))
    }
}

#[async_trait]
impl UriLookup for FakeLedger {
    async fn token_uri(&self, token_id: U256) -> Result<UriResult, SourceError> {
        if let Some(short) = self.intercept(token_id) {
            return short;
        }
        Ok(match self.uris.get(&token_id) {
            Some(uri) => CallResult::Value(uri.clone()),
            None => CallResult::failed("URIQueryForNonexistentToken"),
        })
    }
}
