//! Ownership reconstruction from a transfer log.
//!
//! Used when a source only exposes change events. Each event moves one token
//! from `from` to `to`:
//! - the token leaves the sender's held-set (no-op when absent, e.g. a mint)
//! - the token joins the receiver's held-set (unless it is a burn)
//!
//! Replay is only correct in chronological order. [`replay_in_order`] rejects
//! input that steps backwards; [`replay_sorted`] sorts by
//! `(block_number, log_index)` first and is the path callers should use with
//! data straight from an explorer API.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use alloy_primitives::{Address, U256};
use tracing::warn;

use crate::record::{format_address, OwnershipRecord};
use crate::snapshot::OwnershipSnapshot;

/// One token movement. `from == None` is a mint, `to == None` is a burn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferEvent {
    pub token_id: U256,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub block_number: u64,
    /// Position inside the block; tiebreak for events in the same block.
    pub log_index: u64,
    pub tx_hash: Option<String>,
}

impl TransferEvent {
    /// Build an event from raw addresses; the zero address on either side maps
    /// to `None` (mint / burn).
    pub fn from_parties(
        token_id: U256,
        from: Address,
        to: Address,
        block_number: u64,
        log_index: u64,
    ) -> Self {
        Self {
            token_id,
            from: (!from.is_zero()).then_some(from),
            to: (!to.is_zero()).then_some(to),
            block_number,
            log_index,
            tx_hash: None,
        }
    }

    pub fn chain_position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// Event `index` sits before the event replayed just ahead of it.
    OutOfOrder {
        index: usize,
        previous: (u64, u64),
        got: (u64, u64),
    },
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::OutOfOrder {
                index,
                previous,
                got,
            } => write!(
                f,
                "transfer #{index} at block {}/log {} precedes already replayed block {}/log {}",
                got.0, got.1, previous.0, previous.1
            ),
        }
    }
}

impl std::error::Error for ReplayError {}

/// Held-sets per holder plus the current owner of each token.
#[derive(Debug, Default, Clone)]
pub struct HoldingsLedger {
    held: BTreeMap<Address, BTreeSet<U256>>,
    owner: BTreeMap<U256, Address>,
    last_position: Option<(u64, u64)>,
    applied: usize,
}

impl HoldingsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the next event. Fails, without changing state, when the event is
    /// older than the previous one.
    pub fn apply(&mut self, ev: &TransferEvent) -> Result<(), ReplayError> {
        let pos = ev.chain_position();
        if let Some(prev) = self.last_position {
            if pos < prev {
                return Err(ReplayError::OutOfOrder {
                    index: self.applied,
                    previous: prev,
                    got: pos,
                });
            }
        }

        if let Some(from) = ev.from {
            self.release(from, ev.token_id);
        }

        // The sender in the log should be the current owner; if not, the log is
        // inconsistent and the token still must not end up with two holders.
        if let Some(current) = self.owner.get(&ev.token_id).copied() {
            if Some(current) != ev.from {
                warn!(
                    token_id = %ev.token_id,
                    current = %format_address(&current),
                    block = ev.block_number,
                    "transfer sender differs from tracked owner"
                );
                self.release(current, ev.token_id);
            }
        }

        match ev.to {
            Some(to) => {
                self.held.entry(to).or_default().insert(ev.token_id);
                self.owner.insert(ev.token_id, to);
            }
            None => {
                self.owner.remove(&ev.token_id);
            }
        }

        self.last_position = Some(pos);
        self.applied += 1;
        Ok(())
    }

    fn release(&mut self, holder: Address, token_id: U256) {
        if let Some(set) = self.held.get_mut(&holder) {
            set.remove(&token_id);
            if set.is_empty() {
                self.held.remove(&holder);
            }
        }
    }

    pub fn held_by(&self, holder: &Address) -> Option<&BTreeSet<U256>> {
        self.held.get(holder)
    }

    pub fn applied(&self) -> usize {
        self.applied
    }

    pub fn into_snapshot(self) -> OwnershipSnapshot {
        self.owner
            .into_iter()
            .map(|(token_id, holder)| OwnershipRecord::new(holder, token_id))
            .collect()
    }
}

/// Replay events exactly as given; the slice must already be chronological.
pub fn replay_in_order(events: &[TransferEvent]) -> Result<OwnershipSnapshot, ReplayError> {
    let mut ledger = HoldingsLedger::new();
    for ev in events {
        ledger.apply(ev)?;
    }
    Ok(ledger.into_snapshot())
}

/// Sort by `(block_number, log_index)` then replay.
pub fn replay_sorted(mut events: Vec<TransferEvent>) -> OwnershipSnapshot {
    events.sort_by_key(TransferEvent::chain_position);
    let mut ledger = HoldingsLedger::new();
    for ev in &events {
        // Sorted input cannot step backwards.
        if let Err(e) = ledger.apply(ev) {
            warn!(error = %e, "unexpected replay ordering failure after sort");
        }
    }
    ledger.into_snapshot()
}
