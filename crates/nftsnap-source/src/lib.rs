//! nftsnap-source
//!
//! Read-only access to remote ledgers: a block-explorer REST API and a chain
//! JSON-RPC endpoint, plus the machinery to drain them completely.
//!
//! - [`retry`]: the single bounded-attempts / fixed-delay primitive every
//!   network call goes through.
//! - [`paginate`]: cursor and index drains with inter-page pacing and
//!   cancellation. A drain either returns every record or fails loudly with
//!   the partial result attached; it never skips a page.
//! - [`explorer`] / [`chain`]: concrete sources. Clients are explicit handles
//!   built once per run and passed by reference. The chain side speaks
//!   JSON-RPC through an `alloy` provider.
//!
//! Requests against one resource are issued strictly one at a time.

pub mod cancel;
pub mod chain;
pub mod error;
pub mod explorer;
pub mod paginate;
pub mod retry;

pub use cancel::CancelToken;
pub use chain::{
    BalanceLookup, BalanceResult, CallResult, ChainClient, ContractProbe, ContractReader,
    OwnerIndexSource, OwnerLookup, OwnerResult, SupplyResult, UriLookup, UriResult,
};
pub use error::SourceError;
pub use explorer::{ExplorerClient, TokenCounters, TokenHolder, TokenInfo, TokenInstance};
pub use paginate::{
    drain_cursor, drain_indexed, Cursor, CursorDrain, DrainError, DrainFailure, DrainOptions,
    IndexBound, IndexRead, IndexedDrain, IndexedSource, Page, PageSource,
};
pub use retry::{retry_fixed, retry_fixed_or_cancel, RetryExhausted, RetryPolicy};
