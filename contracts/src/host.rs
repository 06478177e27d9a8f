//! # Execution Host
//!
//! A vault operation runs against a [`Host`]: the environment that knows the
//! current ledger time, resolves asset addresses to token ledgers, holds
//! native balances, and can take a checkpoint of all of that so a failed
//! operation leaves no trace.
//!
//! [`InMemoryChain`] is the host used by the tests and the scenario runner.
//! Checkpoints are full snapshots of the token registry and the native
//! ledger, kept on a stack so they nest:
//!
//! ```text
//! checkpoint() -> push snapshot, return its depth
//! commit(cp)   -> drop snapshots at depth >= cp
//! rollback(cp) -> restore snapshot cp, drop everything above it
//! ```
//!
//! A [`Checkpoint`] is consumed by `commit` or `rollback`. A handle whose
//! depth is no longer open (its snapshot was already dropped by an enclosing
//! commit or rollback) is ignored.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::clock::LedgerClock;
use crate::ledger::{AssetLedger, Erc20Ledger, LedgerError, NativeLedger, ValueTransfer};

/// Opaque handle returned by [`Host::checkpoint`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a checkpoint must be committed or rolled back"]
pub struct Checkpoint(usize);

/// Everything a vault operation is allowed to touch.
pub trait Host {
    /// Ledger time at which the current operation executes.
    fn now(&self) -> DateTime<Utc>;

    /// Resolves `asset` to a token ledger, or `None` if nothing at that
    /// address implements the ledger interface.
    fn asset_mut(&mut self, asset: &Address) -> Option<&mut dyn AssetLedger>;

    /// The native-currency ledger.
    fn native_mut(&mut self) -> &mut dyn ValueTransfer;

    /// Opens a checkpoint covering all ledger state.
    fn checkpoint(&mut self) -> Checkpoint;

    /// Keeps every change made since `checkpoint`.
    fn commit(&mut self, checkpoint: Checkpoint);

    /// Discards every change made since `checkpoint`.
    fn rollback(&mut self, checkpoint: Checkpoint);
}

#[derive(Debug, Clone)]
struct Snapshot {
    tokens: HashMap<Address, Erc20Ledger>,
    native: NativeLedger,
}

/// Single-process host: one clock, a registry of tokens, one native ledger.
#[derive(Debug, Clone)]
pub struct InMemoryChain {
    clock: LedgerClock,
    tokens: HashMap<Address, Erc20Ledger>,
    native: NativeLedger,
    /// Contracts created so far, per deployer.
    nonces: HashMap<Address, u64>,
    journal: Vec<Snapshot>,
}

impl InMemoryChain {
    /// Creates an empty chain whose clock starts at `genesis`.
    pub fn new(genesis: DateTime<Utc>) -> Self {
        Self::with_clock(LedgerClock::new(genesis))
    }

    /// Creates an empty chain driven by `clock`.
    pub fn with_clock(clock: LedgerClock) -> Self {
        Self {
            clock,
            tokens: HashMap::new(),
            native: NativeLedger::new(),
            nonces: HashMap::new(),
            journal: Vec::new(),
        }
    }

    /// Reserves the address of the next contract `deployer` creates.
    pub fn next_contract_address(&mut self, deployer: &Address) -> Address {
        let nonce = self.nonces.entry(*deployer).or_insert(0);
        let address = Address::derive(deployer, *nonce);
        *nonce += 1;
        address
    }

    /// Deploys a fixed-supply token, minting `supply` to `deployer`.
    pub fn deploy_token(
        &mut self,
        deployer: &Address,
        name: &str,
        symbol: &str,
        decimals: u8,
        supply: u128,
    ) -> Address {
        let address = self.next_contract_address(deployer);
        let ledger = Erc20Ledger::new(name, symbol, decimals, *deployer, supply);
        info!(%address, symbol = ledger.symbol(), supply, "token deployed");
        self.tokens.insert(address, ledger);
        address
    }

    /// The token deployed at `address`, if any.
    pub fn token(&self, address: &Address) -> Option<&Erc20Ledger> {
        self.tokens.get(address)
    }

    /// Mutable access to the token deployed at `address`, if any.
    pub fn token_mut(&mut self, address: &Address) -> Option<&mut Erc20Ledger> {
        self.tokens.get_mut(address)
    }

    /// Token balance of `holder`, or 0 if `token` is unknown.
    pub fn token_balance(&self, token: &Address, holder: &Address) -> u128 {
        self.tokens
            .get(token)
            .map(|ledger| ledger.balance_of(holder))
            .unwrap_or(0)
    }

    /// The native ledger.
    pub fn native(&self) -> &NativeLedger {
        &self.native
    }

    /// Mutable access to the native ledger (genesis minting, recipient
    /// behavior).
    pub fn native_ledger_mut(&mut self) -> &mut NativeLedger {
        &mut self.native
    }

    /// Native balance of `holder`.
    pub fn native_balance(&self, holder: &Address) -> u128 {
        self.native.balance_of(holder)
    }

    /// Credits native value to `holder` at genesis.
    pub fn mint_native(&mut self, holder: &Address, amount: u128) -> Result<(), LedgerError> {
        self.native.mint(holder, amount)
    }

    /// The chain clock.
    pub fn clock(&self) -> &LedgerClock {
        &self.clock
    }

    /// Jumps ledger time to `instant`; earlier instants are ignored.
    pub fn warp_to(&mut self, instant: DateTime<Utc>) {
        self.clock.set(instant);
        debug!(now = %self.clock.now(), "ledger time set");
    }

    /// Moves ledger time forward by `secs` seconds.
    pub fn advance_time(&mut self, secs: u64) {
        self.clock.advance(secs);
        debug!(now = %self.clock.now(), secs, "ledger time advanced");
    }

    /// Number of open checkpoints.
    pub fn open_checkpoints(&self) -> usize {
        self.journal.len()
    }
}

impl InMemoryChain {
    fn is_open(&self, checkpoint: &Checkpoint) -> bool {
        let open = checkpoint.0 < self.journal.len();
        if !open {
            warn!(
                depth = checkpoint.0,
                open = self.journal.len(),
                "ignoring checkpoint that is no longer open"
            );
        }
        open
    }
}

impl Host for InMemoryChain {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn asset_mut(&mut self, asset: &Address) -> Option<&mut dyn AssetLedger> {
        self.tokens
            .get_mut(asset)
            .map(|ledger| ledger as &mut dyn AssetLedger)
    }

    fn native_mut(&mut self) -> &mut dyn ValueTransfer {
        &mut self.native
    }

    fn checkpoint(&mut self) -> Checkpoint {
        self.journal.push(Snapshot {
            tokens: self.tokens.clone(),
            native: self.native.clone(),
        });
        let depth = self.journal.len() - 1;
        debug!(depth, "checkpoint opened");
        Checkpoint(depth)
    }

    fn commit(&mut self, checkpoint: Checkpoint) {
        if !self.is_open(&checkpoint) {
            return;
        }
        self.journal.truncate(checkpoint.0);
        debug!(depth = checkpoint.0, "checkpoint committed");
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        if !self.is_open(&checkpoint) {
            return;
        }
        self.journal.truncate(checkpoint.0 + 1);
        if let Some(snapshot) = self.journal.pop() {
            self.tokens = snapshot.tokens;
            self.native = snapshot.native;
            debug!(depth = checkpoint.0, "checkpoint rolled back");
        }
    }
}
