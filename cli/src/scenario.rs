//! # Scenarios
//!
//! A scenario is a JSON script: one token, some native allocations, one
//! vault, and an ordered list of steps. [`run`] replays it against a fresh
//! [`InMemoryChain`] and returns a [`Report`].
//!
//! ```json
//! {
//!   "token": { "name": "Hamachi", "symbol": "HAMA", "supply": 1000000 },
//!   "beneficiary": "beneficiary",
//!   "native": { "owner": 10 },
//!   "steps": [
//!     { "action": { "approve": { "amount": 1000 } } },
//!     { "action": { "fund": { "duration_secs": 10000, "amount": 1000 } } },
//!     { "action": "withdraw", "expect": "not_yet_unlocked" },
//!     { "action": { "advance": { "secs": 10000 } } },
//!     { "action": "withdraw", "expect": "ok" }
//!   ]
//! }
//! ```
//!
//! Account names resolve with [`Address::from_label`], except `vault` and
//! `token` which name the deployed contracts. The account `owner` deploys
//! both.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vesting_contracts::config::{DEFAULT_TOKEN_DECIMALS, NATIVE_DECIMALS};
use vesting_contracts::{
    Address, AssetLedger, FundingTerms, InMemoryChain, LedgerError, ValueTransfer, VaultError,
    VaultEvent, VestingVault,
};

/// Name of the account that deploys the token and the vault.
pub const OWNER: &str = "owner";

const VAULT: &str = "vault";
const TOKEN: &str = "token";
const EXPECT_OK: &str = "ok";

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A complete scripted run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Initial ledger time. Defaults to the wall clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genesis: Option<DateTime<Utc>>,
    pub token: TokenSpec,
    /// Account name of the beneficiary.
    pub beneficiary: String,
    /// Native units credited to named accounts at genesis.
    #[serde(default)]
    pub native: BTreeMap<String, u128>,
    pub steps: Vec<Step>,
}

/// The fixed-supply token minted to the owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenSpec {
    pub name: String,
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    pub supply: u128,
}

fn default_decimals() -> u8 {
    DEFAULT_TOKEN_DECIMALS
}

/// One scripted call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    pub action: Action,
    /// Account making the call. Each action has its natural default caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
    /// `ok`, or the error kind the step must fail with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<String>,
}

/// What a step does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Token allowance from the caller (default `owner`) to `spender`
    /// (default `vault`).
    Approve {
        amount: u128,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spender: Option<String>,
    },
    /// `fund` on the vault, caller defaults to `owner`.
    Fund {
        duration_secs: u64,
        amount: u128,
        #[serde(default)]
        native_value: u128,
        /// Asset account name, defaults to `token`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        asset: Option<String>,
    },
    /// Moves ledger time forward.
    Advance { secs: u64 },
    /// Jumps ledger time to `at`. Instants in the past leave time unchanged.
    WarpTo { at: DateTime<Utc> },
    /// `withdraw` on the vault, caller defaults to the beneficiary.
    Withdraw,
    /// `blacklist_beneficiary` on the vault, caller defaults to `owner`.
    Blacklist,
    /// Makes an account refuse (or accept again) native value.
    RejectNative {
        account: String,
        #[serde(default = "default_true")]
        reject: bool,
    },
}

fn default_true() -> bool {
    true
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::Approve { .. } => "approve",
            Action::Fund { .. } => "fund",
            Action::Advance { .. } => "advance",
            Action::WarpTo { .. } => "warp_to",
            Action::Withdraw => "withdraw",
            Action::Blacklist => "blacklist",
            Action::RejectNative { .. } => "reject_native",
        }
    }
}

impl Scenario {
    /// Reads and parses a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse scenario {}", path.display()))
    }

    /// Fund, try too early, wait, withdraw, try again.
    pub fn sample() -> Self {
        let step = |action, expect: &str| Step {
            action,
            caller: None,
            expect: Some(expect.to_string()),
        };

        Self {
            genesis: None,
            token: TokenSpec {
                name: "Hamachi".into(),
                symbol: "HAMA".into(),
                decimals: DEFAULT_TOKEN_DECIMALS,
                supply: 1_000_000,
            },
            beneficiary: "beneficiary".into(),
            native: BTreeMap::from([(OWNER.to_string(), 10)]),
            steps: vec![
                step(Action::Withdraw, "not_funded"),
                step(
                    Action::Approve {
                        amount: 1_000,
                        spender: None,
                    },
                    EXPECT_OK,
                ),
                step(
                    Action::Fund {
                        duration_secs: 10_000,
                        amount: 1_000,
                        native_value: 1,
                        asset: None,
                    },
                    EXPECT_OK,
                ),
                step(Action::Withdraw, "not_yet_unlocked"),
                step(Action::Advance { secs: 10_000 }, EXPECT_OK),
                step(Action::Withdraw, EXPECT_OK),
                step(Action::Withdraw, "already_withdrawn"),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// `true` when every step met its expectation.
    pub passed: bool,
    pub steps: Vec<StepOutcome>,
    pub vault: VaultView,
    pub balances: BTreeMap<String, Balances>,
    pub denominations: Denominations,
    pub finished_at: DateTime<Utc>,
}

impl Report {
    /// Steps whose expectation was not met.
    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| !s.expectation_met)
    }
}

/// Result of a single step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<Address>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<VaultEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    pub expectation_met: bool,
}

/// Final view of the vault.
#[derive(Debug, Clone, Serialize)]
pub struct VaultView {
    pub address: Address,
    pub owner: Address,
    pub beneficiary: Address,
    pub state: String,
    pub funded: bool,
    pub vesting_vault_value: u128,
    pub native_value: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_at: Option<DateTime<Utc>>,
    pub events: usize,
}

impl From<&VestingVault> for VaultView {
    fn from(vault: &VestingVault) -> Self {
        Self {
            address: vault.address(),
            owner: vault.owner(),
            beneficiary: vault.beneficiary(),
            state: vault.state().to_string(),
            funded: vault.funded(),
            vesting_vault_value: vault.vesting_vault_value(),
            native_value: vault.native_value(),
            unlock_at: vault.unlock_at(),
            events: vault.events().len(),
        }
    }
}

/// Units and supplies the balances are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Denominations {
    pub token_decimals: u8,
    pub token_supply: u128,
    pub native_decimals: u8,
    /// Native units in existence (all genesis allocations).
    pub native_supply: u128,
}

/// Token and native holdings of one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balances {
    pub token: u128,
    pub native: u128,
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Failure of a single step, before it is flattened into a [`StepOutcome`].
#[derive(Debug)]
enum StepError {
    Vault(VaultError),
    Ledger(LedgerError),
}

impl StepError {
    fn kind(&self) -> &'static str {
        match self {
            StepError::Vault(err) => err.kind(),
            StepError::Ledger(_) => "ledger",
        }
    }

    fn message(&self) -> String {
        match self {
            StepError::Vault(err) => err.to_string(),
            StepError::Ledger(err) => err.to_string(),
        }
    }
}

struct Runner {
    chain: InMemoryChain,
    vault: VestingVault,
    token: Address,
    owner: Address,
}

impl Runner {
    fn resolve(&self, name: &str) -> Address {
        match name {
            VAULT => self.vault.address(),
            TOKEN => self.token,
            other => Address::from_label(other),
        }
    }

    fn caller(&self, step: &Step, default: Address) -> Address {
        step.caller
            .as_deref()
            .map(|name| self.resolve(name))
            .unwrap_or(default)
    }

    fn execute(&mut self, step: &Step) -> (Option<Address>, Result<Option<VaultEvent>, StepError>) {
        let owner = self.owner;
        let beneficiary = self.vault.beneficiary();

        match &step.action {
            Action::Approve { amount, spender } => {
                let caller = self.caller(step, owner);
                let spender = spender
                    .as_deref()
                    .map(|name| self.resolve(name))
                    .unwrap_or_else(|| self.vault.address());
                let result = match self.chain.token_mut(&self.token) {
                    Some(ledger) => ledger
                        .approve(&caller, &spender, *amount)
                        .map(|()| None)
                        .map_err(StepError::Ledger),
                    None => Err(StepError::Vault(VaultError::InvalidAsset(self.token))),
                };
                (Some(caller), result)
            }
            Action::Fund {
                duration_secs,
                amount,
                native_value,
                asset,
            } => {
                let caller = self.caller(step, owner);
                let asset = asset
                    .as_deref()
                    .map(|name| self.resolve(name))
                    .unwrap_or(self.token);
                let terms =
                    FundingTerms::new(*duration_secs, asset, *amount).with_native_value(*native_value);
                let result = self.vault.fund(&mut self.chain, &caller, terms);
                (Some(caller), result.map(Some).map_err(StepError::Vault))
            }
            Action::Advance { secs } => {
                self.chain.advance_time(*secs);
                (None, Ok(None))
            }
            Action::WarpTo { at } => {
                self.chain.warp_to(*at);
                (None, Ok(None))
            }
            Action::Withdraw => {
                let caller = self.caller(step, beneficiary);
                let result = self.vault.withdraw(&mut self.chain, &caller);
                (Some(caller), result.map(Some).map_err(StepError::Vault))
            }
            Action::Blacklist => {
                let caller = self.caller(step, owner);
                let result = self.vault.blacklist_beneficiary(&mut self.chain, &caller);
                (Some(caller), result.map(Some).map_err(StepError::Vault))
            }
            Action::RejectNative { account, reject } => {
                let account = self.resolve(account);
                let native = self.chain.native_ledger_mut();
                if *reject {
                    native.reject_incoming(&account);
                } else {
                    native.accept_incoming(&account);
                }
                (None, Ok(None))
            }
        }
    }

    fn balances(&self, address: &Address) -> Balances {
        Balances {
            token: self.chain.token_balance(&self.token, address),
            native: self.chain.native().balance_of(address),
        }
    }

    fn denominations(&self) -> Denominations {
        let token = self.chain.token(&self.token);
        Denominations {
            token_decimals: token.map(|t| t.decimals()).unwrap_or(DEFAULT_TOKEN_DECIMALS),
            token_supply: token.map(|t| t.total_supply()).unwrap_or(0),
            native_decimals: NATIVE_DECIMALS,
            native_supply: self.chain.native().total_issued(),
        }
    }
}

/// Replays `scenario` on a fresh chain.
///
/// Step failures are recorded in the report, not returned; `Err` means the
/// scenario itself could not be set up.
pub fn run(scenario: &Scenario) -> Result<Report> {
    let mut chain = match scenario.genesis {
        Some(genesis) => InMemoryChain::new(genesis),
        None => InMemoryChain::with_clock(Default::default()),
    };

    let owner = Address::from_label(OWNER);
    let beneficiary = match scenario.beneficiary.as_str() {
        VAULT | TOKEN => anyhow::bail!(
            "beneficiary may not be named {:?}: the name is reserved",
            scenario.beneficiary
        ),
        name => Address::from_label(name),
    };

    let def = &scenario.token;
    let token = chain.deploy_token(&owner, &def.name, &def.symbol, def.decimals, def.supply);
    let address = chain.next_contract_address(&owner);
    let vault = VestingVault::deploy(address, owner, beneficiary).context("failed to deploy vault")?;

    let mut runner = Runner {
        chain,
        vault,
        token,
        owner,
    };

    for (name, amount) in &scenario.native {
        let holder = runner.resolve(name);
        runner
            .chain
            .mint_native(&holder, *amount)
            .with_context(|| format!("failed to allocate native value to {name}"))?;
    }

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let (caller, result) = runner.execute(step);

        let actual = match &result {
            Ok(_) => EXPECT_OK,
            Err(err) => err.kind(),
        };
        let expectation_met = step.expect.as_deref().map_or(true, |e| e == actual);
        if !expectation_met {
            warn!(
                index,
                action = step.action.name(),
                expected = step.expect.as_deref().unwrap_or_default(),
                actual,
                "step expectation not met"
            );
        }

        let (event, error, message) = match result {
            Ok(event) => (event, None, None),
            Err(err) => (None, Some(err.kind().to_string()), Some(err.message())),
        };

        steps.push(StepOutcome {
            index,
            action: step.action.name(),
            caller,
            ok: error.is_none(),
            error,
            message,
            event,
            expected: step.expect.clone(),
            expectation_met,
        });
    }

    let mut balances = BTreeMap::new();
    balances.insert(OWNER.to_string(), runner.balances(&owner));
    balances.insert(scenario.beneficiary.clone(), runner.balances(&beneficiary));
    balances.insert(VAULT.to_string(), runner.balances(&runner.vault.address()));

    let passed = steps.iter().all(|s| s.expectation_met);
    info!(steps = steps.len(), passed, "scenario finished");

    Ok(Report {
        passed,
        steps,
        vault: VaultView::from(&runner.vault),
        balances,
        denominations: runner.denominations(),
        finished_at: runner.chain.clock().now(),
    })
}
