//! Integration tests for the vesting vault.
//!
//! Each test deploys a token and a vault on a fresh in-memory chain and
//! drives the vault through its lifecycle the way an owner and beneficiary
//! would: approve, fund, wait, withdraw or blacklist.

use chrono::{Duration, TimeZone, Utc};
use vesting_contracts::events::VaultEvent;
use vesting_contracts::ledger::LedgerError;
use vesting_contracts::{
    Address, FundingTerms, Host, InMemoryChain, VaultConfig, VaultError, VaultState,
    VestingVault,
};

const SUPPLY: u128 = 1_000_000;
const DURATION: u64 = 10_000;
const AMOUNT: u128 = 1_000;
const NATIVE: u128 = 1;

struct World {
    chain: InMemoryChain,
    vault: VestingVault,
    token: Address,
    owner: Address,
    beneficiary: Address,
}

/// Helper: owner deploys a token and a vault for `beneficiary`, and holds
/// some native value.
fn world() -> World {
    let genesis = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let mut chain = InMemoryChain::new(genesis);
    let owner = Address::from_label("owner");
    let beneficiary = Address::from_label("beneficiary");

    let token = chain.deploy_token(&owner, "Hamachi", "HAMA", 18, SUPPLY);
    chain.mint_native(&owner, 10).unwrap();
    let address = chain.next_contract_address(&owner);
    let vault = VestingVault::deploy(address, owner, beneficiary).unwrap();

    World {
        chain,
        vault,
        token,
        owner,
        beneficiary,
    }
}

impl World {
    fn approve(&mut self, amount: u128) {
        let spender = self.vault.address();
        self.chain
            .token_mut(&self.token)
            .unwrap()
            .approve(&self.owner, &spender, amount)
            .unwrap();
    }

    fn fund(&mut self, duration: u64, amount: u128) -> Result<VaultEvent, VaultError> {
        let owner = self.owner;
        let terms = FundingTerms::new(duration, self.token, amount).with_native_value(NATIVE);
        self.vault.fund(&mut self.chain, &owner, terms)
    }

    fn withdraw(&mut self) -> Result<VaultEvent, VaultError> {
        let beneficiary = self.beneficiary;
        self.vault.withdraw(&mut self.chain, &beneficiary)
    }

    fn blacklist(&mut self) -> Result<VaultEvent, VaultError> {
        let owner = self.owner;
        self.vault.blacklist_beneficiary(&mut self.chain, &owner)
    }

    fn tokens_of(&self, holder: &Address) -> u128 {
        self.chain.token_balance(&self.token, holder)
    }
}

/// Helper: a vault funded with the standard terms.
fn funded() -> World {
    let mut w = world();
    w.approve(AMOUNT);
    w.fund(DURATION, AMOUNT).unwrap();
    w
}

// ---------------------------------------------------------------------------
// Funding
// ---------------------------------------------------------------------------

#[test]
fn fund_moves_asset_and_value_into_vault() {
    let w = funded();
    let vault = w.vault.address();

    assert!(w.vault.funded());
    assert_eq!(w.vault.vesting_vault_value(), AMOUNT);
    assert_eq!(w.tokens_of(&vault), AMOUNT);
    assert_eq!(w.tokens_of(&w.owner), SUPPLY - AMOUNT);
    assert_eq!(w.chain.native_balance(&vault), NATIVE);
    assert_eq!(w.chain.native_balance(&w.owner), 10 - NATIVE);
    assert_eq!(
        w.vault.unlock_at(),
        Some(w.chain.now() + Duration::seconds(DURATION as i64))
    );
}

#[test]
fn fund_consumes_allowance() {
    let w = funded();
    let ledger = w.chain.token(&w.token).unwrap();
    assert_eq!(
        vesting_contracts::AssetLedger::allowance(ledger, &w.owner, &w.vault.address()),
        0
    );
}

#[test]
fn fund_with_zero_duration_fails() {
    let mut w = world();
    w.approve(AMOUNT);
    assert_eq!(
        w.fund(0, AMOUNT).unwrap_err(),
        VaultError::InvalidDuration { secs: 0 }
    );
    assert!(!w.vault.funded());
    assert_eq!(w.tokens_of(&w.owner), SUPPLY);
}

#[test]
fn fund_with_non_ledger_asset_fails() {
    let mut w = world();
    let owner = w.owner;
    let bogus = w.beneficiary;
    let result = w
        .vault
        .fund(&mut w.chain, &owner, FundingTerms::new(40, bogus, AMOUNT));
    assert_eq!(result.unwrap_err(), VaultError::InvalidAsset(bogus));
}

#[test]
fn fund_without_approval_fails() {
    let mut w = world();
    let err = w.fund(DURATION, AMOUNT).unwrap_err();
    assert!(matches!(
        err,
        VaultError::AssetTransferFailed(LedgerError::InsufficientAllowance { .. })
    ));
    assert_eq!(w.chain.native_balance(&w.owner), 10);
}

#[test]
fn fund_without_enough_native_rolls_back_token_pull() {
    let mut w = world();
    w.approve(AMOUNT);
    let owner = w.owner;
    let terms = FundingTerms::new(DURATION, w.token, AMOUNT).with_native_value(11);

    let err = w.vault.fund(&mut w.chain, &owner, terms).unwrap_err();
    assert!(matches!(
        err,
        VaultError::ValueTransferFailed(LedgerError::InsufficientBalance { .. })
    ));
    assert_eq!(w.tokens_of(&owner), SUPPLY);
    assert_eq!(w.tokens_of(&w.vault.address()), 0);
    assert_eq!(w.vault.state(), &VaultState::Unfunded);
    assert_eq!(w.chain.open_checkpoints(), 0);
}

#[test]
fn fund_by_non_owner_fails() {
    let mut w = world();
    w.approve(AMOUNT);
    let beneficiary = w.beneficiary;
    let result = w.vault.fund(
        &mut w.chain,
        &beneficiary,
        FundingTerms::new(DURATION, w.token, AMOUNT),
    );
    assert!(matches!(result, Err(VaultError::Unauthorized { .. })));
}

#[test]
fn second_fund_fails() {
    let mut w = funded();
    w.approve(AMOUNT);
    assert_eq!(w.fund(DURATION, AMOUNT).unwrap_err(), VaultError::AlreadyFunded);
    assert_eq!(w.tokens_of(&w.vault.address()), AMOUNT);
}

#[test]
fn configured_duration_cap_is_enforced() {
    let mut w = world();
    let config = VaultConfig {
        max_vesting_duration_secs: 3_600,
    };
    let address = w.chain.next_contract_address(&w.owner);
    w.vault = VestingVault::deploy_with_config(address, w.owner, w.beneficiary, config).unwrap();
    assert_eq!(w.vault.config(), &config);
    w.approve(AMOUNT);

    assert_eq!(
        w.fund(3_601, AMOUNT).unwrap_err(),
        VaultError::InvalidDuration { secs: 3_601 }
    );
    assert!(!w.vault.funded());

    w.fund(3_600, AMOUNT).unwrap();
    assert_eq!(
        w.vault.unlock_at(),
        Some(w.chain.now() + Duration::seconds(3_600))
    );
}

#[test]
fn zero_amount_funding_is_accepted() {
    let mut w = world();
    w.fund(DURATION, 0).unwrap();
    assert!(w.vault.funded());
    assert_eq!(w.vault.vesting_vault_value(), 0);
}

// ---------------------------------------------------------------------------
// Withdrawal
// ---------------------------------------------------------------------------

#[test]
fn withdraw_before_fund_fails_for_everyone() {
    let mut w = world();
    assert_eq!(w.withdraw().unwrap_err(), VaultError::NotFunded);

    let owner = w.owner;
    assert_eq!(
        w.vault.withdraw(&mut w.chain, &owner).unwrap_err(),
        VaultError::NotFunded
    );
}

#[test]
fn withdraw_before_unlock_fails() {
    let mut w = funded();
    w.chain.advance_time(DURATION - 1);

    let err = w.withdraw().unwrap_err();
    assert_eq!(
        err,
        VaultError::NotYetUnlocked {
            unlock_at: w.vault.unlock_at().unwrap()
        }
    );
    assert_eq!(w.tokens_of(&w.beneficiary), 0);
}

#[test]
fn withdraw_exactly_at_unlock_succeeds() {
    let mut w = funded();
    w.chain.advance_time(DURATION);

    w.withdraw().unwrap();
    assert_eq!(w.tokens_of(&w.beneficiary), AMOUNT);
    assert_eq!(w.chain.native_balance(&w.beneficiary), NATIVE);
}

#[test]
fn withdraw_long_after_unlock_succeeds() {
    let mut w = funded();
    w.chain.advance_time(DURATION * 2);

    let event = w.withdraw().unwrap();
    match event {
        VaultEvent::Released(e) => {
            assert_eq!(e.beneficiary, w.beneficiary);
            assert_eq!(e.amount, AMOUNT);
            assert_eq!(e.native_value, NATIVE);
        }
        other => panic!("expected release, got {other:?}"),
    }
    assert_eq!(w.tokens_of(&w.vault.address()), 0);
    assert_eq!(w.chain.native_balance(&w.vault.address()), 0);
    assert_eq!(w.vault.vesting_vault_value(), 0);
}

#[test]
fn withdraw_by_non_beneficiary_fails() {
    let mut w = funded();
    w.chain.advance_time(DURATION);
    let stranger = Address::from_label("stranger");

    let err = w.vault.withdraw(&mut w.chain, &stranger).unwrap_err();
    assert!(matches!(err, VaultError::Unauthorized { caller, .. } if caller == stranger));
    assert_eq!(w.tokens_of(&w.vault.address()), AMOUNT);
}

#[test]
fn second_withdraw_fails() {
    let mut w = funded();
    w.chain.advance_time(DURATION);
    w.withdraw().unwrap();

    assert_eq!(w.withdraw().unwrap_err(), VaultError::AlreadyWithdrawn);
    assert_eq!(w.tokens_of(&w.beneficiary), AMOUNT);
    assert_eq!(w.vault.vesting_vault_value(), 0);
    assert_eq!(w.vault.native_value(), 0);
}

#[test]
fn rejected_payout_leaves_vault_funded() {
    let mut w = funded();
    w.chain.advance_time(DURATION);
    let beneficiary = w.beneficiary;
    w.chain.native_ledger_mut().reject_incoming(&beneficiary);

    let err = w.withdraw().unwrap_err();
    assert_eq!(
        err,
        VaultError::ValueTransferFailed(LedgerError::RecipientRejected {
            recipient: beneficiary
        })
    );
    assert!(matches!(w.vault.state(), VaultState::Funded(_)));
    assert_eq!(w.tokens_of(&beneficiary), 0);
    assert_eq!(w.tokens_of(&w.vault.address()), AMOUNT);
    assert_eq!(w.vault.events().len(), 1);

    w.chain.native_ledger_mut().accept_incoming(&beneficiary);
    w.withdraw().unwrap();
    assert_eq!(w.tokens_of(&beneficiary), AMOUNT);
}

// ---------------------------------------------------------------------------
// Blacklisting
// ---------------------------------------------------------------------------

#[test]
fn blacklist_returns_funds_to_owner() {
    let mut w = funded();
    w.blacklist().unwrap();

    assert!(w.vault.is_blacklisted());
    assert_eq!(w.tokens_of(&w.owner), SUPPLY);
    assert_eq!(w.chain.native_balance(&w.owner), 10);
    assert_eq!(w.tokens_of(&w.vault.address()), 0);
    assert_eq!(w.vault.vesting_vault_value(), 0);
    assert!(w.vault.funded());
}

#[test]
fn blacklisted_beneficiary_cannot_withdraw() {
    let mut w = funded();
    w.blacklist().unwrap();
    w.chain.advance_time(DURATION * 2);

    assert_eq!(w.withdraw().unwrap_err(), VaultError::Blacklisted);
    assert_eq!(w.tokens_of(&w.beneficiary), 0);
}

#[test]
fn blacklist_by_beneficiary_fails() {
    let mut w = funded();
    let beneficiary = w.beneficiary;
    let err = w
        .vault
        .blacklist_beneficiary(&mut w.chain, &beneficiary)
        .unwrap_err();
    assert!(matches!(err, VaultError::Unauthorized { .. }));
    assert!(!w.vault.is_blacklisted());
}

#[test]
fn blacklist_unfunded_vault_blocks_funding() {
    let mut w = world();
    w.blacklist().unwrap();
    w.approve(AMOUNT);

    assert_eq!(w.fund(DURATION, AMOUNT).unwrap_err(), VaultError::Blacklisted);
    assert_eq!(w.withdraw().unwrap_err(), VaultError::NotFunded);
    assert_eq!(w.tokens_of(&w.owner), SUPPLY);
}

#[test]
fn rejected_reclaim_leaves_vault_funded() {
    let mut w = funded();
    let owner = w.owner;
    w.chain.native_ledger_mut().reject_incoming(&owner);

    let err = w.blacklist().unwrap_err();
    assert_eq!(
        err,
        VaultError::ValueTransferFailed(LedgerError::RecipientRejected { recipient: owner })
    );
    assert!(matches!(w.vault.state(), VaultState::Funded(_)));
    assert!(!w.vault.is_blacklisted());
    assert_eq!(w.vault.vesting_vault_value(), AMOUNT);
    assert_eq!(w.tokens_of(&w.vault.address()), AMOUNT);
    assert_eq!(w.tokens_of(&owner), SUPPLY - AMOUNT);
    assert_eq!(w.chain.native_balance(&w.vault.address()), NATIVE);
    assert_eq!(w.vault.events().len(), 1);
    assert_eq!(w.chain.open_checkpoints(), 0);

    w.chain.native_ledger_mut().accept_incoming(&owner);
    w.blacklist().unwrap();
    assert_eq!(w.tokens_of(&owner), SUPPLY);
}

#[test]
fn blacklist_twice_fails() {
    let mut w = funded();
    w.blacklist().unwrap();
    assert_eq!(w.blacklist().unwrap_err(), VaultError::Blacklisted);
    assert_eq!(w.tokens_of(&w.owner), SUPPLY);
}

#[test]
fn blacklist_after_withdraw_fails() {
    let mut w = funded();
    w.chain.advance_time(DURATION);
    w.withdraw().unwrap();

    assert_eq!(w.blacklist().unwrap_err(), VaultError::AlreadyWithdrawn);
    assert_eq!(w.tokens_of(&w.beneficiary), AMOUNT);
}

// ---------------------------------------------------------------------------
// Events & Persistence
// ---------------------------------------------------------------------------

#[test]
fn events_follow_successful_operations() {
    let mut w = funded();
    let _ = w.withdraw();
    w.blacklist().unwrap();

    let events = w.vault.drain_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], VaultEvent::Funded(_)));
    match &events[1] {
        VaultEvent::Blacklisted(e) => {
            assert_eq!(e.reclaimed_amount, AMOUNT);
            assert_eq!(e.reclaimed_native_value, NATIVE);
            assert_eq!(e.asset, Some(w.token));
        }
        other => panic!("expected blacklist, got {other:?}"),
    }
    assert!(events.iter().all(|e| e.vault() == w.vault.address()));
}

#[test]
fn vault_survives_json_round_trip() {
    let w = funded();
    let json = serde_json::to_string(&w.vault).unwrap();
    let restored: VestingVault = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.state(), w.vault.state());
    assert_eq!(restored.owner(), w.owner);
    assert_eq!(restored.beneficiary(), w.beneficiary);
    assert_eq!(restored.events(), w.vault.events());
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn duration() -> impl Strategy<Value = u64> {
        1u64..=100_000_000u64
    }

    fn amount() -> impl Strategy<Value = u128> {
        (1u64..=1_000_000_000_000u64).prop_map(u128::from)
    }

    fn big_world(amount: u128) -> World {
        let mut w = world();
        let owner = w.owner;
        // A second, larger token so amounts above SUPPLY can be escrowed.
        w.token = w.chain.deploy_token(&owner, "Big", "BIG", 18, amount);
        w.approve(amount);
        w
    }

    proptest! {
        /// Withdrawal opens exactly at `funded_at + duration`.
        #[test]
        fn unlock_boundary_is_exact(duration in duration(), amount in amount()) {
            let mut w = big_world(amount);
            w.fund(duration, amount).unwrap();

            w.chain.advance_time(duration - 1);
            let early = w.withdraw();
            let is_not_yet_unlocked = matches!(early, Err(VaultError::NotYetUnlocked { .. }));
            prop_assert!(is_not_yet_unlocked);

            w.chain.advance_time(1);
            prop_assert!(w.withdraw().is_ok());
            prop_assert_eq!(w.tokens_of(&w.beneficiary), amount);
        }

        /// Custody: owner, beneficiary and vault always hold the whole supply.
        #[test]
        fn supply_is_conserved(
            duration in duration(),
            amount in amount(),
            cancel in any::<bool>(),
        ) {
            let mut w = big_world(amount);
            let vault = w.vault.address();
            w.fund(duration, amount).unwrap();

            if cancel {
                w.blacklist().unwrap();
            } else {
                w.chain.advance_time(duration);
                w.withdraw().unwrap();
            }
            let total = w.tokens_of(&w.owner) + w.tokens_of(&w.beneficiary) + w.tokens_of(&vault);
            prop_assert_eq!(total, amount);
            prop_assert_eq!(w.tokens_of(&vault), 0);
            prop_assert_eq!(w.vault.vesting_vault_value(), 0);
        }

        /// A stranger can never move funds, whatever the vault state.
        #[test]
        fn strangers_are_always_rejected(label in "[a-z]{1,12}", elapsed in 0u64..20_000) {
            let mut w = funded();
            let stranger = Address::from_label(&format!("stranger-{label}"));
            w.chain.advance_time(elapsed);

            let withdraw = w.vault.withdraw(&mut w.chain, &stranger);
            let blacklist = w.vault.blacklist_beneficiary(&mut w.chain, &stranger);
            let withdraw_rejected = matches!(withdraw, Err(VaultError::Unauthorized { .. }));
            let blacklist_rejected = matches!(blacklist, Err(VaultError::Unauthorized { .. }));
            prop_assert!(withdraw_rejected);
            prop_assert!(blacklist_rejected);
            prop_assert_eq!(w.tokens_of(&w.vault.address()), AMOUNT);
        }
    }
}
