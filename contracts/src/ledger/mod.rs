//! # Ledgers
//!
//! The two value-bearing capabilities a vault consumes but does not own:
//!
//! - [`AssetLedger`] — a fungible token with balances and allowances
//!   (`transfer`, `transfer_from`, `balance_of`). [`Erc20Ledger`] is the
//!   in-memory implementation.
//! - [`ValueTransfer`] — native-currency balances and a fallible `send`.
//!   [`NativeLedger`] is the in-memory implementation.
//!
//! Both report failures through the shared [`LedgerError`].

pub mod asset;
pub mod native;

pub use asset::{AssetLedger, Erc20Ledger};
pub use native::{NativeLedger, ValueTransfer};

use thiserror::Error;

use crate::address::Address;

/// Errors raised by a ledger when it refuses to move value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The sender does not hold enough units.
    #[error("insufficient balance: {holder} has {balance}, requested {requested}")]
    InsufficientBalance {
        /// Account being debited.
        holder: Address,
        /// Its current balance.
        balance: u128,
        /// Amount requested.
        requested: u128,
    },

    /// The spender has not been authorized for this much.
    #[error(
        "insufficient allowance: {spender} may move {allowance} of {owner}'s balance, requested {requested}"
    )]
    InsufficientAllowance {
        /// Account whose balance would be moved.
        owner: Address,
        /// Account attempting the move.
        spender: Address,
        /// Remaining allowance.
        allowance: u128,
        /// Amount requested.
        requested: u128,
    },

    /// Value cannot be sent to or from the zero address.
    #[error("transfer involving the zero address")]
    ZeroAddress,

    /// Crediting would exceed `u128::MAX`.
    #[error("balance overflow")]
    Overflow,

    /// The recipient refuses incoming value.
    #[error("recipient {recipient} rejected the transfer")]
    RecipientRejected {
        /// The refusing account.
        recipient: Address,
    },
}
