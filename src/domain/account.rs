use crate::error::{ExecutionError, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Ledger-wide account identifier. Valid identifiers are strictly positive.
pub type AccountId = i64;

/// Represents a monetary value held by an account.
///
/// This is a wrapper around `rust_decimal::Decimal` to enforce domain-specific rules
/// and provide type safety for financial calculations. The scale of the decimal is
/// preserved through arithmetic, so `100.00 - 25.50` stays `74.50`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(pub Decimal);

/// Represents a strictly positive monetary amount moved by a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, ValidationError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(ValidationError::NonPositiveAmount)
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// `self + amount`, or `None` if the sum overflows or cannot be held without rounding.
    pub fn checked_credit(self, amount: Amount) -> Option<Self> {
        exact(self.0.checked_add(amount.0), self.0, amount.0).map(Self)
    }

    /// `self - amount`, or `None` if the difference cannot be held without rounding.
    pub fn checked_debit(self, amount: Amount) -> Option<Self> {
        exact(self.0.checked_sub(amount.0), self.0, amount.0).map(Self)
    }
}

/// `rust_decimal` rounds a result whose mantissa no longer fits by lowering its
/// scale. An exact sum or difference keeps the larger operand scale.
fn exact(result: Option<Decimal>, lhs: Decimal, rhs: Decimal) -> Option<Decimal> {
    result.filter(|value| value.scale() >= lhs.scale().max(rhs.scale()))
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Balance {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Balance::ZERO, Add::add)
    }
}

/// A monetary account as stored in the ledger.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Account {
    /// The unique, immutable account identifier.
    pub id: AccountId,
    /// Current balance. Never committed below zero.
    pub balance: Balance,
}

impl Account {
    pub fn new(id: AccountId, balance: Balance) -> Self {
        Self { id, balance }
    }

    /// Adds funds to the balance. Fails, leaving the account untouched, when
    /// the new balance is not exactly representable.
    pub fn credit(&mut self, amount: Amount) -> Result<(), ExecutionError> {
        self.balance = self
            .balance
            .checked_credit(amount)
            .ok_or(ExecutionError::BalanceOutOfRange { id: self.id })?;
        Ok(())
    }

    /// Removes funds if the balance covers them; otherwise leaves the account untouched.
    pub fn debit(&mut self, amount: Amount) -> Result<(), ExecutionError> {
        if self.balance < Balance::from(amount) {
            return Err(ExecutionError::InsufficientFunds {
                id: self.id,
                available: self.balance,
                requested: amount.value(),
            });
        }
        self.balance = self
            .balance
            .checked_debit(amount)
            .ok_or(ExecutionError::BalanceOutOfRange { id: self.id })?;
        Ok(())
    }
}
