//! Lending rules: who may borrow, when a loan falls due, and what a late
//! return costs. Everything here is pure and deterministic.

use super::book::Book;
use super::money::{DailyRate, Money};
use super::user::User;
use crate::error::{LendingError, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Why a borrow request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    UserNotActive,
    NoCopiesAvailable,
    LendingLimitReached,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenialReason::UserNotActive => "user not active",
            DenialReason::NoCopiesAvailable => "no copies available",
            DenialReason::LendingLimitReached => "lending limit reached",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenialReason),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LendingPolicy {
    /// Maximum simultaneous `borrowed` loans per user.
    pub max_active_loans: u32,
    pub daily_fine_rate: DailyRate,
    pub default_loan_days: i64,
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self {
            max_active_loans: 5,
            daily_fine_rate: DailyRate::default(),
            default_loan_days: 14,
        }
    }
}

impl LendingPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_active_loans == 0 {
            return Err(LendingError::InvalidConfig(
                "max_active_loans must be at least 1".to_string(),
            ));
        }
        if self.default_loan_days <= 0 {
            return Err(LendingError::InvalidConfig(format!(
                "default_loan_days must be positive, got {}",
                self.default_loan_days
            )));
        }
        Ok(())
    }

    /// Rules are checked in a fixed order (user status, availability,
    /// limit) and the first failure is reported.
    pub fn can_borrow(&self, user: &User, book: &Book, active_loans: u32) -> Decision {
        if !user.is_active() {
            Decision::Deny(DenialReason::UserNotActive)
        } else if !book.is_lendable() {
            Decision::Deny(DenialReason::NoCopiesAvailable)
        } else if active_loans >= self.max_active_loans {
            Decision::Deny(DenialReason::LendingLimitReached)
        } else {
            Decision::Allow
        }
    }

    pub fn compute_due_date(
        &self,
        borrow_date: DateTime<Utc>,
        loan_days: i64,
    ) -> Result<DateTime<Utc>> {
        compute_due_date(borrow_date, loan_days)
    }

    pub fn compute_fine(&self, due_date: DateTime<Utc>, return_date: DateTime<Utc>) -> Money {
        compute_fine(due_date, return_date, self.daily_fine_rate)
    }
}

/// `borrow_date + loan_days`. A non-positive period is a caller bug.
pub fn compute_due_date(borrow_date: DateTime<Utc>, loan_days: i64) -> Result<DateTime<Utc>> {
    if loan_days <= 0 {
        return Err(LendingError::InvalidLoanPeriod(loan_days));
    }
    TimeDelta::try_days(loan_days)
        .and_then(|period| borrow_date.checked_add_signed(period))
        .ok_or(LendingError::InvalidLoanPeriod(loan_days))
}

/// Every started day past `due_date` costs one `daily_rate`.
pub fn compute_fine(
    due_date: DateTime<Utc>,
    return_date: DateTime<Utc>,
    daily_rate: DailyRate,
) -> Money {
    if return_date <= due_date {
        return Money::ZERO;
    }
    // Sub-millisecond lateness still counts as late.
    let late_ms = (return_date - due_date).num_milliseconds().max(1);
    let days_late = (late_ms + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY;
    daily_rate.for_days(days_late)
}
