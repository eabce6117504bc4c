use super::book::BookId;
use super::money::Money;
use super::user::UserId;
use crate::error::{LendingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BorrowingId(pub u32);

impl fmt::Display for BorrowingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a loan: `Borrowed -> Returned`, and nothing leaves
/// `Returned`. `Overdue` is accepted from storage but never written by the
/// engine.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum BorrowingStatus {
    Borrowed,
    Returned,
    Overdue,
}

impl fmt::Display for BorrowingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BorrowingStatus::Borrowed => "borrowed",
            BorrowingStatus::Returned => "returned",
            BorrowingStatus::Overdue => "overdue",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct NewBorrowing {
    pub user_id: UserId,
    pub book_id: BookId,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub notes: Option<String>,
}

impl NewBorrowing {
    pub fn validate(&self) -> Result<()> {
        if self.due_date <= self.borrow_date {
            return Err(LendingError::ConstraintViolation(format!(
                "due date {} must be after borrow date {}",
                self.due_date, self.borrow_date
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Borrowing {
    pub id: BorrowingId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowingStatus,
    pub fine_amount: Money,
    pub fine_paid: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Borrowing {
    pub fn from_new(id: BorrowingId, new: NewBorrowing, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            book_id: new.book_id,
            borrow_date: new.borrow_date,
            due_date: new.due_date,
            return_date: None,
            status: BorrowingStatus::Borrowed,
            fine_amount: Money::ZERO,
            fine_paid: false,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BorrowingStatus::Borrowed
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.due_date < now
    }

    pub fn outstanding_fine(&self) -> Money {
        if self.fine_paid {
            Money::ZERO
        } else {
            self.fine_amount
        }
    }

    /// Applies `update` if the stored status still matches its expectation.
    pub fn apply(&mut self, update: &BorrowingUpdate, now: DateTime<Utc>) -> bool {
        if self.status != update.expected {
            return false;
        }
        self.status = update.status;
        self.return_date = update.return_date;
        self.fine_amount = update.fine_amount;
        self.updated_at = now;
        true
    }
}

/// A compare-and-set status change: it only lands if the record is still in
/// `expected`.
#[derive(Debug, Clone, PartialEq)]
pub struct BorrowingUpdate {
    pub expected: BorrowingStatus,
    pub status: BorrowingStatus,
    pub return_date: Option<DateTime<Utc>>,
    pub fine_amount: Money,
}

impl BorrowingUpdate {
    pub fn mark_returned(return_date: DateTime<Utc>, fine_amount: Money) -> Self {
        Self {
            expected: BorrowingStatus::Borrowed,
            status: BorrowingStatus::Returned,
            return_date: Some(return_date),
            fine_amount,
        }
    }

    /// Undoes [`BorrowingUpdate::mark_returned`].
    pub fn reopen() -> Self {
        Self {
            expected: BorrowingStatus::Returned,
            status: BorrowingStatus::Borrowed,
            return_date: None,
            fine_amount: Money::ZERO,
        }
    }
}
