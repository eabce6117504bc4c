use super::inventory::InventoryCounter;
use super::locks::KeyedLocks;
use crate::domain::book::BookId;
use crate::domain::borrowing::{
    Borrowing, BorrowingId, BorrowingStatus, BorrowingUpdate, NewBorrowing,
};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::command::{CommandType, LendingCommand};
use crate::domain::money::Money;
use crate::domain::policy::{Decision, LendingPolicy};
use crate::domain::ports::{BookStoreBox, BorrowingStoreBox, UserStoreBox};
use crate::domain::user::UserId;
use crate::error::{EntityRef, LendingError, Result};
use chrono::TimeDelta;

/// What a processed [`LendingCommand`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Borrowed(Borrowing),
    Returned(BorrowingId),
    FinePaid(Borrowing),
}

/// The borrowing lifecycle engine.
///
/// `LendingEngine` runs each borrow or return as a fixed sequence of policy
/// checks and single-row store operations. It keeps no copy of inventory
/// between calls; when a later step fails after an earlier write landed, it
/// compensates so callers observe either the full result or the original
/// state plus an error.
///
/// The engine is `Send + Sync` and meant to be shared behind an `Arc` by
/// concurrent callers.
pub struct LendingEngine {
    users: UserStoreBox,
    books: BookStoreBox,
    borrowings: BorrowingStoreBox,
    policy: LendingPolicy,
    clock: Box<dyn Clock>,
    user_locks: KeyedLocks<UserId>,
}

impl LendingEngine {
    /// Creates a new `LendingEngine` backed by the system clock.
    ///
    /// # Arguments
    ///
    /// * `users` - The store for users.
    /// * `books` - The store for the catalog and inventory counters.
    /// * `borrowings` - The store for loans.
    /// * `policy` - The lending rules to enforce.
    pub fn new(
        users: UserStoreBox,
        books: BookStoreBox,
        borrowings: BorrowingStoreBox,
        policy: LendingPolicy,
    ) -> Self {
        Self {
            users,
            books,
            borrowings,
            policy,
            clock: Box::new(SystemClock),
            user_locks: KeyedLocks::new(),
        }
    }

    /// Replaces the clock used for borrow dates, return dates and fines.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn policy(&self) -> &LendingPolicy {
        &self.policy
    }

    fn inventory(&self) -> InventoryCounter<'_> {
        InventoryCounter::new(&*self.books)
    }

    /// Lends one copy of `book_id` to `user_id` for `loan_days` days.
    ///
    /// Fails with `NotFound` for an unknown user or book, `PolicyViolation`
    /// when the lending rules refuse, and `Conflict` when another request
    /// took the last copy between the policy check and the decrement. A
    /// `Conflict` is safe to retry.
    #[tracing::instrument(skip(self))]
    pub async fn borrow(
        &self,
        user_id: UserId,
        book_id: BookId,
        loan_days: i64,
    ) -> Result<Borrowing> {
        if loan_days <= 0 {
            return Err(LendingError::InvalidLoanPeriod(loan_days));
        }

        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(LendingError::NotFound(EntityRef::User(user_id)))?;
        let book = self
            .books
            .find_book(book_id)
            .await?
            .ok_or(LendingError::NotFound(EntityRef::Book(book_id)))?;

        // Held from the count to the insert so concurrent requests for one
        // user cannot overshoot the lending limit.
        let _user_guard = self.user_locks.lock(user_id).await;

        let active_loans = self.borrowings.count_active_borrowings(user_id).await?;
        if let Decision::Deny(reason) = self.policy.can_borrow(&user, &book, active_loans) {
            tracing::warn!(%reason, active_loans, "Borrow denied");
            return Err(LendingError::PolicyViolation(reason));
        }

        if !self.inventory().try_decrement(book_id).await? {
            tracing::warn!("Inventory exhausted by a concurrent borrower");
            return Err(LendingError::Conflict(book_id));
        }

        let borrow_date = self.clock.now();
        let due_date = match self.policy.compute_due_date(borrow_date, loan_days) {
            Ok(due_date) => due_date,
            Err(e) => {
                self.release_copy(book_id).await;
                return Err(e);
            }
        };

        let new = NewBorrowing {
            user_id,
            book_id,
            borrow_date,
            due_date,
            notes: None,
        };
        match self.borrowings.insert_borrowing(new).await {
            Ok(borrowing) => {
                tracing::info!(borrowing = %borrowing.id, due = %borrowing.due_date, "Book borrowed");
                Ok(borrowing)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Persisting borrowing failed, restoring inventory");
                self.release_copy(book_id).await;
                Err(e)
            }
        }
    }

    /// [`LendingEngine::borrow`] with the policy's default loan period.
    pub async fn borrow_default(&self, user_id: UserId, book_id: BookId) -> Result<Borrowing> {
        self.borrow(user_id, book_id, self.policy.default_loan_days)
            .await
    }

    /// Compensation for a decrement whose borrowing never got persisted.
    async fn release_copy(&self, book_id: BookId) {
        match self.inventory().try_increment(book_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!(book = %book_id, "Compensation found shelf already full");
            }
            Err(e) => {
                tracing::error!(book = %book_id, error = %e, "Compensation failed, copy not restored");
            }
        }
    }

    /// Closes an open loan, records any fine and puts the copy back.
    ///
    /// Returning an already returned loan fails with `InvalidTransition` and
    /// leaves inventory untouched. If the copy cannot be put back the loan is
    /// reopened and `Inconsistency` is reported.
    #[tracing::instrument(skip(self))]
    pub async fn return_book(&self, borrowing_id: BorrowingId) -> Result<bool> {
        let borrowing = self
            .borrowings
            .find_borrowing(borrowing_id)
            .await?
            .ok_or(LendingError::NotFound(EntityRef::Borrowing(borrowing_id)))?;

        if borrowing.status != BorrowingStatus::Borrowed {
            tracing::warn!(status = %borrowing.status, "Return rejected");
            return Err(LendingError::InvalidTransition {
                id: borrowing_id,
                status: borrowing.status,
            });
        }

        let now = self.clock.now();
        let return_date = if now > borrowing.borrow_date {
            now
        } else {
            borrowing.borrow_date + TimeDelta::milliseconds(1)
        };
        let fine = self.policy.compute_fine(borrowing.due_date, return_date);

        let update = BorrowingUpdate::mark_returned(return_date, fine);
        if !self
            .borrowings
            .update_borrowing_status(borrowing_id, update)
            .await?
        {
            // Someone else moved it between our read and write.
            return match self.borrowings.find_borrowing(borrowing_id).await? {
                Some(current) => Err(LendingError::InvalidTransition {
                    id: borrowing_id,
                    status: current.status,
                }),
                None => Err(LendingError::NotFound(EntityRef::Borrowing(borrowing_id))),
            };
        }

        match self.inventory().try_increment(borrowing.book_id).await {
            Ok(true) => {
                tracing::info!(%fine, "Book returned");
                Ok(true)
            }
            Ok(false) => {
                // A book with no active loan may be deleted between the status
                // write and the increment; its closed loans go with it.
                if let Ok(None) = self.books.find_book(borrowing.book_id).await {
                    tracing::warn!(book = %borrowing.book_id, "Book removed while its copy was being returned");
                    return Ok(true);
                }
                let message = format!(
                    "book {} had every copy on the shelf while borrowing {} was open",
                    borrowing.book_id, borrowing_id
                );
                tracing::error!(book = %borrowing.book_id, "{}", message);
                self.reopen(borrowing_id).await;
                Err(LendingError::Inconsistency(message))
            }
            Err(e) => {
                tracing::error!(error = %e, "Inventory increment failed after status write");
                self.reopen(borrowing_id).await;
                Err(e)
            }
        }
    }

    /// Compensation for a status write whose increment did not land.
    async fn reopen(&self, borrowing_id: BorrowingId) {
        match self
            .borrowings
            .update_borrowing_status(borrowing_id, BorrowingUpdate::reopen())
            .await
        {
            Ok(true) => {
                tracing::warn!(borrowing = %borrowing_id, "Return reverted");
            }
            Ok(false) => {
                tracing::error!(borrowing = %borrowing_id, "Return could not be reverted, status changed");
            }
            Err(e) => {
                tracing::error!(borrowing = %borrowing_id, error = %e, "Return could not be reverted");
            }
        }
    }

    /// Settles the fine of a returned loan.
    #[tracing::instrument(skip(self))]
    pub async fn pay_fine(&self, borrowing_id: BorrowingId) -> Result<Borrowing> {
        let borrowing = self.borrowing(borrowing_id).await?;
        if borrowing.status != BorrowingStatus::Returned {
            return Err(LendingError::InvalidTransition {
                id: borrowing_id,
                status: borrowing.status,
            });
        }
        if !borrowing.outstanding_fine().is_positive()
            || !self.borrowings.mark_fine_paid(borrowing_id).await?
        {
            return Err(LendingError::NoOutstandingFine(borrowing_id));
        }
        tracing::info!(fine = %borrowing.fine_amount, "Fine paid");
        self.borrowing(borrowing_id).await
    }

    pub async fn borrowing(&self, borrowing_id: BorrowingId) -> Result<Borrowing> {
        self.borrowings
            .find_borrowing(borrowing_id)
            .await?
            .ok_or(LendingError::NotFound(EntityRef::Borrowing(borrowing_id)))
    }

    pub async fn borrowings_for_user(&self, user_id: UserId) -> Result<Vec<Borrowing>> {
        self.borrowings.borrowings_for_user(user_id).await
    }

    pub async fn all_borrowings(&self) -> Result<Vec<Borrowing>> {
        self.borrowings.all_borrowings().await
    }

    /// Open loans past their due date, as of the engine's clock.
    pub async fn overdue_borrowings(&self) -> Result<Vec<Borrowing>> {
        let now = self.clock.now();
        Ok(self
            .borrowings
            .all_borrowings()
            .await?
            .into_iter()
            .filter(|b| b.is_overdue_at(now))
            .collect())
    }

    pub async fn outstanding_fines(&self, user_id: UserId) -> Result<Money> {
        Ok(self
            .borrowings
            .borrowings_for_user(user_id)
            .await?
            .iter()
            .map(Borrowing::outstanding_fine)
            .sum())
    }

    /// Dispatches one command read from a command file.
    pub async fn process_command(&self, command: LendingCommand) -> Result<CommandOutcome> {
        match command.r#type {
            CommandType::Borrow => {
                let user = command.user.ok_or_else(|| {
                    LendingError::MalformedCommand("borrow requires a user".to_string())
                })?;
                let book = command.book.ok_or_else(|| {
                    LendingError::MalformedCommand("borrow requires a book".to_string())
                })?;
                let days = command.days.unwrap_or(self.policy.default_loan_days);
                self.borrow(user, book, days)
                    .await
                    .map(CommandOutcome::Borrowed)
            }
            CommandType::Return => {
                let id = command.borrowing.ok_or_else(|| {
                    LendingError::MalformedCommand("return requires a borrowing".to_string())
                })?;
                self.return_book(id).await?;
                Ok(CommandOutcome::Returned(id))
            }
            CommandType::Pay => {
                let id = command.borrowing.ok_or_else(|| {
                    LendingError::MalformedCommand("pay requires a borrowing".to_string())
                })?;
                self.pay_fine(id).await.map(CommandOutcome::FinePaid)
            }
        }
    }
}
