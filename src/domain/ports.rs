use super::book::{Book, BookId, NewBook};
use super::borrowing::{Borrowing, BorrowingId, BorrowingUpdate, NewBorrowing};
use super::user::{NewUser, User, UserId, UserProfile, UserStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Storage for users. Implementations enforce username and email
/// uniqueness and keep `updated_at` current.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<User>;
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn all_users(&self) -> Result<Vec<User>>;
    /// Replaces the profile fields. Fails with `ConstraintViolation` when the
    /// new email belongs to another user.
    async fn update_user_profile(&self, id: UserId, profile: UserProfile) -> Result<bool>;
    async fn update_user_status(&self, id: UserId, status: UserStatus) -> Result<bool>;
    /// Deletes the user and cascades to their borrowings. Copies held by
    /// still-active borrowings go back on the shelf.
    async fn delete_user(&self, id: UserId) -> Result<bool>;
}

/// Storage for the catalog and its inventory counters.
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn insert_book(&self, book: NewBook) -> Result<Book>;
    async fn find_book(&self, id: BookId) -> Result<Option<Book>>;
    async fn find_book_by_isbn(&self, isbn: &str) -> Result<Option<Book>>;
    async fn all_books(&self) -> Result<Vec<Book>>;
    /// Number of books with at least one copy on the shelf.
    async fn count_available_books(&self) -> Result<usize> {
        Ok(self
            .all_books()
            .await?
            .iter()
            .filter(|b| b.is_lendable())
            .count())
    }
    /// Refused with `ConstraintViolation` while an active borrowing
    /// references the book. Closed borrowings are deleted with it.
    async fn delete_book(&self, id: BookId) -> Result<bool>;

    /// Atomically takes one copy if `available_copies > 0`. Returns whether
    /// the write applied; `false` also covers a missing book.
    async fn try_decrement_available(&self, id: BookId) -> Result<bool>;
    /// Atomically returns one copy if `available_copies < total_copies`.
    async fn try_increment_available(&self, id: BookId) -> Result<bool>;
}

/// Storage for loans.
#[async_trait]
pub trait BorrowingStore: Send + Sync {
    /// Assigns identity and timestamps. Fails with `ConstraintViolation` when
    /// the user or book does not exist or `due_date <= borrow_date`.
    async fn insert_borrowing(&self, borrowing: NewBorrowing) -> Result<Borrowing>;
    async fn find_borrowing(&self, id: BorrowingId) -> Result<Option<Borrowing>>;
    async fn count_active_borrowings(&self, user_id: UserId) -> Result<u32>;
    async fn borrowings_for_user(&self, user_id: UserId) -> Result<Vec<Borrowing>>;
    async fn all_borrowings(&self) -> Result<Vec<Borrowing>>;
    /// Compare-and-set on the status column; see [`BorrowingUpdate`].
    async fn update_borrowing_status(&self, id: BorrowingId, update: BorrowingUpdate)
    -> Result<bool>;
    /// Sets `fine_paid` if the loan is returned and the fine is unpaid.
    async fn mark_fine_paid(&self, id: BorrowingId) -> Result<bool>;
}

pub type UserStoreBox = Box<dyn UserStore>;
pub type BookStoreBox = Box<dyn BookStore>;
pub type BorrowingStoreBox = Box<dyn BorrowingStore>;
