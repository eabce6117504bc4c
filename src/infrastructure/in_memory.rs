use crate::domain::book::{Book, BookId, NewBook};
use crate::domain::borrowing::{
    Borrowing, BorrowingId, BorrowingStatus, BorrowingUpdate, NewBorrowing,
};
use crate::domain::ports::{BookStore, BorrowingStore, UserStore};
use crate::domain::user::{NewUser, User, UserId, UserProfile, UserStatus};
use crate::error::{LendingError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    books: BTreeMap<BookId, Book>,
    borrowings: BTreeMap<BorrowingId, Borrowing>,
    user_seq: u32,
    book_seq: u32,
    borrowing_seq: u32,
}

fn advance(seq: &mut u32, table: &str) -> Result<u32> {
    *seq = seq.checked_add(1).ok_or_else(|| {
        LendingError::ConstraintViolation(format!("{} id sequence exhausted", table))
    })?;
    Ok(*seq)
}

impl Tables {
    fn next_user_id(&mut self) -> Result<UserId> {
        advance(&mut self.user_seq, "user").map(UserId)
    }

    fn next_book_id(&mut self) -> Result<BookId> {
        advance(&mut self.book_seq, "book").map(BookId)
    }

    fn next_borrowing_id(&mut self) -> Result<BorrowingId> {
        advance(&mut self.borrowing_seq, "borrowing").map(BorrowingId)
    }
}

/// A thread-safe in-memory entity store.
///
/// All three tables sit behind one `Arc<RwLock<..>>`, so every mutation,
/// including the conditional inventory updates and cross-table constraint
/// checks, runs under a single write guard. `Clone` shares the tables.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        user.validate()?;
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables
            .users
            .values()
            .find(|u| u.username == user.username || u.email == user.email)
        {
            let field = if existing.username == user.username {
                "username"
            } else {
                "email"
            };
            return Err(LendingError::ConstraintViolation(format!(
                "duplicate {} for user {}",
                field, existing.id
            )));
        }

        let id = tables.next_user_id()?;
        let user = User::from_new(id, user, Utc::now());
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().cloned().collect())
    }

    async fn update_user_profile(&self, id: UserId, profile: UserProfile) -> Result<bool> {
        profile.validate()?;
        let mut tables = self.tables.write().await;

        if let Some(other) = tables
            .users
            .values()
            .find(|u| u.id != id && u.email == profile.email)
        {
            return Err(LendingError::ConstraintViolation(format!(
                "duplicate email for user {}",
                other.id
            )));
        }
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.apply_profile(profile, Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_user_status(&self, id: UserId, status: UserStatus) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.status = status;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }

        let owned: Vec<BorrowingId> = tables
            .borrowings
            .values()
            .filter(|b| b.user_id == id)
            .map(|b| b.id)
            .collect();
        for borrowing_id in owned {
            if let Some(borrowing) = tables.borrowings.remove(&borrowing_id)
                && borrowing.is_active()
            {
                let restored = tables
                    .books
                    .get_mut(&borrowing.book_id)
                    .is_some_and(Book::restore_copy);
                if !restored {
                    tracing::error!(
                        borrowing = %borrowing_id,
                        book = %borrowing.book_id,
                        "Cascade delete could not return copy to shelf"
                    );
                }
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl BookStore for InMemoryStore {
    async fn insert_book(&self, book: NewBook) -> Result<Book> {
        book.validate()?;
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.books.values().find(|b| b.isbn == book.isbn) {
            return Err(LendingError::ConstraintViolation(format!(
                "duplicate isbn {} for book {}",
                book.isbn, existing.id
            )));
        }

        let id = tables.next_book_id()?;
        let book = Book::from_new(id, book, Utc::now());
        tables.books.insert(id, book.clone());
        Ok(book)
    }

    async fn find_book(&self, id: BookId) -> Result<Option<Book>> {
        let tables = self.tables.read().await;
        Ok(tables.books.get(&id).cloned())
    }

    async fn find_book_by_isbn(&self, isbn: &str) -> Result<Option<Book>> {
        let tables = self.tables.read().await;
        Ok(tables.books.values().find(|b| b.isbn == isbn).cloned())
    }

    async fn all_books(&self) -> Result<Vec<Book>> {
        let tables = self.tables.read().await;
        Ok(tables.books.values().cloned().collect())
    }

    async fn count_available_books(&self) -> Result<usize> {
        let tables = self.tables.read().await;
        Ok(tables.books.values().filter(|b| b.is_lendable()).count())
    }

    async fn delete_book(&self, id: BookId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if let Some(active) = tables
            .borrowings
            .values()
            .find(|b| b.book_id == id && b.is_active())
        {
            return Err(LendingError::ConstraintViolation(format!(
                "book {} is referenced by active borrowing {}",
                id, active.id
            )));
        }
        if tables.books.remove(&id).is_none() {
            return Ok(false);
        }
        // Closed loans go with the book.
        tables.borrowings.retain(|_, b| b.book_id != id);
        Ok(true)
    }

    async fn try_decrement_available(&self, id: BookId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.books.get_mut(&id) {
            Some(book) => {
                let applied = book.take_copy();
                if applied {
                    book.updated_at = Utc::now();
                }
                applied
            }
            None => false,
        })
    }

    async fn try_increment_available(&self, id: BookId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.books.get_mut(&id) {
            Some(book) => {
                let applied = book.restore_copy();
                if applied {
                    book.updated_at = Utc::now();
                }
                applied
            }
            None => false,
        })
    }
}

#[async_trait]
impl BorrowingStore for InMemoryStore {
    async fn insert_borrowing(&self, borrowing: NewBorrowing) -> Result<Borrowing> {
        borrowing.validate()?;
        let mut tables = self.tables.write().await;

        if !tables.users.contains_key(&borrowing.user_id) {
            return Err(LendingError::ConstraintViolation(format!(
                "borrowing references missing user {}",
                borrowing.user_id
            )));
        }
        if !tables.books.contains_key(&borrowing.book_id) {
            return Err(LendingError::ConstraintViolation(format!(
                "borrowing references missing book {}",
                borrowing.book_id
            )));
        }

        let id = tables.next_borrowing_id()?;
        let borrowing = Borrowing::from_new(id, borrowing, Utc::now());
        tables.borrowings.insert(id, borrowing.clone());
        Ok(borrowing)
    }

    async fn find_borrowing(&self, id: BorrowingId) -> Result<Option<Borrowing>> {
        let tables = self.tables.read().await;
        Ok(tables.borrowings.get(&id).cloned())
    }

    async fn count_active_borrowings(&self, user_id: UserId) -> Result<u32> {
        let tables = self.tables.read().await;
        let count = tables
            .borrowings
            .values()
            .filter(|b| b.user_id == user_id && b.is_active())
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn borrowings_for_user(&self, user_id: UserId) -> Result<Vec<Borrowing>> {
        let tables = self.tables.read().await;
        Ok(tables
            .borrowings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn all_borrowings(&self) -> Result<Vec<Borrowing>> {
        let tables = self.tables.read().await;
        Ok(tables.borrowings.values().cloned().collect())
    }

    async fn update_borrowing_status(
        &self,
        id: BorrowingId,
        update: BorrowingUpdate,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .borrowings
            .get_mut(&id)
            .is_some_and(|b| b.apply(&update, Utc::now())))
    }

    async fn mark_fine_paid(&self, id: BorrowingId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.borrowings.get_mut(&id) {
            Some(b)
                if b.status == BorrowingStatus::Returned
                    && b.fine_amount.is_positive()
                    && !b.fine_paid =>
            {
                b.fine_paid = true;
                b.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    async fn seeded() -> (InMemoryStore, User, Book) {
        let store = InMemoryStore::new();
        let user = store
            .insert_user(NewUser::new("ana", "ana@example.org"))
            .await
            .unwrap();
        let book = store
            .insert_book(NewBook::new("978-0", "Dune", 2))
            .await
            .unwrap();
        (store, user, book)
    }

    fn loan(user: UserId, book: BookId) -> NewBorrowing {
        let now = Utc::now();
        NewBorrowing {
            user_id: user,
            book_id: book,
            borrow_date: now,
            due_date: now + TimeDelta::days(7),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_user_uniqueness() {
        let (store, _, _) = seeded().await;

        let dup_name = store
            .insert_user(NewUser::new("ana", "other@example.org"))
            .await;
        assert!(matches!(dup_name, Err(LendingError::ConstraintViolation(m)) if m.contains("username")));

        let dup_email = store
            .insert_user(NewUser::new("bo", "ana@example.org"))
            .await;
        assert!(matches!(dup_email, Err(LendingError::ConstraintViolation(m)) if m.contains("email")));
    }

    #[tokio::test]
    async fn test_isbn_uniqueness() {
        let (store, _, _) = seeded().await;
        let dup = store.insert_book(NewBook::new("978-0", "Dune II", 1)).await;
        assert!(matches!(dup, Err(LendingError::ConstraintViolation(_))));
        assert_eq!(store.all_books().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let (store, user, book) = seeded().await;
        assert_eq!(user.id, UserId(1));
        assert_eq!(book.id, BookId(1));

        let second = store
            .insert_user(NewUser::new("bo", "bo@example.org"))
            .await
            .unwrap();
        assert_eq!(second.id, UserId(2));
    }

    #[tokio::test]
    async fn test_exhausted_sequence_is_rejected() {
        let (store, _, _) = seeded().await;
        store.tables.write().await.user_seq = u32::MAX;

        let result = store
            .insert_user(NewUser::new("bo", "bo@example.org"))
            .await;
        assert!(matches!(result, Err(LendingError::ConstraintViolation(m)) if m.contains("exhausted")));
        assert_eq!(store.all_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_conditional_inventory_updates() {
        let (store, _, book) = seeded().await;

        // Shelf is full.
        assert!(!store.try_increment_available(book.id).await.unwrap());

        assert!(store.try_decrement_available(book.id).await.unwrap());
        assert!(store.try_decrement_available(book.id).await.unwrap());
        assert!(!store.try_decrement_available(book.id).await.unwrap());

        let empty = store.find_book(book.id).await.unwrap().unwrap();
        assert_eq!(empty.available_copies, 0);

        assert!(store.try_increment_available(book.id).await.unwrap());
        assert!(!store.try_decrement_available(BookId(99)).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_borrowing_checks_foreign_keys() {
        let (store, user, book) = seeded().await;

        let missing_user = store.insert_borrowing(loan(UserId(42), book.id)).await;
        assert!(matches!(missing_user, Err(LendingError::ConstraintViolation(m)) if m.contains("user")));

        let missing_book = store.insert_borrowing(loan(user.id, BookId(42))).await;
        assert!(matches!(missing_book, Err(LendingError::ConstraintViolation(m)) if m.contains("book")));

        let ok = store.insert_borrowing(loan(user.id, book.id)).await.unwrap();
        assert_eq!(ok.status, BorrowingStatus::Borrowed);
        assert_eq!(store.count_active_borrowings(user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_borrowing_checks_due_date() {
        let (store, user, book) = seeded().await;
        let mut bad = loan(user.id, book.id);
        bad.due_date = bad.borrow_date - TimeDelta::days(1);
        assert!(matches!(
            store.insert_borrowing(bad).await,
            Err(LendingError::ConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_status_update_is_compare_and_set() {
        let (store, user, book) = seeded().await;
        let b = store.insert_borrowing(loan(user.id, book.id)).await.unwrap();
        let at = Utc::now();

        let update = BorrowingUpdate::mark_returned(at, Default::default());
        assert!(store.update_borrowing_status(b.id, update.clone()).await.unwrap());
        assert!(!store.update_borrowing_status(b.id, update).await.unwrap());
        assert_eq!(store.count_active_borrowings(user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_user_cascades_and_restores_copies() {
        let (store, user, book) = seeded().await;
        assert!(store.try_decrement_available(book.id).await.unwrap());
        store.insert_borrowing(loan(user.id, book.id)).await.unwrap();

        assert!(store.delete_user(user.id).await.unwrap());
        assert!(store.borrowings_for_user(user.id).await.unwrap().is_empty());

        let book = store.find_book(book.id).await.unwrap().unwrap();
        assert_eq!(book.available_copies, book.total_copies);

        assert!(!store.delete_user(user.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_book_restricted_by_active_borrowing() {
        let (store, user, book) = seeded().await;
        let b = store.insert_borrowing(loan(user.id, book.id)).await.unwrap();

        assert!(matches!(
            store.delete_book(book.id).await,
            Err(LendingError::ConstraintViolation(_))
        ));

        let update = BorrowingUpdate::mark_returned(Utc::now(), Default::default());
        store.update_borrowing_status(b.id, update).await.unwrap();
        assert!(store.delete_book(book.id).await.unwrap());
        assert!(store.find_book(book.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_updated_at_moves_on_mutation() {
        let (store, user, _) = seeded().await;
        assert!(
            store
                .update_user_status(user.id, UserStatus::Suspended)
                .await
                .unwrap()
        );
        let updated = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(updated.status, UserStatus::Suspended);
        assert!(updated.updated_at >= user.updated_at);
        assert_eq!(updated.created_at, user.created_at);
    }
}
