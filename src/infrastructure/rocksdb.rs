use crate::domain::book::{Book, BookId, NewBook};
use crate::domain::borrowing::{
    Borrowing, BorrowingId, BorrowingStatus, BorrowingUpdate, NewBorrowing,
};
use crate::domain::ports::{BookStore, BorrowingStore, UserStore};
use crate::domain::user::{NewUser, User, UserId, UserProfile, UserStatus};
use crate::error::{LendingError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for user records.
pub const CF_USERS: &str = "users";
/// Column Family for the catalog.
pub const CF_BOOKS: &str = "books";
/// Column Family for loans.
pub const CF_BORROWINGS: &str = "borrowings";
/// Column Family for id sequences.
pub const CF_META: &str = "meta";

const SEQ_USERS: &[u8] = b"seq:users";
const SEQ_BOOKS: &[u8] = b"seq:books";
const SEQ_BORROWINGS: &[u8] = b"seq:borrowings";

/// A persistent entity store using RocksDB.
///
/// Users, books and borrowings live in separate Column Families, keyed by
/// their big-endian id. Every mutation runs under one write gate and lands
/// as a single `WriteBatch`, which makes each conditional update
/// (inventory counters, status compare-and-set, cascades) atomic for all
/// clones of this store. Reads bypass the gate.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_gate: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_USERS, CF_BOOKS, CF_BORROWINGS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            LendingError::StorageError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: u32) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        key: u32,
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        batch.put_cf(cf, key.to_be_bytes(), serde_json::to_vec(value)?);
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    /// Advances a sequence inside `batch`. Only call with the gate held.
    fn next_id(&self, batch: &mut WriteBatch, seq: &[u8]) -> Result<u32> {
        let cf = self.cf(CF_META)?;
        let current = match self.db.get_cf(cf, seq)? {
            Some(bytes) => {
                let raw: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    LendingError::StorageError(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "corrupt id sequence",
                    )))
                })?;
                u32::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = current.checked_add(1).ok_or_else(|| {
            LendingError::StorageError(Box::new(std::io::Error::other(format!(
                "id sequence {} exhausted",
                String::from_utf8_lossy(seq)
            ))))
        })?;
        batch.put_cf(cf, seq, next.to_be_bytes());
        Ok(next)
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.db.write(batch)?;
        Ok(())
    }

    fn insert_user_locked(&self, new: NewUser) -> Result<User> {
        let users: Vec<User> = self.scan(CF_USERS)?;
        if let Some(existing) = users
            .iter()
            .find(|u| u.username == new.username || u.email == new.email)
        {
            let field = if existing.username == new.username {
                "username"
            } else {
                "email"
            };
            return Err(LendingError::ConstraintViolation(format!(
                "duplicate {} for user {}",
                field, existing.id
            )));
        }

        let mut batch = WriteBatch::default();
        let id = UserId(self.next_id(&mut batch, SEQ_USERS)?);
        let user = User::from_new(id, new, Utc::now());
        self.put_json(&mut batch, CF_USERS, id.0, &user)?;
        self.commit(batch)?;
        Ok(user)
    }

    fn update_user_profile_locked(&self, id: UserId, profile: UserProfile) -> Result<bool> {
        let users: Vec<User> = self.scan(CF_USERS)?;
        if let Some(other) = users
            .iter()
            .find(|u| u.id != id && u.email == profile.email)
        {
            return Err(LendingError::ConstraintViolation(format!(
                "duplicate email for user {}",
                other.id
            )));
        }
        let Some(mut user) = users.into_iter().find(|u| u.id == id) else {
            return Ok(false);
        };
        user.apply_profile(profile, Utc::now());
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_USERS, id.0, &user)?;
        self.commit(batch)?;
        Ok(true)
    }

    fn delete_user_locked(&self, id: UserId) -> Result<bool> {
        if self.get_json::<User>(CF_USERS, id.0)?.is_none() {
            return Ok(false);
        }

        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_USERS)?, id.0.to_be_bytes());

        let owned: Vec<Borrowing> = self
            .scan::<Borrowing>(CF_BORROWINGS)?
            .into_iter()
            .filter(|b| b.user_id == id)
            .collect();
        // Several loans may point at one book; restore against the pending copy.
        let mut touched: BTreeMap<BookId, Book> = BTreeMap::new();
        for borrowing in owned {
            batch.delete_cf(self.cf(CF_BORROWINGS)?, borrowing.id.0.to_be_bytes());
            if !borrowing.is_active() {
                continue;
            }
            let book = match touched.entry(borrowing.book_id) {
                Entry::Occupied(slot) => Some(slot.into_mut()),
                Entry::Vacant(slot) => self
                    .get_json::<Book>(CF_BOOKS, borrowing.book_id.0)?
                    .map(|book| slot.insert(book)),
            };
            if !book.is_some_and(Book::restore_copy) {
                tracing::error!(
                    borrowing = %borrowing.id,
                    book = %borrowing.book_id,
                    "Cascade delete could not return copy to shelf"
                );
            }
        }
        let now = Utc::now();
        for (book_id, mut book) in touched {
            book.updated_at = now;
            self.put_json(&mut batch, CF_BOOKS, book_id.0, &book)?;
        }

        self.commit(batch)?;
        Ok(true)
    }

    fn insert_book_locked(&self, new: NewBook) -> Result<Book> {
        let books: Vec<Book> = self.scan(CF_BOOKS)?;
        if let Some(existing) = books.iter().find(|b| b.isbn == new.isbn) {
            return Err(LendingError::ConstraintViolation(format!(
                "duplicate isbn {} for book {}",
                new.isbn, existing.id
            )));
        }

        let mut batch = WriteBatch::default();
        let id = BookId(self.next_id(&mut batch, SEQ_BOOKS)?);
        let book = Book::from_new(id, new, Utc::now());
        self.put_json(&mut batch, CF_BOOKS, id.0, &book)?;
        self.commit(batch)?;
        Ok(book)
    }

    fn delete_book_locked(&self, id: BookId) -> Result<bool> {
        let related: Vec<Borrowing> = self
            .scan::<Borrowing>(CF_BORROWINGS)?
            .into_iter()
            .filter(|b| b.book_id == id)
            .collect();
        if let Some(active) = related.iter().find(|b| b.is_active()) {
            return Err(LendingError::ConstraintViolation(format!(
                "book {} is referenced by active borrowing {}",
                id, active.id
            )));
        }
        if self.get_json::<Book>(CF_BOOKS, id.0)?.is_none() {
            return Ok(false);
        }

        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_BOOKS)?, id.0.to_be_bytes());
        for borrowing in related {
            batch.delete_cf(self.cf(CF_BORROWINGS)?, borrowing.id.0.to_be_bytes());
        }
        self.commit(batch)?;
        Ok(true)
    }

    /// Read-modify-write of one book row. Only call with the gate held.
    fn adjust_book_locked(&self, id: BookId, adjust: fn(&mut Book) -> bool) -> Result<bool> {
        let Some(mut book) = self.get_json::<Book>(CF_BOOKS, id.0)? else {
            return Ok(false);
        };
        if !adjust(&mut book) {
            return Ok(false);
        }
        book.updated_at = Utc::now();
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_BOOKS, id.0, &book)?;
        self.commit(batch)?;
        Ok(true)
    }

    fn insert_borrowing_locked(&self, new: NewBorrowing) -> Result<Borrowing> {
        if self.get_json::<User>(CF_USERS, new.user_id.0)?.is_none() {
            return Err(LendingError::ConstraintViolation(format!(
                "borrowing references missing user {}",
                new.user_id
            )));
        }
        if self.get_json::<Book>(CF_BOOKS, new.book_id.0)?.is_none() {
            return Err(LendingError::ConstraintViolation(format!(
                "borrowing references missing book {}",
                new.book_id
            )));
        }

        let mut batch = WriteBatch::default();
        let id = BorrowingId(self.next_id(&mut batch, SEQ_BORROWINGS)?);
        let borrowing = Borrowing::from_new(id, new, Utc::now());
        self.put_json(&mut batch, CF_BORROWINGS, id.0, &borrowing)?;
        self.commit(batch)?;
        Ok(borrowing)
    }

    /// Read-modify-write of one borrowing row. Only call with the gate held.
    fn modify_borrowing_locked(
        &self,
        id: BorrowingId,
        modify: impl FnOnce(&mut Borrowing) -> bool,
    ) -> Result<bool> {
        let Some(mut borrowing) = self.get_json::<Borrowing>(CF_BORROWINGS, id.0)? else {
            return Ok(false);
        };
        if !modify(&mut borrowing) {
            return Ok(false);
        }
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_BORROWINGS, id.0, &borrowing)?;
        self.commit(batch)?;
        Ok(true)
    }
}

#[async_trait]
impl UserStore for RocksDBStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        user.validate()?;
        let _gate = self.write_gate.lock().await;
        self.insert_user_locked(user)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        self.get_json(CF_USERS, id.0)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let users: Vec<User> = self.scan(CF_USERS)?;
        Ok(users.into_iter().find(|u| u.username == username))
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        self.scan(CF_USERS)
    }

    async fn update_user_profile(&self, id: UserId, profile: UserProfile) -> Result<bool> {
        profile.validate()?;
        let _gate = self.write_gate.lock().await;
        self.update_user_profile_locked(id, profile)
    }

    async fn update_user_status(&self, id: UserId, status: UserStatus) -> Result<bool> {
        let _gate = self.write_gate.lock().await;
        let Some(mut user) = self.get_json::<User>(CF_USERS, id.0)? else {
            return Ok(false);
        };
        user.status = status;
        user.updated_at = Utc::now();
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_USERS, id.0, &user)?;
        self.commit(batch)?;
        Ok(true)
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        let _gate = self.write_gate.lock().await;
        self.delete_user_locked(id)
    }
}

#[async_trait]
impl BookStore for RocksDBStore {
    async fn insert_book(&self, book: NewBook) -> Result<Book> {
        book.validate()?;
        let _gate = self.write_gate.lock().await;
        self.insert_book_locked(book)
    }

    async fn find_book(&self, id: BookId) -> Result<Option<Book>> {
        self.get_json(CF_BOOKS, id.0)
    }

    async fn find_book_by_isbn(&self, isbn: &str) -> Result<Option<Book>> {
        let books: Vec<Book> = self.scan(CF_BOOKS)?;
        Ok(books.into_iter().find(|b| b.isbn == isbn))
    }

    async fn all_books(&self) -> Result<Vec<Book>> {
        self.scan(CF_BOOKS)
    }

    async fn delete_book(&self, id: BookId) -> Result<bool> {
        let _gate = self.write_gate.lock().await;
        self.delete_book_locked(id)
    }

    async fn try_decrement_available(&self, id: BookId) -> Result<bool> {
        let _gate = self.write_gate.lock().await;
        self.adjust_book_locked(id, Book::take_copy)
    }

    async fn try_increment_available(&self, id: BookId) -> Result<bool> {
        let _gate = self.write_gate.lock().await;
        self.adjust_book_locked(id, Book::restore_copy)
    }
}

#[async_trait]
impl BorrowingStore for RocksDBStore {
    async fn insert_borrowing(&self, borrowing: NewBorrowing) -> Result<Borrowing> {
        borrowing.validate()?;
        let _gate = self.write_gate.lock().await;
        self.insert_borrowing_locked(borrowing)
    }

    async fn find_borrowing(&self, id: BorrowingId) -> Result<Option<Borrowing>> {
        self.get_json(CF_BORROWINGS, id.0)
    }

    async fn count_active_borrowings(&self, user_id: UserId) -> Result<u32> {
        let count = self
            .scan::<Borrowing>(CF_BORROWINGS)?
            .iter()
            .filter(|b| b.user_id == user_id && b.is_active())
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn borrowings_for_user(&self, user_id: UserId) -> Result<Vec<Borrowing>> {
        Ok(self
            .scan::<Borrowing>(CF_BORROWINGS)?
            .into_iter()
            .filter(|b| b.user_id == user_id)
            .collect())
    }

    async fn all_borrowings(&self) -> Result<Vec<Borrowing>> {
        self.scan(CF_BORROWINGS)
    }

    async fn update_borrowing_status(
        &self,
        id: BorrowingId,
        update: BorrowingUpdate,
    ) -> Result<bool> {
        let _gate = self.write_gate.lock().await;
        self.modify_borrowing_locked(id, |b| b.apply(&update, Utc::now()))
    }

    async fn mark_fine_paid(&self, id: BorrowingId) -> Result<bool> {
        let _gate = self.write_gate.lock().await;
        self.modify_borrowing_locked(id, |b| {
            if b.status == BorrowingStatus::Returned && b.fine_amount.is_positive() && !b.fine_paid
            {
                b.fine_paid = true;
                b.updated_at = Utc::now();
                true
            } else {
                false
            }
        })
    }
}
