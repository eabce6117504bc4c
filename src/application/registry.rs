use crate::domain::book::{Book, BookId, NewBook};
use crate::domain::ports::{BookStoreBox, UserStoreBox};
use crate::domain::user::{NewUser, User, UserId, UserProfile, UserStatus};
use crate::error::{EntityRef, LendingError, Result};

/// Catalog and membership administration.
///
/// Everything here is plain record keeping on top of the stores; the
/// uniqueness, cascade and restrict rules are enforced by the stores
/// themselves.
pub struct Registry {
    users: UserStoreBox,
    books: BookStoreBox,
}

impl Registry {
    pub fn new(users: UserStoreBox, books: BookStoreBox) -> Self {
        Self { users, books }
    }

    pub async fn register_user(&self, user: NewUser) -> Result<User> {
        let user = self.users.insert_user(user).await?;
        tracing::info!(user = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    pub async fn find_user(&self, id: UserId) -> Result<User> {
        self.users
            .find_user(id)
            .await?
            .ok_or(LendingError::NotFound(EntityRef::User(id)))
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.users.find_user_by_username(username).await
    }

    pub async fn users(&self) -> Result<Vec<User>> {
        self.users.all_users().await
    }

    pub async fn count_users(&self) -> Result<usize> {
        Ok(self.users.all_users().await?.len())
    }

    /// Rewrites email, name, phone, role and status. The email must stay
    /// unique across users.
    pub async fn update_user_profile(&self, id: UserId, profile: UserProfile) -> Result<User> {
        if !self.users.update_user_profile(id, profile).await? {
            return Err(LendingError::NotFound(EntityRef::User(id)));
        }
        tracing::info!(user = %id, "User profile updated");
        self.find_user(id).await
    }

    pub async fn set_user_status(&self, id: UserId, status: UserStatus) -> Result<User> {
        if !self.users.update_user_status(id, status).await? {
            return Err(LendingError::NotFound(EntityRef::User(id)));
        }
        tracing::info!(user = %id, %status, "User status changed");
        self.find_user(id).await
    }

    /// Deletes the user together with their borrowings.
    pub async fn remove_user(&self, id: UserId) -> Result<()> {
        if !self.users.delete_user(id).await? {
            return Err(LendingError::NotFound(EntityRef::User(id)));
        }
        tracing::info!(user = %id, "User removed");
        Ok(())
    }

    pub async fn add_book(&self, book: NewBook) -> Result<Book> {
        let book = self.books.insert_book(book).await?;
        tracing::info!(book = %book.id, isbn = %book.isbn, copies = book.total_copies, "Book added");
        Ok(book)
    }

    pub async fn find_book(&self, id: BookId) -> Result<Book> {
        self.books
            .find_book(id)
            .await?
            .ok_or(LendingError::NotFound(EntityRef::Book(id)))
    }

    pub async fn find_book_by_isbn(&self, isbn: &str) -> Result<Option<Book>> {
        self.books.find_book_by_isbn(isbn).await
    }

    /// Fails with `ConstraintViolation` while the book is on loan.
    pub async fn remove_book(&self, id: BookId) -> Result<()> {
        if !self.books.delete_book(id).await? {
            return Err(LendingError::NotFound(EntityRef::Book(id)));
        }
        tracing::info!(book = %id, "Book removed");
        Ok(())
    }

    pub async fn books(&self) -> Result<Vec<Book>> {
        self.books.all_books().await
    }

    pub async fn count_books(&self) -> Result<usize> {
        Ok(self.books.all_books().await?.len())
    }

    pub async fn count_available_books(&self) -> Result<usize> {
        self.books.count_available_books().await
    }

    /// Case-insensitive title search, ordered by title.
    pub async fn search_books(&self, fragment: &str) -> Result<Vec<Book>> {
        let needle = fragment.to_lowercase();
        let mut found: Vec<Book> = self
            .books
            .all_books()
            .await?
            .into_iter()
            .filter(|b| b.title.to_lowercase().contains(&needle))
            .collect();
        found.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(found)
    }

    /// Books with at least one copy on the shelf, ordered by title.
    pub async fn available_books(&self) -> Result<Vec<Book>> {
        let mut found: Vec<Book> = self
            .books
            .all_books()
            .await?
            .into_iter()
            .filter(Book::is_lendable)
            .collect();
        found.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(found)
    }
}
