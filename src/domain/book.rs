use crate::error::{LendingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BookId(pub u32);

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    #[default]
    Available,
    Unavailable,
    Maintenance,
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookStatus::Available => "available",
            BookStatus::Unavailable => "unavailable",
            BookStatus::Maintenance => "maintenance",
        };
        f.write_str(s)
    }
}

/// A catalog entry to be added. `available_copies` defaults to
/// `total_copies` when omitted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct NewBook {
    pub isbn: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i32>,
    pub total_copies: u32,
    #[serde(default)]
    pub available_copies: Option<u32>,
    #[serde(default)]
    pub status: BookStatus,
}

impl NewBook {
    pub fn new(isbn: impl Into<String>, title: impl Into<String>, total_copies: u32) -> Self {
        Self {
            isbn: isbn.into(),
            title: title.into(),
            author: None,
            publication_year: None,
            total_copies,
            available_copies: None,
            status: BookStatus::Available,
        }
    }

    pub fn with_available(mut self, available_copies: u32) -> Self {
        self.available_copies = Some(available_copies);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.isbn.trim().is_empty() {
            return Err(LendingError::ConstraintViolation(
                "isbn must not be empty".to_string(),
            ));
        }
        if self.title.trim().is_empty() {
            return Err(LendingError::ConstraintViolation(
                "title must not be empty".to_string(),
            ));
        }
        let available = self.available_copies.unwrap_or(self.total_copies);
        check_inventory(available, self.total_copies)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Book {
    pub id: BookId,
    pub isbn: String,
    pub title: String,
    pub author: Option<String>,
    pub publication_year: Option<i32>,
    pub total_copies: u32,
    pub available_copies: u32,
    pub status: BookStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn from_new(id: BookId, new: NewBook, now: DateTime<Utc>) -> Self {
        Self {
            id,
            available_copies: new.available_copies.unwrap_or(new.total_copies),
            isbn: new.isbn,
            title: new.title,
            author: new.author,
            publication_year: new.publication_year,
            total_copies: new.total_copies,
            status: new.status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Takes one copy off the shelf if any is left.
    ///
    /// Stores call this while holding exclusive access to the row, which is
    /// what makes the check and the write a single atomic step.
    pub fn take_copy(&mut self) -> bool {
        if self.available_copies > 0 {
            self.available_copies -= 1;
            true
        } else {
            false
        }
    }

    /// Puts one copy back unless the shelf is already full.
    pub fn restore_copy(&mut self) -> bool {
        if self.available_copies < self.total_copies {
            self.available_copies += 1;
            true
        } else {
            false
        }
    }

    pub fn is_lendable(&self) -> bool {
        self.available_copies > 0
    }
}

pub fn check_inventory(available: u32, total: u32) -> Result<()> {
    if available > total {
        return Err(LendingError::ConstraintViolation(format!(
            "available copies ({}) exceed total copies ({})",
            available, total
        )));
    }
    Ok(())
}
