//! JSON catalog used to seed users and books before commands run.
//!
//! ```json
//! {
//!   "users": [{ "username": "ana", "email": "ana@example.org" }],
//!   "books": [{ "isbn": "978-0", "title": "Dune", "total_copies": 2 }]
//! }
//! ```

use crate::application::registry::Registry;
use crate::domain::book::NewBook;
use crate::domain::user::NewUser;
use crate::error::{ErrorKind, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct Catalog {
    #[serde(default)]
    pub users: Vec<NewUser>,
    #[serde(default)]
    pub books: Vec<NewBook>,
}

/// How many catalog entries made it into the store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub books: usize,
    pub skipped: usize,
}

impl Catalog {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Registers every entry. Entries the store rejects on a constraint
    /// (for example a username already present from an earlier run) are
    /// logged and skipped; any other failure aborts seeding.
    pub async fn seed(self, registry: &Registry) -> Result<SeedReport> {
        let mut report = SeedReport::default();

        for user in self.users {
            let username = user.username.clone();
            match registry.register_user(user).await {
                Ok(_) => report.users += 1,
                Err(e) if e.kind() == ErrorKind::ConstraintViolation => {
                    tracing::warn!(%username, error = %e, "Skipping catalog user");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        for book in self.books {
            let isbn = book.isbn.clone();
            match registry.add_book(book).await {
                Ok(_) => report.books += 1,
                Err(e) if e.kind() == ErrorKind::ConstraintViolation => {
                    tracing::warn!(%isbn, error = %e, "Skipping catalog book");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryStore;

    const CATALOG: &str = r#"{
        "users": [
            { "username": "ana", "email": "ana@example.org" },
            { "username": "ana", "email": "dup@example.org" },
            { "username": "bo", "email": "bo@example.org", "status": "inactive" }
        ],
        "books": [
            { "isbn": "978-0", "title": "Dune", "total_copies": 2 },
            { "isbn": "978-1", "title": "Emma", "total_copies": 1, "available_copies": 3 }
        ]
    }"#;

    #[tokio::test]
    async fn test_seed_skips_constraint_violations() {
        let store = InMemoryStore::new();
        let registry = Registry::new(Box::new(store.clone()), Box::new(store));

        let catalog = Catalog::from_reader(CATALOG.as_bytes()).unwrap();
        let report = catalog.seed(&registry).await.unwrap();

        assert_eq!(
            report,
            SeedReport {
                users: 2,
                books: 1,
                skipped: 2
            }
        );
        let bo = registry.find_user_by_username("bo").await.unwrap().unwrap();
        assert!(!bo.is_active());
    }

    #[test]
    fn test_sections_are_optional() {
        let catalog = Catalog::from_reader("{}".as_bytes()).unwrap();
        assert_eq!(catalog, Catalog::default());
    }
}
