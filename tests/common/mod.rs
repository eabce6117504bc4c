#![allow(dead_code)]

use biblend::application::engine::LendingEngine;
use biblend::application::registry::Registry;
use biblend::domain::book::{Book, BookId, NewBook};
use biblend::domain::policy::LendingPolicy;
use biblend::domain::user::{NewUser, User};
use biblend::infrastructure::in_memory::InMemoryStore;
use rand::Rng;
use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub const COMMAND_HEADER: [&str; 5] = ["type", "user", "book", "borrowing", "days"];

/// A registry and an engine sharing one in-memory store.
pub struct Library {
    pub store: InMemoryStore,
    pub registry: Registry,
    pub engine: LendingEngine,
}

impl Library {
    pub fn new(policy: LendingPolicy) -> Self {
        let store = InMemoryStore::new();
        let registry = Registry::new(Box::new(store.clone()), Box::new(store.clone()));
        let engine = LendingEngine::new(
            Box::new(store.clone()),
            Box::new(store.clone()),
            Box::new(store.clone()),
            policy,
        );
        Self {
            store,
            registry,
            engine,
        }
    }

    pub async fn member(&self, username: &str) -> User {
        self.registry
            .register_user(NewUser::new(username, format!("{username}@example.org")))
            .await
            .unwrap()
    }

    pub async fn book(&self, isbn: &str, copies: u32) -> Book {
        self.registry
            .add_book(NewBook::new(isbn, format!("Title {isbn}"), copies))
            .await
            .unwrap()
    }

    pub async fn available(&self, id: BookId) -> u32 {
        self.registry.find_book(id).await.unwrap().available_copies
    }
}

pub fn write_commands(rows: &[[&str; 5]]) -> Result<NamedTempFile, Error> {
    let file = NamedTempFile::new()?;
    let mut wtr = csv::Writer::from_writer(file.reopen()?);
    wtr.write_record(COMMAND_HEADER)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(file)
}

/// Writes a catalog with `users` members named `user1..` and `books` titles
/// with `copies` copies each.
pub fn write_catalog(users: usize, books: usize, copies: u32) -> Result<NamedTempFile, Error> {
    let users: Vec<_> = (1..=users)
        .map(|i| serde_json::json!({ "username": format!("user{i}"), "email": format!("user{i}@example.org") }))
        .collect();
    let books: Vec<_> = (1..=books)
        .map(|i| serde_json::json!({ "isbn": format!("978-{i}"), "title": format!("Title {i}"), "total_copies": copies }))
        .collect();
    let catalog = serde_json::json!({ "users": users, "books": books });

    let mut file = NamedTempFile::new()?;
    serde_json::to_writer(&mut file, &catalog)?;
    file.flush()?;
    Ok(file)
}

/// Generates a command file mixing borrows against random users and books
/// with returns of earlier borrowing ids.
pub fn generate_commands_csv(
    path: &Path,
    rows: usize,
    users: u32,
    books: u32,
) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(COMMAND_HEADER)?;

    let mut rng = rand::thread_rng();
    let mut borrows = 0u32;
    for _ in 0..rows {
        if borrows > 0 && rng.gen_range(0..3) == 0 {
            let borrowing = rng.gen_range(1..=borrows);
            wtr.write_record(["return", "", "", &borrowing.to_string(), ""])?;
        } else {
            borrows += 1;
            let user = rng.gen_range(1..=users);
            let book = rng.gen_range(1..=books);
            let days = rng.gen_range(1..=21);
            wtr.write_record([
                "borrow",
                &user.to_string(),
                &book.to_string(),
                "",
                &days.to_string(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
