//! Borrowing lifecycle engine for a small lending library.
//!
//! Users borrow and return copies of books; the engine enforces the lending
//! policy, keeps each book's available-copy counter within bounds under
//! concurrent requests, and compensates when a multi-step workflow fails
//! halfway.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
