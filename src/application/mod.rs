//! Application layer containing the lending workflows.
//!
//! `LendingEngine` owns the borrow/return lifecycle and its compensation
//! logic; `Registry` covers user and catalog administration. Both talk to
//! storage only through the ports in [`crate::domain::ports`].

pub mod engine;
pub mod inventory;
pub mod locks;
pub mod registry;
