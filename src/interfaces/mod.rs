//! Edges of the crate: command files in, reports out, catalog seeding.

pub mod catalog;
pub mod csv;
