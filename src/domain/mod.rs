//! Domain model: entities, value types, lending rules and the storage ports
//! the application layer talks to.

pub mod book;
pub mod borrowing;
pub mod clock;
pub mod command;
pub mod money;
pub mod policy;
pub mod ports;
pub mod user;
