pub mod borrowing_writer;
pub mod command_reader;
pub mod inventory_writer;
