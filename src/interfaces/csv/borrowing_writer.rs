use crate::domain::borrowing::{Borrowing, BorrowingStatus};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct BorrowingRecord {
    borrowing: u32,
    user: u32,
    book: u32,
    status: BorrowingStatus,
    borrow_date: String,
    due_date: String,
    return_date: Option<String>,
    fine_amount: String,
    fine_paid: bool,
}

impl From<&Borrowing> for BorrowingRecord {
    fn from(b: &Borrowing) -> Self {
        Self {
            borrowing: b.id.0,
            user: b.user_id.0,
            book: b.book_id.0,
            status: b.status,
            borrow_date: b.borrow_date.to_rfc3339(),
            due_date: b.due_date.to_rfc3339(),
            return_date: b.return_date.map(|d| d.to_rfc3339()),
            fine_amount: b.fine_amount.to_string(),
            fine_paid: b.fine_paid,
        }
    }
}

/// Writes loan records as CSV, one row per borrowing.
pub struct BorrowingWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BorrowingWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_borrowings(&mut self, borrowings: &[Borrowing]) -> Result<()> {
        for borrowing in borrowings {
            self.writer.serialize(BorrowingRecord::from(borrowing))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
