use crate::domain::book::{Book, BookStatus};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct InventoryRecord<'a> {
    book: u32,
    isbn: &'a str,
    title: &'a str,
    total_copies: u32,
    available_copies: u32,
    status: BookStatus,
}

/// Writes the inventory of each book as CSV.
pub struct InventoryWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> InventoryWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_books(&mut self, books: impl IntoIterator<Item = Book>) -> Result<()> {
        for book in books {
            self.writer.serialize(InventoryRecord {
                book: book.id.0,
                isbn: &book.isbn,
                title: &book.title,
                total_copies: book.total_copies,
                available_copies: book.available_copies,
                status: book.status,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::{BookId, NewBook};
    use chrono::Utc;

    #[test]
    fn test_write_books() {
        let book = Book::from_new(
            BookId(3),
            NewBook::new("978-0", "Dune, Deluxe", 2).with_available(1),
            Utc::now(),
        );
        let mut out = Vec::new();
        InventoryWriter::new(&mut out).write_books(vec![book]).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "book,isbn,title,total_copies,available_copies,status\n3,978-0,\"Dune, Deluxe\",2,1,available\n"
        );
    }
}
