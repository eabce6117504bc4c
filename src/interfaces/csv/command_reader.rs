use crate::domain::command::LendingCommand;
use crate::error::{LendingError, Result};
use std::io::Read;

/// Reads lending commands from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over
/// `Result<LendingCommand>`. Whitespace around fields is trimmed and short
/// rows are accepted, so trailing empty columns may be omitted.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes commands, so
    /// large files are processed without loading them into memory.
    pub fn commands(self) -> impl Iterator<Item = Result<LendingCommand>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LendingError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::BookId;
    use crate::domain::borrowing::BorrowingId;
    use crate::domain::command::CommandType;
    use crate::domain::user::UserId;

    #[test]
    fn test_reader_valid_stream() {
        let data = "type, user, book, borrowing, days\nborrow, 1, 2, , 7\nreturn, , , 1,\npay, , , 1";
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<Result<LendingCommand>> = reader.commands().collect();

        assert_eq!(results.len(), 3);
        let borrow = results[0].as_ref().unwrap();
        assert_eq!(borrow.user, Some(UserId(1)));
        assert_eq!(borrow.book, Some(BookId(2)));
        assert_eq!(borrow.days, Some(7));

        let pay = results[2].as_ref().unwrap();
        assert_eq!(pay.r#type, CommandType::Pay);
        assert_eq!(pay.borrowing, Some(BorrowingId(1)));
        assert_eq!(pay.days, None);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "type, user, book, borrowing, days\nlend, 1, 1, , 7\nborrow, x, 1, , 7";
        let reader = CommandReader::new(data.as_bytes());
        let results: Vec<Result<LendingCommand>> = reader.commands().collect();

        assert!(matches!(results[0], Err(LendingError::CsvError(_))));
        assert!(results[1].is_err());
    }
}
