use super::book::BookId;
use super::borrowing::BorrowingId;
use super::user::UserId;
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Borrow,
    Return,
    Pay,
}

/// One row of a lending command file.
///
/// Which columns are required depends on `type`: `borrow` needs `user` and
/// `book` (and optionally `days`), `return` and `pay` need `borrowing`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct LendingCommand {
    pub r#type: CommandType,
    pub user: Option<UserId>,
    pub book: Option<BookId>,
    pub borrowing: Option<BorrowingId>,
    pub days: Option<i64>,
}

impl LendingCommand {
    pub fn borrow(user: UserId, book: BookId, days: Option<i64>) -> Self {
        Self {
            r#type: CommandType::Borrow,
            user: Some(user),
            book: Some(book),
            borrowing: None,
            days,
        }
    }

    pub fn return_book(borrowing: BorrowingId) -> Self {
        Self {
            r#type: CommandType::Return,
            user: None,
            book: None,
            borrowing: Some(borrowing),
            days: None,
        }
    }

    pub fn pay(borrowing: BorrowingId) -> Self {
        Self {
            r#type: CommandType::Pay,
            ..Self::return_book(borrowing)
        }
    }
}
