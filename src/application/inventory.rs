use crate::domain::book::BookId;
use crate::domain::ports::BookStore;
use crate::error::Result;

/// The only path through which the engine touches `available_copies`.
///
/// Both operations are a single conditional write in the store; there is
/// never a read of the counter followed by a separate write.
pub struct InventoryCounter<'a> {
    books: &'a dyn BookStore,
}

impl<'a> InventoryCounter<'a> {
    pub fn new(books: &'a dyn BookStore) -> Self {
        Self { books }
    }

    /// Takes one copy. `false` means the shelf was empty when the write ran.
    pub async fn try_decrement(&self, book_id: BookId) -> Result<bool> {
        let applied = self.books.try_decrement_available(book_id).await?;
        tracing::debug!(book = %book_id, applied, "Inventory decrement");
        Ok(applied)
    }

    /// Returns one copy. `false` means the shelf was already full.
    pub async fn try_increment(&self, book_id: BookId) -> Result<bool> {
        let applied = self.books.try_increment_available(book_id).await?;
        tracing::debug!(book = %book_id, applied, "Inventory increment");
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::book::NewBook;
    use crate::infrastructure::in_memory::InMemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_counter_respects_bounds() {
        let store = InMemoryStore::new();
        let book = store
            .insert_book(NewBook::new("978-0", "Dune", 1))
            .await
            .unwrap();
        let counter = InventoryCounter::new(&store);

        assert!(!counter.try_increment(book.id).await.unwrap());
        assert!(counter.try_decrement(book.id).await.unwrap());
        assert!(!counter.try_decrement(book.id).await.unwrap());
        assert!(counter.try_increment(book.id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_decrements_never_oversell() {
        let store = InMemoryStore::new();
        let book = store
            .insert_book(NewBook::new("978-0", "Dune", 3))
            .await
            .unwrap();
        let store = Arc::new(store);
        let book_id = book.id;

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                InventoryCounter::new(&*store)
                    .try_decrement(book_id)
                    .await
                    .unwrap()
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 3);
        let book = store.find_book(book_id).await.unwrap().unwrap();
        assert_eq!(book.available_copies, 0);
    }
}
