//! # Catalog Source
//!
//! Read-only access to books and chapters. Hosts back it with whatever
//! store they use; the core only queries by id, tag, or category.

use async_trait::async_trait;
use core_async::sync::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{LibraryError, Result};
use crate::models::{Book, Chapter};

/// Book/chapter data source.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Find a book by its id.
    ///
    /// # Returns
    /// - `Ok(Some(book))` if found
    /// - `Ok(None)` if not found
    async fn book(&self, id: &str) -> Result<Option<Book>>;

    /// Books carrying `tag` (case-insensitive).
    async fn books_by_tag(&self, tag: &str) -> Result<Vec<Book>>;

    /// Books in `category` (case-insensitive).
    async fn books_by_category(&self, category: &str) -> Result<Vec<Book>>;

    /// Like [`book`](Self::book), but a missing book is an error.
    async fn require_book(&self, id: &str) -> Result<Book> {
        self.book(id)
            .await?
            .ok_or_else(|| LibraryError::book_not_found(id))
    }

    /// Find one chapter of a book.
    async fn chapter(&self, book_id: &str, chapter_id: &str) -> Result<Chapter> {
        let book = self.require_book(book_id).await?;
        book.chapter(chapter_id)
            .cloned()
            .ok_or_else(|| LibraryError::chapter_not_found(chapter_id))
    }
}

/// In-memory [`CatalogSource`], ordered by book id.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    books: RwLock<BTreeMap<String, Book>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from books, validating each one.
    pub fn with_books(books: impl IntoIterator<Item = Book>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for book in books {
            book.validate()?;
            map.insert(book.id.clone(), book);
        }
        Ok(Self {
            books: RwLock::new(map),
        })
    }

    /// Parse a JSON array of book records.
    pub fn from_json(json: &str) -> Result<Self> {
        let books: Vec<Book> = serde_json::from_str(json)?;
        Self::with_books(books)
    }

    /// Insert or replace a book.
    pub async fn upsert(&self, book: Book) -> Result<()> {
        book.validate()?;
        debug!(book_id = %book.id, "Upserting book");
        self.books.write().await.insert(book.id.clone(), book);
        Ok(())
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.books.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.books.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.books.read().await.is_empty()
    }

    async fn filter<F>(&self, predicate: F) -> Vec<Book>
    where
        F: Fn(&Book) -> bool + Send,
    {
        self.books
            .read()
            .await
            .values()
            .filter(|book| predicate(book))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn book(&self, id: &str) -> Result<Option<Book>> {
        Ok(self.books.read().await.get(id).cloned())
    }

    async fn books_by_tag(&self, tag: &str) -> Result<Vec<Book>> {
        Ok(self.filter(|book| book.has_tag(tag)).await)
    }

    async fn books_by_category(&self, category: &str) -> Result<Vec<Book>> {
        Ok(self.filter(|book| book.in_category(category)).await)
    }
}
