//! Book catalog service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, CreateBook, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list().await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;

        if self.repository.books.isbn_exists(book.isbn.trim(), None).await? {
            return Err(AppError::Conflict(format!("A book with ISBN {} already exists", book.isbn.trim())));
        }

        let created = self.repository.books.create(&book).await?;
        tracing::info!(book_id = created.id, isbn = %created.isbn, "Book created");
        Ok(created)
    }

    pub async fn update_book(&self, id: i32, book: UpdateBook) -> AppResult<Book> {
        book.validate()?;

        self.repository.books.get_by_id(id).await?;
        if let Some(ref isbn) = book.isbn {
            if self.repository.books.isbn_exists(isbn.trim(), Some(id)).await? {
                return Err(AppError::Conflict(format!("A book with ISBN {} already exists", isbn.trim())));
            }
        }

        self.repository.books.update(id, &book).await
    }

    /// Books with loan history cannot be deleted
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }
}
