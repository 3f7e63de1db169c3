//! Book catalog operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::{Book, NewBook, UpdateBook};
use crate::repository::Database;

impl Database {
    // ==================== Book Operations ====================

    /// Insert a new book
    pub async fn insert_book(&self, book: NewBook) -> Result<Book, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO books (title, synopsis, author, year_of_publish, img_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&book.title)
        .bind(&book.synopsis)
        .bind(&book.author)
        .bind(book.year_of_publish)
        .bind(&book.img_url)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = result.get("id");

        Ok(Book {
            id,
            title: book.title,
            synopsis: book.synopsis,
            author: book.author,
            year_of_publish: book.year_of_publish,
            img_url: book.img_url,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a book by ID
    pub async fn get_book_by_id(&self, id: i64) -> Result<Option<Book>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, title, synopsis, author, year_of_publish, img_url, created_at, updated_at
            FROM books
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| Book::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List all books
    pub async fn list_books(&self) -> Result<Vec<Book>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, synopsis, author, year_of_publish, img_url, created_at, updated_at
            FROM books
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Book::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Get the number of books in the catalog
    pub async fn count_books(&self) -> Result<i64, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(result.get("count"))
    }

    /// Apply a partial update to a book's details
    ///
    /// Returns `Ok(None)` if the book does not exist.
    pub async fn update_book(&self, id: i64, update: UpdateBook) -> Result<Option<Book>, DbError> {
        let Some(mut book) = self.get_book_by_id(id).await? else {
            return Ok(None);
        };

        if let Some(title) = update.title {
            book.title = title;
        }
        if let Some(synopsis) = update.synopsis {
            book.synopsis = synopsis;
        }
        if let Some(author) = update.author {
            book.author = author;
        }
        if let Some(year) = update.year_of_publish {
            book.year_of_publish = year;
        }
        book.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE books
            SET title = ?, synopsis = ?, author = ?, year_of_publish = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&book.title)
        .bind(&book.synopsis)
        .bind(&book.author)
        .bind(book.year_of_publish)
        .bind(book.updated_at.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(Some(book))
    }

    /// Point a book at a different stored cover
    pub async fn update_book_cover(&self, id: i64, img_url: &str) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE books
            SET img_url = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(img_url)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a book together with any borrow records pointing at it
    pub async fn delete_book(&self, id: i64) -> Result<bool, DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_books WHERE book_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
