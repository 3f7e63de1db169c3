//! Borrow association operations (`user_books`)

use sqlx::Row;

use crate::error::DbError;
use crate::models::{Book, User};
use crate::repository::Database;

impl Database {
    // ==================== Borrow Operations ====================

    /// Record that a user has borrowed a book
    ///
    /// Fails with `DbError::NotFound` if either side is missing and with
    /// `DbError::Duplicate` if the user already holds the book.
    pub async fn borrow_book(&self, user_id: i64, book_id: i64) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let user_exists: i64 = sqlx::query("SELECT COUNT(*) as count FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?
            .get("count");
        if user_exists == 0 {
            return Err(DbError::NotFound(format!("User: {}", user_id)));
        }

        let book_exists: i64 = sqlx::query("SELECT COUNT(*) as count FROM books WHERE id = ?")
            .bind(book_id)
            .fetch_one(&mut *tx)
            .await?
            .get("count");
        if book_exists == 0 {
            return Err(DbError::NotFound(format!("Book: {}", book_id)));
        }

        sqlx::query("INSERT INTO user_books (user_id, book_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(book_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::from_write(e, "Book is already borrowed by this user"))?;

        tx.commit().await?;
        Ok(())
    }

    /// Remove a borrow record; returns false if the user did not hold the book
    pub async fn return_book(&self, user_id: i64, book_id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM user_books WHERE user_id = ? AND book_id = ?")
            .bind(user_id)
            .bind(book_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List the books currently borrowed by a user
    pub async fn list_borrowed_books(&self, user_id: i64) -> Result<Vec<Book>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.title, b.synopsis, b.author, b.year_of_publish, b.img_url, b.created_at, b.updated_at
            FROM books b
            JOIN user_books ub ON ub.book_id = b.id
            WHERE ub.user_id = ?
            ORDER BY b.title
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Book::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// List the users currently holding a book
    pub async fn list_borrowers(&self, book_id: i64) -> Result<Vec<User>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.name, u.email, u.password_hash, u.is_admin, u.created_at, u.updated_at
            FROM users u
            JOIN user_books ub ON ub.user_id = u.id
            WHERE ub.book_id = ?
            ORDER BY u.name
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| User::try_from(row).map_err(DbError::from))
            .collect()
    }
}
