//! Catalog and circulation service

use bytes::Bytes;
use libris_db::{Book, Database, DbError, NewBook, UpdateBook, User};
use libris_storage::{CoverFormat, CoverStorage};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::validate::validate_book_fields;

/// Details of a book to be added to the catalog
#[derive(Debug, Clone)]
pub struct BookDraft {
    pub title: String,
    pub synopsis: String,
    pub author: String,
    pub year_of_publish: i64,
}

/// An uploaded cover image
#[derive(Debug, Clone)]
pub struct CoverUpload {
    /// Filename supplied by the client, only its extension is used
    pub filename: String,
    pub data: Bytes,
}

impl CoverUpload {
    /// Check the declared extension and the actual image type
    fn format(&self) -> Result<CoverFormat, CoreError> {
        if CoverFormat::from_filename(&self.filename).is_none() {
            return Err(CoreError::BadRequest(
                "Cover must be a jpg, jpeg or png file".to_string(),
            ));
        }
        CoverFormat::sniff(&self.data).ok_or_else(|| {
            CoreError::BadRequest("Cover is not a valid jpg or png image".to_string())
        })
    }
}

/// Library service coordinating the catalog store and cover storage
pub struct LibraryService {
    db: Database,
    covers: Arc<dyn CoverStorage>,
}

impl LibraryService {
    pub fn new(db: Database, covers: Arc<dyn CoverStorage>) -> Self {
        Self { db, covers }
    }

    // ==================== Catalog ====================

    pub async fn list_books(&self) -> Result<Vec<Book>, CoreError> {
        Ok(self.db.list_books().await?)
    }

    pub async fn count_books(&self) -> Result<i64, CoreError> {
        Ok(self.db.count_books().await?)
    }

    pub async fn get_book(&self, id: i64) -> Result<Book, CoreError> {
        self.db
            .get_book_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Book {} not found", id)))
    }

    /// Store the cover, then insert the book row pointing at it
    ///
    /// If the insert fails the stored cover is removed again.
    pub async fn add_book(&self, draft: BookDraft, cover: CoverUpload) -> Result<Book, CoreError> {
        validate_book_fields(
            Some(&draft.title),
            Some(&draft.synopsis),
            Some(&draft.author),
            Some(draft.year_of_publish),
        )?;
        let format = cover.format()?;

        let img_url = self.covers.save(cover.data, format).await?;
        debug!("Stored cover {} for new book '{}'", img_url, draft.title);

        let result = self
            .db
            .insert_book(NewBook {
                title: draft.title,
                synopsis: draft.synopsis,
                author: draft.author,
                year_of_publish: draft.year_of_publish,
                img_url: img_url.clone(),
            })
            .await;

        match result {
            Ok(book) => {
                info!("Added book {} '{}'", book.id, book.title);
                Ok(book)
            }
            Err(e) => {
                self.discard_cover(&img_url).await;
                Err(e.into())
            }
        }
    }

    pub async fn update_book(&self, id: i64, update: UpdateBook) -> Result<Book, CoreError> {
        validate_book_fields(
            update.title.as_deref(),
            update.synopsis.as_deref(),
            update.author.as_deref(),
            update.year_of_publish,
        )?;

        let book = self
            .db
            .update_book(id, update)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Book {} not found", id)))?;

        info!("Updated book {}", id);
        Ok(book)
    }

    /// Swap a book's cover; the old file is removed only once the row
    /// points at the new one
    pub async fn replace_cover(&self, id: i64, cover: CoverUpload) -> Result<Book, CoreError> {
        let format = cover.format()?;
        let book = self.get_book(id).await?;

        let img_url = self.covers.save(cover.data, format).await?;
        match self.db.update_book_cover(id, &img_url).await {
            Ok(true) => {}
            Ok(false) => {
                self.discard_cover(&img_url).await;
                return Err(CoreError::NotFound(format!("Book {} not found", id)));
            }
            Err(e) => {
                self.discard_cover(&img_url).await;
                return Err(e.into());
            }
        }

        self.discard_cover(&book.img_url).await;
        info!("Replaced cover of book {}", id);
        self.get_book(id).await
    }

    /// Read a book's cover, returning its bytes and stored name
    pub async fn read_cover(&self, id: i64) -> Result<(Bytes, String), CoreError> {
        let book = self.get_book(id).await?;
        let data = self.covers.read(&book.img_url).await?;
        Ok((data, book.img_url))
    }

    /// Delete a book row and then its cover
    pub async fn delete_book(&self, id: i64) -> Result<(), CoreError> {
        let book = self.get_book(id).await?;

        if !self.db.delete_book(id).await? {
            return Err(CoreError::NotFound(format!("Book {} not found", id)));
        }
        self.discard_cover(&book.img_url).await;

        info!("Deleted book {} '{}'", id, book.title);
        Ok(())
    }

    async fn discard_cover(&self, name: &str) {
        match self.covers.delete(name).await {
            Ok(true) => debug!("Removed cover {}", name),
            Ok(false) => warn!("Cover {} was already missing", name),
            Err(e) => warn!("Failed to remove cover {}: {}", name, e),
        }
    }

    // ==================== Circulation ====================

    pub async fn borrow(&self, user_id: i64, book_id: i64) -> Result<(), CoreError> {
        self.db
            .borrow_book(user_id, book_id)
            .await
            .map_err(|e| match e {
                DbError::NotFound(what) => CoreError::NotFound(format!("{} not found", what)),
                DbError::Duplicate(_) => {
                    CoreError::Conflict("Book is already borrowed by this user".to_string())
                }
                other => CoreError::Database(other),
            })?;

        metrics::counter!("libris_borrows_total").increment(1);
        info!("User {} borrowed book {}", user_id, book_id);
        Ok(())
    }

    pub async fn return_book(&self, user_id: i64, book_id: i64) -> Result<(), CoreError> {
        if !self.db.return_book(user_id, book_id).await? {
            return Err(CoreError::NotFound(format!(
                "Book {} is not borrowed by user {}",
                book_id, user_id
            )));
        }

        metrics::counter!("libris_returns_total").increment(1);
        info!("User {} returned book {}", user_id, book_id);
        Ok(())
    }

    pub async fn borrowed_books(&self, user_id: i64) -> Result<Vec<Book>, CoreError> {
        if self.db.get_user_by_id(user_id).await?.is_none() {
            return Err(CoreError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(self.db.list_borrowed_books(user_id).await?)
    }

    pub async fn borrowers(&self, book_id: i64) -> Result<Vec<User>, CoreError> {
        self.get_book(book_id).await?;
        Ok(self.db.list_borrowers(book_id).await?)
    }
}
