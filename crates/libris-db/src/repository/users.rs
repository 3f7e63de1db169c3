//! User operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::{NewUser, UpdateUser, User};
use crate::repository::Database;

const USER_COLUMNS: &str = "id, name, email, password_hash, is_admin, created_at, updated_at";

impl Database {
    // ==================== User Operations ====================

    /// Insert a new user
    ///
    /// Fails with `DbError::Duplicate` before writing anything if the name
    /// or the email is already taken.
    pub async fn insert_user(&self, user: NewUser) -> Result<User, DbError> {
        let now = Utc::now();

        if self.get_user_by_name(&user.name).await?.is_some() {
            return Err(DbError::Duplicate(format!("User '{}' already exists", user.name)));
        }
        if self.get_user_by_email(&user.email).await?.is_some() {
            return Err(DbError::Duplicate(format!("Email '{}' is already registered", user.email)));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO users (name, email, password_hash, is_admin, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_write(e, "An account with that name or email already exists"))?;

        let id: i64 = result.get("id");

        Ok(User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            is_admin: user.is_admin,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a user by name
    pub async fn get_user_by_name(&self, name: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE name = ?"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get a user by email
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        let result = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List all users
    pub async fn list_users(&self) -> Result<Vec<User>, DbError> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| User::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Apply a partial update to a user
    ///
    /// Returns `Ok(None)` if the user does not exist. A rename to a name or
    /// email held by another user fails with `DbError::Duplicate` and leaves
    /// the record untouched.
    pub async fn update_user(&self, id: i64, update: UpdateUser) -> Result<Option<User>, DbError> {
        let Some(mut user) = self.get_user_by_id(id).await? else {
            return Ok(None);
        };

        if let Some(name) = update.name
            && name != user.name
        {
            if self.get_user_by_name(&name).await?.is_some() {
                return Err(DbError::Duplicate(format!("User '{}' already exists", name)));
            }
            user.name = name;
        }
        if let Some(email) = update.email
            && email != user.email
        {
            if self.get_user_by_email(&email).await?.is_some() {
                return Err(DbError::Duplicate(format!("Email '{}' is already registered", email)));
            }
            user.email = email;
        }
        if let Some(password_hash) = update.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(is_admin) = update.is_admin {
            user.is_admin = is_admin;
        }
        user.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE users
            SET name = ?, email = ?, password_hash = ?, is_admin = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(user.updated_at.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from_write(e, "An account with that name or email already exists"))?;

        Ok(Some(user))
    }

    /// Delete a user together with their borrow records
    pub async fn delete_user(&self, id: i64) -> Result<bool, DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_books WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check if any users exist
    pub async fn has_users(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}
