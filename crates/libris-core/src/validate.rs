//! Input validation for users and books

use crate::error::CoreError;

/// Maximum allowed username length
pub const MAX_USERNAME_LENGTH: usize = 20;
/// Maximum allowed email length
pub const MAX_EMAIL_LENGTH: usize = 32;
/// Maximum allowed password length (hashing very large inputs is expensive)
pub const MAX_PASSWORD_LENGTH: usize = 256;
pub const MAX_TITLE_LENGTH: usize = 120;
pub const MAX_SYNOPSIS_LENGTH: usize = 1000;
pub const MAX_AUTHOR_LENGTH: usize = 50;

fn check_length(field: &str, value: &str, max: usize) -> Result<(), CoreError> {
    let len = value.chars().count();
    if len == 0 {
        return Err(CoreError::BadRequest(format!("{} cannot be empty", field)));
    }
    if len > max {
        return Err(CoreError::BadRequest(format!(
            "{} exceeds maximum length of {} characters",
            field, max
        )));
    }
    Ok(())
}

/// Validate username format and length
pub fn validate_username(name: &str) -> Result<(), CoreError> {
    check_length("Username", name, MAX_USERNAME_LENGTH)?;
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(CoreError::BadRequest(
            "Username can only contain alphanumeric characters, underscores, and hyphens"
                .to_string(),
        ));
    }
    Ok(())
}

/// Validate that an email looks like `local@domain.tld`
pub fn validate_email(email: &str) -> Result<(), CoreError> {
    check_length("Email", email, MAX_EMAIL_LENGTH)?;

    let invalid = || CoreError::BadRequest(format!("Invalid email address: {}", email));
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), CoreError> {
    check_length("Password", password, MAX_PASSWORD_LENGTH)
}

/// Validate whichever book fields are present
pub fn validate_book_fields(
    title: Option<&str>,
    synopsis: Option<&str>,
    author: Option<&str>,
    year_of_publish: Option<i64>,
) -> Result<(), CoreError> {
    if let Some(title) = title {
        check_length("Title", title, MAX_TITLE_LENGTH)?;
    }
    if let Some(synopsis) = synopsis {
        check_length("Synopsis", synopsis, MAX_SYNOPSIS_LENGTH)?;
    }
    if let Some(author) = author {
        check_length("Author", author, MAX_AUTHOR_LENGTH)?;
    }
    if let Some(year) = year_of_publish
        && year < 0
    {
        return Err(CoreError::BadRequest(
            "Year of publish cannot be negative".to_string(),
        ));
    }
    Ok(())
}
