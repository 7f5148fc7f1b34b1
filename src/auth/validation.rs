use lazy_static::lazy_static;
use regex::Regex;

use crate::auth::error::{AuthError, AuthResult, FieldError};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn password_error(password: &str, min_len: usize) -> Option<FieldError> {
    (password.chars().count() < min_len).then(|| FieldError {
        field: "password",
        message: format!("Password must be at least {} characters", min_len),
    })
}

/// Checks a signup payload, collecting every problem rather than the first.
pub fn validate_credentials(email: &str, password: &str, min_len: usize) -> AuthResult<()> {
    let mut errors = Vec::new();
    if !is_valid_email(email) {
        errors.push(FieldError {
            field: "email",
            message: "Enter a valid email".into(),
        });
    }
    errors.extend(password_error(password, min_len));
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AuthError::Validation(errors))
    }
}

pub fn validate_new_password(password: &str, min_len: usize) -> AuthResult<()> {
    match password_error(password, min_len) {
        Some(e) => Err(AuthError::Validation(vec![e])),
        None => Ok(()),
    }
}
