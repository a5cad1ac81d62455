//! Input checks shared by the admin, profile and entity forms.

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// User-facing validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("email must be a valid address")]
    InvalidEmail,

    #[error("password must be at least 6 characters")]
    PasswordTooShort,

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("current password is incorrect")]
    WrongPassword,

    #[error("the administrator password is fixed and cannot be changed")]
    FixedAdminPassword,

    #[error("a user with email {0} already exists")]
    DuplicateEmail(String),

    #[error("sample size must be at least 1")]
    EmptySample,

    #[error("defects found ({defects}) exceed sample size ({sample})")]
    TooManyDefects { sample: u32, defects: u32 },
}

pub fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(())
}

/// Trimmed, lowercased email after a presence and `@` check
pub fn normalize_email(email: &str) -> Result<String, ValidationError> {
    required("email", email)?;
    if !email.contains('@') {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email.trim().to_lowercase())
}

pub fn new_password(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::Required("password"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ana@CapyMES.com ").unwrap(), "ana@capymes.com");
    }

    #[test]
    fn email_checks_run_in_order() {
        assert_eq!(normalize_email("   "), Err(ValidationError::Required("email")));
        assert_eq!(normalize_email("ana.capymes.com"), Err(ValidationError::InvalidEmail));
    }

    #[test]
    fn password_rules() {
        assert_eq!(new_password("", ""), Err(ValidationError::Required("password")));
        assert_eq!(new_password("12345", "12345"), Err(ValidationError::PasswordTooShort));
        assert_eq!(new_password("123456", "123457"), Err(ValidationError::PasswordMismatch));
        assert!(new_password("123456", "123456").is_ok());
    }
}
