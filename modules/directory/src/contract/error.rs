use thiserror::Error;

/// Errors the directory services expose to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Person not found!")]
    PersonNotFound { id: String },

    #[error("Company not found")]
    CompanyNotFound { id: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl DirectoryError {
    pub fn person_not_found(id: impl Into<String>) -> Self {
        Self::PersonNotFound { id: id.into() }
    }

    pub fn company_not_found(id: impl Into<String>) -> Self {
        Self::CompanyNotFound { id: id.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
