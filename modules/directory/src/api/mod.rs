//! Contract declarations: how the directory services are exposed over HTTP.

use contractkit::DomainFailure;
use http::StatusCode;

use crate::contract::error::DirectoryError;

pub mod companies;
pub mod people;

impl From<DirectoryError> for DomainFailure {
    fn from(err: DirectoryError) -> Self {
        let status = match &err {
            DirectoryError::PersonNotFound { .. } | DirectoryError::CompanyNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            DirectoryError::Validation { .. } => StatusCode::BAD_REQUEST,
        };
        DomainFailure::new(status, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_statuses() {
        let f = DomainFailure::from(DirectoryError::person_not_found("1"));
        assert_eq!(f.status(), StatusCode::NOT_FOUND);
        assert_eq!(f.message(), "Person not found!");

        let f = DomainFailure::from(DirectoryError::validation("bad"));
        assert_eq!(f.status(), StatusCode::BAD_REQUEST);
    }
}
