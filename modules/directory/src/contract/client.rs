use async_trait::async_trait;

use crate::contract::error::DirectoryError;
use crate::contract::model::{Company, PeopleQuery, Person};

/// People directory. Exposed over HTTP by its contract declaration.
#[async_trait]
pub trait PeopleApi: Send + Sync {
    async fn people(&self) -> Vec<Person>;

    /// Case-insensitive substring match on every given filter.
    async fn search_people(&self, query: PeopleQuery) -> Vec<Person>;

    /// People whose company equals `company`, ignoring case.
    async fn people_by_company(&self, company: &str) -> Vec<Person>;

    async fn person(&self, id: &str) -> Result<Person, DirectoryError>;

    async fn create_person(&self, person: Person) -> Result<(), DirectoryError>;

    /// Removing an unknown id is not an error.
    async fn delete_person(&self, id: &str);

    /// Replace the person with the same id, or add it when absent.
    async fn update_person(&self, person: Person) -> Result<(), DirectoryError>;
}

#[async_trait]
pub trait CompanyApi: Send + Sync {
    async fn companies(&self) -> Vec<Company>;

    async fn company(&self, id: &str) -> Result<Company, DirectoryError>;

    async fn create_company(&self, company: Company) -> Result<(), DirectoryError>;

    async fn delete_company(&self, id: &str);

    async fn update_company(&self, company: Company) -> Result<(), DirectoryError>;

    /// Drop duplicate names, keeping the first entry. Not exposed over HTTP.
    async fn compact(&self) -> usize;
}
