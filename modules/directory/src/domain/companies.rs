use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::{debug, info};

use super::new_id;
use crate::contract::{client::CompanyApi, error::DirectoryError, model::Company};

/// In-memory company store.
#[derive(Debug, Default)]
pub struct CompanyService {
    companies: RwLock<Vec<Company>>,
}

impl CompanyService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded() -> Self {
        let svc = Self::new();
        for name in ["ACME", "Kids Club", "Polizei"] {
            svc.insert(Company::new(name));
        }
        svc
    }

    fn insert(&self, mut company: Company) -> String {
        if company.id.is_empty() {
            company.id = new_id();
        }
        let id = company.id.clone();
        self.companies.write().push(company);
        id
    }

    fn remove(&self, id: &str) -> bool {
        let mut companies = self.companies.write();
        let before = companies.len();
        companies.retain(|c| c.id != id);
        companies.len() != before
    }
}

#[async_trait]
impl CompanyApi for CompanyService {
    async fn companies(&self) -> Vec<Company> {
        self.companies.read().clone()
    }

    async fn company(&self, id: &str) -> Result<Company, DirectoryError> {
        self.companies
            .read()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| DirectoryError::company_not_found(id))
    }

    async fn create_company(&self, company: Company) -> Result<(), DirectoryError> {
        if company.name.trim().is_empty() {
            return Err(DirectoryError::validation("Company name cannot be empty"));
        }
        let id = self.insert(company);
        debug!(%id, "company created");
        Ok(())
    }

    async fn delete_company(&self, id: &str) {
        if self.remove(id) {
            debug!(%id, "company deleted");
        }
    }

    async fn update_company(&self, company: Company) -> Result<(), DirectoryError> {
        if company.id.is_empty() {
            return Err(DirectoryError::validation("Company id is required"));
        }
        self.remove(&company.id);
        self.create_company(company).await
    }

    async fn compact(&self) -> usize {
        let mut seen = HashSet::new();
        let mut companies = self.companies.write();
        let before = companies.len();
        companies.retain(|c| seen.insert(c.name.to_lowercase()));
        let removed = before - companies.len();
        info!(removed, "company list compacted");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_companies() {
        let svc = CompanyService::seeded();
        let names: Vec<_> = svc.companies().await.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["ACME", "Kids Club", "Polizei"]);
    }

    #[tokio::test]
    async fn unknown_company_is_not_found() {
        let err = CompanyService::seeded().company("x").await.unwrap_err();
        assert_eq!(err.to_string(), "Company not found");
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let err = CompanyService::new()
            .create_company(Company::new("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Validation { .. }));
    }

    #[tokio::test]
    async fn compact_drops_duplicate_names() {
        let svc = CompanyService::seeded();
        svc.create_company(Company::new("acme")).await.unwrap();
        assert_eq!(svc.compact().await, 1);
        assert_eq!(svc.companies().await.len(), 3);
    }
}
