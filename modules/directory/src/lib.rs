//! Sample directory contracts: people and companies kept in memory.
//!
//! The services implement the contract traits in [`contract::client`]; the
//! HTTP exposure of those traits is declared in [`api`].

use contractkit::ServiceHub;
use std::sync::Arc;

pub mod api;
pub mod contract;
pub mod domain;

pub use contract::client::{CompanyApi, PeopleApi};
pub use contract::error::DirectoryError;
pub use contract::model::{Company, PeopleQuery, Person};
pub use domain::{companies::CompanyService, people::PeopleService};

/// Register seeded instances of both directory services.
pub fn register_services(hub: &ServiceHub) {
    hub.register::<dyn PeopleApi>(Arc::new(PeopleService::seeded()));
    hub.register::<dyn CompanyApi>(Arc::new(CompanyService::seeded()));
    tracing::debug!("directory services registered");
}
