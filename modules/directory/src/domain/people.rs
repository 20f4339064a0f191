use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::{contains_ci, new_id};
use crate::contract::{
    client::PeopleApi,
    error::DirectoryError,
    model::{PeopleQuery, Person},
};

/// In-memory people store.
#[derive(Debug, Default)]
pub struct PeopleService {
    people: RwLock<Vec<Person>>,
}

impl PeopleService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with a handful of sample people.
    pub fn seeded() -> Self {
        let svc = Self::new();
        for p in [
            Person::new("Dagobert", "Duck", "ACME"),
            Person::new("Seppl", "Kasperls Freund", "Kids Club"),
            Person::new("Kasperl", "Seppls Freund", "Kids Club"),
            Person::new("Räuber", "Hotzenplotz", "n.a."),
            Person::new("Dimpfelmoser", "Wachtmeister", "Polizei"),
            Person::new("Inspector", "Gadget", "Polizei"),
        ] {
            svc.insert(p);
        }
        svc
    }

    fn insert(&self, mut person: Person) -> String {
        if person.id.is_empty() {
            person.id = new_id();
        }
        let id = person.id.clone();
        self.people.write().push(person);
        id
    }

    fn remove(&self, id: &str) -> bool {
        let mut people = self.people.write();
        match people.iter().position(|p| p.id == id) {
            Some(idx) => {
                people.remove(idx);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PeopleApi for PeopleService {
    async fn people(&self) -> Vec<Person> {
        self.people.read().clone()
    }

    async fn search_people(&self, query: PeopleQuery) -> Vec<Person> {
        self.people
            .read()
            .iter()
            .filter(|p| {
                contains_ci(&p.first_name, query.first_name.as_deref())
                    && contains_ci(&p.last_name, query.last_name.as_deref())
                    && contains_ci(&p.company, query.company.as_deref())
            })
            .cloned()
            .collect()
    }

    async fn people_by_company(&self, company: &str) -> Vec<Person> {
        let company = company.to_lowercase();
        self.people
            .read()
            .iter()
            .filter(|p| p.company.to_lowercase() == company)
            .cloned()
            .collect()
    }

    async fn person(&self, id: &str) -> Result<Person, DirectoryError> {
        self.people
            .read()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| DirectoryError::person_not_found(id))
    }

    async fn create_person(&self, person: Person) -> Result<(), DirectoryError> {
        let id = self.insert(person);
        debug!(%id, "person created");
        Ok(())
    }

    async fn delete_person(&self, id: &str) {
        if self.remove(id) {
            debug!(%id, "person deleted");
        }
    }

    async fn update_person(&self, person: Person) -> Result<(), DirectoryError> {
        if person.id.is_empty() {
            return Err(DirectoryError::validation("Person id is required"));
        }
        self.remove(&person.id);
        self.insert(person);
        Ok(())
    }
}
