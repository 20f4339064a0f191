use serde::{Deserialize, Serialize};

/// A person in the directory. An empty `id` is assigned on creation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Person {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
}

impl Person {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        company: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            company: company.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Company {
    pub id: String,
    pub name: String,
}

impl Company {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
        }
    }
}

/// Optional filters for a people search; empty values match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeopleQuery {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
}
