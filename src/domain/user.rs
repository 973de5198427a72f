use serde::{Deserialize, Serialize};

/// A user row as stored in the sheet and returned over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
}

/// Payload for creating a new user.
///
/// `id` is only honoured when the store runs without identity uniqueness
/// (the basic variant); otherwise the store always assigns one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCreate {
    pub id: Option<u64>,
    pub name: String,
    pub email: String,
}

/// Payload for updating an existing user. Fields left as `None` keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Secondary lookups supported by the user store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    Email(String),
}

impl User {
    pub fn new(id: u64, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
        }
    }
}

impl UserCreate {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }
}

impl UserPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: None,
        }
    }

    pub fn email(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: Some(email.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}
