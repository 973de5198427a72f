use crate::actor_framework::Entity;
use crate::domain::{User, UserCreate, UserLookup, UserPatch};

impl Entity for User {
    const KIND: &'static str = "user";

    type Id = u64;
    type CreatePayload = UserCreate;
    type Patch = UserPatch;
    type Lookup = UserLookup;

    fn id(&self) -> u64 {
        self.id
    }

    /// Creates a new User from creation parameters.
    ///
    /// The payload's own `id` is ignored here; the store decides which id
    /// the row receives and passes it in.
    fn from_create(id: u64, params: UserCreate) -> Self {
        Self {
            id,
            name: params.name,
            email: params.email,
        }
    }

    /// Updates the user's profile information.
    ///
    /// # Fields Updated
    /// - `name`: User's display name
    /// - `email`: User's email address
    fn on_update(&mut self, patch: UserPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
    }

    fn matches(&self, lookup: &UserLookup) -> bool {
        match lookup {
            UserLookup::Email(email) => &self.email == email,
        }
    }
}
