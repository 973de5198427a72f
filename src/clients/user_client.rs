use tracing::{debug, instrument};

use crate::actor_framework::ResourceClient;
use crate::domain::{User, UserCreate, UserLookup, UserPatch};
use crate::error::StoreResult;

/// Client for interacting with the User actor.
///
/// Cheap to clone; every clone talks to the same single-writer actor.
#[derive(Clone)]
pub struct UserClient {
    inner: ResourceClient<User>,
}

impl_basic_client!(UserClient, User, user);

impl UserClient {
    #[instrument(skip(self, payload), fields(user_name = %payload.name, user_email = %payload.email))]
    pub async fn create_user(&self, payload: UserCreate) -> StoreResult<u64> {
        debug!("Sending request");
        self.inner.create(payload).await
    }

    #[instrument(skip(self))]
    pub async fn update_user(&self, id: u64, patch: UserPatch) -> StoreResult<User> {
        debug!("Sending request");
        self.inner.update(id, patch).await
    }

    #[instrument(skip(self))]
    pub async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        debug!("Sending request");
        self.inner.find(UserLookup::Email(email.to_string())).await
    }
}
