use tracing::{error, info, warn};

use crate::actor_framework::ResourceActor;
use crate::clients::UserClient;
use crate::domain::User;
use crate::store::RecordStore;

const ACTOR_BUFFER: usize = 32;

/// Owns the user actor task and hands out clients to it.
///
/// Responsible for starting the actor over a store, and for waiting on it
/// during shutdown.
pub struct UserSystem {
    pub user_client: UserClient,
    handle: tokio::task::JoinHandle<()>,
}

impl UserSystem {
    /// Spawn the actor. Must be called from inside a Tokio runtime.
    pub fn start(store: RecordStore) -> Self {
        info!(
            path = %store.path().display(),
            uniqueness = ?store.uniqueness(),
            "Starting user system"
        );
        if let Err(e) = store.open() {
            warn!(error = %e, "Store is not readable yet; requests will fail until it is");
        }

        let (actor, resource_client) = ResourceActor::<User, _>::new(ACTOR_BUFFER, store);
        let handle = tokio::spawn(actor.run());

        Self {
            user_client: UserClient::new(resource_client),
            handle,
        }
    }

    /// Drop this system's client and wait for the actor to drain. Any clones
    /// still held elsewhere keep the actor alive until they are dropped too.
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down user system...");
        drop(self.user_client);

        if let Err(e) = self.handle.await {
            error!("Actor task failed: {:?}", e);
            return Err(format!("Actor task failed: {:?}", e));
        }

        info!("User system shutdown complete.");
        Ok(())
    }
}
