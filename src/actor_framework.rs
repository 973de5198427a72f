use std::fmt::{Debug, Display};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{StoreError, StoreResult};

// =============================================================================
// 1. THE ABSTRACTION
// =============================================================================

/// Trait that any domain entity must implement to be managed by ResourceActor
pub trait Entity: Clone + Send + Sync + 'static {
    /// Label used in tracing output
    const KIND: &'static str;

    type Id: Copy + Eq + Send + Sync + Display + Debug + 'static;
    type CreatePayload: Send + Sync + Debug + 'static;
    type Patch: Send + Sync + Debug + 'static;
    type Lookup: Send + Sync + Debug + 'static;

    /// Get the ID of the entity
    fn id(&self) -> Self::Id;

    /// Construct the full Entity from the assigned ID and Payload
    fn from_create(id: Self::Id, payload: Self::CreatePayload) -> Self;

    /// Merge a patch into the entity. Absent fields keep their value.
    fn on_update(&mut self, patch: Self::Patch);

    /// Whether the entity satisfies a secondary lookup
    fn matches(&self, lookup: &Self::Lookup) -> bool;
}

/// Blocking storage that a ResourceActor drives. Each call is a complete
/// operation against durable state; the actor guarantees at most one is in
/// flight at a time.
pub trait Backend<T: Entity>: Clone + Send + Sync + 'static {
    fn list(&self) -> StoreResult<Vec<T>>;
    fn get(&self, id: T::Id) -> StoreResult<Option<T>>;
    fn find(&self, lookup: &T::Lookup) -> StoreResult<Option<T>>;
    fn create(&self, payload: T::CreatePayload) -> StoreResult<T::Id>;
    fn update(&self, id: T::Id, patch: T::Patch) -> StoreResult<T>;
    fn delete(&self, id: T::Id) -> StoreResult<()>;
}

// =============================================================================
// 2. THE GENERIC MESSAGES
// =============================================================================

pub type Response<T> = oneshot::Sender<StoreResult<T>>;

#[derive(Debug)]
pub enum ResourceRequest<T: Entity> {
    Create {
        payload: T::CreatePayload,
        respond_to: Response<T::Id>,
    },
    Get {
        id: T::Id,
        respond_to: Response<Option<T>>,
    },
    List {
        respond_to: Response<Vec<T>>,
    },
    Find {
        lookup: T::Lookup,
        respond_to: Response<Option<T>>,
    },
    Update {
        id: T::Id,
        patch: T::Patch,
        respond_to: Response<T>,
    },
    Delete {
        id: T::Id,
        respond_to: Response<()>,
    },
}

// =============================================================================
// 3. THE GENERIC ACTOR SERVER
// =============================================================================

/// Single-writer task in front of a [`Backend`]. Requests are handled strictly
/// one after another, so read-modify-write cycles never interleave.
pub struct ResourceActor<T: Entity, B: Backend<T>> {
    receiver: mpsc::Receiver<ResourceRequest<T>>,
    backend: B,
}

impl<T: Entity, B: Backend<T>> ResourceActor<T, B> {
    pub fn new(buffer_size: usize, backend: B) -> (Self, ResourceClient<T>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self { receiver, backend };
        let client = ResourceClient::new(sender);
        (actor, client)
    }

    #[instrument(name = "resource_actor", skip(self), fields(kind = T::KIND))]
    pub async fn run(mut self) {
        info!("Actor starting");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ResourceRequest::Create { payload, respond_to } => {
                    debug!(?payload, "Processing create request");
                    let result = self.blocking(move |backend| backend.create(payload)).await;
                    match &result {
                        Ok(id) => info!(id = %id, "Created"),
                        Err(e) => warn!(error = %e, "Create rejected"),
                    }
                    let _ = respond_to.send(result);
                }
                ResourceRequest::Get { id, respond_to } => {
                    debug!(id = %id, "Processing get request");
                    let result = self.blocking(move |backend| backend.get(id)).await;
                    let _ = respond_to.send(result);
                }
                ResourceRequest::List { respond_to } => {
                    debug!("Processing list request");
                    let result = self.blocking(|backend| backend.list()).await;
                    if let Ok(items) = &result {
                        debug!(count = items.len(), "Listed");
                    }
                    let _ = respond_to.send(result);
                }
                ResourceRequest::Find { lookup, respond_to } => {
                    debug!(?lookup, "Processing find request");
                    let result = self.blocking(move |backend| backend.find(&lookup)).await;
                    let _ = respond_to.send(result);
                }
                ResourceRequest::Update { id, patch, respond_to } => {
                    debug!(id = %id, ?patch, "Processing update request");
                    let result = self.blocking(move |backend| backend.update(id, patch)).await;
                    match &result {
                        Ok(item) => info!(id = %item.id(), "Updated"),
                        Err(e) => warn!(id = %id, error = %e, "Update rejected"),
                    }
                    let _ = respond_to.send(result);
                }
                ResourceRequest::Delete { id, respond_to } => {
                    debug!(id = %id, "Processing delete request");
                    let result = self.blocking(move |backend| backend.delete(id)).await;
                    match &result {
                        Ok(()) => info!(id = %id, "Deleted"),
                        Err(e) => warn!(id = %id, error = %e, "Delete rejected"),
                    }
                    let _ = respond_to.send(result);
                }
            }
        }

        info!("Actor stopped");
    }

    /// Run one backend call on the blocking pool and wait for it before the
    /// next message is taken off the channel.
    async fn blocking<R, F>(&self, op: F) -> StoreResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&B) -> StoreResult<R> + Send + 'static,
    {
        let backend = self.backend.clone();
        match tokio::task::spawn_blocking(move || op(&backend)).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Backend task failed");
                Err(StoreError::ActorCommunication(e.to_string()))
            }
        }
    }
}

// =============================================================================
// 4. THE GENERIC CLIENT
// =============================================================================

#[derive(Clone)]
pub struct ResourceClient<T: Entity> {
    sender: mpsc::Sender<ResourceRequest<T>>,
}

impl<T: Entity> ResourceClient<T> {
    pub fn new(sender: mpsc::Sender<ResourceRequest<T>>) -> Self {
        Self { sender }
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(Response<R>) -> ResourceRequest<T>,
    ) -> StoreResult<R> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| StoreError::ActorCommunication("Actor closed".to_string()))?;
        response
            .await
            .map_err(|_| StoreError::ActorCommunication("Actor dropped".to_string()))?
    }

    pub async fn create(&self, payload: T::CreatePayload) -> StoreResult<T::Id> {
        self.request(|respond_to| ResourceRequest::Create { payload, respond_to })
            .await
    }

    pub async fn get(&self, id: T::Id) -> StoreResult<Option<T>> {
        self.request(|respond_to| ResourceRequest::Get { id, respond_to })
            .await
    }

    pub async fn list(&self) -> StoreResult<Vec<T>> {
        self.request(|respond_to| ResourceRequest::List { respond_to })
            .await
    }

    pub async fn find(&self, lookup: T::Lookup) -> StoreResult<Option<T>> {
        self.request(|respond_to| ResourceRequest::Find { lookup, respond_to })
            .await
    }

    pub async fn update(&self, id: T::Id, patch: T::Patch) -> StoreResult<T> {
        self.request(|respond_to| ResourceRequest::Update { id, patch, respond_to })
            .await
    }

    pub async fn delete(&self, id: T::Id) -> StoreResult<()> {
        self.request(|respond_to| ResourceRequest::Delete { id, respond_to })
            .await
    }
}

// =============================================================================
// 5. TESTS
// =============================================================================
