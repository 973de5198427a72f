//! # Mock Framework
//!
//! Utilities for testing clients in isolation.
//!
//! Use [`create_mock_client`] to get a client and a receiver.
//! Then use helpers like [`expect_create`] or [`expect_find`] to assert behavior.

use tokio::sync::mpsc;

use crate::actor_framework::{Entity, ResourceClient, ResourceRequest, Response};

/// Creates a mock client and a receiver for asserting requests.
///
/// The client sends to a channel the test controls, so the test plays the part
/// of the actor: inspect each request, then answer with success or failure.
pub fn create_mock_client<T: Entity>(
    buffer_size: usize,
) -> (ResourceClient<T>, mpsc::Receiver<ResourceRequest<T>>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (ResourceClient::new(sender), receiver)
}

/// Helper to verify that the next message is a Create request
pub async fn expect_create<T: Entity>(
    receiver: &mut mpsc::Receiver<ResourceRequest<T>>,
) -> Option<(T::CreatePayload, Response<T::Id>)> {
    match receiver.recv().await {
        Some(ResourceRequest::Create { payload, respond_to }) => Some((payload, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a Get request
pub async fn expect_get<T: Entity>(
    receiver: &mut mpsc::Receiver<ResourceRequest<T>>,
) -> Option<(T::Id, Response<Option<T>>)> {
    match receiver.recv().await {
        Some(ResourceRequest::Get { id, respond_to }) => Some((id, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a Find request
pub async fn expect_find<T: Entity>(
    receiver: &mut mpsc::Receiver<ResourceRequest<T>>,
) -> Option<(T::Lookup, Response<Option<T>>)> {
    match receiver.recv().await {
        Some(ResourceRequest::Find { lookup, respond_to }) => Some((lookup, respond_to)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{User, UserCreate};

    #[tokio::test]
    async fn test_mock_client() {
        let (client, mut receiver) = create_mock_client::<User>(10);

        let create_task = tokio::spawn(async move {
            client.create(UserCreate::new("Test", "test@example.com")).await
        });

        let (payload, responder) = expect_create(&mut receiver).await.expect("Expected Create request");
        assert_eq!(payload.name, "Test");
        responder.send(Ok(1)).unwrap();

        let result = create_task.await.unwrap();
        assert_eq!(result, Ok(1));
    }

    #[tokio::test]
    async fn expect_helpers_reject_other_requests() {
        let (client, mut receiver) = create_mock_client::<User>(10);

        tokio::spawn(async move {
            let _ = client.list().await;
        });

        assert!(expect_get(&mut receiver).await.is_none());
    }
}
