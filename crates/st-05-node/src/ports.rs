//! # Ports of the node façade
//!
//! The inbound API clients drive, and the time source the scheduler
//! consults for each batch.

use crate::errors::NodeError;
use async_trait::async_trait;
use shared_types::{Request, Response, StorageReference, TransactionReference};
use st_03_state_store::{ObjectState, StateId};

/// The public API of a running node.
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// Enqueues a request and returns its reference at once; the caller
    /// may poll [`NodeApi::get_response`] with it.
    async fn post(&self, request: Request) -> Result<TransactionReference, NodeError>;

    /// Enqueues a request and waits for its response, up to the
    /// configured timeout. On timeout the request may still commit.
    async fn add(&self, request: Request) -> Result<Response, NodeError>;

    /// The response of a committed transaction, against the latest state.
    async fn get_response(
        &self,
        reference: &TransactionReference,
    ) -> Result<Option<Response>, NodeError>;

    /// The request of a committed transaction, against the latest state.
    async fn get_request(
        &self,
        reference: &TransactionReference,
    ) -> Result<Option<Request>, NodeError>;

    /// The newest-first history of an object, against the latest state.
    async fn get_history(
        &self,
        object: &StorageReference,
    ) -> Result<Vec<TransactionReference>, NodeError>;

    /// The folded field values of an object, against the latest state.
    async fn get_state(
        &self,
        object: &StorageReference,
    ) -> Result<Option<ObjectState>, NodeError>;

    /// The manifest pointer, once the node is initialized.
    async fn get_manifest(&self) -> Result<Option<StorageReference>, NodeError>;

    /// The identity of the latest committed state.
    async fn state_id(&self) -> Result<StateId, NodeError>;
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Current timestamp in milliseconds since the epoch.
    fn now(&self) -> u64;
}
