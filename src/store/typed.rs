//! Typed access on top of [`DocumentStore`].
//!
//! Handlers work with [`Stored<T>`] for an [`Entity`] `T`; these helpers
//! pick the collection from `T::COLLECTION` and convert documents.

use super::{DocumentStore, Query, StoreError};
use crate::domain::{Entity, RecordId, Stored};
use crate::error::GatewayError;

/// Loads `T` by id.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] (`"<Entity> not found"`) if absent,
/// or a store error.
pub async fn fetch<T: Entity>(
    store: &dyn DocumentStore,
    id: RecordId,
) -> Result<Stored<T>, GatewayError> {
    let Some(document) = store.get(T::COLLECTION, id).await? else {
        return Err(GatewayError::NotFound(format!("{} not found", T::NAME)));
    };
    Stored::from_document(document).map_err(|e| GatewayError::Store(e.into()))
}

/// Runs `query` against `T`'s collection.
///
/// # Errors
///
/// Returns a store error, including for documents that fail to decode.
pub async fn find<T: Entity>(
    store: &dyn DocumentStore,
    query: &Query,
) -> Result<Vec<Stored<T>>, GatewayError> {
    let documents = store.query(T::COLLECTION, query).await?;
    documents
        .into_iter()
        .map(Stored::from_document)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| GatewayError::Store(e.into()))
}

/// Creates or replaces `stored`.
///
/// # Errors
///
/// Returns a store error.
pub async fn save<T: Entity>(
    store: &dyn DocumentStore,
    stored: &Stored<T>,
) -> Result<(), GatewayError> {
    let document = stored.to_document().map_err(StoreError::from)?;
    store.put(T::COLLECTION, document).await?;
    Ok(())
}
