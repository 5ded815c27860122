use std::sync::Arc;

use larder_types::Record;

use crate::collection::IndexedCollection;
use crate::concurrent::ConcurrentIndexedCollection;
use crate::error::ProviderError;

/// Builds empty collections for a record type.
pub trait CollectionProvider<T: Record>: Send + Sync {
    /// Provider name, for logs and errors.
    fn name(&self) -> &str;

    fn build(&self) -> Result<Arc<dyn IndexedCollection<T>>, ProviderError>;
}

/// Provides [`ConcurrentIndexedCollection`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConcurrentCollectionProvider {
    /// Initial record capacity of each built collection.
    pub initial_capacity: usize,
}

impl ConcurrentCollectionProvider {
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self { initial_capacity }
    }
}

impl<T: Record> CollectionProvider<T> for ConcurrentCollectionProvider {
    fn name(&self) -> &str {
        "concurrent"
    }

    fn build(&self) -> Result<Arc<dyn IndexedCollection<T>>, ProviderError> {
        Ok(Arc::new(ConcurrentIndexedCollection::<T>::with_capacity(
            self.initial_capacity,
        )))
    }
}
