//! The entry point of this crate.
//! # Example
//! A [`BigQuery`](BigQuery) needs a [`ClientFactory`](ClientFactory), which
//! turns the options of a session into a connected client:
//! ```rust
//! use std::sync::Arc;
//! use bigquery_io::{BigQueryClient, BigQueryOptions, ClientFactory, Result};
//!
//! struct Connector;
//!
//! #[async_trait::async_trait]
//! impl ClientFactory for Connector {
//!     async fn connect(&self, options: &BigQueryOptions) -> Result<Arc<dyn BigQueryClient>> {
//!         // 1. Authenticate with `options.credentials`
//!         // 2. Build a client billed to `options.project`
//!         todo!()
//!     }
//! }
//!
//! let bq = bigquery_io::BigQuery::new(Connector);
//! ```
use std::sync::Arc;

use crate::client::{BigQueryClient, ClientCache, ClientFactory};
use crate::io::{SelectIo, StorageIo, StorageReadParams, TableIo, TypedIo};
use crate::session::Session;
use crate::source::{Query, Table};
use crate::types::{BigQueryType, Record};
use crate::Result;

/// Builds BigQuery sources and sinks. Cheap to clone, clones share the
/// per-session client cache.
#[derive(Clone)]
pub struct BigQuery {
    clients: Arc<ClientCache>,
}

impl BigQuery {
    pub fn new<F: ClientFactory + 'static>(factory: F) -> Self {
        Self::from_factory(Arc::new(factory))
    }

    pub fn from_factory(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            clients: Arc::new(ClientCache::new(factory)),
        }
    }

    /// The client of `session`, connected on first use.
    pub async fn client_for(&self, session: &dyn Session) -> Result<Arc<dyn BigQueryClient>> {
        self.clients.client_for(session).await
    }

    pub fn clients(&self) -> &ClientCache {
        &self.clients
    }

    /// A table, read in full or written to.
    pub fn table<T: Record>(&self, table: Table) -> TableIo<T> {
        TableIo::new(self.clone(), table)
    }

    /// The result of `query`.
    pub fn select<T: Record>(&self, query: Query) -> SelectIo<T> {
        SelectIo::new(self.clone(), query)
    }

    /// A projection of `table`, filtered by the server, read through the
    /// Storage API.
    pub fn storage<T: Record>(&self, table: Table, params: StorageReadParams) -> StorageIo<T> {
        StorageIo::new(self.clone(), table, params)
    }

    /// The source `T` declares for itself.
    pub fn typed<T: BigQueryType>(&self) -> Result<TypedIo<T>> {
        TypedIo::resolve(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingFactory, RecordingSession};

    #[tokio::test]
    async fn clones_share_the_client_cache() {
        let factory = Arc::new(CountingFactory::new(false));
        let bq = BigQuery::from_factory(factory.clone());
        let other = bq.clone();
        let session = RecordingSession::new();

        let a = bq.client_for(&session).await.unwrap();
        let b = other.client_for(&session).await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!a.is_query_cache_enabled());
        assert_eq!(factory.connections(), 1);
        assert_eq!(other.clients().len(), 1);
    }
}
