use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::options::BigQueryOptions;
use crate::session::{Session, SessionId};
use crate::table::TableReference;
use crate::Result;

/// SQL dialect accepted by the BigQuery query engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dialect {
    Legacy,
    Standard,
}

impl Dialect {
    pub fn is_legacy(self) -> bool {
        self == Dialect::Legacy
    }
}

/// A query job submitted through the client's query cache.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryJob {
    pub job_id: String,
    /// SQL the job runs, as submitted.
    pub query: String,
    /// Table the job writes its result to.
    pub destination: TableReference,
}

/// The warehouse client of one pipeline session. It owns credentials and
/// connections; every network round trip of this crate goes through it.
///
/// Errors are returned to callers unchanged, this crate never retries.
#[async_trait]
pub trait BigQueryClient: Send + Sync {
    /// Whether results of identical queries are reused across runs.
    fn is_query_cache_enabled(&self) -> bool;

    /// Submit `sql` as an asynchronous job, or return the job whose cached
    /// result already answers it.
    async fn submit_cached_query(&self, sql: &str, flatten_results: bool) -> Result<QueryJob>;

    /// Block until every job reached a terminal state. Waiting on a job
    /// that already finished must return immediately.
    async fn wait_for(&self, jobs: &[QueryJob]) -> Result<()>;

    /// Decide whether `sql` is legacy or standard SQL, typically by dry runs.
    async fn classify_dialect(&self, sql: &str, flatten_results: bool) -> Result<Dialect>;

    /// Run `sql` to completion and return the table holding its result.
    async fn run_query(&self, sql: &str, flatten_results: bool) -> Result<TableReference>;
}

/// Builds the client of a session from the session's options.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, options: &BigQueryOptions) -> Result<Arc<dyn BigQueryClient>>;
}

type ClientCell = Arc<OnceCell<Arc<dyn BigQueryClient>>>;

/// One [`BigQueryClient`](BigQueryClient) per session, built on first use.
///
/// The map lock is only held to fetch the session's cell; construction runs
/// outside of it, so sessions never wait on each other. Concurrent first
/// calls for the same session share a single construction. A failed
/// construction leaves the cell empty and the next call tries again.
pub struct ClientCache {
    factory: Arc<dyn ClientFactory>,
    clients: Mutex<HashMap<SessionId, ClientCell>>,
}

impl ClientCache {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn cell(&self, id: SessionId) -> ClientCell {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        clients.entry(id).or_default().clone()
    }

    /// The client of `session`, connecting it if this is the first request.
    pub async fn client_for(&self, session: &dyn Session) -> Result<Arc<dyn BigQueryClient>> {
        let id = session.id();
        let cell = self.cell(id);
        let client = cell
            .get_or_try_init(|| async {
                let options = session.options();
                info!(
                    session = %id,
                    project = ?options.project,
                    priority = ?options.priority,
                    query_cache = options.query_cache,
                    "Connecting BigQuery client"
                );
                self.factory.connect(options).await
            })
            .await?;
        debug!(session = %id, "Using cached BigQuery client");
        Ok(Arc::clone(client))
    }

    /// Number of sessions holding a client.
    pub fn len(&self) -> usize {
        let clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        clients.values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
