//! In-memory sessions and clients for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{BigQueryClient, ClientFactory, Dialect, QueryJob};
use crate::options::BigQueryOptions;
use crate::read::ReadRequest;
use crate::session::{Dataset, NodeId, Session, SessionId, TeardownHook};
use crate::table::TableReference;
use crate::types::TableRow;
use crate::write::{WriteRequest, WriteResult};
use crate::{BigQuery, Result};

struct Write {
    rows: Dataset<TableRow>,
    request: WriteRequest,
    failed: NodeId,
}

/// Records everything applied to it. Nodes are numbered from 1 in the order
/// they are created.
pub struct RecordingSession {
    id: SessionId,
    options: BigQueryOptions,
    next_node: AtomicUsize,
    reads: Mutex<Vec<(NodeId, ReadRequest)>>,
    writes: Mutex<Vec<Write>>,
    discarded: Mutex<Vec<NodeId>>,
    hooks: Mutex<Vec<TeardownHook>>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self {
            id: SessionId::next(),
            options: BigQueryOptions::default(),
            next_node: AtomicUsize::new(1),
            reads: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            discarded: Mutex::new(Vec::new()),
            hooks: Mutex::new(Vec::new()),
        }
    }

    fn node(&self) -> NodeId {
        NodeId(self.next_node.fetch_add(1, Ordering::SeqCst) as u64)
    }

    /// The read that created `node`.
    pub fn read(&self, node: NodeId) -> ReadRequest {
        self.reads
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| *id == node)
            .map(|(_, request)| request.clone())
            .unwrap_or_else(|| panic!("no read produced {:?}", node))
    }

    pub fn reads(&self) -> usize {
        self.reads.lock().unwrap().len()
    }

    pub fn write(&self, i: usize) -> WriteRequest {
        self.writes.lock().unwrap()[i].request.clone()
    }

    /// The rows handed to the `i`th write.
    pub fn written_rows(&self, i: usize) -> Dataset<TableRow> {
        self.writes.lock().unwrap()[i].rows.clone()
    }

    pub fn failed_node(&self, i: usize) -> NodeId {
        self.writes.lock().unwrap()[i].failed
    }

    pub fn writes(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn discarded(&self) -> Vec<NodeId> {
        self.discarded.lock().unwrap().clone()
    }

    pub fn hooks(&self) -> usize {
        self.hooks.lock().unwrap().len()
    }

    /// Run the teardown hooks in registration order.
    pub async fn close(&self) -> Result<()> {
        let hooks: Vec<_> = self.hooks.lock().unwrap().drain(..).collect();
        for hook in hooks {
            hook().await?;
        }
        Ok(())
    }
}

impl Session for RecordingSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn options(&self) -> &BigQueryOptions {
        &self.options
    }

    fn apply_read(&self, request: ReadRequest) -> Result<NodeId> {
        let node = self.node();
        self.reads.lock().unwrap().push((node, request));
        Ok(node)
    }

    fn apply_write(&self, rows: Dataset<TableRow>, request: WriteRequest) -> Result<WriteResult> {
        let failed = self.node();
        self.writes.lock().unwrap().push(Write { rows, request, failed });
        Ok(WriteResult { failed_inserts: failed })
    }

    fn discard(&self, node: NodeId) -> Result<()> {
        self.discarded.lock().unwrap().push(node);
        Ok(())
    }

    fn on_close(&self, hook: TeardownHook) {
        self.hooks.lock().unwrap().push(hook);
    }
}

/// A client answering from memory. Cached jobs write to `proj:cache.job_N`,
/// synchronous queries to `proj:results.run_N`.
pub struct FakeClient {
    cache_enabled: bool,
    dialect: Dialect,
    failing: bool,
    jobs: AtomicUsize,
    submitted: Mutex<Vec<(String, bool)>>,
    classified: Mutex<Vec<(String, bool)>>,
    waited: Mutex<Vec<String>>,
    ran: Mutex<Vec<(String, bool)>>,
}

impl FakeClient {
    fn with(cache_enabled: bool, dialect: Dialect) -> Self {
        Self {
            cache_enabled,
            dialect,
            failing: false,
            jobs: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
            classified: Mutex::new(Vec::new()),
            waited: Mutex::new(Vec::new()),
            ran: Mutex::new(Vec::new()),
        }
    }

    pub fn cached() -> Self {
        Self::with(true, Dialect::Standard)
    }

    /// Classifies every unmarked query as `dialect`.
    pub fn uncached(dialect: Dialect) -> Self {
        Self::with(false, dialect)
    }

    /// Fail every dry run.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    fn next_job(&self) -> usize {
        self.jobs.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn submitted(&self) -> Vec<(String, bool)> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn classified(&self) -> Vec<(String, bool)> {
        self.classified.lock().unwrap().clone()
    }

    pub fn waited(&self) -> Vec<String> {
        self.waited.lock().unwrap().clone()
    }

    pub fn ran(&self) -> Vec<(String, bool)> {
        self.ran.lock().unwrap().clone()
    }
}

#[async_trait]
impl BigQueryClient for FakeClient {
    fn is_query_cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    async fn submit_cached_query(&self, sql: &str, flatten_results: bool) -> Result<QueryJob> {
        self.submitted.lock().unwrap().push((sql.to_string(), flatten_results));
        let job_id = format!("job_{}", self.next_job());
        Ok(QueryJob {
            destination: TableReference::new("proj", "cache", &job_id),
            job_id,
            query: sql.to_string(),
        })
    }

    async fn wait_for(&self, jobs: &[QueryJob]) -> Result<()> {
        let mut waited = self.waited.lock().unwrap();
        waited.extend(jobs.iter().map(|job| job.job_id.clone()));
        Ok(())
    }

    async fn classify_dialect(&self, sql: &str, flatten_results: bool) -> Result<Dialect> {
        self.classified.lock().unwrap().push((sql.to_string(), flatten_results));
        if self.failing {
            return Err(tonic::Status::invalid_argument("dry run failed").into());
        }
        Ok(self.dialect)
    }

    async fn run_query(&self, sql: &str, flatten_results: bool) -> Result<TableReference> {
        self.ran.lock().unwrap().push((sql.to_string(), flatten_results));
        Ok(TableReference::new("proj", "results", &format!("run_{}", self.next_job())))
    }
}

/// Always hands out the same client.
struct FixedFactory(Arc<FakeClient>);

#[async_trait]
impl ClientFactory for FixedFactory {
    async fn connect(&self, _options: &BigQueryOptions) -> Result<Arc<dyn BigQueryClient>> {
        Ok(self.0.clone())
    }
}

/// A `BigQuery` whose every session talks to `client`.
pub fn fixture(client: FakeClient) -> (BigQuery, Arc<FakeClient>) {
    let client = Arc::new(client);
    (BigQuery::new(FixedFactory(Arc::clone(&client))), client)
}

/// Builds a fresh client per connection and counts connections.
pub struct CountingFactory {
    cache_enabled: bool,
    delay: Option<Duration>,
    fail_first: bool,
    connections: AtomicUsize,
}

impl CountingFactory {
    pub fn new(cache_enabled: bool) -> Self {
        Self {
            cache_enabled,
            delay: None,
            fail_first: false,
            connections: AtomicUsize::new(0),
        }
    }

    /// Takes a while to connect, so that concurrent callers overlap.
    pub fn slow(cache_enabled: bool) -> Self {
        Self {
            delay: Some(Duration::from_millis(50)),
            ..Self::new(cache_enabled)
        }
    }

    /// The first connection attempt fails.
    pub fn failing_once(cache_enabled: bool) -> Self {
        Self {
            fail_first: true,
            ..Self::new(cache_enabled)
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for CountingFactory {
    async fn connect(&self, _options: &BigQueryOptions) -> Result<Arc<dyn BigQueryClient>> {
        let attempt = self.connections.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_first && attempt == 0 {
            return Err(tonic::Status::unavailable("warehouse unreachable").into());
        }
        Ok(Arc::new(FakeClient::with(self.cache_enabled, Dialect::Standard)))
    }
}
