//! The slice of the pipeline framework this crate builds on.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::options::BigQueryOptions;
use crate::read::ReadRequest;
use crate::types::TableRow;
use crate::write::{WriteRequest, WriteResult};
use crate::Result;

/// Identity of a pipeline-construction session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// A process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SessionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Handle of a node in the session's pipeline graph. Nodes produce raw rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Run when the session closes, after the pipeline finished.
pub type TeardownHook = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// A pipeline under construction.
///
/// Every method only records into the pipeline graph; none of them performs
/// I/O against BigQuery.
pub trait Session: Send + Sync {
    fn id(&self) -> SessionId;

    fn options(&self) -> &BigQueryOptions;

    /// Add a BigQuery read to the graph.
    fn apply_read(&self, request: ReadRequest) -> Result<NodeId>;

    /// Add a BigQuery write of `rows` to the graph.
    fn apply_write(&self, rows: Dataset<TableRow>, request: WriteRequest) -> Result<WriteResult>;

    /// Attach a sink that drops every element of `node`, so that the branch
    /// counts as consumed.
    fn discard(&self, node: NodeId) -> Result<()>;

    fn on_close(&self, hook: TeardownHook);
}

/// A lazily evaluated collection of `T`, derived from the raw rows of a
/// pipeline node by a per-element conversion.
pub struct Dataset<T> {
    node: NodeId,
    convert: Arc<dyn Fn(TableRow) -> Result<T> + Send + Sync>,
}

impl<T> Clone for Dataset<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node,
            convert: Arc::clone(&self.convert),
        }
    }
}

impl<T> fmt::Debug for Dataset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset").field("node", &self.node).finish()
    }
}

impl Dataset<TableRow> {
    /// The raw rows of `node`.
    pub fn rows(node: NodeId) -> Self {
        Self::new(node, Ok)
    }
}

impl<T: 'static> Dataset<T> {
    pub fn new<F>(node: NodeId, convert: F) -> Self
    where
        F: Fn(TableRow) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            node,
            convert: Arc::new(convert),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Turn one raw row of the node into an element. Called by the runner.
    pub fn convert(&self, row: TableRow) -> Result<T> {
        (self.convert)(row)
    }

    /// Append a per-element step.
    pub fn map<U, F>(self, f: F) -> Dataset<U>
    where
        U: 'static,
        F: Fn(T) -> Result<U> + Send + Sync + 'static,
    {
        let convert = self.convert;
        Dataset::new(self.node, move |row| convert(row).and_then(&f))
    }
}
