//! Sources and sinks, one per kind of BigQuery access.
//!
//! Every adapter is generic over its element type: `TableRow` reads and
//! writes raw rows, any other [`Record`](Record) converts on the way.

use std::marker::PhantomData;

use async_trait::async_trait;
use tracing::info;

use crate::read::ReadRequest;
use crate::session::{Dataset, Session};
use crate::source::{Query, Table};
use crate::tap::Tap;
use crate::types::{BigQueryType, DeclaredSource, Record, TableRow};
use crate::write::WriteParams;
use crate::{BigQuery, Error, Result};

/// A BigQuery source or sink of `T`.
#[async_trait]
pub trait BigQueryIo<T: Record>: Send + Sync {
    type ReadParams: Send + 'static;
    type WriteParams: Send + 'static;

    /// Stable identifier used by test harnesses to substitute this IO.
    fn test_id(&self) -> String;

    /// Add a read to the pipeline.
    async fn read(&self, session: &dyn Session, params: Self::ReadParams) -> Result<Dataset<T>>;

    /// Add a write to the pipeline.
    async fn write(
        &self,
        session: &dyn Session,
        data: Dataset<T>,
        params: Self::WriteParams,
    ) -> Result<Tap<T>>;

    /// Resolve what a read would return, right away, outside of the pipeline.
    async fn tap(&self, session: &dyn Session, params: Self::ReadParams) -> Result<Tap<T>>;
}

fn records<T: Record>(rows: Dataset<TableRow>) -> Dataset<T> {
    rows.map(T::from_row)
}

fn read_only<T>(test_id: String) -> Result<Tap<T>> {
    Err(Error::unsupported(format!("{} is read-only", test_id)))
}

/// A table, read in full or written to.
pub struct TableIo<T> {
    bq: BigQuery,
    table: Table,
    _record: PhantomData<fn() -> T>,
}

impl<T> TableIo<T> {
    pub fn new(bq: BigQuery, table: Table) -> Self {
        Self {
            bq,
            table,
            _record: PhantomData,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }
}

#[async_trait]
impl<T: Record> BigQueryIo<T> for TableIo<T> {
    type ReadParams = ();
    type WriteParams = WriteParams;

    fn test_id(&self) -> String {
        format!("BigQueryIO({})", self.table.spec())
    }

    async fn read(&self, session: &dyn Session, _params: ()) -> Result<Dataset<T>> {
        let rows = self.bq.execute_table_read(session, ReadRequest::new(), &self.table)?;
        Ok(records(rows))
    }

    async fn write(&self, session: &dyn Session, data: Dataset<T>, params: WriteParams) -> Result<Tap<T>> {
        self.bq.write_table(session, data, &self.table, params)
    }

    async fn tap(&self, _session: &dyn Session, _params: ()) -> Result<Tap<T>> {
        Ok(Tap::for_table(self.table.clone()))
    }
}

/// Read parameters of a [`SelectIo`](SelectIo).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SelectParams {
    /// Flatten nested and repeated fields. Only meaningful for legacy SQL.
    pub flatten_results: bool,
}

/// The result of a query. Read-only.
pub struct SelectIo<T> {
    bq: BigQuery,
    query: Query,
    _record: PhantomData<fn() -> T>,
}

impl<T> SelectIo<T> {
    pub fn new(bq: BigQuery, query: Query) -> Self {
        Self {
            bq,
            query,
            _record: PhantomData,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }
}

#[async_trait]
impl<T: Record> BigQueryIo<T> for SelectIo<T> {
    type ReadParams = SelectParams;
    type WriteParams = ();

    fn test_id(&self) -> String {
        format!("BigQueryIO({})", self.query.underlying())
    }

    async fn read(&self, session: &dyn Session, params: SelectParams) -> Result<Dataset<T>> {
        let rows = self
            .bq
            .execute_query(session, ReadRequest::new(), self.query.underlying(), params.flatten_results)
            .await?;
        Ok(records(rows))
    }

    async fn write(&self, _session: &dyn Session, _data: Dataset<T>, _params: ()) -> Result<Tap<T>> {
        read_only(self.test_id())
    }

    async fn tap(&self, session: &dyn Session, params: SelectParams) -> Result<Tap<T>> {
        let client = self.bq.client_for(session).await?;
        let destination = client
            .run_query(self.query.underlying(), params.flatten_results)
            .await?;
        info!(destination = %destination, "Query tapped");
        Ok(Tap::for_table(Table::from_ref(destination)))
    }
}

/// Projection and filter of a [`StorageIo`](StorageIo).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageReadParams {
    /// Columns to read, in this order. Empty reads every column.
    pub selected_fields: Vec<String>,
    /// Filter applied by the server, like a `WHERE` clause without aggregates.
    pub row_restriction: Option<String>,
}

/// A table read through the Storage API. Read-only.
pub struct StorageIo<T> {
    bq: BigQuery,
    table: Table,
    params: StorageReadParams,
    _record: PhantomData<fn() -> T>,
}

impl<T> StorageIo<T> {
    pub fn new(bq: BigQuery, table: Table, params: StorageReadParams) -> Self {
        Self {
            bq,
            table,
            params,
            _record: PhantomData,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn params(&self) -> &StorageReadParams {
        &self.params
    }
}

#[async_trait]
impl<T: Record> BigQueryIo<T> for StorageIo<T> {
    type ReadParams = ();
    type WriteParams = ();

    fn test_id(&self) -> String {
        format!(
            "BigQueryIO({}, List({}), {})",
            self.table.spec(),
            self.params.selected_fields.join(","),
            self.params.row_restriction.as_deref().unwrap_or("None")
        )
    }

    async fn read(&self, session: &dyn Session, _params: ()) -> Result<Dataset<T>> {
        let rows = self.bq.execute_storage_read(
            session,
            ReadRequest::new(),
            &self.table,
            &self.params.selected_fields,
            self.params.row_restriction.as_deref(),
        )?;
        Ok(records(rows))
    }

    async fn write(&self, _session: &dyn Session, _data: Dataset<T>, _params: ()) -> Result<Tap<T>> {
        read_only(self.test_id())
    }

    async fn tap(&self, _session: &dyn Session, _params: ()) -> Result<Tap<T>> {
        Ok(Tap::for_storage(self.table.clone(), &self.params))
    }
}

/// The source a [`BigQueryType`](BigQueryType) declares for itself.
pub enum TypedIo<T> {
    Table(TableIo<T>),
    Select(SelectIo<T>),
    Storage(StorageIo<T>),
}

impl<T: BigQueryType> TypedIo<T> {
    /// Pick the adapter matching the source `T` declares. Fails when `T`
    /// declares none or several.
    pub fn resolve(bq: &BigQuery) -> Result<Self> {
        let io = match DeclaredSource::of::<T>()? {
            DeclaredSource::Table(spec) => TypedIo::Table(TableIo::new(bq.clone(), Table::from_spec(spec))),
            DeclaredSource::Query(sql) => TypedIo::Select(SelectIo::new(bq.clone(), Query::from_string(sql))),
            DeclaredSource::Storage(storage) => {
                let params = StorageReadParams {
                    selected_fields: storage.selected_fields.iter().map(|f| f.to_string()).collect(),
                    row_restriction: storage.row_restriction.map(str::to_string),
                };
                TypedIo::Storage(StorageIo::new(bq.clone(), Table::from_spec(storage.table), params))
            }
        };
        Ok(io)
    }
}

#[async_trait]
impl<T: BigQueryType> BigQueryIo<T> for TypedIo<T> {
    type ReadParams = ();
    type WriteParams = WriteParams;

    fn test_id(&self) -> String {
        match self {
            TypedIo::Table(io) => io.test_id(),
            TypedIo::Select(io) => io.test_id(),
            TypedIo::Storage(io) => io.test_id(),
        }
    }

    async fn read(&self, session: &dyn Session, _params: ()) -> Result<Dataset<T>> {
        match self {
            TypedIo::Table(io) => io.read(session, ()).await,
            TypedIo::Select(io) => io.read(session, SelectParams::default()).await,
            TypedIo::Storage(io) => io.read(session, ()).await,
        }
    }

    /// Only table sources can be written. Schema and description default to
    /// the ones of `T`.
    async fn write(&self, session: &dyn Session, data: Dataset<T>, params: WriteParams) -> Result<Tap<T>> {
        match self {
            TypedIo::Table(io) => io.write(session, data, params.with_type_defaults::<T>()).await,
            TypedIo::Select(_) | TypedIo::Storage(_) => read_only(self.test_id()),
        }
    }

    async fn tap(&self, session: &dyn Session, _params: ()) -> Result<Tap<T>> {
        match self {
            TypedIo::Table(io) => io.tap(session, ()).await,
            TypedIo::Select(io) => io.tap(session, SelectParams::default()).await,
            TypedIo::Storage(io) => io.tap(session, ()).await,
        }
    }
}
