use std::sync::Arc;

use futures::future::FutureExt;
use prost_types::Timestamp;
use tracing::{debug, info};

use crate::client::Dialect;
use crate::googleapis::{
    read_session::{TableModifiers, TableReadOptions},
    CreateReadSessionRequest, DataFormat, ReadSession,
};
use crate::session::{Dataset, Session, TeardownHook};
use crate::source::Table;
use crate::table::TableReference;
use crate::types::TableRow;
use crate::{BigQuery, Error, Result};

/// How the runner should execute a read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReadMethod {
    /// Let the runner pick, usually an export to files followed by a read.
    #[default]
    Default,
    /// Export the table to files and read the files.
    Export,
    /// Stream the table through the Storage read API.
    DirectRead,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadSource {
    /// A table spec.
    Table(String),
    /// SQL text.
    Query(String),
}

/// A BigQuery read, as handed to [`Session::apply_read`](Session::apply_read).
///
/// Built like a transform: start from [`ReadRequest::new`](ReadRequest::new)
/// (or a caller supplied template), name the source, then adjust.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadRequest {
    source: Option<ReadSource>,
    method: ReadMethod,
    validate: bool,
    standard_sql: bool,
    flatten_results: bool,
    data_format: DataFormat,
    snapshot_time: Option<Timestamp>,
    read_options: Option<TableReadOptions>,
}

impl Default for ReadRequest {
    fn default() -> Self {
        Self {
            source: None,
            method: ReadMethod::Default,
            validate: true,
            standard_sql: false,
            flatten_results: true,
            data_format: DataFormat::Avro,
            snapshot_time: None,
            read_options: None,
        }
    }
}

impl ReadRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a whole table.
    pub fn table<S: Into<String>>(mut self, spec: S) -> Self {
        self.source = Some(ReadSource::Table(spec.into()));
        self
    }

    /// Read the result of a query.
    pub fn query<S: Into<String>>(mut self, sql: S) -> Self {
        self.source = Some(ReadSource::Query(sql.into()));
        self
    }

    /// Skip checking that the source exists when the pipeline is built.
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    pub fn using_standard_sql(self) -> Self {
        self.with_standard_sql(true)
    }

    pub fn with_standard_sql(mut self, standard_sql: bool) -> Self {
        self.standard_sql = standard_sql;
        self
    }

    /// Keep nested and repeated fields of the query result as they are.
    pub fn without_result_flattening(self) -> Self {
        self.with_result_flattening(false)
    }

    pub fn with_result_flattening(mut self, flatten_results: bool) -> Self {
        self.flatten_results = flatten_results;
        self
    }

    pub fn with_method(mut self, method: ReadMethod) -> Self {
        self.method = method;
        self
    }

    /// Sets the data format of direct reads. Defaults to Avro.
    pub fn with_data_format(mut self, data_format: DataFormat) -> Self {
        self.data_format = data_format;
        self
    }

    /// Sets the snapshot time of direct reads. If not set, interpreted as now.
    pub fn with_snapshot_time(mut self, snapshot_time: Timestamp) -> Self {
        self.snapshot_time = Some(snapshot_time);
        self
    }

    pub fn with_read_options(mut self, read_options: TableReadOptions) -> Self {
        self.read_options = Some(read_options);
        self
    }

    pub fn source(&self) -> Option<&ReadSource> {
        self.source.as_ref()
    }

    pub fn method(&self) -> ReadMethod {
        self.method
    }

    pub fn validate(&self) -> bool {
        self.validate
    }

    pub fn standard_sql(&self) -> bool {
        self.standard_sql
    }

    pub fn flatten_results(&self) -> bool {
        self.flatten_results
    }

    pub fn data_format(&self) -> DataFormat {
        self.data_format
    }

    pub fn read_options(&self) -> Option<&TableReadOptions> {
        self.read_options.as_ref()
    }

    fn direct_read_table(&self) -> Result<TableReference> {
        match (&self.source, self.method) {
            (Some(ReadSource::Table(spec)), ReadMethod::DirectRead) => spec.parse(),
            _ => Err(Error::invalid_argument(
                "only direct reads of a table have a read session",
            )),
        }
    }

    /// The Storage API session this direct read opens.
    pub fn read_session(&self) -> Result<ReadSession> {
        let table = self.direct_read_table()?.resource_path()?;

        let mut inner = ReadSession {
            table,
            ..Default::default()
        };
        inner.set_data_format(self.data_format);

        if let Some(snapshot_time) = self.snapshot_time.clone() {
            inner.table_modifiers = Some(TableModifiers {
                snapshot_time: Some(snapshot_time),
            });
        }

        inner.read_options = Some(self.read_options.clone().unwrap_or_default());

        Ok(inner)
    }

    /// The `CreateReadSession` call for this direct read. The session is
    /// owned by `parent_project_id`, or by the table's project if not set.
    pub fn create_read_session_request(
        &self,
        parent_project_id: Option<&str>,
        max_stream_count: i32,
    ) -> Result<CreateReadSessionRequest> {
        let table = self.direct_read_table()?;
        let parent_project_id = parent_project_id
            .or_else(|| table.project_id())
            .ok_or_else(|| Error::invalid_argument(format!("no parent project for {}", table)))?;

        Ok(CreateReadSessionRequest {
            parent: format!("projects/{}", parent_project_id),
            read_session: Some(self.read_session()?),
            max_stream_count,
        })
    }
}

/// Dialect named by a `#legacysql` or `#standardsql` marker on the first
/// line of `sql`.
pub fn explicit_dialect(sql: &str) -> Option<Dialect> {
    let first_line = sql.trim().lines().next()?.trim().to_ascii_lowercase();
    if first_line.starts_with("#legacysql") {
        Some(Dialect::Legacy)
    } else if first_line.starts_with("#standardsql") {
        Some(Dialect::Standard)
    } else {
        None
    }
}

impl BigQuery {
    /// Add the result of `sql` to the pipeline.
    ///
    /// With the client's query cache enabled the query runs as a cached job
    /// and the pipeline reads the job's destination table; the session waits
    /// for the job when it closes. Otherwise the pipeline runs the query
    /// itself, in the dialect the query declares or the client detects.
    pub async fn execute_query(
        &self,
        session: &dyn Session,
        base: ReadRequest,
        sql: &str,
        flatten_results: bool,
    ) -> Result<Dataset<TableRow>> {
        let client = self.client_for(session).await?;

        let request = if client.is_query_cache_enabled() {
            let job = client.submit_cached_query(sql, flatten_results).await?;
            info!(
                session = %session.id(),
                job = %job.job_id,
                destination = %job.destination,
                "Reading query result from cached job"
            );
            debug!(job = %job.job_id, query = %job.query, "Cached job query");

            let waiter = Arc::clone(&client);
            let pending = job.clone();
            let hook: TeardownHook =
                Box::new(move || async move { waiter.wait_for(&[pending]).await }.boxed());
            session.on_close(hook);

            base.table(job.destination.spec()).without_validation()
        } else {
            let dialect = match explicit_dialect(sql) {
                Some(dialect) => dialect,
                None => {
                    let dialect = client.classify_dialect(sql, flatten_results).await?;
                    debug!(?dialect, "Classified query dialect");
                    dialect
                }
            };

            // Flattening only exists in legacy SQL, where it stays on.
            let flatten = dialect.is_legacy() || flatten_results;
            info!(session = %session.id(), ?dialect, flatten, "Reading query result in pipeline");
            base.query(sql)
                .with_standard_sql(!dialect.is_legacy())
                .with_result_flattening(flatten)
        };

        let node = session.apply_read(request)?;
        Ok(Dataset::rows(node))
    }

    /// Add a full read of `table` to the pipeline.
    pub fn execute_table_read(
        &self,
        session: &dyn Session,
        base: ReadRequest,
        table: &Table,
    ) -> Result<Dataset<TableRow>> {
        debug!(table = %table, "Table read");
        let node = session.apply_read(base.table(table.spec()))?;
        Ok(Dataset::rows(node))
    }

    /// Add a Storage API direct read of `table` to the pipeline. Field names
    /// and the restriction are passed through untouched.
    pub fn execute_storage_read(
        &self,
        session: &dyn Session,
        base: ReadRequest,
        table: &Table,
        selected_fields: &[String],
        row_restriction: Option<&str>,
    ) -> Result<Dataset<TableRow>> {
        let read_options = TableReadOptions {
            selected_fields: selected_fields.to_vec(),
            row_restriction: row_restriction.map(str::to_string),
        };
        debug!(
            table = %table,
            fields = selected_fields.len(),
            restricted = row_restriction.is_some(),
            "Direct read"
        );

        let request = base
            .table(table.spec())
            .with_method(ReadMethod::DirectRead)
            .with_read_options(read_options);

        let node = session.apply_read(request)?;
        Ok(Dataset::rows(node))
    }
}
