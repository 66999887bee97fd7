use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::schema::TableSchema;
use crate::session::{Dataset, NodeId, Session};
use crate::source::Table;
use crate::table::TableReference;
use crate::tap::Tap;
use crate::types::{BigQueryType, Record, TableRow};
use crate::{BigQuery, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    WriteAppend,
    WriteTruncate,
    WriteEmpty,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateDisposition {
    CreateIfNeeded,
    CreateNever,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionType {
    Hour,
    Day,
    Month,
    Year,
}

/// Time-based partitioning of the destination table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePartitioning {
    #[serde(rename = "type")]
    pub partition_type: PartitionType,
    /// Column to partition on. Ingestion time if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_partition_filter: Option<bool>,
}

impl TimePartitioning {
    pub fn new(partition_type: PartitionType) -> Self {
        Self {
            partition_type,
            field: None,
            expiration_ms: None,
            require_partition_filter: None,
        }
    }

    pub fn field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    pub fn expiration_ms(mut self, expiration_ms: i64) -> Self {
        self.expiration_ms = Some(expiration_ms);
        self
    }

    pub fn require_partition_filter(mut self, require: bool) -> Self {
        self.require_partition_filter = Some(require);
        self
    }
}

/// One error reported by BigQuery for a failed insert.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorProto {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub message: String,
}

/// A row BigQuery refused, with the reasons.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsertError {
    pub row: TableRow,
    #[serde(default)]
    pub errors: Vec<ErrorProto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableReference>,
}

crate::serde_record!(InsertError);

/// The insert failures side output of a write.
#[derive(Clone, Debug)]
pub enum InsertErrors {
    /// Failed rows only.
    Rows(Dataset<TableRow>),
    /// Failed rows with their errors, when extended error info is enabled.
    Detailed(Dataset<InsertError>),
}

impl InsertErrors {
    pub fn node(&self) -> NodeId {
        match self {
            InsertErrors::Rows(rows) => rows.node(),
            InsertErrors::Detailed(errors) => errors.node(),
        }
    }
}

/// Consumes the insert failures of a write. Runs while the pipeline is
/// built, the elements themselves are only seen by the runner.
pub type InsertErrorHandler = Arc<dyn Fn(&dyn Session, InsertErrors) -> Result<()> + Send + Sync>;

/// Drops every insert failure, leaving no dangling branch in the graph.
pub fn discard_insert_errors() -> InsertErrorHandler {
    Arc::new(|session: &dyn Session, errors: InsertErrors| session.discard(errors.node()))
}

macro_rules! write_params {
    {
        $(
            $(#[$m:meta])*
            $field:ident: $ty:ty,
        )*
    } => {
        #[derive(Clone, Debug, Default)]
        struct WriteOpts {
            $(
                $field: Option<$ty>,
            )*
        }

        /// Parameters of a table write. Every setting left unset is left out
        /// of the [`WriteRequest`](WriteRequest) so that BigQuery's own
        /// defaults apply.
        #[derive(Clone)]
        pub struct WriteParams {
            opts: WriteOpts,
            extended_error_info: bool,
            insert_error_handler: InsertErrorHandler,
        }

        impl WriteParams {
            $(
                $(#[$m])*
                pub fn $field(mut self, $field: $ty) -> Self {
                    self.opts.$field = Some($field);
                    self
                }
            )*
        }
    };
}

write_params! {
    #[doc = "Schema of the destination table. Required when the table may be created."]
    schema: TableSchema,
    #[doc = "What to do with existing rows."]
    write_disposition: WriteDisposition,
    #[doc = "Whether the table may be created."]
    create_disposition: CreateDisposition,
    #[doc = "Description set on the destination table."]
    table_description: String,
    time_partitioning: TimePartitioning,
}

impl Default for WriteParams {
    fn default() -> Self {
        Self {
            opts: WriteOpts::default(),
            extended_error_info: false,
            insert_error_handler: discard_insert_errors(),
        }
    }
}

impl fmt::Debug for WriteParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteParams")
            .field("opts", &self.opts)
            .field("extended_error_info", &self.extended_error_info)
            .finish()
    }
}

impl WriteParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report failed inserts with their errors rather than as bare rows.
    pub fn extended_error_info(mut self, enabled: bool) -> Self {
        self.extended_error_info = enabled;
        self
    }

    /// Consume the insert failures. Defaults to [`discard_insert_errors`](discard_insert_errors).
    pub fn insert_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&dyn Session, InsertErrors) -> Result<()> + Send + Sync + 'static,
    {
        self.insert_error_handler = Arc::new(handler);
        self
    }

    pub fn is_append(&self) -> bool {
        self.opts.write_disposition == Some(WriteDisposition::WriteAppend)
    }

    /// Fill schema and description from `T` where the caller set none.
    pub(crate) fn with_type_defaults<T: BigQueryType>(mut self) -> Self {
        if self.opts.schema.is_none() {
            self.opts.schema = Some(T::schema());
        }
        if self.opts.table_description.is_none() {
            self.opts.table_description = T::table_description().map(str::to_string);
        }
        self
    }

    fn request(&self, table: TableReference) -> WriteRequest {
        WriteRequest {
            destination_table: table,
            schema: self.opts.schema.clone(),
            write_disposition: self.opts.write_disposition,
            create_disposition: self.opts.create_disposition,
            table_description: self.opts.table_description.clone(),
            time_partitioning: self.opts.time_partitioning.clone(),
            extended_error_info: self.extended_error_info,
        }
    }
}

/// A BigQuery write, as handed to [`Session::apply_write`](Session::apply_write).
/// Serializes to the load configuration shape, without unset fields.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    pub destination_table: TableReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<TableSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_disposition: Option<WriteDisposition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_disposition: Option<CreateDisposition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_partitioning: Option<TimePartitioning>,
    pub extended_error_info: bool,
}

/// What the session hands back for a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteResult {
    /// Rows that could not be inserted. Elements are [`InsertError`](InsertError)
    /// objects when the request asked for extended error info.
    pub failed_inserts: NodeId,
}

impl BigQuery {
    /// Add a write of `data` into `table` to the pipeline.
    ///
    /// The returned tap reads the written table back, unless the write
    /// appends: appended rows are not a stable read-back target, and that
    /// tap fails.
    ///
    /// The insert-error handler runs on the failed inserts node that the
    /// write creates, so it runs after the write is applied. If it fails the
    /// error is returned as is and the write stays in the session's graph
    /// with an unconsumed branch; the pipeline should be discarded.
    pub fn write_table<T: Record>(
        &self,
        session: &dyn Session,
        data: Dataset<T>,
        table: &Table,
        params: WriteParams,
    ) -> Result<Tap<T>> {
        let request = params.request(table.reference()?);
        info!(
            session = %session.id(),
            table = %request.destination_table,
            schema = request.schema.is_some(),
            write_disposition = ?request.write_disposition,
            create_disposition = ?request.create_disposition,
            partitioned = request.time_partitioning.is_some(),
            "Writing table"
        );

        let rows = data.map(|record: T| record.to_row());
        let result = session.apply_write(rows, request)?;

        let errors = if params.extended_error_info {
            InsertErrors::Detailed(Dataset::new(result.failed_inserts, InsertError::from_row))
        } else {
            InsertErrors::Rows(Dataset::rows(result.failed_inserts))
        };
        (params.insert_error_handler)(session, errors)?;

        if params.is_append() {
            Ok(Tap::unsupported(format!(
                "cannot tap {}: rows were appended with WRITE_APPEND",
                table
            )))
        } else {
            Ok(Tap::for_table(table.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture, FakeClient, RecordingSession};
    use crate::Error;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn absent_params_stay_absent() {
        let (bq, _client) = fixture(FakeClient::cached());
        let session = RecordingSession::new();
        let data = Dataset::rows(NodeId(1));

        let tap = bq
            .write_table(&session, data, &Table::from_spec("proj:ds.tbl"), WriteParams::default())
            .unwrap();

        let request = session.write(0);
        assert_eq!(request.schema, None);
        assert_eq!(request.write_disposition, None);
        assert_eq!(request.create_disposition, None);
        assert_eq!(request.table_description, None);
        assert_eq!(request.time_partitioning, None);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "destinationTable": {"projectId": "proj", "datasetId": "ds", "tableId": "tbl"},
                "extendedErrorInfo": false
            })
        );

        assert_eq!(session.discarded(), vec![session.failed_node(0)]);
        assert_eq!(tap.table().unwrap(), &Table::from_spec("proj:ds.tbl"));
    }

    #[test]
    fn present_params_are_applied() {
        let (bq, _client) = fixture(FakeClient::cached());
        let session = RecordingSession::new();
        let schema = TableSchema::new(vec![crate::TableFieldSchema::new("id", "INTEGER")]);
        let params = WriteParams::new()
            .schema(schema.clone())
            .write_disposition(WriteDisposition::WriteTruncate)
            .create_disposition(CreateDisposition::CreateIfNeeded)
            .table_description("stations".to_string())
            .time_partitioning(TimePartitioning::new(PartitionType::Day).field("ts"));

        let tap = bq
            .write_table(&session, Dataset::rows(NodeId(1)), &Table::from_spec("proj:ds.tbl"), params)
            .unwrap();

        let request = session.write(0);
        assert_eq!(request.schema, Some(schema));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["writeDisposition"], "WRITE_TRUNCATE");
        assert_eq!(json["createDisposition"], "CREATE_IF_NEEDED");
        assert_eq!(json["tableDescription"], "stations");
        assert_eq!(json["timePartitioning"], json!({"type": "DAY", "field": "ts"}));
        assert!(tap.table().is_ok());
    }

    #[test]
    fn appending_writes_cannot_be_tapped() {
        let (bq, _client) = fixture(FakeClient::cached());
        let session = RecordingSession::new();
        let params = WriteParams::new().write_disposition(WriteDisposition::WriteAppend);

        let tap = bq
            .write_table(&session, Dataset::rows(NodeId(1)), &Table::from_spec("proj:ds.tbl"), params)
            .unwrap();

        assert!(matches!(tap.table(), Err(Error::Unsupported(_))));
        assert_eq!(session.writes(), 1);
    }

    #[test]
    fn extended_errors_reach_the_handler() {
        let (bq, _client) = fixture(FakeClient::cached());
        let session = RecordingSession::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let params = WriteParams::new()
            .extended_error_info(true)
            .insert_error_handler(move |_session, errors| {
                if let InsertErrors::Detailed(errors) = errors {
                    let row = json!({
                        "row": {"id": 3},
                        "errors": [{"reason": "invalid", "message": "no such field: nope"}]
                    });
                    let error = errors.convert(row.as_object().cloned().unwrap())?;
                    sink.lock().unwrap().push(error);
                }
                Ok(())
            });

        bq.write_table(&session, Dataset::rows(NodeId(1)), &Table::from_spec("proj:ds.tbl"), params)
            .unwrap();

        assert!(session.write(0).extended_error_info);
        assert!(session.discarded().is_empty());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].errors[0].reason, "invalid");
        assert_eq!(seen[0].row["id"], 3);
    }

    #[test]
    fn handler_failures_are_returned_after_the_write() {
        let (bq, _client) = fixture(FakeClient::cached());
        let session = RecordingSession::new();
        let params = WriteParams::new().insert_error_handler(|_session, _errors| Err(Error::invalid("no sink")));

        let err = bq
            .write_table(&session, Dataset::rows(NodeId(1)), &Table::from_spec("proj:ds.tbl"), params)
            .unwrap_err();

        assert!(matches!(err, Error::Invalid(_)));
        assert_eq!(session.writes(), 1);
        assert!(session.discarded().is_empty());
    }

    #[test]
    fn malformed_destinations_fail_before_writing() {
        let (bq, _client) = fixture(FakeClient::cached());
        let session = RecordingSession::new();

        let err = bq
            .write_table(&session, Dataset::rows(NodeId(1)), &Table::from_spec("nope"), WriteParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(session.writes(), 0);
    }
}
