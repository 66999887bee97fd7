//! # bigquery-io
//! BigQuery tables, queries and [Storage API](https://cloud.google.com/bigquery/docs/reference/storage) direct reads exposed as typed sources and sinks of a dataset pipeline.
//!
//! This crate only decides *how* a read or a write should be expressed. Job
//! submission, polling and credentials belong to a [`BigQueryClient`](BigQueryClient)
//! implementation, and the pipeline graph itself belongs to a [`Session`](Session).
//!
//! # Example
//! ```rust
//! async fn run(
//!     factory: impl bigquery_io::ClientFactory + 'static,
//!     session: &dyn bigquery_io::Session,
//! ) -> bigquery_io::Result<()> {
//!     use bigquery_io::{BigQuery, BigQueryIo, Query, SelectParams, TableRow};
//!
//!     // 1. One `BigQuery` per process, it caches one client per session
//!     let bq = BigQuery::new(factory);
//!
//!     // 2. Describe the source
//!     let select = bq.select::<TableRow>(Query::from_string("SELECT 1 AS x"));
//!
//!     // 3. Add it to the pipeline
//!     let rows = select.read(session, SelectParams::default()).await?;
//!
//!     Ok(())
//! }
//! ```

pub use yup_oauth2;
#[doc(hidden)]
pub use serde_json;

pub mod googleapis;

pub mod bigquery;
pub mod client;
pub mod io;
pub mod options;
pub mod read;
pub mod schema;
pub mod session;
pub mod source;
pub mod table;
pub mod tap;
pub mod types;
pub mod write;

#[cfg(test)]
mod testing;

pub use bigquery::BigQuery;
pub use client::{BigQueryClient, ClientCache, ClientFactory, Dialect, QueryJob};
pub use io::{BigQueryIo, SelectIo, SelectParams, StorageIo, StorageReadParams, TableIo, TypedIo};
pub use options::{BigQueryOptions, Credentials, QueryPriority};
pub use read::{ReadMethod, ReadRequest, ReadSource};
pub use schema::{TableFieldSchema, TableSchema};
pub use session::{Dataset, NodeId, Session, SessionId, TeardownHook};
pub use source::{Query, Source, Table};
pub use table::TableReference;
pub use tap::{Tap, TapTarget};
pub use types::{BigQueryType, DeclaredSource, Record, TableRow};
pub use write::{
    CreateDisposition, InsertError, InsertErrorHandler, InsertErrors, PartitionType,
    TimePartitioning, WriteDisposition, WriteParams, WriteRequest, WriteResult,
};

/// Boxed failure of a [`BigQueryClient`](BigQueryClient) that is neither a gRPC status nor I/O.
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

macro_rules! errors {
    {
        wrap {
            $($id:ident($p:path),)*
        }
        describe {
            $(
                $(#[$m:meta])*
                $kind:ident => $ctor:ident,
            )*
        }
    } => {
        /// Encompassing error enum for this crate.
        #[derive(Debug)]
        pub enum Error {
            $($id($p),)*
            $(
                $(#[$m])*
                $kind(String),
            )*
        }

        impl Error {
            $(
                pub fn $ctor<S: Into<String>>(msg: S) -> Self {
                    Self::$kind(msg.into())
                }
            )*
        }

        impl std::fmt::Display for Error {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$id(inner) => {
                            write!(f, "{}: {}", stringify!($id), inner)
                        },
                    )*
                    $(
                        Self::$kind(msg) => {
                            write!(f, "{}: {}", stringify!($kind), msg)
                        },
                    )*
                }
            }
        }

        impl std::error::Error for Error { }

        $(
            impl From<$p> for Error {
                fn from(inner: $p) -> Self {
                    Self::$id(inner)
                }
            }
        )*
    };
}

errors! {
    wrap {
        Status(tonic::Status),
        Client(ClientError),
        Io(std::io::Error),
        Json(serde_json::Error),
    }
    describe {
        /// Bad configuration detected while building the pipeline.
        InvalidArgument => invalid_argument,
        /// The operation is not allowed on this source or sink.
        Unsupported => unsupported,
        /// Malformed data.
        Invalid => invalid,
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
