//! Messages of `google.cloud.bigquery.storage.v1` that a direct read request carries.
//!
//! Only the read-session half of `storage.proto`/`stream.proto` is mirrored
//! here, with the upstream field tags, so that requests built by this crate can
//! be handed to any Storage API runner as-is.

/// Data format for input or output data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum DataFormat {
    Unspecified = 0,
    /// Avro is a standard open source row based file format.
    Avro = 1,
    /// Arrow is a standard open source column-based message format.
    Arrow = 2,
}

/// Information about a single stream that gets data out of the storage system.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadStream {
    /// `projects/{project_id}/locations/{location}/sessions/{session_id}/streams/{stream_id}`
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}

/// Information about the ReadSession.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadSession {
    /// Unique identifier for the session, assigned by the server.
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    /// Data format of the output data.
    #[prost(enumeration = "DataFormat", tag = "3")]
    pub data_format: i32,
    /// Table that this ReadSession is reading from, in the form
    /// `projects/{project_id}/datasets/{dataset_id}/tables/{table_id}`
    #[prost(string, tag = "6")]
    pub table: ::prost::alloc::string::String,
    /// Any modifiers which are applied when reading from the specified table.
    #[prost(message, optional, tag = "7")]
    pub table_modifiers: ::core::option::Option<read_session::TableModifiers>,
    /// Read options for this session (e.g. column selection, filters).
    #[prost(message, optional, tag = "8")]
    pub read_options: ::core::option::Option<read_session::TableReadOptions>,
    /// A list of streams created with the session, filled in by the server.
    #[prost(message, repeated, tag = "10")]
    pub streams: ::prost::alloc::vec::Vec<ReadStream>,
}

/// Nested message and enum types in `ReadSession`.
pub mod read_session {
    /// Additional attributes when reading a table.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TableModifiers {
        /// The snapshot time of the table. If not set, interpreted as now.
        #[prost(message, optional, tag = "1")]
        pub snapshot_time: ::core::option::Option<::prost_types::Timestamp>,
    }

    /// Options dictating how we read a table.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TableReadOptions {
        /// Names of the fields in the table that should be read. If empty, all
        /// fields will be read.
        #[prost(string, repeated, tag = "1")]
        pub selected_fields: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
        /// SQL text filtering statement, similar to a WHERE clause in a query.
        /// Unset means no restriction.
        #[prost(string, optional, tag = "2")]
        pub row_restriction: ::core::option::Option<::prost::alloc::string::String>,
    }
}

/// Request message for `CreateReadSession`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateReadSessionRequest {
    /// The request project that owns the session, in the form of `projects/{project_id}`.
    #[prost(string, tag = "1")]
    pub parent: ::prost::alloc::string::String,
    /// Session to be created.
    #[prost(message, optional, tag = "2")]
    pub read_session: ::core::option::Option<ReadSession>,
    /// Max initial number of streams. If unset or zero, the server will
    /// provide a value of streams so as to produce reasonable throughput.
    #[prost(int32, tag = "3")]
    pub max_stream_count: i32,
}
