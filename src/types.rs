//! Row and record representations.

use crate::schema::TableSchema;
use crate::{Error, Result};

/// A raw BigQuery row, as returned by the `tabledata` JSON API.
pub type TableRow = serde_json::Map<String, serde_json::Value>;

/// Conversion between raw rows and a record type.
///
/// Reads only ever call [`from_row`](Record::from_row) and writes only ever
/// call [`to_row`](Record::to_row).
pub trait Record: Sized + Send + Sync + 'static {
    fn from_row(row: TableRow) -> Result<Self>;
    fn to_row(&self) -> Result<TableRow>;
}

impl Record for TableRow {
    fn from_row(row: TableRow) -> Result<Self> {
        Ok(row)
    }

    fn to_row(&self) -> Result<TableRow> {
        Ok(self.clone())
    }
}

/// Convert a JSON value that must be an object into a row.
pub fn into_row(value: serde_json::Value) -> Result<TableRow> {
    match value {
        serde_json::Value::Object(row) => Ok(row),
        other => Err(Error::invalid(format!("expected a JSON object row, got {}", other))),
    }
}

/// Implement [`Record`](Record) for serde-enabled types.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Station { id: i64, name: String }
/// bigquery_io::serde_record!(Station);
/// ```
#[macro_export]
macro_rules! serde_record {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::Record for $ty {
                fn from_row(row: $crate::TableRow) -> $crate::Result<Self> {
                    Ok($crate::serde_json::from_value($crate::serde_json::Value::Object(row))?)
                }

                fn to_row(&self) -> $crate::Result<$crate::TableRow> {
                    $crate::types::into_row($crate::serde_json::to_value(self)?)
                }
            }
        )*
    };
}

/// A storage read declared by a record type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageDeclaration {
    pub table: &'static str,
    pub selected_fields: &'static [&'static str],
    pub row_restriction: Option<&'static str>,
}

/// Which source a record type declares, resolved by
/// [`DeclaredSource::of`](DeclaredSource::of).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclaredSource {
    Table(&'static str),
    Query(&'static str),
    Storage(StorageDeclaration),
}

impl DeclaredSource {
    /// Exactly one of table, query and storage must be declared by `T`.
    pub fn of<T: BigQueryType>() -> Result<Self> {
        let mut declared = Vec::with_capacity(1);
        if let Some(table) = T::table() {
            declared.push(DeclaredSource::Table(table));
        }
        if let Some(query) = T::query() {
            declared.push(DeclaredSource::Query(query));
        }
        if let Some(storage) = T::storage() {
            declared.push(DeclaredSource::Storage(storage));
        }

        match declared.len() {
            1 => Ok(declared.remove(0)),
            0 => Err(Error::invalid_argument(format!(
                "{} declares no table, query or storage source",
                std::any::type_name::<T>()
            ))),
            n => Err(Error::invalid_argument(format!(
                "{} declares {} sources, expected exactly one",
                std::any::type_name::<T>(),
                n
            ))),
        }
    }
}

/// A record type carrying BigQuery metadata: its schema and where it is read
/// from.
pub trait BigQueryType: Record {
    fn schema() -> TableSchema;

    fn table_description() -> Option<&'static str> {
        None
    }

    fn table() -> Option<&'static str> {
        None
    }

    fn query() -> Option<&'static str> {
        None
    }

    fn storage() -> Option<StorageDeclaration> {
        None
    }
}
