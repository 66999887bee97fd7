use std::fmt;
use std::marker::PhantomData;

use tracing::debug;

use crate::io::{BigQueryIo, StorageIo, StorageReadParams};
use crate::session::{Dataset, Session};
use crate::source::Table;
use crate::types::Record;
use crate::{BigQuery, Error, Result};

/// What a [`Tap`](Tap) reads back.
#[derive(Clone, Debug, PartialEq)]
pub enum TapTarget {
    Table(Table),
    Storage {
        table: Table,
        selected_fields: Vec<String>,
        row_restriction: Option<String>,
    },
    /// Reading back is not possible; carries the reason.
    Unsupported(String),
}

/// A handle on data produced by a write or a query, readable outside of the
/// pipeline that produced it.
pub struct Tap<T> {
    target: TapTarget,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Tap<T> {
    fn clone(&self) -> Self {
        Self::new(self.target.clone())
    }
}

impl<T> fmt::Debug for Tap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tap").field(&self.target).finish()
    }
}

impl<T> Tap<T> {
    pub fn new(target: TapTarget) -> Self {
        Self {
            target,
            _record: PhantomData,
        }
    }

    pub fn for_table(table: Table) -> Self {
        Self::new(TapTarget::Table(table))
    }

    pub fn for_storage(table: Table, params: &StorageReadParams) -> Self {
        Self::new(TapTarget::Storage {
            table,
            selected_fields: params.selected_fields.clone(),
            row_restriction: params.row_restriction.clone(),
        })
    }

    pub fn unsupported<S: Into<String>>(reason: S) -> Self {
        Self::new(TapTarget::Unsupported(reason.into()))
    }

    pub fn target(&self) -> &TapTarget {
        &self.target
    }

    /// The table this tap addresses.
    pub fn table(&self) -> Result<&Table> {
        match &self.target {
            TapTarget::Table(table) | TapTarget::Storage { table, .. } => Ok(table),
            TapTarget::Unsupported(reason) => Err(Error::unsupported(reason.clone())),
        }
    }
}

impl<T: Record> Tap<T> {
    /// Read the tapped data into `session`.
    pub async fn open(&self, bq: &BigQuery, session: &dyn Session) -> Result<Dataset<T>> {
        debug!(tap = ?self.target, "Opening tap");
        match &self.target {
            TapTarget::Table(table) => bq.table::<T>(table.clone()).read(session, ()).await,
            TapTarget::Storage {
                table,
                selected_fields,
                row_restriction,
            } => {
                let params = StorageReadParams {
                    selected_fields: selected_fields.clone(),
                    row_restriction: row_restriction.clone(),
                };
                let io: StorageIo<T> = bq.storage(table.clone(), params);
                io.read(session, ()).await
            }
            TapTarget::Unsupported(reason) => Err(Error::unsupported(reason.clone())),
        }
    }
}
