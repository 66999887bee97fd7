//! Descriptors identifying a logical BigQuery read.
//!
//! Descriptors are immutable values; equality and hashing go through the
//! canonical string form so that the same table named by reference or by
//! spec is one key.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::table::TableReference;
use crate::Result;

/// A warehouse table, named either by a structured reference or by an
/// opaque spec string.
#[derive(Clone, Debug)]
pub enum Table {
    Ref(TableReference),
    Spec(String),
}

impl Table {
    pub fn from_ref(table: TableReference) -> Self {
        Table::Ref(table)
    }

    pub fn from_spec<S: Into<String>>(spec: S) -> Self {
        Table::Spec(spec.into())
    }

    /// Canonical spec, used for identity, logging and test ids.
    pub fn spec(&self) -> String {
        match self {
            Table::Ref(table) => table.spec(),
            Table::Spec(spec) => spec.clone(),
        }
    }

    /// The structured reference. Spec strings are parsed on demand.
    pub fn reference(&self) -> Result<TableReference> {
        match self {
            Table::Ref(table) => Ok(table.clone()),
            Table::Spec(spec) => spec.parse(),
        }
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.spec() == other.spec()
    }
}

impl Eq for Table {}

impl Hash for Table {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.spec().hash(state)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Table::Ref(table) => table.fmt(f),
            Table::Spec(spec) => f.write_str(spec),
        }
    }
}

impl From<TableReference> for Table {
    fn from(table: TableReference) -> Self {
        Table::Ref(table)
    }
}

/// A SQL query. Its identity is the query text itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Query(String);

impl Query {
    pub fn from_string<S: Into<String>>(sql: S) -> Self {
        Query(sql.into())
    }

    pub fn underlying(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Either kind of descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    Table(Table),
    Query(Query),
}

impl Source {
    pub fn id(&self) -> String {
        match self {
            Source::Table(table) => table.spec(),
            Source::Query(query) => query.underlying().to_string(),
        }
    }
}

impl From<Table> for Source {
    fn from(table: Table) -> Self {
        Source::Table(table)
    }
}

impl From<Query> for Source {
    fn from(query: Query) -> Self {
        Source::Query(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn reference_and_spec_share_identity() {
        let by_ref = Table::from_ref(TableReference::new("proj", "ds", "tbl"));
        let by_spec = Table::from_spec("proj:ds.tbl");
        assert_eq!(by_ref, by_spec);

        let keys: HashSet<Source> = vec![Source::from(by_ref), Source::from(by_spec)]
            .into_iter()
            .collect();
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn spec_strings_are_kept_verbatim() {
        let table = Table::from_spec("proj.ds.tbl");
        assert_eq!(table.spec(), "proj.ds.tbl");
        assert_eq!(table.reference().unwrap().spec(), "proj:ds.tbl");
    }

    #[test]
    fn queries_are_identified_by_their_text() {
        let q = Query::from_string("SELECT 1");
        assert_eq!(Source::from(q.clone()).id(), "SELECT 1");
        assert_ne!(Source::from(q), Source::from(Table::from_spec("SELECT 1")));
    }
}
