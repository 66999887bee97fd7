use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A BigQuery table. This requires a `dataset_id` and a `table_id`; the
/// `project_id` may be omitted, in which case the project of the running
/// client applies. Only alphanumerical and underscores are allowed for
/// `dataset_id`. `table_id` may additionally carry `-` and a `$` partition
/// decorator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project_id: Option<String>,
    dataset_id: String,
    table_id: String,
}

impl TableReference {
    pub fn new(project_id: &str, dataset_id: &str, table_id: &str) -> Self {
        Self {
            project_id: Some(project_id.to_string()),
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
        }
    }

    /// A table without an explicit project.
    pub fn in_default_project(dataset_id: &str, table_id: &str) -> Self {
        Self {
            project_id: None,
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    /// Canonical `project:dataset.table` form (`dataset.table` without a project).
    pub fn spec(&self) -> String {
        self.to_string()
    }

    /// The Storage API resource name, `projects/{}/datasets/{}/tables/{}`.
    pub fn resource_path(&self) -> Result<String> {
        let project_id = self.project_id.as_ref().ok_or_else(|| {
            Error::invalid_argument(format!("table {} has no project", self))
        })?;
        Ok(format!(
            "projects/{}/datasets/{}/tables/{}",
            project_id, self.dataset_id, self.table_id
        ))
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project_id {
            Some(project_id) => write!(f, "{}:{}.{}", project_id, self.dataset_id, self.table_id),
            None => write!(f, "{}.{}", self.dataset_id, self.table_id),
        }
    }
}

fn is_dataset_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_table_id(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '$')
}

impl FromStr for TableReference {
    type Err = Error;

    /// Accepts `project:dataset.table`, `project.dataset.table` and
    /// `dataset.table`. Domain-scoped projects (`example.com:project`) are
    /// only recognised in the colon form.
    fn from_str(spec: &str) -> Result<Self> {
        let malformed = || {
            Error::invalid_argument(format!(
                "malformed table spec {:?}, expected [project:]dataset.table",
                spec
            ))
        };

        let (project_id, rest) = match spec.rsplit_once(':') {
            Some((project_id, rest)) => (Some(project_id), rest),
            None => (None, spec),
        };
        let parts: Vec<&str> = rest.split('.').collect();
        let (project_id, dataset_id, table_id) = match (project_id, parts.as_slice()) {
            (Some(p), [d, t]) => (Some(p), *d, *t),
            (None, [p, d, t]) => (Some(*p), *d, *t),
            (None, [d, t]) => (None, *d, *t),
            _ => return Err(malformed()),
        };

        if project_id.map_or(false, str::is_empty) || !is_dataset_id(dataset_id) || !is_table_id(table_id) {
            return Err(malformed());
        }

        Ok(Self {
            project_id: project_id.map(str::to_string),
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
        })
    }
}
