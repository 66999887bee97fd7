use std::path::Path;

use serde::Deserialize;
use yup_oauth2::ServiceAccountKey;

use crate::{Error, Result};

/// How BigQuery credentials are obtained.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// Resolved by the client (metadata server, `gcloud` config, ...).
    ApplicationDefault,
    ServiceAccount(ServiceAccountKey),
}

impl Default for Credentials {
    fn default() -> Self {
        Credentials::ApplicationDefault
    }
}

impl Credentials {
    /// Load a service account key file.
    pub async fn from_key_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let key = yup_oauth2::read_service_account_key(path).await?;
        Ok(Credentials::ServiceAccount(key))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryPriority {
    Interactive,
    Batch,
}

impl std::str::FromStr for QueryPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INTERACTIVE" => Ok(QueryPriority::Interactive),
            "BATCH" => Ok(QueryPriority::Batch),
            _ => Err(Error::invalid_argument(format!("unknown query priority {:?}", s))),
        }
    }
}

/// Per-session BigQuery settings read by a [`ClientFactory`](crate::ClientFactory)
/// when it builds the session's client.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BigQueryOptions {
    /// Billing project. `None` lets the client pick one from the credentials.
    pub project: Option<String>,
    pub credentials: Credentials,
    /// Whether the client should reuse results of identical queries.
    pub query_cache: bool,
    /// Priority of the jobs the client submits. Left to the factory; this
    /// crate only logs it.
    pub priority: Option<QueryPriority>,
}

impl Default for BigQueryOptions {
    fn default() -> Self {
        Self {
            project: None,
            credentials: Credentials::default(),
            query_cache: true,
            priority: None,
        }
    }
}

const PROJECT_VARS: [&str; 2] = ["BIGQUERY_PROJECT", "GOOGLE_CLOUD_PROJECT"];
const CREDENTIALS_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";
const CACHE_VAR: &str = "BIGQUERY_CACHE_ENABLED";
const PRIORITY_VAR: &str = "BIGQUERY_PRIORITY";

impl BigQueryOptions {
    /// Read options from the process environment.
    pub async fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok()).await
    }

    pub(crate) async fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        options.project = PROJECT_VARS.iter().find_map(|key| lookup(*key));

        if let Some(path) = lookup(CREDENTIALS_VAR) {
            options.credentials = Credentials::from_key_file(path).await?;
        }

        if let Some(enabled) = lookup(CACHE_VAR) {
            options.query_cache = match enabled.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                other => {
                    return Err(Error::invalid_argument(format!(
                        "{} must be a boolean, got {:?}",
                        CACHE_VAR, other
                    )))
                }
            };
        }

        if let Some(priority) = lookup(PRIORITY_VAR) {
            options.priority = Some(priority.parse()?);
        }

        Ok(options)
    }
}
