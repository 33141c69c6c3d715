//! Workgroups: named execution-policy scopes under which queries run.

use crate::error::{QueryError, RemoteError, Result};
use crate::observability::Observability;
use crate::transport::{AthenaApi, WorkgroupState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Workgroup every account has; it is never looked up or created.
pub const DEFAULT_WORKGROUP_NAME: &str = "primary";

/// Default per-query scan cutoff: 1 GiB.
pub const DEFAULT_BYTES_SCANNED_CUTOFF_PER_QUERY: i64 = 1024 * 1024 * 1024;

const TAG_SEPARATOR: char = '|';
const KEY_VALUE_SEPARATOR: char = '`';

/// Policy settings of a workgroup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkgroupConfig {
    pub bytes_scanned_cutoff_per_query: i64,
    pub enforce_workgroup_configuration: bool,
    #[serde(rename = "PublishCloudWatchMetricsEnabled")]
    pub publish_cloudwatch_metrics_enabled: bool,
    pub requester_pays_enabled: bool,
}

impl Default for WorkgroupConfig {
    fn default() -> Self {
        Self {
            bytes_scanned_cutoff_per_query: DEFAULT_BYTES_SCANNED_CUTOFF_PER_QUERY,
            enforce_workgroup_configuration: true,
            publish_cloudwatch_metrics_enabled: true,
            requester_pays_enabled: false,
        }
    }
}

impl WorkgroupConfig {
    pub(crate) fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub(crate) fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Ordered key/value tags attached to a workgroup.
///
/// Stored in a config as one string: ``|key`value|key2`value2``.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkgroupTags {
    tags: Vec<(String, String)>,
}

impl WorkgroupTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, value: &str) {
        self.tags.push((key.to_string(), value.to_string()));
    }

    /// Value of the first tag named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Encode as ``|key`value`` pairs.
    pub fn flatten(&self) -> String {
        self.tags
            .iter()
            .map(|(k, v)| format!("{}{}{}{}", TAG_SEPARATOR, k, KEY_VALUE_SEPARATOR, v))
            .collect()
    }

    /// Decode the output of [`WorkgroupTags::flatten`]. Pairs without a key separator are skipped.
    pub fn parse(flat: &str) -> Self {
        let tags = flat
            .trim_start_matches(TAG_SEPARATOR)
            .split(TAG_SEPARATOR)
            .filter_map(|pair| pair.split_once(KEY_VALUE_SEPARATOR))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { tags }
    }
}

/// A named workgroup with its policy and tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workgroup {
    name: String,
    config: WorkgroupConfig,
    tags: WorkgroupTags,
}

impl Workgroup {
    pub fn new(name: &str, config: WorkgroupConfig, tags: WorkgroupTags) -> Self {
        Self {
            name: name.to_string(),
            config,
            tags,
        }
    }

    /// Workgroup with the default policy and no tags.
    pub fn with_defaults(name: &str) -> Self {
        Self::new(name, WorkgroupConfig::default(), WorkgroupTags::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &WorkgroupConfig {
        &self.config
    }

    pub fn tags(&self) -> &WorkgroupTags {
        &self.tags
    }

    /// The built-in workgroup needs no remote resolution.
    pub fn is_default(&self) -> bool {
        self.name.is_empty() || self.name == DEFAULT_WORKGROUP_NAME
    }
}

/// Resolves and creates workgroups on the remote service.
pub struct WorkgroupManager {
    client: Arc<dyn AthenaApi>,
    observability: Observability,
}

impl WorkgroupManager {
    pub fn new(client: Arc<dyn AthenaApi>, observability: Observability) -> Self {
        Self {
            client,
            observability,
        }
    }

    /// Look up a workgroup's remote state. `None` means it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` for failures other than "not found".
    pub async fn resolve(&self, name: &str) -> Result<Option<WorkgroupState>, RemoteError> {
        self.client.get_workgroup(name).await
    }

    /// Create a workgroup remotely.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the service rejects the creation.
    pub async fn create_remotely(&self, workgroup: &Workgroup) -> Result<(), RemoteError> {
        self.client.create_workgroup(workgroup).await?;
        self.observability
            .info(&format!("workgroup {} is created", workgroup.name()));
        self.observability.count("workgroup.created");
        Ok(())
    }

    /// Make sure `workgroup` can run queries.
    ///
    /// The default workgroup is accepted without a remote call. A missing
    /// workgroup is created when `allow_creation` is set.
    ///
    /// # Errors
    ///
    /// - `QueryError::WorkgroupMissing` if it does not exist and creation is disabled
    /// - `QueryError::WorkgroupDisabled` if it exists but is disabled
    /// - `RemoteError` if a lookup or creation call fails
    pub async fn ensure_usable(&self, workgroup: &Workgroup, allow_creation: bool) -> Result<()> {
        if workgroup.is_default() {
            return Ok(());
        }

        match self.resolve(workgroup.name()).await? {
            Some(WorkgroupState::Enabled) => Ok(()),
            Some(WorkgroupState::Disabled) => {
                self.observability
                    .error(&format!("workgroup {} is disabled", workgroup.name()));
                self.observability.count("workgroup.disabled");
                Err(QueryError::WorkgroupDisabled {
                    name: workgroup.name().to_string(),
                }
                .into())
            }
            None if allow_creation => {
                self.create_remotely(workgroup).await?;
                Ok(())
            }
            None => {
                self.observability.error(&format!(
                    "workgroup {} doesn't exist and remote creation is disabled",
                    workgroup.name()
                ));
                self.observability.count("workgroup.missing");
                Err(QueryError::WorkgroupMissing {
                    name: workgroup.name().to_string(),
                }
                .into())
            }
        }
    }
}
