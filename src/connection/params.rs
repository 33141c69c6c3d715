//! Driver configuration and DSN parsing.
//!
//! A [`Config`] is a result-storage location plus a flat map of string
//! settings. It serializes to a single DSN string of the form
//! `s3://[user@]bucket/path?key=value&...` with parameters in sorted order.

use crate::connection::limits::ServiceLimitOverride;
use crate::error::ConfigError;
use crate::workgroup::{Workgroup, WorkgroupConfig, WorkgroupTags, DEFAULT_WORKGROUP_NAME};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Result-storage scheme every DSN and output location must use.
pub const SCHEME: &str = "s3";

/// Region used when neither the config nor the environment names one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Database used when the config does not name one.
pub const DEFAULT_DATABASE: &str = "default";

/// Value substituted for credentials in redacted output.
pub const REDACTED: &str = "*";

/// Prefix of per-column masking entries.
pub const MASKED_COLUMN_PREFIX: &str = "masked_";

const KEY_REGION: &str = "region";
const KEY_DB: &str = "db";
const KEY_ACCESS_ID: &str = "accessID";
const KEY_SECRET_ACCESS_KEY: &str = "secretAccessKey";
const KEY_SESSION_TOKEN: &str = "sessionToken";
const KEY_WORKGROUP_NAME: &str = "workgroupName";
const KEY_WORKGROUP_CONFIG: &str = "workgroupConfig";
const KEY_TAG: &str = "tag";
const KEY_MISSING_AS_EMPTY_STRING: &str = "missingAsEmptyString";
const KEY_MISSING_AS_DEFAULT: &str = "missingAsDefault";
const KEY_WG_REMOTE_CREATION: &str = "WGRemoteCreation";
const KEY_LOGGING_ENABLED: &str = "LoggingEnabled";
const KEY_METRICS_ENABLED: &str = "MetricsEnabled";
const KEY_READ_ONLY: &str = "ReadOnly";
const KEY_MONEY_WISE: &str = "MoneyWise";
const KEY_AWS_PROFILE: &str = "AWSProfile";

const SECRET_KEYS: [&str; 3] = [KEY_ACCESS_ID, KEY_SECRET_ACCESS_KEY, KEY_SESSION_TOKEN];

const ENV_ACCESS_ID: [&str; 2] = ["AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY"];
const ENV_SECRET_KEY: [&str; 2] = ["AWS_SECRET_ACCESS_KEY", "AWS_SECRET_KEY"];
const ENV_SESSION_TOKEN: [&str; 1] = ["AWS_SESSION_TOKEN"];
const ENV_REGION: [&str; 2] = ["AWS_REGION", "AWS_DEFAULT_REGION"];

/// Configuration of one logical connection.
///
/// Credentials never appear in `Debug` or `Display` output; use
/// [`Config::to_dsn`] for the full serialized form.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    user: Option<String>,
    bucket: String,
    path: String,
    values: BTreeMap<String, String>,
}

impl Config {
    /// Create a config with no output location and the standard defaults:
    /// database `default`, region `us-east-1`, missing cells read as empty
    /// strings, remote workgroup creation allowed.
    pub fn new() -> Self {
        let mut values = BTreeMap::new();
        values.insert(KEY_DB.to_string(), DEFAULT_DATABASE.to_string());
        values.insert(KEY_REGION.to_string(), DEFAULT_REGION.to_string());
        values.insert(KEY_MISSING_AS_EMPTY_STRING.to_string(), "true".to_string());
        values.insert(KEY_WG_REMOTE_CREATION.to_string(), "true".to_string());
        Self {
            user: None,
            bucket: String::new(),
            path: String::new(),
            values,
        }
    }

    /// Create a config with an output location, region and static credentials.
    ///
    /// # Errors
    ///
    /// Returns the first validation error among the four inputs.
    pub fn with_credentials(
        output_location: &str,
        region: &str,
        access_id: &str,
        secret_access_key: &str,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::new();
        config.set_output_location(output_location)?;
        config.set_region(region)?;
        config.set_access_id(access_id)?;
        config.set_secret_access_key(secret_access_key)?;
        Ok(config)
    }

    /// Serialize to the canonical DSN, credentials included.
    pub fn to_dsn(&self) -> String {
        self.serialize(false)
    }

    /// Serialize to a DSN with credential values replaced by `*`.
    pub fn to_redacted_dsn(&self) -> String {
        self.serialize(true)
    }

    fn serialize(&self, redact: bool) -> String {
        let mut out = format!("{}://", SCHEME);
        if let Some(user) = &self.user {
            out.push_str(&urlencoding::encode(user));
            out.push('@');
        }
        out.push_str(&self.bucket);
        if !self.path.is_empty() {
            out.push('/');
            let segments: Vec<_> = self
                .path
                .split('/')
                .map(|segment| urlencoding::encode(segment).into_owned())
                .collect();
            out.push_str(&segments.join("/"));
        }

        let pairs: Vec<String> = self
            .values
            .iter()
            .map(|(key, value)| {
                let value = if redact && SECRET_KEYS.contains(&key.as_str()) {
                    REDACTED
                } else {
                    value.as_str()
                };
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
            .collect();
        if !pairs.is_empty() {
            out.push('?');
            out.push_str(&pairs.join("&"));
        }
        out
    }

    // ------------------------------------------------------------------
    // Output location
    // ------------------------------------------------------------------

    /// Set the query result location, e.g. `s3://bucket/prefix`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidOutputLocation` if `location` does not
    /// start with `s3://`.
    pub fn set_output_location(&mut self, location: &str) -> Result<(), ConfigError> {
        let rest = location
            .strip_prefix("s3://")
            .ok_or_else(|| ConfigError::InvalidOutputLocation(location.to_string()))?;
        let (bucket, path) = rest.split_once('/').unwrap_or((rest, ""));
        self.bucket = bucket.to_string();
        self.path = path.to_string();
        Ok(())
    }

    /// Query result location as `s3://bucket/path`.
    pub fn output_location(&self) -> String {
        format!("{}://{}/{}", SCHEME, self.bucket, self.path)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_user(&mut self, user: &str) {
        self.user = if user.is_empty() {
            None
        } else {
            Some(user.to_string())
        };
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    // ------------------------------------------------------------------
    // Region, database and credentials
    // ------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `ConfigError::MissingRegion` if `region` is empty.
    pub fn set_region(&mut self, region: &str) -> Result<(), ConfigError> {
        if region.is_empty() {
            return Err(ConfigError::MissingRegion);
        }
        self.set_value(KEY_REGION, region);
        Ok(())
    }

    /// Region from the config, then `AWS_REGION`, then `AWS_DEFAULT_REGION`,
    /// then `us-east-1`.
    pub fn region(&self) -> String {
        self.region_with(env_var)
    }

    pub(crate) fn region_with(&self, env: impl Fn(&str) -> Option<String>) -> String {
        self.lookup(KEY_REGION, &ENV_REGION, env)
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    /// # Errors
    ///
    /// Returns `ConfigError::MissingAccessId` if `access_id` is empty.
    pub fn set_access_id(&mut self, access_id: &str) -> Result<(), ConfigError> {
        if access_id.is_empty() {
            return Err(ConfigError::MissingAccessId);
        }
        self.set_value(KEY_ACCESS_ID, access_id);
        Ok(())
    }

    /// Access key ID from the config, then `AWS_ACCESS_KEY_ID`, then `AWS_ACCESS_KEY`.
    pub fn access_id(&self) -> Option<String> {
        self.access_id_with(env_var)
    }

    pub(crate) fn access_id_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.lookup(KEY_ACCESS_ID, &ENV_ACCESS_ID, env)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::MissingSecretKey` if `secret` is empty.
    pub fn set_secret_access_key(&mut self, secret: &str) -> Result<(), ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::MissingSecretKey);
        }
        self.set_value(KEY_SECRET_ACCESS_KEY, secret);
        Ok(())
    }

    /// Secret key from the config, then `AWS_SECRET_ACCESS_KEY`, then `AWS_SECRET_KEY`.
    pub fn secret_access_key(&self) -> Option<String> {
        self.secret_access_key_with(env_var)
    }

    pub(crate) fn secret_access_key_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.lookup(KEY_SECRET_ACCESS_KEY, &ENV_SECRET_KEY, env)
    }

    pub fn set_session_token(&mut self, token: &str) {
        self.set_value(KEY_SESSION_TOKEN, token);
    }

    /// Session token from the config, then `AWS_SESSION_TOKEN`.
    pub fn session_token(&self) -> Option<String> {
        self.session_token_with(env_var)
    }

    pub(crate) fn session_token_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.lookup(KEY_SESSION_TOKEN, &ENV_SESSION_TOKEN, env)
    }

    pub fn set_database(&mut self, database: &str) {
        self.set_value(KEY_DB, database);
    }

    /// Database name, `default` when unset.
    pub fn database(&self) -> &str {
        self.value(KEY_DB).unwrap_or(DEFAULT_DATABASE)
    }

    pub fn set_aws_profile(&mut self, profile: &str) {
        self.set_value(KEY_AWS_PROFILE, profile);
    }

    pub fn aws_profile(&self) -> Option<&str> {
        self.value(KEY_AWS_PROFILE)
    }

    // ------------------------------------------------------------------
    // Workgroup
    // ------------------------------------------------------------------

    /// Store a workgroup's name, policy configuration and tags.
    ///
    /// Tags are appended to any tags already stored.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidParameter` if the policy cannot be encoded.
    pub fn set_workgroup(&mut self, workgroup: &Workgroup) -> Result<(), ConfigError> {
        self.set_value(KEY_WORKGROUP_NAME, workgroup.name());
        let encoded = workgroup.config().encode().map_err(|e| ConfigError::InvalidParameter {
            parameter: KEY_WORKGROUP_CONFIG.to_string(),
            message: e.to_string(),
        })?;
        self.set_value(KEY_WORKGROUP_CONFIG, &encoded);

        let mut tags = self.value(KEY_TAG).unwrap_or_default().to_string();
        tags.push_str(&workgroup.tags().flatten());
        self.set_value(KEY_TAG, &tags);
        Ok(())
    }

    /// Workgroup name, `primary` when unset.
    pub fn workgroup_name(&self) -> &str {
        match self.value(KEY_WORKGROUP_NAME) {
            Some(name) if !name.is_empty() => name,
            _ => DEFAULT_WORKGROUP_NAME,
        }
    }

    /// Rebuild the configured workgroup.
    ///
    /// A missing or undecodable policy configuration yields the default policy.
    pub fn workgroup(&self) -> Workgroup {
        let config = self
            .value(KEY_WORKGROUP_CONFIG)
            .and_then(|raw| WorkgroupConfig::decode(raw).ok())
            .unwrap_or_default();
        let tags = self
            .value(KEY_TAG)
            .map(WorkgroupTags::parse)
            .unwrap_or_default();
        Workgroup::new(self.workgroup_name(), config, tags)
    }

    pub fn set_wg_remote_creation(&mut self, allowed: bool) {
        self.set_flag(KEY_WG_REMOTE_CREATION, allowed);
    }

    pub fn is_wg_remote_creation_allowed(&self) -> bool {
        self.flag(KEY_WG_REMOTE_CREATION)
    }

    // ------------------------------------------------------------------
    // Missing values and masking
    // ------------------------------------------------------------------

    pub fn set_missing_as_empty_string(&mut self, enabled: bool) {
        self.set_flag(KEY_MISSING_AS_EMPTY_STRING, enabled);
    }

    pub fn is_missing_as_empty_string(&self) -> bool {
        self.flag(KEY_MISSING_AS_EMPTY_STRING)
    }

    pub fn set_missing_as_default(&mut self, enabled: bool) {
        self.set_flag(KEY_MISSING_AS_DEFAULT, enabled);
    }

    pub fn is_missing_as_default(&self) -> bool {
        self.flag(KEY_MISSING_AS_DEFAULT)
    }

    /// Replace every value of `column` with `substitute`.
    pub fn set_masked_column(&mut self, column: &str, substitute: &str) {
        self.set_value(&format!("{}{}", MASKED_COLUMN_PREFIX, column), substitute);
    }

    /// Column name to substitute value for every masked column.
    pub fn masked_columns(&self) -> HashMap<String, String> {
        self.values
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(MASKED_COLUMN_PREFIX)
                    .map(|column| (column.to_string(), value.clone()))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Feature flags
    // ------------------------------------------------------------------

    pub fn set_logging(&mut self, enabled: bool) {
        self.set_flag(KEY_LOGGING_ENABLED, enabled);
    }

    /// Logging is on unless explicitly set to `false`.
    pub fn is_logging_enabled(&self) -> bool {
        self.value(KEY_LOGGING_ENABLED) != Some("false")
    }

    pub fn set_metrics(&mut self, enabled: bool) {
        self.set_flag(KEY_METRICS_ENABLED, enabled);
    }

    pub fn is_metrics_enabled(&self) -> bool {
        self.flag(KEY_METRICS_ENABLED)
    }

    pub fn set_read_only(&mut self, enabled: bool) {
        self.set_flag(KEY_READ_ONLY, enabled);
    }

    pub fn is_read_only(&self) -> bool {
        self.flag(KEY_READ_ONLY)
    }

    pub fn set_moneywise(&mut self, enabled: bool) {
        self.set_flag(KEY_MONEY_WISE, enabled);
    }

    pub fn is_moneywise(&self) -> bool {
        self.flag(KEY_MONEY_WISE)
    }

    // ------------------------------------------------------------------
    // Timeouts
    // ------------------------------------------------------------------

    /// Merge timeout overrides into the config. Unset overrides leave stored values alone.
    pub fn set_service_limit_override(&mut self, limits: &ServiceLimitOverride) {
        limits.write_values(&mut self.values);
    }

    pub fn service_limit_override(&self) -> ServiceLimitOverride {
        ServiceLimitOverride::from_values(&self.values)
    }

    // ------------------------------------------------------------------
    // Raw access
    // ------------------------------------------------------------------

    /// Raw parameter value.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Set a raw parameter value.
    pub fn set_value(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn flag(&self, key: &str) -> bool {
        self.value(key) == Some("true")
    }

    fn set_flag(&mut self, key: &str, enabled: bool) {
        self.set_value(key, if enabled { "true" } else { "false" });
    }

    fn lookup(
        &self,
        key: &str,
        env_keys: &[&str],
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        if let Some(value) = self.value(key).filter(|v| !v.is_empty()) {
            return Some(value.to_string());
        }
        env_keys
            .iter()
            .find_map(|name| env(name).filter(|v| !v.is_empty()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl FromStr for Config {
    type Err = ConfigError;

    /// Parse a DSN in the format `s3://[user@]bucket[/path][?param=value&...]`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use athena_sql::connection::Config;
    /// # use std::str::FromStr;
    /// let config = Config::from_str("s3://query-results/athena?db=sales&region=us-west-2")?;
    /// assert_eq!(config.database(), "sales");
    /// assert_eq!(config.output_location(), "s3://query-results/athena");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dsn = s.trim();
        let rest = dsn
            .strip_prefix("s3://")
            .ok_or_else(|| ConfigError::InvalidConfig(format!("scheme must be {}", SCHEME)))?;

        let (main_part, query_string) = match rest.split_once('?') {
            Some((main, query)) => (main, Some(query)),
            None => (rest, None),
        };
        let values = parse_query_params(query_string)?;

        let (authority, path) = main_part.split_once('/').unwrap_or((main_part, ""));
        let (user, bucket) = match authority.rfind('@') {
            Some(pos) => (Some(decode("user", &authority[..pos])?), &authority[pos + 1..]),
            None => (None, authority),
        };

        let config = Self {
            user: user.filter(|u| !u.is_empty()),
            bucket: bucket.to_string(),
            path: decode("path", path)?,
            values,
        };
        if config.value(KEY_REGION).map_or(true, str::is_empty) {
            return Err(ConfigError::InvalidConfig("region is required".to_string()));
        }
        Ok(config)
    }
}

/// Parse query parameters from the DSN query string. The first occurrence of a key wins.
fn parse_query_params(query: Option<&str>) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut params = BTreeMap::new();

    if let Some(query) = query {
        for pair in query.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode("parameter name", key)?;
            let value = decode(&key, value)?;
            params.entry(key).or_insert(value);
        }
    }

    Ok(params)
}

fn decode(what: &str, raw: &str) -> Result<String, ConfigError> {
    let raw = raw.replace('+', " ");
    urlencoding::decode(&raw)
        .map(|s| s.into_owned())
        .map_err(|e| ConfigError::InvalidConfig(format!("failed to decode {}: {}", what, e)))
}

// Prevent credentials from being displayed in debug or display output
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("dsn", &self.to_redacted_dsn())
            .finish()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_redacted_dsn())
    }
}
