//! Configuration management for SwiftKV
//!
//! [`ConnectionConfig`] carries the credentials an object-store client needs to
//! authenticate; [`StoreConfig`] adds the target container and listing page
//! size. Both deserialize from the camelCase maps produced by plugin config
//! files.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Names requested per listing call unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 10_000;

/// Upper bound the Swift listing API accepts for a single call.
pub const MAX_PAGE_SIZE: usize = 10_000;

/// Credentials and endpoint for an object-store account
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Account user name
    pub user_name: String,
    /// API key or password
    pub api_key: String,
    /// Auth endpoint, e.g. `https://auth.example.com/v3`
    pub auth_url: String,
    /// Auth protocol version; 0 lets the client detect it from the URL
    #[serde(default)]
    pub auth_version: u8,
    /// Tenant (project) name
    #[serde(default)]
    pub tenant: Option<String>,
    /// Tenant (project) id
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Region to select from the service catalog
    #[serde(default)]
    pub region: Option<String>,
}

/// Full configuration for one container-backed datastore
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Account connection settings
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    /// Container holding every object of the datastore
    pub container: String,
    /// Names requested per listing call
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl StoreConfig {
    /// Build a config with the default page size.
    pub fn new(connection: ConnectionConfig, container: impl Into<String>) -> Self {
        Self {
            connection,
            container: container.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the listing page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Parse and validate a plugin-style config map.
    pub fn from_map(map: &Map<String, Value>) -> StoreResult<Self> {
        let config: StoreConfig = serde_json::from_value(Value::Object(map.clone()))
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        config.validate().map_err(StoreError::InvalidConfig)?;
        Ok(config)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        let conn = &self.connection;
        if conn.user_name.is_empty() {
            return Err("userName must not be empty".into());
        }
        if conn.api_key.is_empty() {
            return Err("apiKey must not be empty".into());
        }
        if !(conn.auth_url.starts_with("http://") || conn.auth_url.starts_with("https://")) {
            return Err(format!("authUrl must be an http(s) URL, got {:?}", conn.auth_url));
        }
        if conn.auth_version > 3 {
            return Err(format!("authVersion must be 0, 1, 2 or 3, got {}", conn.auth_version));
        }
        if self.container.is_empty() {
            return Err("container must not be empty".into());
        }
        if self.container.contains('/') {
            return Err("container must not contain '/'".into());
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(format!("pageSize must be in [1, {}]", MAX_PAGE_SIZE));
        }
        Ok(())
    }
}
