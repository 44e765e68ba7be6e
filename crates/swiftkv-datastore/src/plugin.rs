//! Plugin entry point: builds a [`SwiftDatastore`] from a host config map.
//!
//! A host repository describes its datastores as JSON maps tagged with a
//! `type`. Maps tagged `swiftds` are handed to [`SwiftPlugin::parse_config`].

use std::sync::Arc;

use serde_json::{Map, Value};

use swiftkv_core::{ObjectStore, StoreConfig};

use crate::datastore::SwiftDatastore;
use crate::error::DatastoreResult;

/// Registration data for the Swift datastore.
#[derive(Debug, Default, Clone, Copy)]
pub struct SwiftPlugin;

impl SwiftPlugin {
    pub fn name(&self) -> &'static str {
        "swift-datastore-plugin"
    }

    pub fn version(&self) -> &'static str {
        "0.0.1"
    }

    /// Value of the `type` field this plugin handles.
    pub fn datastore_type_name(&self) -> &'static str {
        "swiftds"
    }

    /// Parse a datastore config map.
    ///
    /// Requires `userName`, `apiKey`, `authUrl` and `container`; accepts
    /// `tenant`, `tenantId`, `region`, `authVersion` and `pageSize`.
    pub fn parse_config(&self, map: &Map<String, Value>) -> DatastoreResult<PluginConfig> {
        let config = StoreConfig::from_map(map)?;
        Ok(PluginConfig { config })
    }
}

/// A parsed datastore config, ready to create the datastore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    config: StoreConfig,
}

impl PluginConfig {
    pub fn store_config(&self) -> &StoreConfig {
        &self.config
    }

    /// Fields identifying the on-disk (here: in-container) data.
    ///
    /// Hosts compare this against the spec recorded at creation time to
    /// detect a config pointing at different data.
    pub fn disk_spec(&self) -> Map<String, Value> {
        let conn = &self.config.connection;
        let mut spec = Map::new();
        spec.insert("apiUrl".into(), Value::String(conn.auth_url.clone()));
        spec.insert("container".into(), Value::String(self.config.container.clone()));
        spec.insert("tenant".into(), Value::String(conn.tenant.clone().unwrap_or_default()));
        spec
    }

    /// Open the datastore on `store`, which must be a client for the configured account.
    pub fn create(&self, store: Arc<dyn ObjectStore>) -> DatastoreResult<SwiftDatastore> {
        SwiftDatastore::open(&self.config, store)
    }
}
