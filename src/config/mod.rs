//! Local declaration file
//!
//! The component's desired storage and URLs live in a YAML file next to the
//! project sources. The file is parsed and validated on every read so edits
//! take effect without restarting anything.

use crate::domain::quantity;
use crate::domain::{
    ComponentRef, EndpointKind, EndpointSpec, LocalConfigProvider, StorageSpec,
    DEFAULT_STORAGE_SIZE, DEFAULT_URL_PATH,
};
use crate::error::{Error, Result};
use crate::kubernetes::labels::{is_valid_label_value, MAX_LABEL_VALUE_LENGTH};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default location of the declaration file, relative to the project root
pub const DEFAULT_CONFIG_PATH: &str = ".devsync/config.yaml";

// =============================================================================
// File Format
// =============================================================================

/// Top-level declaration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfig {
    /// Component name
    pub name: String,

    /// Application the component belongs to
    pub application: String,

    /// Namespace to work in; the kube context default otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default)]
    pub storage: Vec<StorageConfig>,

    #[serde(default)]
    pub urls: Vec<UrlConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    pub name: String,

    #[serde(default = "default_size")]
    pub size: String,

    pub path: String,

    #[serde(default)]
    pub container: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlConfig {
    pub name: String,

    pub port: i64,

    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub secure: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_secret: Option<String>,

    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default)]
    pub kind: EndpointKind,
}

fn default_size() -> String {
    DEFAULT_STORAGE_SIZE.to_string()
}

fn default_path() -> String {
    DEFAULT_URL_PATH.to_string()
}

/// Names are written as label values on every object created for them
fn label_value(what: &str, name: &str) -> Result<()> {
    if is_valid_label_value(name) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{} name {:?} is not a valid label value (at most {} alphanumerics, '-', '_' or '.')",
            what, name, MAX_LABEL_VALUE_LENGTH
        )))
    }
}

impl ComponentConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: ComponentConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("component name must not be empty".into()));
        }
        if self.application.trim().is_empty() {
            return Err(Error::Validation(format!(
                "component {}: application name must not be empty",
                self.name
            )));
        }

        label_value("component", &self.name)?;
        label_value("application", &self.application)?;

        let mut names = BTreeSet::new();
        for storage in &self.storage {
            if storage.name.is_empty() {
                return Err(Error::Validation("storage name must not be empty".into()));
            }
            label_value("storage", &storage.name)?;
            if !names.insert(storage.name.as_str()) {
                return Err(Error::Validation(format!(
                    "storage {} is declared more than once",
                    storage.name
                )));
            }
            if storage.path.is_empty() {
                return Err(Error::Validation(format!(
                    "storage {}: mount path must not be empty",
                    storage.name
                )));
            }
            quantity::validate(&storage.size)?;
        }

        let mut names = BTreeSet::new();
        for url in &self.urls {
            if url.name.is_empty() {
                return Err(Error::Validation("url name must not be empty".into()));
            }
            label_value("url", &url.name)?;
            if !names.insert(url.name.as_str()) {
                return Err(Error::Validation(format!(
                    "url {} is declared more than once",
                    url.name
                )));
            }
            if !(1..=i64::from(u16::MAX)).contains(&url.port) {
                return Err(Error::Validation(format!(
                    "url {}: port {} is out of range",
                    url.name, url.port
                )));
            }
            if url.tls_secret.is_some() && !url.secure {
                return Err(Error::Validation(format!(
                    "url {}: tlsSecret requires secure: true",
                    url.name
                )));
            }
        }

        Ok(())
    }

    pub fn component(&self) -> ComponentRef {
        ComponentRef::new(&self.name, &self.application)
    }

    pub fn storage_specs(&self) -> Vec<StorageSpec> {
        self.storage
            .iter()
            .map(|s| StorageSpec::new(&s.name, &s.size, &s.path, &s.container))
            .collect()
    }

    pub fn endpoint_specs(&self) -> Vec<EndpointSpec> {
        self.urls
            .iter()
            .map(|u| EndpointSpec {
                name: u.name.clone(),
                host: u.host.clone(),
                // range checked by validate
                port: u16::try_from(u.port).unwrap_or_default(),
                secure: u.secure,
                tls_secret: u.tls_secret.clone(),
                path: u.path.clone(),
                kind: u.kind,
            })
            .collect()
    }
}

// =============================================================================
// File Provider
// =============================================================================

/// Declaration provider reading a YAML file on every call
#[derive(Debug, Clone)]
pub struct LocalConfigFile {
    path: PathBuf,
}

impl LocalConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, parse and validate the file
    pub fn load(&self) -> Result<ComponentConfig> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        debug!(path = %self.path.display(), "Loaded component declaration");
        ComponentConfig::from_yaml(&content)
    }
}

impl LocalConfigProvider for LocalConfigFile {
    fn component(&self) -> Result<ComponentRef> {
        Ok(self.load()?.component())
    }

    fn list_storage(&self) -> Result<Vec<StorageSpec>> {
        Ok(self.load()?.storage_specs())
    }

    fn list_endpoints(&self) -> Result<Vec<EndpointSpec>> {
        Ok(self.load()?.endpoint_specs())
    }
}
