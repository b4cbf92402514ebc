//! Gateway configuration
//!
//! Loaded from TOML. Older deployments carry a single `apiUrl` combining the
//! endpoint, the storage account and an optional subfolder, e.g.
//! `https://storage.example.net/my-zone/media`. That form is decomposed once,
//! in [`GatewayConfig::resolve`], never per call.

use crate::error::{GatewayError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bound on a single mirror operation
pub const DEFAULT_MIRROR_TIMEOUT_MS: u64 = 5_000;

const LEGACY_URL_PATTERN: &str = r"^(?P<scheme>[A-Za-z][A-Za-z0-9+.-]*)://(?P<host>[^/?#]+)(?P<path>/[^?#]*)?$";

/// Recognized configuration options
///
/// # Examples
///
/// ```
/// use storage_gateway::GatewayConfig;
///
/// let config = GatewayConfig::from_toml_str(r#"
///     apiUrl = "https://storage.example.net/my-zone/media"
///     apiKey = "secret"
///     useGarbage = true
/// "#).unwrap();
///
/// let resolved = config.resolve().unwrap();
/// assert_eq!(resolved.credentials.endpoint, "https://storage.example.net");
/// assert_eq!(resolved.credentials.storage_account_id, "my-zone");
/// assert_eq!(resolved.subfolder, "media");
/// assert!(resolved.use_garbage);
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Store endpoint, e.g. "https://storage.example.net"
    pub endpoint: String,

    /// Storage account (zone) name, used as the access key id
    #[serde(alias = "storageName")]
    pub storage_account_id: String,

    /// Secret access key
    #[serde(alias = "apiKey")]
    pub access_key: String,

    /// Subfolder prefixed to every logical path
    pub subfolder: String,

    /// Keep dated copies of objects before they are overwritten or deleted
    #[serde(alias = "useGarbage")]
    pub use_garbage: bool,

    /// Report deletes as successful without touching the store
    #[serde(alias = "neverDelete")]
    pub never_delete: bool,

    /// Directory mirrored with every write and delete
    #[serde(alias = "replicationRoot", skip_serializing_if = "Option::is_none")]
    pub replication_root: Option<PathBuf>,

    /// Legacy combined endpoint/account/subfolder URL
    #[serde(alias = "apiUrl", skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Upper bound for one mirror operation, in milliseconds
    #[serde(alias = "mirrorTimeoutMs")]
    pub mirror_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            endpoint: String::new(),
            storage_account_id: String::new(),
            access_key: String::new(),
            subfolder: String::new(),
            use_garbage: false,
            never_delete: false,
            replication_root: None,
            api_url: None,
            mirror_timeout_ms: DEFAULT_MIRROR_TIMEOUT_MS,
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("endpoint", &self.endpoint)
            .field("storage_account_id", &self.storage_account_id)
            .field("access_key", &"<redacted>")
            .field("subfolder", &self.subfolder)
            .field("use_garbage", &self.use_garbage)
            .field("never_delete", &self.never_delete)
            .field("replication_root", &self.replication_root)
            .field("api_url", &self.api_url)
            .field("mirror_timeout_ms", &self.mirror_timeout_ms)
            .finish()
    }
}

impl GatewayConfig {
    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Validate and decompose the legacy URL form
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let mut credentials = StoreCredentials {
            endpoint: self.endpoint.trim_end_matches('/').to_string(),
            storage_account_id: self.storage_account_id.clone(),
            access_key: self.access_key.clone(),
        };
        let mut subfolder = self.subfolder.clone();

        if let Some(api_url) = &self.api_url {
            let legacy = decompose_legacy_url(api_url)?;
            credentials.endpoint = legacy.endpoint;
            credentials.storage_account_id = legacy.storage_account_id;
            if let Some(sub) = legacy.subfolder {
                subfolder = sub;
            }
        }

        if self.mirror_timeout_ms == 0 {
            return Err(GatewayError::InvalidConfig(
                "mirror_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if let Some(root) = &self.replication_root {
            if root.as_os_str().is_empty() {
                return Err(GatewayError::InvalidConfig(
                    "replication_root cannot be empty".to_string(),
                ));
            }
        }

        Ok(ResolvedConfig {
            credentials,
            subfolder,
            use_garbage: self.use_garbage,
            never_delete: self.never_delete,
            replication_root: self.replication_root.clone(),
            mirror_timeout: Duration::from_millis(self.mirror_timeout_ms),
        })
    }
}

/// Credentials handed to whatever builds the store transport
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StoreCredentials {
    pub endpoint: String,
    pub storage_account_id: String,
    pub access_key: String,
}

impl fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("endpoint", &self.endpoint)
            .field("storage_account_id", &self.storage_account_id)
            .field("access_key", &"<redacted>")
            .finish()
    }
}

/// Configuration after legacy decomposition and validation
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub credentials: StoreCredentials,
    pub subfolder: String,
    pub use_garbage: bool,
    pub never_delete: bool,
    pub replication_root: Option<PathBuf>,
    pub mirror_timeout: Duration,
}

impl ResolvedConfig {
    pub fn credentials(&self) -> &StoreCredentials {
        &self.credentials
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ResolvedConfig {
            credentials: StoreCredentials::default(),
            subfolder: String::new(),
            use_garbage: false,
            never_delete: false,
            replication_root: None,
            mirror_timeout: Duration::from_millis(DEFAULT_MIRROR_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct LegacyParts {
    endpoint: String,
    storage_account_id: String,
    subfolder: Option<String>,
}

/// Split `scheme://host/<account>[/<sub>...]`
fn decompose_legacy_url(url: &str) -> Result<LegacyParts> {
    let re = Regex::new(LEGACY_URL_PATTERN)
        .map_err(|e| GatewayError::InvalidConfig(format!("legacy url pattern: {}", e)))?;
    let caps = re
        .captures(url.trim())
        .ok_or_else(|| GatewayError::InvalidConfig(format!("malformed apiUrl '{}'", url)))?;

    let endpoint = format!("{}://{}", &caps["scheme"], &caps["host"]);
    let segments: Vec<&str> = caps
        .name("path")
        .map(|m| m.as_str().split('/').filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let (account, rest) = segments.split_first().ok_or_else(|| {
        GatewayError::InvalidConfig(format!("apiUrl '{}' names no storage account", url))
    })?;

    Ok(LegacyParts {
        endpoint,
        storage_account_id: account.to_string(),
        subfolder: (!rest.is_empty()).then(|| rest.join("/")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_toml_str("").unwrap();
        assert_eq!(config.mirror_timeout_ms, DEFAULT_MIRROR_TIMEOUT_MS);
        assert!(!config.use_garbage);
        assert!(!config.never_delete);
        assert!(config.replication_root.is_none());

        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.subfolder, "");
        assert_eq!(resolved.mirror_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_snake_case_and_aliases() {
        let config = GatewayConfig::from_toml_str(
            r#"
            endpoint = "https://storage.example.net/"
            storageName = "zone"
            access_key = "k"
            subfolder = "media"
            neverDelete = true
            replicationRoot = "/var/mirror"
            "#,
        )
        .unwrap();
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.credentials.endpoint, "https://storage.example.net");
        assert_eq!(resolved.credentials.storage_account_id, "zone");
        assert_eq!(resolved.subfolder, "media");
        assert!(resolved.never_delete);
        assert_eq!(resolved.replication_root, Some(PathBuf::from("/var/mirror")));
    }

    #[test]
    fn test_legacy_url_account_only_keeps_subfolder() {
        let config = GatewayConfig {
            api_url: Some("https://storage.example.net/zone/".to_string()),
            subfolder: "keep".to_string(),
            ..GatewayConfig::default()
        };
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.credentials.endpoint, "https://storage.example.net");
        assert_eq!(resolved.credentials.storage_account_id, "zone");
        assert_eq!(resolved.subfolder, "keep");
    }

    #[test]
    fn test_legacy_url_with_nested_subfolder() {
        let parts = decompose_legacy_url("http://host:8080//zone/a/b/").unwrap();
        assert_eq!(
            parts,
            LegacyParts {
                endpoint: "http://host:8080".to_string(),
                storage_account_id: "zone".to_string(),
                subfolder: Some("a/b".to_string()),
            }
        );
    }

    #[test]
    fn test_legacy_url_rejected() {
        assert!(decompose_legacy_url("not a url").is_err());
        assert!(decompose_legacy_url("https://host").is_err());
        assert!(decompose_legacy_url("https://host/").is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = GatewayConfig::from_toml_str("mirror_timeout_ms = 0").unwrap();
        assert!(matches!(
            config.resolve(),
            Err(GatewayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_debug_redacts_access_key() {
        let config = GatewayConfig::from_toml_str(r#"access_key = "hunter2""#).unwrap();
        assert!(!format!("{:?}", config).contains("hunter2"));
        let resolved = config.resolve().unwrap();
        assert!(!format!("{:?}", resolved).contains("hunter2"));
    }
}
