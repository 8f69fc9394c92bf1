//! Workspace configuration.

use fieldsync_core::{CodecKind, CodecRegistry, ValueCodec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Workspace configuration stored in `.fieldsync/config.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Configuration version.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Field resolution settings.
    #[serde(default)]
    pub fields: FieldSettings,

    /// Tool server settings.
    #[serde(default)]
    pub server: ServerSettings,
}

fn default_version() -> u32 {
    1
}

/// How custom fields are resolved and serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSettings {
    /// Always resolve field names within the issue's project.
    #[serde(default)]
    pub search_by_project_only: bool,

    /// Codec overrides keyed by field schema type.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub codecs: BTreeMap<String, CodecKind>,
}

/// Defaults for `fieldsync tool serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    17373
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            version: 1,
            fields: FieldSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl WorkspaceConfig {
    /// Codec registry with the standard schema mappings plus configured overrides.
    #[must_use]
    pub fn codec_registry(&self) -> CodecRegistry {
        let mut registry = CodecRegistry::default();
        for (schema, kind) in &self.fields.codecs {
            registry.register(schema, ValueCodec::from(*kind));
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let yaml = r"
fields:
  search_by_project_only: true
  codecs:
    acme:team: reference
";
        let config: WorkspaceConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.version, 1);
        assert!(config.fields.search_by_project_only);
        assert_eq!(config.server.port, 17373);
        assert_eq!(
            config.codec_registry().codec_for(Some("ACME:TEAM")),
            ValueCodec::Reference
        );
    }

    #[test]
    fn test_default_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&WorkspaceConfig::default()).unwrap();
        let config: WorkspaceConfig = serde_yaml::from_str(&yaml).unwrap();

        assert!(!config.fields.search_by_project_only);
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
