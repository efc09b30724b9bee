// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Engine configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! [[plugins]]
//! device = "CPU"
//! plugin = "reference_cpu"
//!
//! [plugins.properties]
//! NUM_STREAMS = 2
//! PERFORMANCE_HINT = "THROUGHPUT"
//! ```
//!
//! Property values may be written as TOML strings, integers or booleans;
//! they are handed to the device as strings.

use std::collections::BTreeMap;
use std::path::Path;

use crate::property::PropertyMap;
use crate::RuntimeError;

/// Device name the default configuration registers.
pub const DEFAULT_DEVICE: &str = "CPU";
/// Plugin id backing [`DEFAULT_DEVICE`].
pub const DEFAULT_PLUGIN: &str = "reference_cpu";

/// The device registry an [`crate::Engine`] starts with.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub plugins: Vec<PluginEntry>,
}

/// One device registration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PluginEntry {
    /// Name callers use to address the device, e.g. `"CPU"`.
    pub device: String,
    /// Plugin id in the process-wide catalog.
    pub plugin: String,
    /// Properties applied right after registration.
    #[serde(default)]
    pub properties: BTreeMap<String, toml::Value>,
}

impl PluginEntry {
    pub fn new(device: impl Into<String>, plugin: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            plugin: plugin.into(),
            properties: BTreeMap::new(),
        }
    }

    /// The entry's properties as a string bag.
    pub fn property_map(&self) -> PropertyMap {
        self.properties
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            plugins: vec![PluginEntry::new(DEFAULT_DEVICE, DEFAULT_PLUGIN)],
        }
    }
}

impl EngineConfig {
    /// A configuration that registers no devices.
    pub fn empty() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| RuntimeError::Config(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::Config(format!("TOML serialise error: {e}")))
    }

    /// Rejects blank names and devices listed twice.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        let mut seen = std::collections::BTreeSet::new();
        for entry in &self.plugins {
            if entry.device.trim().is_empty() || entry.plugin.trim().is_empty() {
                return Err(RuntimeError::Config(
                    "plugin entries need a device and a plugin".into(),
                ));
            }
            if !seen.insert(entry.device.as_str()) {
                return Err(RuntimeError::Config(format!(
                    "device '{}' listed more than once",
                    entry.device
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registers_cpu() {
        let config = EngineConfig::default();
        assert_eq!(config.plugins.len(), 1);
        assert_eq!(config.plugins[0].device, "CPU");
        assert_eq!(config.plugins[0].plugin, "reference_cpu");
    }

    #[test]
    fn test_parse_with_properties() {
        let toml = r#"
            [[plugins]]
            device = "CPU"
            plugin = "reference_cpu"

            [plugins.properties]
            NUM_STREAMS = 2
            PERFORMANCE_HINT = "THROUGHPUT"
            ENABLE_PROFILING = true

            [[plugins]]
            device = "CPU_B"
            plugin = "cpu"
        "#;
        let config = EngineConfig::from_toml(toml).unwrap();
        assert_eq!(config.plugins.len(), 2);
        let props = config.plugins[0].property_map();
        assert_eq!(props["NUM_STREAMS"], "2");
        assert_eq!(props["PERFORMANCE_HINT"], "THROUGHPUT");
        assert_eq!(props["ENABLE_PROFILING"], "true");
        assert!(config.plugins[1].properties.is_empty());
    }

    #[test]
    fn test_roundtrip() {
        let mut entry = PluginEntry::new("CPU", "reference_cpu");
        entry
            .properties
            .insert("NUM_STREAMS".into(), toml::Value::String("AUTO".into()));
        let config = EngineConfig {
            plugins: vec![entry],
        };
        let text = config.to_toml().unwrap();
        let back = EngineConfig::from_toml(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_duplicate_device_rejected() {
        let toml = r#"
            [[plugins]]
            device = "CPU"
            plugin = "reference_cpu"
            [[plugins]]
            device = "CPU"
            plugin = "cpu"
        "#;
        assert!(matches!(
            EngineConfig::from_toml(toml),
            Err(RuntimeError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(EngineConfig::from_toml("plugins = 3").is_err());
        assert!(EngineConfig::from_file(Path::new("/nonexistent/engine.toml")).is_err());
        assert!(EngineConfig::empty().plugins.is_empty());
    }
}
